//! Runtime configuration.
//!
//! Values come from defaults, then an optional `attendd.toml`, then CLI/env
//! overrides applied in `main`.

use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "attendd.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// IANA zone whose calendar day defines "today" for check-ins.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// How long a connection waits on a locked database before giving up.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Attempts of the whole check-in transaction on a busy store.
    #[serde(default = "default_max_check_in_attempts")]
    pub max_check_in_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_check_in_attempts: default_max_check_in_attempts(),
        }
    }
}

fn default_timezone() -> String {
    "Asia/Manila".to_string()
}
fn default_busy_timeout_ms() -> u64 {
    5_000
}
fn default_max_check_in_attempts() -> u32 {
    3
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `attendd.toml` from the workspace when present, otherwise keeps `self`.
    pub fn merged_with_workspace(&self, workspace: &Path) -> anyhow::Result<Self> {
        let p = workspace.join(CONFIG_FILE_NAME);
        if p.is_file() {
            Config::load(&p)
        } else {
            Ok(self.clone())
        }
    }

    pub fn reference_tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("unknown timezone {:?}: {}", self.timezone, e))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.reference_tz()?;
        if self.max_check_in_attempts == 0 {
            anyhow::bail!("max_check_in_attempts must be at least 1");
        }
        Ok(())
    }
}
