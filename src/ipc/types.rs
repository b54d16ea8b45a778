use std::path::PathBuf;

use crate::clock::Clock;
use crate::config::Config;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Settings from defaults or `--config`, before any workspace file.
    pub base_config: Config,
    /// `--timezone` / `ATTENDD_TIMEZONE`; beats every file.
    pub timezone_override: Option<String>,
    /// Effective settings for the open workspace.
    pub config: Config,
    pub clock: Box<dyn Clock>,
}

impl AppState {
    pub fn new(
        base_config: Config,
        timezone_override: Option<String>,
        clock: Box<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let mut config = base_config.clone();
        if let Some(tz) = &timezone_override {
            config.timezone = tz.clone();
        }
        config.validate()?;
        Ok(Self {
            workspace: None,
            db: None,
            base_config,
            timezone_override,
            config,
            clock,
        })
    }
}
