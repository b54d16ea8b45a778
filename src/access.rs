//! IP allowlist for check-ins.
//!
//! With no enabled rule the policy is inactive and every origin is allowed.
//! Once any rule is enabled, only exact matches pass.

use crate::clock::format_timestamp;
use crate::error::{is_constraint_violation, AttendError, AttendResult};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRule {
    pub id: String,
    pub ip_address: String,
    pub is_enabled: bool,
    pub created_at: String,
}

impl IpRule {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(IpRule {
            id: r.get(0)?,
            ip_address: r.get(1)?,
            is_enabled: r.get::<_, i64>(2)? != 0,
            created_at: r.get(3)?,
        })
    }
}

/// Dotted quad: four groups of 1-3 digits, each at most 255.
pub fn validate_ip(raw: &str) -> AttendResult<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(AttendError::Validation("IP address is required".to_string()));
    }
    let groups: Vec<&str> = t.split('.').collect();
    let well_formed = groups.len() == 4
        && groups.iter().all(|g| {
            (1..=3).contains(&g.len())
                && g.bytes().all(|b| b.is_ascii_digit())
                && g.parse::<u16>().map(|v| v <= 255).unwrap_or(false)
        });
    if !well_formed {
        return Err(AttendError::Validation(
            "Invalid IP address format".to_string(),
        ));
    }
    Ok(t.to_string())
}

pub fn is_ip_allowed(conn: &Connection, candidate: Option<&str>) -> AttendResult<bool> {
    let enabled_rules: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attendance_ip_rules WHERE is_enabled = 1",
        [],
        |r| r.get(0),
    )?;
    if enabled_rules == 0 {
        return Ok(true);
    }
    let Some(ip) = candidate else {
        return Ok(false);
    };
    let hit = conn
        .query_row(
            "SELECT 1 FROM attendance_ip_rules WHERE is_enabled = 1 AND ip_address = ?",
            [ip],
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub fn list_rules(conn: &Connection) -> AttendResult<Vec<IpRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, ip_address, is_enabled, created_at FROM attendance_ip_rules
         ORDER BY created_at, rowid",
    )?;
    let rules = stmt
        .query_map([], IpRule::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rules)
}

fn get_rule(conn: &Connection, ip: &str) -> AttendResult<Option<IpRule>> {
    Ok(conn
        .query_row(
            "SELECT id, ip_address, is_enabled, created_at FROM attendance_ip_rules
             WHERE ip_address = ?",
            [ip],
            IpRule::from_row,
        )
        .optional()?)
}

pub fn add_rule(conn: &Connection, raw_ip: &str, now: DateTime<Utc>) -> AttendResult<IpRule> {
    let ip = validate_ip(raw_ip)?;
    if get_rule(conn, &ip)?.is_some() {
        return Err(AttendError::DuplicateRule);
    }
    let rule = IpRule {
        id: uuid::Uuid::new_v4().to_string(),
        ip_address: ip,
        is_enabled: true,
        created_at: format_timestamp(now),
    };
    conn.execute(
        "INSERT INTO attendance_ip_rules(id, ip_address, is_enabled, created_at)
         VALUES(?, ?, 1, ?)",
        (&rule.id, &rule.ip_address, &rule.created_at),
    )
    .map_err(|e| {
        // Lost a race with another writer adding the same address.
        if is_constraint_violation(&e) {
            AttendError::DuplicateRule
        } else {
            AttendError::from(e)
        }
    })?;
    tracing::info!(ip = %rule.ip_address, "ip rule added");
    Ok(rule)
}

pub fn set_rule_enabled(conn: &Connection, raw_ip: &str, enabled: bool) -> AttendResult<IpRule> {
    let ip = validate_ip(raw_ip)?;
    let changed = conn.execute(
        "UPDATE attendance_ip_rules SET is_enabled = ? WHERE ip_address = ?",
        (enabled as i64, &ip),
    )?;
    if changed == 0 {
        return Err(AttendError::RuleNotFound);
    }
    tracing::info!(ip = %ip, enabled, "ip rule updated");
    get_rule(conn, &ip)?.ok_or(AttendError::RuleNotFound)
}

pub fn delete_rule(conn: &Connection, raw_ip: &str) -> AttendResult<()> {
    let ip = validate_ip(raw_ip)?;
    let removed = conn.execute("DELETE FROM attendance_ip_rules WHERE ip_address = ?", [&ip])?;
    if removed == 0 {
        return Err(AttendError::RuleNotFound);
    }
    tracing::info!(ip = %ip, "ip rule deleted");
    Ok(())
}
