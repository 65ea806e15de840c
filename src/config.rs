use std::env;

use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub clinic_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .ok()
            .map(|s| parse_flag(&s))
            .unwrap_or(true);
        let clinic_offset = match env::var("CLINIC_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw)
                .with_context(|| format!("CLINIC_UTC_OFFSET is not a UTC offset: {raw:?}"))?,
            Err(_) => default_clinic_offset(),
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
            run_migrations,
            clinic_offset,
        })
    }
}

/// Korea Standard Time.
fn default_clinic_offset() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Accepts `+09:00`, `-05:30`, `+0900` or whole hours such as `9` / `-5`.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+09:00"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_utc_offset("9"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_utc_offset("+0900"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_utc_offset("-05:30"), FixedOffset::west_opt(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("0"), FixedOffset::east_opt(0));
        assert_eq!(parse_utc_offset("KST"), None);
        assert_eq!(parse_utc_offset("+25:00"), None);
        assert_eq!(parse_utc_offset(""), None);
    }

    #[test]
    fn test_default_clinic_offset_is_kst() {
        assert_eq!(default_clinic_offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("OFF"));
        assert!(!parse_flag("0"));
    }
}
