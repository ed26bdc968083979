//! Runtime configuration.
//!
//! Read once at startup from the environment, with `.env` as a fallback.
//! Recognised variables: `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`
//! (or `SUPABASE_KEY` / `SUPABASE_ANON_KEY`), `PROBE_TIMEOUT_SECS`,
//! `PROBE_SAMPLE_LIMIT`, `PROBE_TABLES` and `PROBE_INSERT`.

use crate::errors::ProbeError;
use std::time::Duration;

/// Tables probed when neither the command line nor `PROBE_TABLES` names any.
pub const DEFAULT_TABLES: &[&str] = &["teams", "games", "players", "profiles"];

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SAMPLE_LIMIT: usize = 3;
pub const MAX_SAMPLE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_key: String,
    pub request_timeout: Duration,
    pub sample_limit: usize,
    pub tables: Vec<String>,
    pub insert_probe: bool,
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ProbeError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProbeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            supabase_url: non_empty("SUPABASE_URL")
                .ok_or_else(|| {
                    ProbeError::Configuration(
                        "SUPABASE_URL environment variable required".to_string(),
                    )
                })
                .and_then(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err(ProbeError::Configuration(
                            "SUPABASE_URL must start with http:// or https://".to_string(),
                        ));
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })?,
            supabase_key: non_empty("SUPABASE_SERVICE_ROLE_KEY")
                .or_else(|| non_empty("SUPABASE_KEY"))
                .or_else(|| non_empty("SUPABASE_ANON_KEY"))
                .ok_or_else(|| {
                    ProbeError::Configuration(
                        "SUPABASE_SERVICE_ROLE_KEY, SUPABASE_KEY or SUPABASE_ANON_KEY required"
                            .to_string(),
                    )
                })?,
            request_timeout: match non_empty("PROBE_TIMEOUT_SECS") {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        ProbeError::Configuration(
                            "PROBE_TIMEOUT_SECS must be a positive number of seconds".to_string(),
                        )
                    })?,
                None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            },
            sample_limit: match non_empty("PROBE_SAMPLE_LIMIT") {
                Some(raw) => parse_sample_limit(&raw)?,
                None => DEFAULT_SAMPLE_LIMIT,
            },
            tables: non_empty("PROBE_TABLES")
                .map(|raw| parse_table_list(&raw))
                .filter(|tables| !tables.is_empty())
                .unwrap_or_else(|| DEFAULT_TABLES.iter().map(|t| t.to_string()).collect()),
            insert_probe: match non_empty("PROBE_INSERT") {
                Some(raw) => parse_flag(&raw).ok_or_else(|| {
                    ProbeError::Configuration("PROBE_INSERT must be true or false".to_string())
                })?,
                None => true,
            },
        };

        // Never log the key itself
        tracing::debug!("Supabase URL: {}", config.supabase_url);
        tracing::debug!(
            "Request timeout: {}s, sample limit: {}, insert probe: {}",
            config.request_timeout.as_secs(),
            config.sample_limit,
            config.insert_probe
        );

        Ok(config)
    }
}

pub fn parse_sample_limit(raw: &str) -> Result<usize, ProbeError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=MAX_SAMPLE_LIMIT).contains(n))
        .ok_or_else(|| {
            ProbeError::Configuration(format!(
                "sample limit must be between 1 and {}",
                MAX_SAMPLE_LIMIT
            ))
        })
}

fn parse_table_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
