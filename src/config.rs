//! Environment-driven configuration.
//!
//! Every value can be overridden via environment variables so the same build
//! serves multiple upstream tenants without code changes. The custom-field
//! identifiers exist in a "new" and a "legacy" variant; the legacy one is
//! only consulted when the new one yields nothing, which lets the upstream
//! schema migrate without a redeploy.

use std::env;

const DEFAULT_BASE_URL: &str = "https://accounting.example.com/api2";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;

/// Identifiers of the custom fields holding investment terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldIds {
    pub start_new: String,
    pub end_new: String,
    pub profit_new: String,
    pub start_legacy: String,
    pub end_legacy: String,
    pub profit_legacy: String,
}

impl FieldIds {
    /// Ordered sources for the start date: new field first, then legacy.
    pub fn start_sources(&self) -> [&str; 2] {
        [&self.start_new, &self.start_legacy]
    }

    pub fn end_sources(&self) -> [&str; 2] {
        [&self.end_new, &self.end_legacy]
    }

    pub fn profit_sources(&self) -> [&str; 2] {
        [&self.profit_new, &self.profit_legacy]
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    /// HTTP timeout for upstream calls, seconds.
    pub timeout_secs: u64,
    /// Minimum interval between non-forced refreshes, seconds.
    pub update_interval_secs: u64,
    pub field_ids: FieldIds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            field_ids: FieldIds::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            base_url: env_string("LEDGER_API_BASE_URL", &defaults.base_url),
            api_key: env_string("LEDGER_API_KEY", &defaults.api_key),
            timeout_secs: env_u64("LEDGER_API_TIMEOUT_SECS", defaults.timeout_secs),
            update_interval_secs: env_u64(
                "INVESTOR_UPDATE_INTERVAL_SECS",
                defaults.update_interval_secs,
            ),
            field_ids: FieldIds {
                start_new: env_string("INVESTOR_FIELD_START_NEW", ""),
                end_new: env_string("INVESTOR_FIELD_END_NEW", ""),
                profit_new: env_string("INVESTOR_FIELD_PROFIT_NEW", ""),
                start_legacy: env_string("INVESTOR_FIELD_START_LEGACY", ""),
                end_legacy: env_string("INVESTOR_FIELD_END_LEGACY", ""),
                profit_legacy: env_string("INVESTOR_FIELD_PROFIT_LEGACY", ""),
            },
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
