//! Layered configuration.
//!
//! Merge order, later overriding earlier:
//! 1. Compiled defaults
//! 2. The TOML file passed on the command line (if any)
//! 3. `ESCROWBOT_*` environment variables, `__` separating sections from keys
//!    (`ESCROWBOT_RATE_LIMIT__MAX_CALLS=5` sets `rate_limit.max_calls`)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    #[diagnostic(code(escrowbot::config::load))]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {}", .0.join("; "))]
    #[diagnostic(
        code(escrowbot::config::invalid),
        help("check the [rate_limit] and [payment] sections")
    )]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscrowConfig {
    #[serde(default)]
    pub operators: OperatorConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// The operator allow-list. A caller matching either list is an operator.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorConfig {
    #[serde(default)]
    pub user_ids: Vec<i64>,
    /// Handles, compared case-insensitively and without a leading `@`.
    #[serde(default)]
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowStrategy {
    /// Counts calls in the trailing `window_seconds`.
    #[default]
    Sliding,
    /// Counts calls in consecutive buckets of `window_seconds`.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_max_calls")]
    pub max_calls: u32,
    #[serde(default)]
    pub strategy: WindowStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_calls: default_max_calls(),
            strategy: WindowStrategy::default(),
        }
    }
}

fn default_window_seconds() -> u64 {
    60
}

fn default_max_calls() -> u32 {
    20
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    #[serde(default = "default_upi_id")]
    pub upi_id: String,
    #[serde(default = "default_qr_path")]
    pub qr_path: PathBuf,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            upi_id: default_upi_id(),
            qr_path: default_qr_path(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

fn default_upi_id() -> String {
    "escrow@upi".to_string()
}

fn default_qr_path() -> PathBuf {
    PathBuf::from("static/payment_qr.jpg")
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Persistent database directory; in-memory storage when unset.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

fn env_provider() -> Env {
    Env::prefixed("ESCROWBOT_").split("__")
}

/// Loads defaults, the optional file at `path`, then environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<EscrowConfig, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(EscrowConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    let config: EscrowConfig = figment
        .merge(env_provider())
        .extract()
        .map_err(Box::new)?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads defaults overlaid with a TOML string. No environment lookup.
pub fn load_config_from_str(toml_content: &str) -> Result<EscrowConfig, ConfigError> {
    let config: EscrowConfig = Figment::new()
        .merge(Serialized::defaults(EscrowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
        .map_err(Box::new)?;
    validate_config(&config)?;
    Ok(config)
}

/// Collects every semantic problem instead of stopping at the first one.
pub fn validate_config(config: &EscrowConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.rate_limit.window_seconds == 0 {
        errors.push("rate_limit.window_seconds must be greater than zero".to_string());
    }
    if config.rate_limit.max_calls == 0 {
        errors.push("rate_limit.max_calls must be greater than zero".to_string());
    }
    if config.payment.upi_id.trim().is_empty() {
        errors.push("payment.upi_id must not be empty".to_string());
    }
    if config
        .operators
        .usernames
        .iter()
        .any(|name| name.trim().trim_start_matches('@').is_empty())
    {
        errors.push("operators.usernames must not contain blank handles".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.rate_limit.max_calls, 20);
        assert_eq!(config.rate_limit.strategy, WindowStrategy::Sliding);
        assert_eq!(config.payment.upi_id, "escrow@upi");
        assert!(config.operators.user_ids.is_empty());
        assert!(config.storage.db_path.is_none());
    }

    #[test]
    fn test_full_file() {
        let toml = r#"
[operators]
user_ids = [42]
usernames = ["@darx_zerox"]

[rate_limit]
window_seconds = 10
max_calls = 3
strategy = "fixed"

[payment]
upi_id = "deals@okbank"
qr_path = "/srv/escrow/qr.jpg"

[storage]
db_path = "/var/lib/escrowbot"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.operators.user_ids, vec![42]);
        assert_eq!(config.operators.usernames, vec!["@darx_zerox"]);
        assert_eq!(config.rate_limit.max_calls, 3);
        assert_eq!(config.rate_limit.strategy, WindowStrategy::Fixed);
        assert_eq!(config.payment.upi_id, "deals@okbank");
        assert_eq!(config.payment.currency_symbol, "₹");
        assert_eq!(
            config.storage.db_path.as_deref(),
            Some(Path::new("/var/lib/escrowbot"))
        );
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = load_config_from_str("[rate_limit]\nburst = 4\n");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let toml = r#"
[rate_limit]
window_seconds = 0
max_calls = 0

[payment]
upi_id = "  "
"#;
        match load_config_from_str(toml) {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }
}
