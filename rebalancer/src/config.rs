//! TOML configuration loading and validation.
//!
//! Every section is optional; a missing file at the default path means
//! built-in defaults (the moderate-risk portfolio, Robinhood API, one
//! scheduled run at 09:35 local time).

use std::path::{Path, PathBuf};
use std::time::Duration;

use allocbot::{Basis, DEFAULT_CASH_SYMBOL, TargetWeights};
use allocbot_broker::TimeInForce;
use allocbot_broker::robinhood::RobinhoodConfig;
use allocbot_broker::robinhood::client::DEFAULT_BASE_URL;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::scheduler::DailySchedule;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "allocbot.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub portfolio: PortfolioConfig,
    pub broker: BrokerConfig,
    pub orders: OrdersConfig,
    pub schedule: ScheduleConfig,
    pub credentials: CredentialsConfig,
    pub logging: LoggingConfig,
}

/// One `[[portfolio.targets]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetEntry {
    pub symbol: String,
    pub weight: f64,
}

impl TargetEntry {
    fn new(symbol: &str, weight: f64) -> Self {
        Self {
            symbol: symbol.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub cash_symbol: String,
    pub basis: Basis,
    pub min_order_usd: f64,
    /// Order is preserved; it only affects which symbol a weight-sum error names.
    pub targets: Vec<TargetEntry>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            cash_symbol: DEFAULT_CASH_SYMBOL.into(),
            basis: Basis::default(),
            min_order_usd: default_min_order(),
            targets: default_targets(),
        }
    }
}

fn default_min_order() -> f64 {
    1.0
}

/// "Moderate risk appetite" allocation.
fn default_targets() -> Vec<TargetEntry> {
    vec![
        TargetEntry::new("QQQ", 0.312),
        TargetEntry::new("JEPQ", 0.0375),
        TargetEntry::new("BBIN", 0.1205),
        TargetEntry::new("AGG", 0.3375),
        TargetEntry::new("BBAG", 0.1425),
        TargetEntry::new(DEFAULT_CASH_SYMBOL, 0.05),
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub device_token: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: default_timeout(),
            device_token: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    #[serde(deserialize_with = "de_time_in_force")]
    pub time_in_force: TimeInForce,
    pub extended_hours: bool,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            time_in_force: TimeInForce::Gfd,
            extended_hours: true,
        }
    }
}

fn de_time_in_force<'de, D>(deserializer: D) -> std::result::Result<TimeInForce, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock times, `HH:MM` or `HH:MM:SS`.
    pub times: Vec<String>,
    pub poll_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            times: vec!["09:35".into()],
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}

/// Names of the environment variables holding the login secrets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub email_var: String,
    pub password_var: String,
    pub totp_seed_var: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            email_var: "ALLOCBOT_EMAIL".into(),
            password_var: "ALLOCBOT_PASSWORD".into(),
            totp_seed_var: "ALLOCBOT_TOTP_SEED".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSONL audit trail; no file is written when unset.
    pub audit_file: Option<PathBuf>,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Load `path` if given; otherwise the default file if it exists, else
    /// built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load(default)
                } else {
                    log::info!("No {DEFAULT_CONFIG_PATH} found, using built-in defaults");
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants. Target weights are checked separately by
    /// [`Config::target_weights`].
    fn validate(&self) -> Result<()> {
        if self.portfolio.cash_symbol.trim().is_empty() {
            return Err(Error::Config("cash_symbol must not be empty".into()));
        }
        let min = self.portfolio.min_order_usd;
        if !min.is_finite() || min < 0.0 {
            return Err(Error::Config("min_order_usd must be a finite number >= 0".into()));
        }
        if self.broker.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        if self.broker.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".into()));
        }
        if self.schedule.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be > 0".into()));
        }
        self.daily_schedule()?;
        Ok(())
    }

    /// Validated target weights, in file order.
    pub fn target_weights(&self) -> Result<TargetWeights> {
        let pairs = self
            .portfolio
            .targets
            .iter()
            .map(|t| (t.symbol.as_str(), t.weight));
        Ok(TargetWeights::new(pairs)?)
    }

    pub fn daily_schedule(&self) -> Result<DailySchedule> {
        DailySchedule::parse(&self.schedule.times)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_interval_secs)
    }

    /// Connection settings for the Robinhood broker.
    pub fn robinhood(&self) -> RobinhoodConfig {
        RobinhoodConfig {
            base_url: self.broker.base_url.clone(),
            timeout: Duration::from_secs(self.broker.timeout_secs),
            device_token: self.broker.device_token.clone(),
        }
    }

    pub fn audit_path(&self) -> Option<&Path> {
        self.logging.audit_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_toml() -> &'static str {
        r#"
[portfolio]
cash_symbol = "$$$"
basis = "invested_equity"
min_order_usd = 5.0

[[portfolio.targets]]
symbol = "QQQ"
weight = 0.6

[[portfolio.targets]]
symbol = "AGG"
weight = 0.35

[[portfolio.targets]]
symbol = "$$$"
weight = 0.05

[broker]
base_url = "http://localhost:8080"
timeout_secs = 10
device_token = "0c1d2e3f-device"

[orders]
time_in_force = "gtc"
extended_hours = false

[schedule]
times = ["09:35", "15:45"]
poll_interval_secs = 15

[credentials]
email_var = "RH_EMAIL"
password_var = "RH_PASSWORD"
totp_seed_var = "RH_TOTP"

[logging]
audit_file = "./logs/audit.jsonl"
"#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.portfolio.basis, Basis::InvestedEquity);
        assert_eq!(config.portfolio.min_order_usd, 5.0);
        assert_eq!(config.portfolio.targets.len(), 3);
        assert_eq!(config.portfolio.targets[0], TargetEntry::new("QQQ", 0.6));
        assert_eq!(config.broker.timeout_secs, 10);
        assert_eq!(config.orders.time_in_force, TimeInForce::Gtc);
        assert!(!config.orders.extended_hours);
        assert_eq!(config.schedule.times.len(), 2);
        assert_eq!(config.credentials.email_var, "RH_EMAIL");
        assert_eq!(
            config.audit_path(),
            Some(Path::new("./logs/audit.jsonl"))
        );
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.portfolio.cash_symbol, "$$$");
        assert_eq!(config.portfolio.basis, Basis::AccountEquity);
        assert_eq!(config.portfolio.min_order_usd, 1.0);
        assert_eq!(config.portfolio.targets.len(), 6);
        assert_eq!(config.broker.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.orders.time_in_force, TimeInForce::Gfd);
        assert!(config.orders.extended_hours);
        assert_eq!(config.schedule.times, vec!["09:35".to_string()]);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.credentials.totp_seed_var, "ALLOCBOT_TOTP_SEED");
        assert!(config.audit_path().is_none());
    }

    #[test]
    fn default_targets_are_valid() {
        let weights = Config::default().target_weights().unwrap();
        assert!((weights.total() - 1.0).abs() < 1e-9);
        assert_eq!(weights.get("QQQ"), Some(0.312));
    }

    #[test]
    fn target_order_preserved() {
        let config = Config::from_toml(example_toml()).unwrap();
        let weights = config.target_weights().unwrap();
        let symbols: Vec<&str> = weights.symbols().map(|s| s.as_str()).collect();
        assert_eq!(symbols, ["QQQ", "AGG", "$$$"]);
    }

    #[test]
    fn negative_target_weight_rejected() {
        let toml = example_toml().replace("weight = 0.35", "weight = -0.35");
        let config = Config::from_toml(&toml).unwrap();
        assert!(matches!(config.target_weights(), Err(Error::Validation(_))));
    }

    #[test]
    fn validate_catches_zero_timeout() {
        let toml = example_toml().replace("timeout_secs = 10", "timeout_secs = 0");
        assert!(matches!(Config::from_toml(&toml), Err(Error::Config(_))));
    }

    #[test]
    fn validate_catches_zero_poll_interval() {
        let toml = example_toml().replace("poll_interval_secs = 15", "poll_interval_secs = 0");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn validate_catches_negative_min_order() {
        let toml = example_toml().replace("min_order_usd = 5.0", "min_order_usd = -1.0");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn validate_catches_bad_schedule_time() {
        let toml = example_toml().replace("\"15:45\"", "\"25:00\"");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn unknown_time_in_force_rejected() {
        let toml = example_toml().replace("\"gtc\"", "\"ioc\"");
        assert!(matches!(Config::from_toml(&toml), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(Config::from_toml("[connection]\nhost = \"x\"\n").is_err());
    }

    #[test]
    fn robinhood_settings() {
        let config = Config::from_toml(example_toml()).unwrap();
        let rh = config.robinhood();
        assert_eq!(rh.base_url, "http://localhost:8080");
        assert_eq!(rh.timeout, Duration::from_secs(10));
        assert_eq!(rh.device_token.as_deref(), Some("0c1d2e3f-device"));
    }

    #[test]
    fn shipped_example_parses() {
        let config = Config::from_toml(include_str!("../../allocbot.example.toml")).unwrap();
        let weights = config.target_weights().unwrap();
        assert_eq!(weights.len(), 6);
        assert_eq!(
            config.target_weights().unwrap(),
            Config::default().target_weights().unwrap()
        );
    }

    #[test]
    fn load_missing_file_errors() {
        let err = Config::load(Path::new("/nonexistent/allocbot.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allocbot.toml");
        std::fs::write(&path, example_toml()).unwrap();
        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.schedule.poll_interval_secs, 15);
    }
}
