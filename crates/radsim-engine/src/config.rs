use crate::client::RadclientConfig;
use crate::scheduler::SchedulerSettings;
use radsim_proto::{GeneratorDefaults, Scenario};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the RADIUS server
pub const SERVER_ENV: &str = "ISE_PSN";
/// Environment variable holding the shared secret
pub const SECRET_ENV: &str = "ISE_RADIUS_SECRET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("{0} is not set")]
    MissingEnv(&'static str),
}

/// Continuous scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scenarios the random-auth timer picks from
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,

    /// Usernames the random-auth timer picks from
    #[serde(default = "default_usernames")]
    pub usernames: Vec<String>,

    #[serde(default = "default_auth_min_secs")]
    pub auth_min_secs: u64,

    #[serde(default = "default_auth_max_secs")]
    pub auth_max_secs: u64,

    /// Chance that random-auth re-authenticates instead of starting a session
    #[serde(default = "default_reauth_probability")]
    pub reauth_probability: f64,

    #[serde(default = "default_sweep_period_secs")]
    pub sweep_period_secs: u64,

    #[serde(default = "default_disconnect_min_secs")]
    pub disconnect_min_secs: u64,

    #[serde(default = "default_disconnect_max_secs")]
    pub disconnect_max_secs: u64,

    /// Quiet period before the first random disconnect
    #[serde(default = "default_disconnect_delay_secs")]
    pub disconnect_delay_secs: u64,

    #[serde(default = "default_report_period_secs")]
    pub report_period_secs: u64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_scenarios() -> Vec<Scenario> {
    Scenario::ALL.to_vec()
}

fn default_usernames() -> Vec<String> {
    [
        "hayley", "brad", "paul", "arthur", "ryan", "anita", "cathy", "victoria", "sarah", "ruby",
        "carol", "alex", "armando", "sergio", "anna", "adriana", "maria", "nicolina", "wan",
        "dong", "yan", "ali", "yasmin", "rahul", "amar", "neha", "tyrice", "karah", "jane",
        "michael", "thomas", "charlie", "scott", "devi", "jerome", "pavan", "jacob", "ben",
        "taylor",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_auth_min_secs() -> u64 {
    10
}

fn default_auth_max_secs() -> u64 {
    60
}

fn default_reauth_probability() -> f64 {
    0.1
}

fn default_sweep_period_secs() -> u64 {
    5
}

fn default_disconnect_min_secs() -> u64 {
    60
}

fn default_disconnect_max_secs() -> u64 {
    300
}

fn default_disconnect_delay_secs() -> u64 {
    300
}

fn default_report_period_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            scenarios: default_scenarios(),
            usernames: default_usernames(),
            auth_min_secs: default_auth_min_secs(),
            auth_max_secs: default_auth_max_secs(),
            reauth_probability: default_reauth_probability(),
            sweep_period_secs: default_sweep_period_secs(),
            disconnect_min_secs: default_disconnect_min_secs(),
            disconnect_max_secs: default_disconnect_max_secs(),
            disconnect_delay_secs: default_disconnect_delay_secs(),
            report_period_secs: default_report_period_secs(),
            seed: None,
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// NAS-Identifier sent with every request
    #[serde(default = "default_nas_identifier")]
    pub nas_identifier: String,

    /// Address encoded into generated Acct-Session-Ids
    #[serde(default = "default_nas_ip_address")]
    pub nas_ip_address: String,

    #[serde(default = "default_auth_port")]
    pub auth_port: u16,

    #[serde(default = "default_acct_port")]
    pub acct_port: u16,

    #[serde(default = "default_radclient_path")]
    pub radclient_path: String,

    #[serde(default = "default_radclient_retries")]
    pub radclient_retries: u32,

    /// Per-attempt timeout handed to radclient
    #[serde(default = "default_radclient_timeout_secs")]
    pub radclient_timeout_secs: u64,

    /// Hard bound on one exchange, retries included
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,

    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// JSON Lines event journal (disabled when unset)
    #[serde(default)]
    pub journal_path: Option<String>,

    #[serde(default)]
    pub log_level: Option<String>,

    /// Username for 802.1X and VPN when none is given
    #[serde(default)]
    pub default_username: Option<String>,

    /// Password for 802.1X and VPN when none is given
    #[serde(default = "default_password")]
    pub default_password: Option<String>,

    #[serde(default = "default_corp_ssid")]
    pub corp_ssid: String,

    #[serde(default = "default_iot_ssid")]
    pub iot_ssid: String,

    /// Stopped sessions are kept this many days
    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: u32,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_nas_identifier() -> String {
    "radsim".to_string()
}

fn default_nas_ip_address() -> String {
    "127.0.0.1".to_string()
}

fn default_auth_port() -> u16 {
    1812
}

fn default_acct_port() -> u16 {
    1813
}

fn default_radclient_path() -> String {
    "radclient".to_string()
}

fn default_radclient_retries() -> u32 {
    3
}

fn default_radclient_timeout_secs() -> u64 {
    5
}

fn default_exchange_timeout_secs() -> u64 {
    30
}

fn default_store_path() -> String {
    "radsim.sessions.jsonl".to_string()
}

fn default_password() -> Option<String> {
    Some("C1sco12345".to_string())
}

fn default_corp_ssid() -> String {
    "corp".to_string()
}

fn default_iot_ssid() -> String {
    "iot".to_string()
}

fn default_history_retention_days() -> u32 {
    4
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nas_identifier: default_nas_identifier(),
            nas_ip_address: default_nas_ip_address(),
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            radclient_path: default_radclient_path(),
            radclient_retries: default_radclient_retries(),
            radclient_timeout_secs: default_radclient_timeout_secs(),
            exchange_timeout_secs: default_exchange_timeout_secs(),
            store_path: default_store_path(),
            journal_path: None,
            log_level: None,
            default_username: None,
            default_password: default_password(),
            corp_ssid: default_corp_ssid(),
            iot_ssid: default_iot_ssid(),
            history_retention_days: default_history_retention_days(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::from_file(path.as_ref()) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Config::default())
            }
            other => other,
        }
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nas_identifier.is_empty() {
            return Err(ConfigError::Invalid("NAS identifier cannot be empty".to_string()));
        }

        self.nas_ip()?;

        if self.auth_port == 0 || self.acct_port == 0 {
            return Err(ConfigError::Invalid("Ports cannot be 0".to_string()));
        }

        if self.radclient_path.is_empty() {
            return Err(ConfigError::Invalid("radclient path cannot be empty".to_string()));
        }

        if self.radclient_timeout_secs == 0 || self.exchange_timeout_secs == 0 {
            return Err(ConfigError::Invalid("Timeouts must be at least 1 second".to_string()));
        }

        if self.store_path.is_empty() {
            return Err(ConfigError::Invalid("Store path cannot be empty".to_string()));
        }

        let scheduler = &self.scheduler;
        if scheduler.scenarios.is_empty() {
            return Err(ConfigError::Invalid("At least one scenario is required".to_string()));
        }

        let needs_credentials = scheduler.scenarios.iter().any(|s| s.method().needs_password());
        if needs_credentials {
            if scheduler.usernames.iter().all(|u| u.is_empty()) {
                return Err(ConfigError::Invalid(
                    "Username pool cannot be empty for 802.1X or VPN scenarios".to_string(),
                ));
            }
            if self.default_password.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Invalid(
                    "A default password is required for 802.1X or VPN scenarios".to_string(),
                ));
            }
        }

        if scheduler.auth_min_secs > scheduler.auth_max_secs {
            return Err(ConfigError::Invalid(format!(
                "auth_min_secs ({}) exceeds auth_max_secs ({})",
                scheduler.auth_min_secs, scheduler.auth_max_secs
            )));
        }

        if scheduler.disconnect_min_secs > scheduler.disconnect_max_secs {
            return Err(ConfigError::Invalid(format!(
                "disconnect_min_secs ({}) exceeds disconnect_max_secs ({})",
                scheduler.disconnect_min_secs, scheduler.disconnect_max_secs
            )));
        }

        if scheduler.auth_max_secs == 0
            || scheduler.disconnect_max_secs == 0
            || scheduler.sweep_period_secs == 0
            || scheduler.report_period_secs == 0
        {
            return Err(ConfigError::Invalid("Timer periods cannot be 0".to_string()));
        }

        if !(0.0..=1.0).contains(&scheduler.reauth_probability) {
            return Err(ConfigError::Invalid(format!(
                "reauth_probability must be between 0 and 1, got {}",
                scheduler.reauth_probability
            )));
        }

        Ok(())
    }

    pub fn nas_ip(&self) -> Result<Ipv4Addr, ConfigError> {
        self.nas_ip_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid NAS IP address: {}", self.nas_ip_address))
        })
    }

    pub fn generator_defaults(&self) -> GeneratorDefaults {
        GeneratorDefaults {
            username: self.default_username.clone(),
            password: self.default_password.clone(),
            nas_identifier: self.nas_identifier.clone(),
            corp_ssid: self.corp_ssid.clone(),
            iot_ssid: self.iot_ssid.clone(),
        }
    }

    /// radclient settings for `server` and `secret`
    pub fn radclient(&self, server: &str, secret: &str) -> Result<RadclientConfig, ConfigError> {
        Ok(RadclientConfig {
            program: PathBuf::from(&self.radclient_path),
            server: server.to_string(),
            secret: secret.to_string(),
            auth_port: self.auth_port,
            acct_port: self.acct_port,
            retries: self.radclient_retries,
            try_timeout: Duration::from_secs(self.radclient_timeout_secs),
            exchange_timeout: Duration::from_secs(self.exchange_timeout_secs),
            nas_identifier: self.nas_identifier.clone(),
            nas_ip: self.nas_ip()?,
        })
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let s = &self.scheduler;
        SchedulerSettings {
            scenarios: s.scenarios.clone(),
            usernames: s.usernames.iter().filter(|u| !u.is_empty()).cloned().collect(),
            password: self.default_password.clone(),
            auth_min: Duration::from_secs(s.auth_min_secs),
            auth_max: Duration::from_secs(s.auth_max_secs),
            reauth_probability: s.reauth_probability,
            sweep_period: Duration::from_secs(s.sweep_period_secs),
            disconnect_min: Duration::from_secs(s.disconnect_min_secs),
            disconnect_max: Duration::from_secs(s.disconnect_max_secs),
            disconnect_delay: Duration::from_secs(s.disconnect_delay_secs),
            report_period: Duration::from_secs(s.report_period_secs),
            history_retention: chrono::Duration::days(i64::from(self.history_retention_days)),
        }
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        Config {
            nas_identifier: "radsim-lab".to_string(),
            nas_ip_address: "10.1.1.20".to_string(),
            journal_path: Some("/var/log/radsim/journal.jsonl".to_string()),
            log_level: Some("info".to_string()),
            default_username: Some("alice".to_string()),
            scheduler: SchedulerConfig {
                scenarios: vec![Scenario::Dot1x, Scenario::MabWireless, Scenario::Vpn],
                usernames: vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
                seed: Some(42),
                ..SchedulerConfig::default()
            },
            ..Config::default()
        }
    }
}

/// Read a required setting that came from the environment
pub fn require_env(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth_port, 1812);
        assert_eq!(config.acct_port, 1813);
        assert_eq!(config.store_path, "radsim.sessions.jsonl");
        assert_eq!(config.history_retention_days, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_config_is_valid() {
        assert!(Config::example().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.auth_port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.nas_ip_address = "not-an-ip".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.scheduler.auth_min_secs = 100;
        config.scheduler.auth_max_secs = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.reauth_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.scenarios.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_only_required_for_password_scenarios() {
        let mut config = Config::default();
        config.default_password = None;
        assert!(config.validate().is_err());

        config.scheduler.scenarios = vec![Scenario::Mab, Scenario::MabWireless];
        config.scheduler.usernames.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"nas_identifier": "edge-7", "scheduler": {"scenarios": ["vpn", "mab"]}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.nas_identifier, "edge-7");
        assert_eq!(config.scheduler.scenarios, vec![Scenario::Vpn, Scenario::Mab]);
        assert_eq!(config.scheduler.sweep_period_secs, 5);
        assert_eq!(config.acct_port, 1813);
    }

    #[test]
    fn test_scenario_aliases_in_config() {
        let json = r#"{"scheduler": {"scenarios": ["wired", "mab-wired", "wireless-mab"]}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.scheduler.scenarios,
            vec![Scenario::Dot1x, Scenario::Mab, Scenario::MabWireless]
        );

        let json = r#"{"scheduler": {"scenarios": ["guest"]}}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let config = Config::example();
        config.to_file(file.path()).unwrap();
        let loaded = Config::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(
            Config::load_or_default(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_radclient_settings() {
        let config = Config::example();
        let radclient = config.radclient("10.1.1.5", "s3cret").unwrap();
        assert_eq!(radclient.nas_ip, Ipv4Addr::new(10, 1, 1, 20));
        assert_eq!(radclient.exchange_timeout, Duration::from_secs(30));
        assert_eq!(radclient.acct_port, 1813);
    }

    #[test]
    fn test_require_env() {
        assert_eq!(
            require_env(SERVER_ENV, Some("10.1.1.5".to_string())).unwrap(),
            "10.1.1.5"
        );
        assert!(matches!(
            require_env(SERVER_ENV, None),
            Err(ConfigError::MissingEnv("ISE_PSN"))
        ));
        assert!(require_env(SECRET_ENV, Some("  ".to_string())).is_err());
    }
}
