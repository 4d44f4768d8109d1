use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

/// Settings for the statement polling and reconciliation core.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Local hour at which the daily polling window opens.
    pub window_start_hour: u32,
    /// Local hour at which the daily polling window closes (exclusive).
    pub window_end_hour: u32,
    /// Poll interval used when an account carries no explicit override.
    pub default_poll_interval_secs: u64,
    /// Upper bound on how long the drive loop sleeps between due checks.
    pub max_check_interval_secs: u64,
    /// Backoff applied after an unexpected fault escapes the drive loop.
    pub recover_backoff_secs: u64,
    /// Tolerance for amount comparisons, in currency units.
    pub amount_epsilon: f64,
    /// Base URL of the bank statement API.
    pub statement_api_url: String,
    /// Timeout for a single statement fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            window_start_hour: 7,
            window_end_hour: 22,
            default_poll_interval_secs: 300,
            max_check_interval_secs: 30,
            recover_backoff_secs: 30,
            amount_epsilon: 0.01,
            statement_api_url: "http://localhost:9090".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

impl MonitorSettings {
    /// Amount tolerance as a decimal; falls back to the built-in default when
    /// the configured value is not representable.
    pub fn epsilon(&self) -> rust_decimal::Decimal {
        rust_decimal::Decimal::from_f64_retain(self.amount_epsilon)
            .unwrap_or_else(crate::models::default_epsilon)
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
