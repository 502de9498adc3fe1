use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reservations: ReservationRules,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
    #[serde(default = "default_ticket_prefix")]
    pub ticket_prefix: String,
}

impl ReservationRules {
    /// `None` when `hold_seconds` does not fit a duration.
    pub fn hold_duration(&self) -> Option<chrono::Duration> {
        i64::try_from(self.hold_seconds).ok().and_then(chrono::Duration::try_seconds)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            sweep_batch_size: default_sweep_batch_size(),
            ticket_prefix: default_ticket_prefix(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_hold_seconds() -> u64 { 900 }
fn default_sweep_interval_seconds() -> u64 { 30 }
fn default_sweep_batch_size() -> usize { 100 }
fn default_ticket_prefix() -> String { "CL".to_string() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `COACHLINE_RESERVATIONS__HOLD_SECONDS=600`
            .add_source(config::Environment::with_prefix("COACHLINE").separator("__"))
            .build()?;

        s.try_deserialize::<Config>()?.validated()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Config>()?
            .validated()
    }

    fn validated(self) -> Result<Self, config::ConfigError> {
        if self.reservations.hold_seconds == 0 || self.reservations.hold_duration().is_none() {
            return Err(config::ConfigError::Message(format!(
                "reservations.hold_seconds out of range: {}",
                self.reservations.hold_seconds
            )));
        }
        Ok(self)
    }
}
