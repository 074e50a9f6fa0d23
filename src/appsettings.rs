use std::{num::NonZeroUsize, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("telegram.token is missing")]
    MissingTelegramToken,

    #[error("scheduler.poll_interval_secs must be positive")]
    InvalidPollInterval,
}

#[derive(Deserialize, Debug)]
pub struct TelegramSettings {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub struct SchedulerSettings {
    pub max_tasks_per_worker: NonZeroUsize,
    pub poll_interval_secs: u64,
}

impl SchedulerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Deserialize, Debug)]
pub struct ServerSettings {
    pub port: u16,
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub telegram: TelegramSettings,
    pub scheduler: SchedulerSettings,
    pub server: ServerSettings,
}

impl AppSettings {
    /// Reads `appsettings`, then `appsettings.local`, then `APP_*` environment
    /// variables (`APP_TELEGRAM__TOKEN`), later sources overriding earlier ones.
    pub fn load() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(config)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, SettingsError> {
        let settings: AppSettings = builder
            .set_default("scheduler.max_tasks_per_worker", 100)?
            .set_default("scheduler.poll_interval_secs", 10)?
            .set_default("server.port", 5000)?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.telegram.token.trim().is_empty() {
            return Err(SettingsError::MissingTelegramToken);
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(SettingsError::InvalidPollInterval);
        }
        Ok(())
    }
}
