use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use usermgmt_common::config::{AccountStorageConfig, BackendConfig};

fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::Dummy]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManagerConfig {
    /// Where accounts are stored
    /// Defaults to an in-memory directory
    #[serde(default)]
    pub account_storage: AccountStorageConfig,

    /// User backends in the order they are asked to create users
    /// Defaults to a single dummy backend
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            account_storage: AccountStorageConfig::default(),
            backends: default_backends(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from multiple sources in order of priority:
    /// 1. Configuration file (config.toml, config.yaml, config.json)
    /// 2. Environment variables (`USERMGMT__ACCOUNT_STORAGE__TYPE` and so on)
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("USERMGMT").separator("__"))
            .build()?;

        let manager_config: Self = config.try_deserialize()?;

        manager_config.validate()?;

        Ok(manager_config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("USERMGMT").separator("__"))
            .build()?;

        let manager_config: Self = config.try_deserialize()?;

        manager_config.validate()?;

        Ok(manager_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.account_storage.validate()?;

        if self.backends.is_empty() {
            return Err(ConfigError::Message(
                "At least one user backend must be configured".to_string(),
            ));
        }
        for backend in &self.backends {
            backend.validate()?;
        }

        Ok(())
    }
}
