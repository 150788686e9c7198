use config::ConfigError;
use serde::{Deserialize, Serialize};

use crate::{
    config::validate_state_file,
    storage::backends::{
        DummyUserBackend, FileUserBackend, UserBackendInitializationError, UserBackendStorage,
    },
};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "Dummy")]
    Dummy,
    #[serde(rename = "File")]
    File {
        /// file path where credentials will be stored
        state_file: String,
    },
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            BackendConfig::Dummy => Ok(()),
            BackendConfig::File { state_file } => validate_state_file(state_file, "User backend"),
        }
    }

    pub fn build_user_backend(&self) -> Result<UserBackendStorage, UserBackendInitializationError> {
        match self {
            BackendConfig::Dummy => Ok(UserBackendStorage::Dummy(DummyUserBackend::new())),
            BackendConfig::File { state_file } => Ok(UserBackendStorage::File(
                FileUserBackend::new(state_file.clone())?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::UserBackend;

    #[test]
    fn test_backend_config_validation() {
        assert!(BackendConfig::Dummy.validate().is_ok());

        let file_empty = BackendConfig::File {
            state_file: "".to_string(),
        };
        let result = file_empty.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("User backend"));
    }

    #[test]
    fn test_build_dummy_backend() {
        let backend = BackendConfig::Dummy.build_user_backend().unwrap();
        assert_eq!(backend.backend_name(), "Dummy");
    }
}
