use config::ConfigError;
use serde::{Deserialize, Serialize};

use crate::{
    config::validate_state_file,
    storage::accounts::{
        AccountDirectoryInitializationError, AccountDirectoryStorage, FileAccountDirectory,
        MemoryAccountDirectory,
    },
};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(tag = "type")]
pub enum AccountStorageConfig {
    #[default]
    #[serde(rename = "InMemory")]
    InMemory,
    #[serde(rename = "File")]
    File {
        /// file path where the account directory will be stored
        state_file: String,
    },
}

impl AccountStorageConfig {
    /// Validate that the account storage configuration is complete and usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            AccountStorageConfig::InMemory => Ok(()),
            AccountStorageConfig::File { state_file } => {
                validate_state_file(state_file, "Account storage")
            }
        }
    }

    /// Creates the account directory described by this configuration.
    pub fn build_account_directory(
        &self,
    ) -> Result<AccountDirectoryStorage, AccountDirectoryInitializationError> {
        match self {
            AccountStorageConfig::File { state_file } => Ok(AccountDirectoryStorage::File(
                FileAccountDirectory::new(state_file.clone())?,
            )),
            AccountStorageConfig::InMemory => {
                Ok(AccountDirectoryStorage::InMemory(MemoryAccountDirectory::new()))
            }
        }
    }
}
