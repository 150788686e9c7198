use thiserror::Error;
use usermgmt_common::storage::{
    accounts::{AccountDirectoryError, AccountDirectoryInitializationError},
    backends::{UserBackendError, UserBackendInitializationError},
};

#[derive(Debug, Error)]
pub enum UserManagerError {
    #[error("Invalid user id: {0:?}")]
    InvalidUid(String),
    #[error("The user id is already in use: {0}")]
    UserAlreadyExists(String),
    #[error("No user backend accepted user {0}")]
    CreationRefused(String),
    #[error("No installed backend named {backend} for user {uid}")]
    BackendNotInstalled { uid: String, backend: String },
    #[error("Account directory error: {0}")]
    Directory(#[from] AccountDirectoryError),
    #[error("User backend error: {0}")]
    Backend(#[from] UserBackendError),
    #[error("Failed to initialize account directory: {0}")]
    DirectoryInitialization(#[from] AccountDirectoryInitializationError),
    #[error("Failed to initialize user backend: {0}")]
    BackendInitialization(#[from] UserBackendInitializationError),
}
