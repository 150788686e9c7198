mod dummy_user_backend;
mod file_user_backend;

pub use dummy_user_backend::{DUMMY_BACKEND_NAME, DummyUserBackend};
pub use file_user_backend::{FILE_BACKEND_NAME, FileUserBackend};

use std::{collections::BTreeMap, fmt::Debug, future::Future};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserBackendError {
    #[error("User backend error: {0}")]
    Custom(String),
    #[error("{0}")]
    PersistenceError(#[from] UserBackendPersistenceError),
}

#[derive(Debug, Error)]
#[error("Initialization error: {0}")]
pub struct UserBackendInitializationError(pub(crate) String);

#[derive(Debug, Error)]
#[error("Persistence error: {0}")]
pub struct UserBackendPersistenceError(pub(crate) String);

type Result<T> = std::result::Result<T, UserBackendError>;

/// Credential storage and verification, keyed by user id.
///
/// Refused operations (creating an existing user, touching a missing one)
/// return `Ok(false)`. Errors are reserved for storage failures.
pub trait UserBackend: Clone + Debug + Send + Sync {
    /// Stores the credentials unless the uid is already taken.
    fn create_user(&mut self, uid: &str, password: &str) -> impl Future<Output = Result<bool>> + Send;
    fn delete_user(&mut self, uid: &str) -> impl Future<Output = Result<bool>> + Send;
    /// Changes the password of an existing user. Never creates one.
    fn set_password(&mut self, uid: &str, password: &str) -> impl Future<Output = Result<bool>> + Send;
    /// Returns the uid when the password matches.
    fn check_password(
        &self,
        uid: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
    /// Uids in storage order, filtered by a case-insensitive substring when
    /// `search` is not empty. `limit` and `offset` are not applied.
    fn get_users(
        &self,
        search: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
    fn user_exists(&self, uid: &str) -> impl Future<Output = Result<bool>> + Send;
    fn has_user_listings(&self) -> bool;
    fn count_users(&self) -> impl Future<Output = Result<usize>> + Send;
    fn set_display_name(
        &mut self,
        uid: &str,
        display_name: &str,
    ) -> impl Future<Output = Result<()>> + Send;
    /// Falls back to the uid when no display name was set.
    fn get_display_name(&self, uid: &str) -> impl Future<Output = Result<String>> + Send;
    fn backend_name(&self) -> &str;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct CredentialRecord {
    pub uid: String,
    pub password: String,
}

/// Credential bookkeeping shared by the backend implementations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct CredentialStore {
    users: Vec<CredentialRecord>,
    #[serde(default)]
    display_names: BTreeMap<String, String>,
}

impl CredentialStore {
    fn position(&self, uid: &str) -> Option<usize> {
        self.users.iter().position(|record| record.uid == uid)
    }

    pub fn create_user(&mut self, uid: &str, password: &str) -> bool {
        if self.position(uid).is_some() {
            return false;
        }
        self.users.push(CredentialRecord {
            uid: uid.to_string(),
            password: password.to_string(),
        });
        true
    }

    pub fn delete_user(&mut self, uid: &str) -> bool {
        match self.position(uid) {
            Some(index) => {
                self.users.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn set_password(&mut self, uid: &str, password: &str) -> bool {
        match self.position(uid) {
            Some(index) => {
                self.users[index].password = password.to_string();
                true
            }
            None => false,
        }
    }

    pub fn check_password(&self, uid: &str, password: &str) -> Option<String> {
        self.users
            .iter()
            .find(|record| record.uid == uid && record.password == password)
            .map(|record| record.uid.clone())
    }

    pub fn get_users(&self, search: &str) -> Vec<String> {
        let search = search.to_lowercase();
        self.users
            .iter()
            .filter(|record| search.is_empty() || record.uid.to_lowercase().contains(&search))
            .map(|record| record.uid.clone())
            .collect()
    }

    pub fn user_exists(&self, uid: &str) -> bool {
        self.position(uid).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn set_display_name(&mut self, uid: &str, display_name: &str) {
        self.display_names
            .insert(uid.to_string(), display_name.to_string());
    }

    pub fn get_display_name(&self, uid: &str) -> String {
        self.display_names
            .get(uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }
}

/// Enum wrapper over the available user backends.
#[derive(Clone, Debug)]
pub enum UserBackendStorage {
    Dummy(DummyUserBackend),
    File(FileUserBackend),
}

impl UserBackendStorage {
    pub fn same_instance(&self, other: &UserBackendStorage) -> bool {
        match (self, other) {
            (UserBackendStorage::Dummy(a), UserBackendStorage::Dummy(b)) => a.same_instance(b),
            (UserBackendStorage::File(a), UserBackendStorage::File(b)) => a.same_instance(b),
            _ => false,
        }
    }
}

impl UserBackend for UserBackendStorage {
    async fn create_user(&mut self, uid: &str, password: &str) -> Result<bool> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.create_user(uid, password).await,
            UserBackendStorage::File(backend) => backend.create_user(uid, password).await,
        }
    }

    async fn delete_user(&mut self, uid: &str) -> Result<bool> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.delete_user(uid).await,
            UserBackendStorage::File(backend) => backend.delete_user(uid).await,
        }
    }

    async fn set_password(&mut self, uid: &str, password: &str) -> Result<bool> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.set_password(uid, password).await,
            UserBackendStorage::File(backend) => backend.set_password(uid, password).await,
        }
    }

    async fn check_password(&self, uid: &str, password: &str) -> Result<Option<String>> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.check_password(uid, password).await,
            UserBackendStorage::File(backend) => backend.check_password(uid, password).await,
        }
    }

    async fn get_users(
        &self,
        search: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<String>> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.get_users(search, limit, offset).await,
            UserBackendStorage::File(backend) => backend.get_users(search, limit, offset).await,
        }
    }

    async fn user_exists(&self, uid: &str) -> Result<bool> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.user_exists(uid).await,
            UserBackendStorage::File(backend) => backend.user_exists(uid).await,
        }
    }

    fn has_user_listings(&self) -> bool {
        match self {
            UserBackendStorage::Dummy(backend) => backend.has_user_listings(),
            UserBackendStorage::File(backend) => backend.has_user_listings(),
        }
    }

    async fn count_users(&self) -> Result<usize> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.count_users().await,
            UserBackendStorage::File(backend) => backend.count_users().await,
        }
    }

    async fn set_display_name(&mut self, uid: &str, display_name: &str) -> Result<()> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.set_display_name(uid, display_name).await,
            UserBackendStorage::File(backend) => backend.set_display_name(uid, display_name).await,
        }
    }

    async fn get_display_name(&self, uid: &str) -> Result<String> {
        match self {
            UserBackendStorage::Dummy(backend) => backend.get_display_name(uid).await,
            UserBackendStorage::File(backend) => backend.get_display_name(uid).await,
        }
    }

    fn backend_name(&self) -> &str {
        match self {
            UserBackendStorage::Dummy(backend) => backend.backend_name(),
            UserBackendStorage::File(backend) => backend.backend_name(),
        }
    }
}
