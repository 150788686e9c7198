mod file_account_directory;
mod memory_account_directory;

pub use file_account_directory::FileAccountDirectory;
pub use memory_account_directory::MemoryAccountDirectory;

use std::{fmt::Debug, future::Future, ops::ControlFlow};

use thiserror::Error;

use crate::Account;

#[derive(Debug, Error)]
pub enum AccountDirectoryError {
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("Account has not been inserted yet: {0}")]
    MissingId(String),
    #[error("Account directory error: {0}")]
    Custom(String),
    #[error("{0}")]
    PersistenceError(#[from] AccountDirectoryPersistenceError),
}

#[derive(Debug, Error)]
#[error("Initialization error: {0}")]
pub struct AccountDirectoryInitializationError(pub(crate) String);

#[derive(Debug, Error)]
#[error("Persistence error: {0}")]
pub struct AccountDirectoryPersistenceError(pub(crate) String);

type Result<T> = std::result::Result<T, AccountDirectoryError>;

/// Storage and lookup of account records.
///
/// Several filter arguments (`has_logged_in`, `field_name`, `limit`, `offset`,
/// `search`, `only_seen`) are accepted for compatibility with callers of the
/// database-backed mapper but are not applied by any implementation here.
pub trait AccountDirectory: Clone + Debug + Send + Sync {
    /// Assigns a fresh id to the account, stores it and returns the stored copy.
    fn insert(&mut self, account: Account) -> impl Future<Output = Result<Account>> + Send;
    /// Overwrites the record stored under the account's id. A record is created
    /// when nothing is stored under that id yet.
    fn update(&mut self, account: Account) -> impl Future<Output = Result<Account>> + Send;
    /// Removes the record stored under the account's id, if any.
    fn delete(&mut self, account: &Account) -> impl Future<Output = Result<()>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = Result<Vec<Account>>> + Send;
    /// Case-insensitive lookup by user id. Returns the first match in insertion order.
    fn get_by_uid(&self, uid: &str) -> impl Future<Output = Result<Account>> + Send;
    fn get_user_count(&self, has_logged_in: bool) -> impl Future<Output = Result<usize>> + Send;
    /// Case-insensitive substring match of `pattern` against the user id.
    fn search(
        &self,
        field_name: &str,
        pattern: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Account>>> + Send;
    /// Visits every account in insertion order until the callback breaks.
    fn call_for_all_users<F>(
        &self,
        callback: F,
        search: &str,
        only_seen: bool,
    ) -> impl Future<Output = Result<()>> + Send
    where
        F: FnMut(&Account) -> ControlFlow<()> + Send;
}

pub(crate) fn matches_pattern(account: &Account, pattern: &str) -> bool {
    account
        .user_id
        .to_lowercase()
        .contains(&pattern.to_lowercase())
}

/// Enum wrapper so the installed directory can be swapped at runtime
/// between the file-backed store and the in-memory fake.
#[derive(Clone, Debug)]
pub enum AccountDirectoryStorage {
    InMemory(MemoryAccountDirectory),
    File(FileAccountDirectory),
}

impl AccountDirectoryStorage {
    /// True when both values refer to the same underlying store, not merely equal contents.
    pub fn same_instance(&self, other: &AccountDirectoryStorage) -> bool {
        match (self, other) {
            (AccountDirectoryStorage::InMemory(a), AccountDirectoryStorage::InMemory(b)) => {
                a.same_instance(b)
            }
            (AccountDirectoryStorage::File(a), AccountDirectoryStorage::File(b)) => {
                a.same_instance(b)
            }
            _ => false,
        }
    }

    /// Name of the override scope that installed this directory, if it is a scoped fake.
    pub fn owner_scope(&self) -> Option<&str> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => directory.owner_scope(),
            AccountDirectoryStorage::File(_) => None,
        }
    }
}

impl AccountDirectory for AccountDirectoryStorage {
    async fn insert(&mut self, account: Account) -> Result<Account> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => directory.insert(account).await,
            AccountDirectoryStorage::File(directory) => directory.insert(account).await,
        }
    }

    async fn update(&mut self, account: Account) -> Result<Account> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => directory.update(account).await,
            AccountDirectoryStorage::File(directory) => directory.update(account).await,
        }
    }

    async fn delete(&mut self, account: &Account) -> Result<()> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => directory.delete(account).await,
            AccountDirectoryStorage::File(directory) => directory.delete(account).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Vec<Account>> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => directory.get_by_email(email).await,
            AccountDirectoryStorage::File(directory) => directory.get_by_email(email).await,
        }
    }

    async fn get_by_uid(&self, uid: &str) -> Result<Account> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => directory.get_by_uid(uid).await,
            AccountDirectoryStorage::File(directory) => directory.get_by_uid(uid).await,
        }
    }

    async fn get_user_count(&self, has_logged_in: bool) -> Result<usize> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => {
                directory.get_user_count(has_logged_in).await
            }
            AccountDirectoryStorage::File(directory) => {
                directory.get_user_count(has_logged_in).await
            }
        }
    }

    async fn search(
        &self,
        field_name: &str,
        pattern: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Account>> {
        match self {
            AccountDirectoryStorage::InMemory(directory) => {
                directory.search(field_name, pattern, limit, offset).await
            }
            AccountDirectoryStorage::File(directory) => {
                directory.search(field_name, pattern, limit, offset).await
            }
        }
    }

    async fn call_for_all_users<F>(&self, callback: F, search: &str, only_seen: bool) -> Result<()>
    where
        F: FnMut(&Account) -> ControlFlow<()> + Send,
    {
        match self {
            AccountDirectoryStorage::InMemory(directory) => {
                directory.call_for_all_users(callback, search, only_seen).await
            }
            AccountDirectoryStorage::File(directory) => {
                directory.call_for_all_users(callback, search, only_seen).await
            }
        }
    }
}
