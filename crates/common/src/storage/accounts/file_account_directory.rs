use std::{
    collections::BTreeMap,
    ops::ControlFlow,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::{
    Account, AccountId,
    storage::accounts::{
        AccountDirectory, AccountDirectoryError, AccountDirectoryInitializationError,
        AccountDirectoryPersistenceError, matches_pattern,
    },
};

type Result<T> = std::result::Result<T, AccountDirectoryError>;

const FIRST_ACCOUNT_ID: u64 = 1;

#[derive(Clone, Debug)]
struct DirectoryState {
    next_id: AccountId,
    accounts: BTreeMap<AccountId, Account>,
}

/// On-disk layout of the state file.
#[derive(Serialize, Deserialize)]
struct PersistedDirectory {
    next_id: AccountId,
    accounts: Vec<Account>,
}

/// Account directory persisted to a JSON state file after every mutation.
#[derive(Clone, Debug)]
pub struct FileAccountDirectory {
    file_path: String,
    state: Arc<RwLock<DirectoryState>>,
}

impl FileAccountDirectory {
    pub fn new(file_path: String) -> std::result::Result<Self, AccountDirectoryInitializationError> {
        let state = if std::path::Path::new(&file_path).exists() {
            Self::load_file(&file_path)?
        } else {
            DirectoryState {
                next_id: AccountId::new(FIRST_ACCOUNT_ID),
                accounts: BTreeMap::new(),
            }
        };

        Ok(Self {
            file_path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn same_instance(&self, other: &FileAccountDirectory) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn load_file(
        file_path: &str,
    ) -> std::result::Result<DirectoryState, AccountDirectoryInitializationError> {
        let file_content = std::fs::read_to_string(file_path).map_err(|e| {
            AccountDirectoryInitializationError(format!("Failed to read file: {}", e))
        })?;
        debug!("Loaded account directory file content");
        let persisted: PersistedDirectory = serde_json::from_str(&file_content).map_err(|e| {
            AccountDirectoryInitializationError(format!("Failed to parse file: {}", e))
        })?;

        let mut accounts = BTreeMap::new();
        for account in persisted.accounts {
            let id = account.id.ok_or_else(|| {
                AccountDirectoryInitializationError(format!(
                    "Stored account {} has no id",
                    account.user_id
                ))
            })?;
            accounts.insert(id, account);
        }
        // Never hand out an id at or below one already on disk
        let next_id = accounts
            .keys()
            .next_back()
            .map(|id| id.next())
            .filter(|id| *id > persisted.next_id)
            .unwrap_or(persisted.next_id);
        debug!("Parsed {} accounts from file", accounts.len());

        Ok(DirectoryState { next_id, accounts })
    }

    fn persist(&self, state: &DirectoryState) -> std::result::Result<(), AccountDirectoryPersistenceError> {
        trace!("Persisting accounts to file: {}", self.file_path);
        let persisted = PersistedDirectory {
            next_id: state.next_id,
            accounts: state.accounts.values().cloned().collect(),
        };
        let serialized = serde_json::to_string_pretty(&persisted).map_err(|e| {
            AccountDirectoryPersistenceError(format!("Failed to serialize accounts: {}", e))
        })?;
        std::fs::write(&self.file_path, serialized).map_err(|e| {
            AccountDirectoryPersistenceError(format!("Failed to write to file: {}", e))
        })?;
        debug!("Successfully persisted {} accounts", state.accounts.len());
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, DirectoryState>> {
        self.state
            .read()
            .map_err(|_| AccountDirectoryError::Custom("Poisoned account directory".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, DirectoryState>> {
        self.state
            .write()
            .map_err(|_| AccountDirectoryError::Custom("Poisoned account directory".into()))
    }
}

impl AccountDirectory for FileAccountDirectory {
    #[instrument(level = "info", skip(self, account), fields(user_id = %account.user_id))]
    async fn insert(&mut self, account: Account) -> Result<Account> {
        let mut state = self.write()?;
        let mut next = state.clone();
        let id = next.next_id;
        next.next_id = id.next();
        let account = Account {
            id: Some(id),
            ..account
        };
        next.accounts.insert(id, account.clone());
        self.persist(&next)?;
        *state = next;
        Ok(account)
    }

    #[instrument(level = "info", skip(self, account), fields(user_id = %account.user_id))]
    async fn update(&mut self, account: Account) -> Result<Account> {
        let id = account
            .id
            .ok_or_else(|| AccountDirectoryError::MissingId(account.user_id.clone()))?;
        let mut state = self.write()?;
        let mut next = state.clone();
        if id >= next.next_id {
            next.next_id = id.next();
        }
        next.accounts.insert(id, account.clone());
        self.persist(&next)?;
        *state = next;
        Ok(account)
    }

    #[instrument(level = "info", skip(self, account), fields(user_id = %account.user_id))]
    async fn delete(&mut self, account: &Account) -> Result<()> {
        let Some(id) = account.id else {
            return Ok(());
        };
        let mut state = self.write()?;
        let mut next = state.clone();
        if next.accounts.remove(&id).is_some() {
            self.persist(&next)?;
            *state = next;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_by_email(&self, email: &str) -> Result<Vec<Account>> {
        Ok(self
            .read()?
            .accounts
            .values()
            .filter(|account| account.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_by_uid(&self, uid: &str) -> Result<Account> {
        self.read()?
            .accounts
            .values()
            .find(|account| account.matches_uid(uid))
            .cloned()
            .ok_or_else(|| AccountDirectoryError::NotFound(uid.to_string()))
    }

    async fn get_user_count(&self, _has_logged_in: bool) -> Result<usize> {
        Ok(self.read()?.accounts.len())
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(
        &self,
        _field_name: &str,
        pattern: &str,
        _limit: Option<usize>,
        _offset: Option<usize>,
    ) -> Result<Vec<Account>> {
        Ok(self
            .read()?
            .accounts
            .values()
            .filter(|account| matches_pattern(account, pattern))
            .cloned()
            .collect())
    }

    async fn call_for_all_users<F>(
        &self,
        mut callback: F,
        _search: &str,
        _only_seen: bool,
    ) -> Result<()>
    where
        F: FnMut(&Account) -> ControlFlow<()> + Send,
    {
        let accounts: Vec<Account> = self.read()?.accounts.values().cloned().collect();
        for account in &accounts {
            if callback(account).is_break() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state_file(name: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "usermgmt-{}-{}-{}.json",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_accounts_survive_reload() {
        let path = temp_state_file("reload");
        let mut directory = FileAccountDirectory::new(path.clone()).unwrap();
        let alice = directory
            .insert(Account::new("Alice", "File").with_email("alice@example.com"))
            .await
            .unwrap();
        directory.insert(Account::new("bob", "File")).await.unwrap();

        let reloaded = FileAccountDirectory::new(path.clone()).unwrap();
        let found = reloaded.get_by_uid("alice").await.unwrap();
        assert_eq!(found, alice);
        assert_eq!(reloaded.get_user_count(false).await.unwrap(), 2);
        assert!(!reloaded.same_instance(&directory));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_ids_continue_after_reload() {
        let path = temp_state_file("ids");
        let mut directory = FileAccountDirectory::new(path.clone()).unwrap();
        let first = directory.insert(Account::new("a", "File")).await.unwrap();

        let mut reloaded = FileAccountDirectory::new(path.clone()).unwrap();
        let second = reloaded.insert(Account::new("b", "File")).await.unwrap();

        assert!(second.id.unwrap() > first.id.unwrap());

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_delete_is_persisted() {
        let path = temp_state_file("delete");
        let mut directory = FileAccountDirectory::new(path.clone()).unwrap();
        let account = directory.insert(Account::new("gone", "File")).await.unwrap();
        directory.delete(&account).await.unwrap();

        let reloaded = FileAccountDirectory::new(path.clone()).unwrap();
        assert!(matches!(
            reloaded.get_by_uid("gone").await,
            Err(AccountDirectoryError::NotFound(_))
        ));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let path = std::env::temp_dir()
            .join(format!("usermgmt-missing-{}", std::process::id()))
            .join("accounts.json")
            .to_string_lossy()
            .into_owned();
        let mut directory = FileAccountDirectory::new(path).unwrap();

        let result = directory.insert(Account::new("alice", "File")).await;

        assert!(matches!(result, Err(AccountDirectoryError::PersistenceError(_))));
        assert!(matches!(
            directory.get_by_uid("alice").await,
            Err(AccountDirectoryError::NotFound(_))
        ));
        assert_eq!(directory.get_user_count(false).await.unwrap(), 0);
    }

    #[test]
    fn test_corrupt_file_fails_initialization() {
        let path = temp_state_file("corrupt");
        std::fs::write(&path, "not json").unwrap();

        let result = FileAccountDirectory::new(path.clone());
        assert!(result.is_err());

        std::fs::remove_file(path).ok();
    }
}
