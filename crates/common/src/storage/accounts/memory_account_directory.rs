use std::{
    collections::BTreeMap,
    ops::ControlFlow,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::trace;

use crate::{
    Account, AccountId,
    storage::accounts::{AccountDirectory, AccountDirectoryError, matches_pattern},
};

type Result<T> = std::result::Result<T, AccountDirectoryError>;

const FIRST_ACCOUNT_ID: u64 = 1000;

/// Shared by every in-memory directory so ids are never reused within a process.
static NEXT_ACCOUNT_ID: AtomicU64 = AtomicU64::new(FIRST_ACCOUNT_ID);

fn next_account_id() -> AccountId {
    AccountId::new(NEXT_ACCOUNT_ID.fetch_add(1, Ordering::SeqCst))
}

/// In-memory account directory used in place of the database mapper.
///
/// Accounts are keyed by id. Ids come from a process-wide counter, so
/// iterating the map in key order is iterating in insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryAccountDirectory {
    accounts: Arc<RwLock<BTreeMap<AccountId, Account>>>,
    owner_scope: Option<String>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory labelled with the override scope that installs it.
    pub fn for_scope(scope: impl Into<String>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(BTreeMap::new())),
            owner_scope: Some(scope.into()),
        }
    }

    pub fn owner_scope(&self) -> Option<&str> {
        self.owner_scope.as_deref()
    }

    pub fn same_instance(&self, other: &MemoryAccountDirectory) -> bool {
        Arc::ptr_eq(&self.accounts, &other.accounts)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<AccountId, Account>>> {
        self.accounts
            .read()
            .map_err(|_| AccountDirectoryError::Custom("Poisoned account directory".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<AccountId, Account>>> {
        self.accounts
            .write()
            .map_err(|_| AccountDirectoryError::Custom("Poisoned account directory".into()))
    }
}

impl AccountDirectory for MemoryAccountDirectory {
    async fn insert(&mut self, account: Account) -> Result<Account> {
        let id = next_account_id();
        let account = Account {
            id: Some(id),
            ..account
        };
        trace!(%id, user_id = %account.user_id, "Inserting account");
        self.write()?.insert(id, account.clone());
        Ok(account)
    }

    async fn update(&mut self, account: Account) -> Result<Account> {
        let id = account
            .id
            .ok_or_else(|| AccountDirectoryError::MissingId(account.user_id.clone()))?;
        self.write()?.insert(id, account.clone());
        Ok(account)
    }

    async fn delete(&mut self, account: &Account) -> Result<()> {
        if let Some(id) = account.id {
            self.write()?.remove(&id);
        }
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Vec<Account>> {
        Ok(self
            .read()?
            .values()
            .filter(|account| account.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    async fn get_by_uid(&self, uid: &str) -> Result<Account> {
        self.read()?
            .values()
            .find(|account| account.matches_uid(uid))
            .cloned()
            .ok_or_else(|| AccountDirectoryError::NotFound(uid.to_string()))
    }

    async fn get_user_count(&self, _has_logged_in: bool) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn search(
        &self,
        _field_name: &str,
        pattern: &str,
        _limit: Option<usize>,
        _offset: Option<usize>,
    ) -> Result<Vec<Account>> {
        Ok(self
            .read()?
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
        // Snapshot first so the callback may touch the directory itself.
        let accounts: Vec<Account> = self.read()?.values().cloned().collect();
        for account in &accounts {
            if callback(account).is_break() {
                break;
            }
        }
        Ok(())
    }
}
