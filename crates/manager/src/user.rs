use tracing::{debug, info, instrument};
use usermgmt_common::{
    Account,
    storage::{AccountDirectory, AccountDirectoryError, UserBackend, UserBackendStorage},
};

use crate::{error::UserManagerError, user_manager::UserManager};

type Result<T> = std::result::Result<T, UserManagerError>;

/// A user known to a [`UserManager`]: the stored account plus access to the
/// backend holding its credentials.
#[derive(Clone, Debug)]
pub struct User {
    account: Account,
    manager: UserManager,
}

impl User {
    pub(crate) fn new(account: Account, manager: UserManager) -> Self {
        Self { account, manager }
    }

    pub fn uid(&self) -> &str {
        &self.account.user_id
    }

    pub fn display_name(&self) -> &str {
        self.account
            .display_name
            .as_deref()
            .unwrap_or(&self.account.user_id)
    }

    pub fn email(&self) -> Option<&str> {
        self.account.email.as_deref()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    async fn backend(&self) -> Result<UserBackendStorage> {
        self.manager
            .current()
            .await
            .backend_named(&self.account.backend)
            .cloned()
            .ok_or_else(|| UserManagerError::BackendNotInstalled {
                uid: self.account.user_id.clone(),
                backend: self.account.backend.clone(),
            })
    }

    pub async fn set_password(&self, password: &str) -> Result<bool> {
        let mut backend = self.backend().await?;
        Ok(backend.set_password(self.uid(), password).await?)
    }

    pub async fn set_display_name(&mut self, display_name: &str) -> Result<()> {
        let mut backend = self.backend().await?;
        backend.set_display_name(self.uid(), display_name).await?;

        let mut directory = self.manager.current().await.directory;
        self.account = directory
            .update(self.account.with_display_name(display_name))
            .await?;
        Ok(())
    }

    /// Removes the account and its credentials. Returns whether the backend
    /// still held credentials for the user.
    ///
    /// Credentials are only touched while the directory still maps the uid to
    /// this account, so a stale handle never removes a newer user's login.
    #[instrument(level = "info", skip(self), fields(uid = %self.account.user_id))]
    pub async fn delete(self) -> Result<bool> {
        let internals = self.manager.current().await;
        let current = match internals.directory.get_by_uid(&self.account.user_id).await {
            Ok(account) => account.id == self.account.id,
            Err(AccountDirectoryError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if !current {
            debug!("Account is gone from the directory, keeping credentials");
        }

        let removed_credentials = match internals.backend_named(&self.account.backend) {
            Some(backend) if current => backend.clone().delete_user(&self.account.user_id).await?,
            _ => false,
        };

        let mut directory = internals.directory;
        directory.delete(&self.account).await?;
        info!("Deleted user");
        Ok(removed_credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usermgmt_common::storage::{
        AccountDirectoryStorage, accounts::MemoryAccountDirectory, backends::DummyUserBackend,
    };

    fn memory_manager() -> UserManager {
        UserManager::new(
            AccountDirectoryStorage::InMemory(MemoryAccountDirectory::new()),
            vec![UserBackendStorage::Dummy(DummyUserBackend::new())],
        )
    }

    #[tokio::test]
    async fn test_delete_removes_account_and_credentials() {
        let manager = memory_manager();
        let user = manager.create_user("alice", "secret").await.unwrap();

        assert!(user.delete().await.unwrap());

        assert!(!manager.user_exists("alice").await.unwrap());
        assert!(manager.check_password("alice", "secret").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_handle_keeps_newer_users_credentials() {
        let manager = memory_manager();
        let stale = manager.create_user("alice", "one").await.unwrap();
        assert!(stale.clone().delete().await.unwrap());
        let live = manager.create_user("alice", "two").await.unwrap();

        assert!(!stale.delete().await.unwrap());

        assert!(manager.user_exists("alice").await.unwrap());
        let found = manager.check_password("alice", "two").await.unwrap().unwrap();
        assert_eq!(found.account().id, live.account().id);
    }

    #[tokio::test]
    async fn test_set_password() {
        let manager = memory_manager();
        let user = manager.create_user("alice", "old").await.unwrap();

        assert!(user.set_password("new").await.unwrap());
        assert!(manager.check_password("alice", "new").await.unwrap().is_some());
        assert!(manager.check_password("alice", "old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_display_name_updates_account() {
        let manager = memory_manager();
        let mut user = manager.create_user("alice", "pw").await.unwrap();

        user.set_display_name("Alice Liddell").await.unwrap();

        assert_eq!(user.display_name(), "Alice Liddell");
        let reloaded = manager.get("alice").await.unwrap().unwrap();
        assert_eq!(reloaded.display_name(), "Alice Liddell");
    }

    #[tokio::test]
    async fn test_missing_backend_is_reported() {
        let manager = memory_manager();
        let user = manager.create_user("alice", "pw").await.unwrap();
        let directory = manager.current().await.directory;
        manager.reset(directory, vec![]).await;

        assert!(matches!(
            user.set_password("new").await,
            Err(UserManagerError::BackendNotInstalled { .. })
        ));
        // Deleting still removes the account
        assert!(!user.clone().delete().await.unwrap());
        assert!(!manager.user_exists("alice").await.unwrap());
    }
}
