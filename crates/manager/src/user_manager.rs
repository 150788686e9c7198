use std::{ops::ControlFlow, sync::Arc};

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use usermgmt_common::{
    Account,
    storage::{
        AccountDirectory, AccountDirectoryError, AccountDirectoryStorage, UserBackend,
        UserBackendStorage,
    },
};

use crate::{error::UserManagerError, manager_config::ManagerConfig, user::User};

type Result<T> = std::result::Result<T, UserManagerError>;

/// The account directory and user backends a [`UserManager`] is working with.
#[derive(Clone, Debug)]
pub struct ManagerInternals {
    pub directory: AccountDirectoryStorage,
    pub backends: Vec<UserBackendStorage>,
}

impl ManagerInternals {
    /// True when both hold the very same directory and backend instances, in the same order.
    pub fn same_instances(&self, other: &ManagerInternals) -> bool {
        self.directory.same_instance(&other.directory)
            && self.backends.len() == other.backends.len()
            && self
                .backends
                .iter()
                .zip(&other.backends)
                .all(|(a, b)| a.same_instance(b))
    }

    pub(crate) fn backend_named(&self, name: &str) -> Option<&UserBackendStorage> {
        self.backends
            .iter()
            .find(|backend| backend.backend_name() == name)
    }
}

/// Entry point for user management.
///
/// Cloning is cheap and every clone sees the same installed internals, so a
/// single manager is handed to whatever needs user management.
#[derive(Clone, Debug)]
pub struct UserManager {
    internals: Arc<RwLock<ManagerInternals>>,
}

impl UserManager {
    pub fn new(directory: AccountDirectoryStorage, backends: Vec<UserBackendStorage>) -> Self {
        Self {
            internals: Arc::new(RwLock::new(ManagerInternals {
                directory,
                backends,
            })),
        }
    }

    /// Build the manager from configuration
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        let directory = config.account_storage.build_account_directory()?;
        let backends = config
            .backends
            .iter()
            .map(|backend| backend.build_user_backend())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        info!(
            "Initialized user manager with {} user backends",
            backends.len()
        );
        Ok(Self::new(directory, backends))
    }

    /// The currently installed directory and backends.
    pub async fn current(&self) -> ManagerInternals {
        self.internals.read().await.clone()
    }

    /// Installs new internals and returns the ones they replace.
    #[instrument(level = "info", skip_all)]
    pub async fn reset(
        &self,
        directory: AccountDirectoryStorage,
        backends: Vec<UserBackendStorage>,
    ) -> ManagerInternals {
        let mut internals = self.internals.write().await;
        let previous = std::mem::replace(
            &mut *internals,
            ManagerInternals {
                directory,
                backends,
            },
        );
        info!(
            owner_scope = internals.directory.owner_scope(),
            "Installed new account directory with {} user backends",
            internals.backends.len()
        );
        previous
    }

    pub async fn user_exists(&self, uid: &str) -> Result<bool> {
        Ok(self.find_account(uid).await?.is_some())
    }

    pub async fn get(&self, uid: &str) -> Result<Option<User>> {
        Ok(self
            .find_account(uid)
            .await?
            .map(|account| User::new(account, self.clone())))
    }

    /// Creates the credentials in the first backend that accepts them and
    /// records the account in the directory.
    #[instrument(level = "info", skip(self, password))]
    pub async fn create_user(&self, uid: &str, password: &str) -> Result<User> {
        if uid.trim().is_empty() {
            return Err(UserManagerError::InvalidUid(uid.to_string()));
        }
        if self.user_exists(uid).await? {
            return Err(UserManagerError::UserAlreadyExists(uid.to_string()));
        }

        let mut internals = self.current().await;
        for backend in internals.backends.iter_mut() {
            if !backend.create_user(uid, password).await? {
                debug!(backend = backend.backend_name(), "Backend refused user");
                continue;
            }
            let display_name = backend.get_display_name(uid).await?;
            let account = Account::new(uid, backend.backend_name()).with_display_name(display_name);
            let account = match internals.directory.insert(account).await {
                Ok(account) => account,
                Err(e) => {
                    if let Err(rollback) = backend.delete_user(uid).await {
                        warn!(error = %rollback, "Failed to remove credentials of unrecorded user");
                    }
                    return Err(e.into());
                }
            };
            info!(backend = %account.backend, "Created user");
            return Ok(User::new(account, self.clone()));
        }

        Err(UserManagerError::CreationRefused(uid.to_string()))
    }

    /// Returns the user whose password matches in any installed backend.
    pub async fn check_password(&self, uid: &str, password: &str) -> Result<Option<User>> {
        let internals = self.current().await;
        for backend in &internals.backends {
            if let Some(uid) = backend.check_password(uid, password).await? {
                return self.get(&uid).await;
            }
        }
        Ok(None)
    }

    pub async fn search(&self, pattern: &str) -> Result<Vec<User>> {
        let internals = self.current().await;
        let accounts = internals
            .directory
            .search("user_id", pattern, None, None)
            .await?;
        Ok(accounts
            .into_iter()
            .map(|account| User::new(account, self.clone()))
            .collect())
    }

    pub async fn count_users(&self) -> Result<usize> {
        Ok(self.current().await.directory.get_user_count(false).await?)
    }

    /// Visits every user in insertion order until the callback breaks.
    pub async fn call_for_all_users<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(&User) -> ControlFlow<()> + Send,
    {
        let internals = self.current().await;
        internals
            .directory
            .call_for_all_users(
                |account| callback(&User::new(account.clone(), self.clone())),
                "",
                false,
            )
            .await?;
        Ok(())
    }

    async fn find_account(&self, uid: &str) -> Result<Option<Account>> {
        match self.current().await.directory.get_by_uid(uid).await {
            Ok(account) => Ok(Some(account)),
            Err(AccountDirectoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
