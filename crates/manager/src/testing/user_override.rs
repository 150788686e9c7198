use thiserror::Error;
use tracing::{error, info, warn};
use usermgmt_common::storage::{
    AccountDirectoryStorage, UserBackendStorage, accounts::MemoryAccountDirectory,
    backends::DummyUserBackend,
};

use crate::{ManagerInternals, User, UserManager, UserManagerError};

#[derive(Debug, Error)]
pub enum OverrideError {
    /// The installed directory still belongs to an earlier scope that never deactivated.
    #[error("Missing deactivation of user override in {scope}")]
    IsolationViolation { scope: String },
    #[error("{0}")]
    Manager(#[from] UserManagerError),
}

type Result<T> = std::result::Result<T, OverrideError>;

/// An override that is not installed.
#[derive(Clone, Debug)]
pub struct UserOverride {
    manager: UserManager,
    scope: String,
}

impl UserOverride {
    /// `scope` names the test that owns the override and shows up in
    /// diagnostics when it is not deactivated.
    pub fn new(manager: &UserManager, scope: impl Into<String>) -> Self {
        Self {
            manager: manager.clone(),
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Installs a fresh in-memory directory and dummy backend.
    ///
    /// Fails without touching the manager when the installed directory is a
    /// fake that another scope never handed back.
    pub async fn activate(self) -> Result<ActiveUserOverride> {
        let current = self.manager.current().await;
        if let Some(owner) = current.directory.owner_scope() {
            error!(
                scope = %self.scope,
                owner = %owner,
                "User override is still active from an earlier scope"
            );
            return Err(OverrideError::IsolationViolation {
                scope: owner.to_string(),
            });
        }

        let previous = self
            .manager
            .reset(
                AccountDirectoryStorage::InMemory(MemoryAccountDirectory::for_scope(&self.scope)),
                vec![UserBackendStorage::Dummy(DummyUserBackend::new())],
            )
            .await;
        info!(scope = %self.scope, "Activated user override");

        Ok(ActiveUserOverride {
            manager: self.manager,
            scope: self.scope,
            previous: Some(previous),
            users: Vec::new(),
        })
    }
}

/// An installed override. Call [`ActiveUserOverride::deactivate`] when the
/// scope ends; dropping it leaves the fakes installed.
#[derive(Debug)]
pub struct ActiveUserOverride {
    manager: UserManager,
    scope: String,
    previous: Option<ManagerInternals>,
    users: Vec<User>,
}

impl ActiveUserOverride {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn manager(&self) -> &UserManager {
        &self.manager
    }

    /// The internals that will be restored on deactivation.
    pub fn previous(&self) -> Option<&ManagerInternals> {
        self.previous.as_ref()
    }

    /// Creates a user that is deleted again on deactivation. The password
    /// defaults to the user name, and an existing user of the same name is
    /// replaced.
    pub async fn create_user(&mut self, name: &str, password: Option<&str>) -> Result<User> {
        let password = password.unwrap_or(name);
        if let Some(existing) = self.manager.get(name).await? {
            self.users.retain(|user| user.account().id != existing.account().id);
            existing.delete().await?;
        }

        let user = self.manager.create_user(name, password).await?;
        self.users.push(user.clone());
        Ok(user)
    }

    /// Deletes the users created through this override and restores the
    /// internals that were installed before activation.
    pub async fn deactivate(mut self) -> Result<UserOverride> {
        for user in std::mem::take(&mut self.users) {
            let uid = user.uid().to_string();
            if let Err(e) = user.delete().await {
                warn!(scope = %self.scope, uid = %uid, error = %e, "Failed to delete user created in override");
            }
        }

        if let Some(previous) = self.previous.take() {
            self.manager
                .reset(previous.directory, previous.backends)
                .await;
        }
        info!(scope = %self.scope, "Deactivated user override");

        Ok(UserOverride {
            manager: self.manager.clone(),
            scope: std::mem::take(&mut self.scope),
        })
    }
}

impl Drop for ActiveUserOverride {
    fn drop(&mut self) {
        if self.previous.is_some() {
            warn!(
                scope = %self.scope,
                "User override dropped without deactivation; the next activation will fail"
            );
        }
    }
}
