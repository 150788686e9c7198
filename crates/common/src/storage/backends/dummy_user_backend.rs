use std::sync::{Arc, RwLock};

use crate::storage::backends::{CredentialStore, UserBackend, UserBackendError};

type Result<T> = std::result::Result<T, UserBackendError>;

pub const DUMMY_BACKEND_NAME: &str = "Dummy";

/// Plaintext credential backend. Only suitable as a test double.
#[derive(Clone, Debug, Default)]
pub struct DummyUserBackend {
    store: Arc<RwLock<CredentialStore>>,
}

impl DummyUserBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn same_instance(&self, other: &DummyUserBackend) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, CredentialStore>> {
        self.store
            .read()
            .map_err(|_| UserBackendError::Custom("Poisoned credential store".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, CredentialStore>> {
        self.store
            .write()
            .map_err(|_| UserBackendError::Custom("Poisoned credential store".into()))
    }
}

impl UserBackend for DummyUserBackend {
    async fn create_user(&mut self, uid: &str, password: &str) -> Result<bool> {
        Ok(self.write()?.create_user(uid, password))
    }

    async fn delete_user(&mut self, uid: &str) -> Result<bool> {
        Ok(self.write()?.delete_user(uid))
    }

    async fn set_password(&mut self, uid: &str, password: &str) -> Result<bool> {
        Ok(self.write()?.set_password(uid, password))
    }

    async fn check_password(&self, uid: &str, password: &str) -> Result<Option<String>> {
        Ok(self.read()?.check_password(uid, password))
    }

    async fn get_users(
        &self,
        search: &str,
        _limit: Option<usize>,
        _offset: Option<usize>,
    ) -> Result<Vec<String>> {
        Ok(self.read()?.get_users(search))
    }

    async fn user_exists(&self, uid: &str) -> Result<bool> {
        Ok(self.read()?.user_exists(uid))
    }

    fn has_user_listings(&self) -> bool {
        true
    }

    /// Always zero. Callers treat zero as "count unknown".
    async fn count_users(&self) -> Result<usize> {
        Ok(0)
    }

    async fn set_display_name(&mut self, uid: &str, display_name: &str) -> Result<()> {
        self.write()?.set_display_name(uid, display_name);
        Ok(())
    }

    async fn get_display_name(&self, uid: &str) -> Result<String> {
        Ok(self.read()?.get_display_name(uid))
    }

    fn backend_name(&self) -> &str {
        DUMMY_BACKEND_NAME
    }
}
