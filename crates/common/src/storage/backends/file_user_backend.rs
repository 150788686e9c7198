use std::sync::{Arc, RwLock};

use tracing::{debug, instrument, trace};

use crate::storage::backends::{
    CredentialStore, UserBackend, UserBackendError, UserBackendInitializationError,
    UserBackendPersistenceError,
};

type Result<T> = std::result::Result<T, UserBackendError>;

pub const FILE_BACKEND_NAME: &str = "File";

/// Credential backend persisted to a JSON state file.
///
/// Passwords are stored as given. Use it for local setups and fixtures, not
/// for anything exposed to real users.
#[derive(Clone, Debug)]
pub struct FileUserBackend {
    file_path: String,
    store: Arc<RwLock<CredentialStore>>,
}

impl FileUserBackend {
    pub fn new(file_path: String) -> std::result::Result<Self, UserBackendInitializationError> {
        let store = if std::path::Path::new(&file_path).exists() {
            Self::load_file(&file_path)?
        } else {
            CredentialStore::default()
        };

        Ok(Self {
            file_path,
            store: Arc::new(RwLock::new(store)),
        })
    }

    pub fn same_instance(&self, other: &FileUserBackend) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    fn load_file(file_path: &str) -> std::result::Result<CredentialStore, UserBackendInitializationError> {
        let file_content = std::fs::read_to_string(file_path).map_err(|e| {
            UserBackendInitializationError(format!("Failed to read file: {}", e))
        })?;
        let store: CredentialStore = serde_json::from_str(&file_content).map_err(|e| {
            UserBackendInitializationError(format!("Failed to parse file: {}", e))
        })?;
        debug!("Parsed {} users from credential file", store.len());
        Ok(store)
    }

    fn persist(&self, store: &CredentialStore) -> std::result::Result<(), UserBackendPersistenceError> {
        trace!("Persisting credentials to file: {}", self.file_path);
        let serialized = serde_json::to_string_pretty(store).map_err(|e| {
            UserBackendPersistenceError(format!("Failed to serialize credentials: {}", e))
        })?;
        std::fs::write(&self.file_path, serialized).map_err(|e| {
            UserBackendPersistenceError(format!("Failed to write to file: {}", e))
        })?;
        Ok(())
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

impl UserBackend for FileUserBackend {
    #[instrument(level = "info", skip(self, password))]
    async fn create_user(&mut self, uid: &str, password: &str) -> Result<bool> {
        let mut store = self.write()?;
        let mut next = store.clone();
        let created = next.create_user(uid, password);
        if created {
            self.persist(&next)?;
            *store = next;
        }
        Ok(created)
    }

    #[instrument(level = "info", skip(self))]
    async fn delete_user(&mut self, uid: &str) -> Result<bool> {
        let mut store = self.write()?;
        let mut next = store.clone();
        let deleted = next.delete_user(uid);
        if deleted {
            self.persist(&next)?;
            *store = next;
        }
        Ok(deleted)
    }

    #[instrument(level = "info", skip(self, password))]
    async fn set_password(&mut self, uid: &str, password: &str) -> Result<bool> {
        let mut store = self.write()?;
        let mut next = store.clone();
        let updated = next.set_password(uid, password);
        if updated {
            self.persist(&next)?;
            *store = next;
        }
        Ok(updated)
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

    async fn count_users(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    #[instrument(level = "info", skip(self))]
    async fn set_display_name(&mut self, uid: &str, display_name: &str) -> Result<()> {
        let mut store = self.write()?;
        let mut next = store.clone();
        next.set_display_name(uid, display_name);
        self.persist(&next)?;
        *store = next;
        Ok(())
    }

    async fn get_display_name(&self, uid: &str) -> Result<String> {
        Ok(self.read()?.get_display_name(uid))
    }

    fn backend_name(&self) -> &str {
        FILE_BACKEND_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state_file(name: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "usermgmt-backend-{}-{}-{}.json",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_credentials_survive_reload() {
        let path = temp_state_file("reload");
        let mut backend = FileUserBackend::new(path.clone()).unwrap();
        backend.create_user("alice", "secret").await.unwrap();
        backend.create_user("bob", "hunter2").await.unwrap();
        backend.set_display_name("alice", "Alice").await.unwrap();

        let reloaded = FileUserBackend::new(path.clone()).unwrap();
        assert_eq!(
            reloaded.check_password("alice", "secret").await.unwrap().as_deref(),
            Some("alice")
        );
        assert_eq!(reloaded.get_display_name("alice").await.unwrap(), "Alice");
        assert_eq!(reloaded.get_users("", None, None).await.unwrap(), vec!["alice", "bob"]);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_count_users_reports_stored_users() {
        let path = temp_state_file("count");
        let mut backend = FileUserBackend::new(path.clone()).unwrap();
        backend.create_user("a", "p").await.unwrap();
        backend.create_user("b", "p").await.unwrap();
        backend.delete_user("a").await.unwrap();

        assert_eq!(backend.count_users().await.unwrap(), 1);
        assert_eq!(backend.backend_name(), "File");

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_refused_operations_do_not_touch_disk() {
        let path = temp_state_file("refused");
        let mut backend = FileUserBackend::new(path.clone()).unwrap();

        assert!(!backend.set_password("ghost", "p").await.unwrap());
        assert!(!backend.delete_user("ghost").await.unwrap());
        assert!(!std::path::Path::new(&path).exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_credentials_unchanged() {
        let path = std::env::temp_dir()
            .join(format!("usermgmt-backend-missing-{}", std::process::id()))
            .join("credentials.json")
            .to_string_lossy()
            .into_owned();
        let mut backend = FileUserBackend::new(path).unwrap();

        assert!(matches!(
            backend.create_user("alice", "secret").await,
            Err(UserBackendError::PersistenceError(_))
        ));
        assert!(!backend.user_exists("alice").await.unwrap());
        assert_eq!(backend.count_users().await.unwrap(), 0);
    }
}
