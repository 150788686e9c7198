use std::ops::ControlFlow;

use usermgmt_common::config::{AccountStorageConfig, BackendConfig};
use usermgmt_manager::{ManagerConfig, UserManager, UserManagerError};

fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!(
            "usermgmt-it-{}-{}-{}.json",
            name,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default()
        ))
        .to_string_lossy()
        .into_owned()
}

fn file_config(accounts: &str, credentials: &str) -> ManagerConfig {
    ManagerConfig {
        account_storage: AccountStorageConfig::File {
            state_file: accounts.to_string(),
        },
        backends: vec![BackendConfig::File {
            state_file: credentials.to_string(),
        }],
    }
}

#[tokio::test]
async fn test_users_persist_across_managers() {
    let accounts = temp_path("accounts");
    let credentials = temp_path("credentials");
    let config = file_config(&accounts, &credentials);
    config.validate().unwrap();

    let manager = UserManager::from_config(&config).unwrap();
    let mut alice = manager.create_user("alice", "secret").await.unwrap();
    alice.set_display_name("Alice").await.unwrap();
    manager.create_user("bob", "hunter2").await.unwrap();

    let reopened = UserManager::from_config(&config).unwrap();
    let found = reopened.get("ALICE").await.unwrap().unwrap();
    assert_eq!(found.display_name(), "Alice");
    assert_eq!(found.account().backend, "File");
    assert!(reopened.check_password("bob", "hunter2").await.unwrap().is_some());
    assert_eq!(reopened.count_users().await.unwrap(), 2);

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&accounts).unwrap()).unwrap();
    let uids: Vec<_> = stored["accounts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|account| account["user_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(uids, vec!["alice", "bob"]);

    std::fs::remove_file(accounts).ok();
    std::fs::remove_file(credentials).ok();
}

#[tokio::test]
async fn test_deleted_users_stay_deleted() {
    let accounts = temp_path("accounts-delete");
    let credentials = temp_path("credentials-delete");
    let config = file_config(&accounts, &credentials);

    let manager = UserManager::from_config(&config).unwrap();
    let user = manager.create_user("carol", "pw").await.unwrap();
    assert!(user.delete().await.unwrap());

    let reopened = UserManager::from_config(&config).unwrap();
    assert!(!reopened.user_exists("carol").await.unwrap());
    assert!(reopened.check_password("carol", "pw").await.unwrap().is_none());

    // The uid can be reused once the user is gone
    reopened.create_user("carol", "pw2").await.unwrap();

    std::fs::remove_file(accounts).ok();
    std::fs::remove_file(credentials).ok();
}

#[tokio::test]
async fn test_corrupt_state_file_fails_manager_construction() {
    let accounts = temp_path("accounts-corrupt");
    std::fs::write(&accounts, "{").unwrap();
    let config = ManagerConfig {
        account_storage: AccountStorageConfig::File {
            state_file: accounts.clone(),
        },
        backends: vec![BackendConfig::Dummy],
    };

    assert!(matches!(
        UserManager::from_config(&config),
        Err(UserManagerError::DirectoryInitialization(_))
    ));

    std::fs::remove_file(accounts).ok();
}

#[tokio::test]
async fn test_enumeration_stops_early() {
    let manager = UserManager::from_config(&ManagerConfig::default()).unwrap();
    for uid in ["one", "two", "three"] {
        manager.create_user(uid, "pw").await.unwrap();
    }

    let mut visited = Vec::new();
    manager
        .call_for_all_users(|user| {
            visited.push(user.uid().to_string());
            if user.uid() == "two" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();

    assert_eq!(visited, vec!["one", "two"]);
}
