use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier assigned to an account by the directory that stores it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(u64);

impl AccountId {
    pub fn new(id: u64) -> Self {
        AccountId(id)
    }

    pub fn value(&self) -> &u64 {
        &self.0
    }

    pub fn next(&self) -> Self {
        AccountId(self.0 + 1)
    }
}

impl From<u64> for AccountId {
    fn from(value: u64) -> Self {
        AccountId(value)
    }
}

impl From<AccountId> for u64 {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(AccountId)
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    /// Unset until the account has been inserted into a directory.
    pub id: Option<AccountId>,
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Name of the user backend holding this account's credentials.
    pub backend: String,
    pub last_login: Option<DateTime<Utc>>,
    /// Opaque attributes owned by other parts of the application.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Account {
    pub fn new(user_id: impl Into<String>, backend: impl Into<String>) -> Self {
        Account {
            id: None,
            user_id: user_id.into(),
            email: None,
            display_name: None,
            backend: backend.into(),
            last_login: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_email(&self, email: impl Into<String>) -> Self {
        Account {
            email: Some(email.into()),
            ..self.clone()
        }
    }

    pub fn with_display_name(&self, display_name: impl Into<String>) -> Self {
        Account {
            display_name: Some(display_name.into()),
            ..self.clone()
        }
    }

    pub fn update_last_login(&self, at: DateTime<Utc>) -> Self {
        Account {
            last_login: Some(at),
            ..self.clone()
        }
    }

    pub fn has_logged_in(&self) -> bool {
        self.last_login.is_some()
    }

    /// Case-insensitive comparison against the stored user id.
    pub fn matches_uid(&self, uid: &str) -> bool {
        self.user_id.to_lowercase() == uid.to_lowercase()
    }
}
