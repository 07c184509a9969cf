use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-assigned numeric identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who sent the event currently being handled, as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: String,
}

impl Caller {
    pub fn new(user_id: i64, username: Option<&str>, display_name: &str) -> Self {
        Self {
            user_id: UserId(user_id),
            username: username
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            display_name: display_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: Option<String>,
    pub display_name: String,
    pub first_seen: DateTime<Utc>,
}

impl User {
    pub fn from_caller(caller: &Caller) -> Self {
        Self {
            user_id: caller.user_id,
            username: caller.username.clone(),
            display_name: caller.display_name.clone(),
            first_seen: Utc::now(),
        }
    }

    /// Takes the display fields of `latest`; identity and `first_seen` never change.
    pub fn refresh(&mut self, latest: User) {
        self.username = latest.username;
        self.display_name = latest.display_name;
    }
}
