use crate::application::conversation::Session;
use crate::domain::user::UserId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process session table with one lock per user.
///
/// A turn holds its user's guard from the moment it starts until its effects are
/// stored, so two events from the same user are handled strictly one after the
/// other while different users proceed in parallel. Nothing here survives a
/// restart.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<UserId, Arc<Mutex<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user_id`'s session, creating an idle one on
    /// first use.
    pub async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<Session> {
        let slot = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(user_id))))
            .clone();
        slot.lock_owned().await
    }

    /// Number of users currently in the middle of a flow. Sessions locked by an
    /// in-flight turn are not counted.
    pub fn open_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|slot| slot.try_lock().is_ok_and(|session| session.is_open()))
            .count()
    }
}
