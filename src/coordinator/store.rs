use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Duration;
use tracing::warn;

use super::session::{AuthId, AuthSession, BindingRecord, SessionState};
use crate::primitives::group::RISTRETTO_BYTES;
use crate::primitives::{Element, Scalar};
use crate::protocol::ClientInit;
use crate::{Error, Result};

const DEFAULT_SESSION_TTL_SECS: u64 = 300;
const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// What `bind_tag` does when the tag already has a binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagReplayPolicy {
    /// Refuse the second binding with `DuplicateTag`.
    #[default]
    Reject,
    /// Replace the earlier record.
    Overwrite,
}

/// Session store limits and policies.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub session_ttl: Duration,
    pub max_sessions: usize,
    pub tag_replay: TagReplayPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
            tag_replay: TagReplayPolicy::default(),
        }
    }
}

/// Exclusive access to one session.
pub type SessionGuard = OwnedMutexGuard<AuthSession>;

/// In-flight sessions and bound linkage tags of one server.
///
/// Each session sits behind its own mutex so phase calls for one `auth_id` are
/// serialised while unrelated sessions proceed in parallel. The map lock is never
/// held while waiting for a session lock.
pub struct SessionStore {
    config: StoreConfig,
    sessions: RwLock<HashMap<AuthId, Arc<Mutex<AuthSession>>>>,
    bindings: RwLock<HashMap<[u8; RISTRETTO_BYTES], BindingRecord>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Limits and policies in effect.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Inserts a new session.
    ///
    /// Returns an error if the id is taken or the store is full.
    pub async fn create(&self, session: AuthSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&session.auth_id) {
            return Err(Error::DuplicateSession(session.auth_id.to_string()));
        }
        if sessions.len() >= self.config.max_sessions {
            return Err(Error::CapacityExceeded(format!(
                "{} sessions in flight",
                sessions.len()
            )));
        }

        sessions.insert(session.auth_id.clone(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    /// Creates a session, or restarts one that has not been issued a challenge yet.
    ///
    /// Restarting replaces the stored client data and share, so a repeated begin
    /// call is not idempotent.
    pub async fn open(&self, auth_id: AuthId, client_data: ClientInit, share: Scalar) -> Result<()> {
        let ttl = self.config.session_ttl;

        if let Some(entry) = self.entry(&auth_id).await {
            let mut session = entry.lock_owned().await;
            if session.is_expired() || session.state == SessionState::Created {
                *session = AuthSession::new(auth_id, client_data, share, ttl);
                return Ok(());
            }
            return Err(Error::DuplicateSession(auth_id.to_string()));
        }

        self.create(AuthSession::new(auth_id, client_data, share, ttl))
            .await
    }

    /// Locks a session for the duration of one phase call.
    ///
    /// An expired session is removed and reported as `SessionExpired`.
    pub async fn lock(&self, auth_id: &AuthId) -> Result<SessionGuard> {
        let entry = self
            .entry(auth_id)
            .await
            .ok_or_else(|| Error::UnknownSession(auth_id.to_string()))?;

        let guard = Arc::clone(&entry).lock_owned().await;
        if guard.is_expired() {
            drop(guard);
            self.remove_entry(auth_id, &entry).await;
            return Err(Error::SessionExpired(auth_id.to_string()));
        }

        Ok(guard)
    }

    /// Snapshot of a session.
    pub async fn get(&self, auth_id: &AuthId) -> Result<AuthSession> {
        Ok(self.lock(auth_id).await?.clone())
    }

    /// Applies `mutation` under the session lock.
    pub async fn update<T>(
        &self,
        auth_id: &AuthId,
        mutation: impl FnOnce(&mut AuthSession) -> Result<T>,
    ) -> Result<T> {
        let mut session = self.lock(auth_id).await?;
        mutation(&mut session)
    }

    /// Removes a session. Returns whether it existed.
    pub async fn evict(&self, auth_id: &AuthId) -> bool {
        self.sessions.write().await.remove(auth_id).is_some()
    }

    /// Removes every expired session not currently locked. Returns how many were removed.
    pub async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(session) => !session.is_expired(),
            Err(_) => true,
        });

        before - sessions.len()
    }

    /// Records the binding of a linkage tag according to the replay policy.
    pub async fn bind_tag(&self, record: BindingRecord) -> Result<()> {
        let mut bindings = self.bindings.write().await;

        match bindings.entry(record.tag.to_bytes()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
            Entry::Occupied(mut slot) => match self.config.tag_replay {
                TagReplayPolicy::Reject => Err(Error::DuplicateTag(record.tag.to_string())),
                TagReplayPolicy::Overwrite => {
                    warn!(
                        tag = %record.tag,
                        previous = %slot.get().auth_id,
                        auth_id = %record.auth_id,
                        "Overwriting binding of replayed linkage tag"
                    );
                    slot.insert(record);
                    Ok(())
                }
            },
        }
    }

    /// The binding recorded for `tag`.
    pub async fn binding(&self, tag: &Element) -> Option<BindingRecord> {
        self.bindings.read().await.get(&tag.to_bytes()).cloned()
    }

    /// Whether `tag` has been bound.
    pub async fn is_bound(&self, tag: &Element) -> bool {
        self.bindings.read().await.contains_key(&tag.to_bytes())
    }

    /// Number of live sessions, expired ones included until evicted.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of bound tags.
    pub async fn binding_count(&self) -> usize {
        self.bindings.read().await.len()
    }

    async fn entry(&self, auth_id: &AuthId) -> Option<Arc<Mutex<AuthSession>>> {
        self.sessions.read().await.get(auth_id).cloned()
    }

    async fn remove_entry(&self, auth_id: &AuthId, entry: &Arc<Mutex<AuthSession>>) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(auth_id)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            sessions.remove(auth_id);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
