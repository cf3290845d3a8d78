use core::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::primitives::{Element, Scalar, Signature};
use crate::protocol::{ClientInit, ClientProof};

/// Identifier of one authentication attempt, chosen by the leader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthId(String);

impl AuthId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AuthId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AuthId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AuthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress of a session on this server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Client data stored and a share drawn.
    Created,
    /// Joint challenge verified and stored.
    ChallengeIssued,
    /// Client response accepted; `links` is the chain length after this server's link.
    ResponseVerified { links: usize },
    /// Linkage tag bound.
    Bound,
}

impl SessionState {
    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::ChallengeIssued => "challenge_issued",
            SessionState::ResponseVerified { .. } => "response_verified",
            SessionState::Bound => "bound",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One authentication attempt as seen by this server.
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub auth_id: AuthId,
    pub group_id: Uuid,
    pub client_data: ClientInit,
    /// The challenge share this server drew for the attempt.
    pub share: Scalar,
    pub challenge: Option<Scalar>,
    pub response: Option<ClientProof>,
    pub state: SessionState,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl AuthSession {
    /// Creates a session in the `Created` state.
    pub fn new(auth_id: AuthId, client_data: ClientInit, share: Scalar, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            auth_id,
            group_id: client_data.group_id,
            client_data,
            share,
            challenge: None,
            response: None,
            state: SessionState::Created,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Checks if the session outlived its time to live.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Durable record that a linkage tag was used.
#[derive(Clone, Debug)]
pub struct BindingRecord {
    pub tag: Element,
    pub bind: String,
    pub signature: Signature,
    pub auth_id: AuthId,
    pub bound_at: SystemTime,
}
