//! Distributed session coordination.
//!
//! - **store**: per-server sessions and bound linkage tags
//! - **rpc**: typed peer operations and the dispatcher that routes them
//! - **peer**: the four internal operations every server runs
//! - **leader**: the client-facing rounds that drive all servers in index order

/// Leader-side rounds for the client-facing operations.
pub mod leader;
/// Request and reply bodies.
pub mod messages;
/// Internal peer operations.
pub mod peer;
/// Operation routing.
pub mod rpc;
/// Session and binding records.
pub mod session;
/// Session store.
pub mod store;

pub use leader::Coordinator;
pub use messages::{
    AuthenticateRequest, AuthenticationResult, BeginChallengeRequest, BindReply, BindRequest,
    ChallengeGrant, CheckResponseRequest, ErrorBody, FinishChallengeRequest,
    ProofReply, SignedChallenge, SignedShare,
};
pub use peer::{Membership, PeerService};
pub use rpc::{Dispatcher, Operation, PeerRequest, PeerResponse, PeerTransport};
pub use session::{AuthId, AuthSession, BindingRecord, SessionState};
pub use store::{SessionGuard, SessionStore, StoreConfig, TagReplayPolicy};
