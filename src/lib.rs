//! Multi-server node for deniable anonymous group authentication.
//!
//! A client proves membership of a group without revealing which member it is. The
//! servers of the group jointly produce the challenge, each server in turn verifies
//! the client's answer and appends its own proof to a verification chain, and the
//! chain yields a linkage tag that is the same every time a given client
//! authenticates.
//!
//! Any server can lead a round ([`Coordinator`]); every server, the leader included,
//! runs the same four internal operations ([`PeerService`]).

#![forbid(unsafe_code)]

/// Deployment descriptors.
pub mod bootstrap;
/// Client-side prover and signature checks.
pub mod client;
/// Sessions, peer operations and client-facing rounds.
pub mod coordinator;
/// Error types.
pub mod error;
/// Group arithmetic, randomness, signatures and transcripts.
pub mod primitives;
/// Proof-chain construction and verification.
pub mod protocol;
/// HTTP surface, configuration and peer transport.
#[cfg(feature = "server")]
pub mod server;

pub use client::{ClientSecret, PendingAuthentication};
pub use coordinator::{Coordinator, Dispatcher, PeerService, SessionStore};
pub use error::{Error, ErrorKind, Result};
pub use primitives::{
    Element, RandomShares, Scalar, SecureRng, ServerSigningKey, ServerVerifyingKey, ShareSource,
    Signature, SignatureLabel,
};
pub use protocol::{AuthenticationContext, ServerSecret, VerificationChain};
