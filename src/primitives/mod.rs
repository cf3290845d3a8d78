//! Cryptographic building blocks consumed by the protocol.
//!
//! - **group**: Ristretto255 scalars and elements, the group of order `Q`
//! - **rng**: secure randomness and the challenge share source
//! - **signature**: Ed25519 server signatures over labelled messages
//! - **transcript**: Fiat-Shamir transform for server proof links

/// Ristretto255 scalar and element types.
pub mod group;
/// Secure randomness.
pub mod rng;
/// Server signing and verification keys.
pub mod signature;
/// Transcript for Fiat-Shamir transform.
pub mod transcript;

pub use group::{Element, Scalar};
pub use rng::{RandomShares, SecureRng, ShareSource};
pub use signature::{ServerSigningKey, ServerVerifyingKey, Signature, SignatureLabel};
pub use transcript::Transcript;
