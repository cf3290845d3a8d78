/// Byte layouts of signed values.
pub mod attest;
/// Proof-chain construction and verification.
pub mod chain;
/// Client submission and OR-proof verification.
pub mod client_proof;
/// Authentication context and server secrets.
pub mod context;
/// Server proof links.
pub mod server_proof;

pub use chain::{authenticate_client, VerificationChain};
pub use client_proof::{ClientInit, ClientProof};
pub use context::{AuthenticationContext, ServerSecret};
pub use server_proof::{LinkStatement, ServerProof};
