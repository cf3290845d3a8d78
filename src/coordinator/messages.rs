//! JSON bodies exchanged with peers and clients.

use serde::{Deserialize, Serialize};

use super::session::AuthId;
use crate::error::ErrorKind;
use crate::primitives::{Element, Scalar, Signature};
use crate::protocol::{ClientInit, ClientProof, ServerProof};

/// `begin_challenge_generation` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeginChallengeRequest {
    pub auth_id: AuthId,
    pub client_data: ClientInit,
}

/// A server's challenge share and its signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedShare {
    pub n: Scalar,
    pub sig: Signature,
}

/// `finish_challenge_generation` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinishChallengeRequest {
    pub auth_id: AuthId,
    pub parts: Vec<SignedShare>,
}

/// A server's view of the joint challenge and its signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedChallenge {
    pub challenge: Scalar,
    pub sig: Signature,
}

/// `check_challenge_response` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResponseRequest {
    pub auth_id: AuthId,
    #[serde(flatten)]
    pub response: ClientProof,
    pub server_proofs: Vec<ServerProof>,
}

/// `check_challenge_response` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofReply {
    pub proof: ServerProof,
}

/// `bind_linkage_tag` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindRequest {
    pub auth_id: AuthId,
    pub bind: String,
    pub server_proofs: Vec<ServerProof>,
}

/// `bind_linkage_tag` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindReply {
    pub tag: Element,
    pub tag_sig: Signature,
    pub binding_sig: Signature,
}

/// Client `request_challenge` result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeGrant {
    pub auth_id: AuthId,
    pub challenge: Scalar,
    pub sigs: Vec<Signature>,
}

/// Client `authenticate` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub auth_id: AuthId,
    #[serde(flatten)]
    pub response: ClientProof,
    pub bind: String,
}

/// Client `authenticate` result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub tag: Element,
    pub tag_sigs: Vec<Signature>,
    pub binding_sigs: Vec<Signature>,
}

/// Error body returned by every endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}
