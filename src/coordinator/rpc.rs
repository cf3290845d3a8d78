use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{timeout, Duration};
use tracing::debug;
use uuid::Uuid;

use super::messages::{
    BeginChallengeRequest, BindReply, BindRequest, CheckResponseRequest, FinishChallengeRequest,
    ProofReply, SignedChallenge, SignedShare,
};
use super::peer::PeerService;
use super::session::AuthId;
use crate::error::ServerIndex;
use crate::{Error, Result};

/// The internal operations every server exposes to its peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    BeginChallengeGeneration,
    FinishChallengeGeneration,
    CheckChallengeResponse,
    BindLinkageTag,
}

impl Operation {
    /// All operations in protocol order.
    pub const ALL: [Operation; 4] = [
        Operation::BeginChallengeGeneration,
        Operation::FinishChallengeGeneration,
        Operation::CheckChallengeResponse,
        Operation::BindLinkageTag,
    ];

    /// Wire name of the operation.
    pub fn name(self) -> &'static str {
        match self {
            Operation::BeginChallengeGeneration => "begin_challenge_generation",
            Operation::FinishChallengeGeneration => "finish_challenge_generation",
            Operation::CheckChallengeResponse => "check_challenge_response",
            Operation::BindLinkageTag => "bind_linkage_tag",
        }
    }

    /// HTTP path of the peer endpoint.
    pub fn path(self) -> &'static str {
        match self {
            Operation::BeginChallengeGeneration => "/internal/begin_challenge_generation",
            Operation::FinishChallengeGeneration => "/internal/finish_challenge_generation",
            Operation::CheckChallengeResponse => "/internal/check_challenge_response",
            Operation::BindLinkageTag => "/internal/bind_linkage_tag",
        }
    }

    /// Looks an operation up by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed request for one internal operation.
#[derive(Clone, Debug)]
pub enum PeerRequest {
    BeginChallengeGeneration(BeginChallengeRequest),
    FinishChallengeGeneration(FinishChallengeRequest),
    CheckChallengeResponse(CheckResponseRequest),
    BindLinkageTag(BindRequest),
}

impl PeerRequest {
    /// The operation this request invokes.
    pub fn operation(&self) -> Operation {
        match self {
            PeerRequest::BeginChallengeGeneration(_) => Operation::BeginChallengeGeneration,
            PeerRequest::FinishChallengeGeneration(_) => Operation::FinishChallengeGeneration,
            PeerRequest::CheckChallengeResponse(_) => Operation::CheckChallengeResponse,
            PeerRequest::BindLinkageTag(_) => Operation::BindLinkageTag,
        }
    }

    /// Session the request belongs to.
    pub fn auth_id(&self) -> &AuthId {
        match self {
            PeerRequest::BeginChallengeGeneration(req) => &req.auth_id,
            PeerRequest::FinishChallengeGeneration(req) => &req.auth_id,
            PeerRequest::CheckChallengeResponse(req) => &req.auth_id,
            PeerRequest::BindLinkageTag(req) => &req.auth_id,
        }
    }

    /// JSON body of the request.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let body = match self {
            PeerRequest::BeginChallengeGeneration(req) => serde_json::to_vec(req),
            PeerRequest::FinishChallengeGeneration(req) => serde_json::to_vec(req),
            PeerRequest::CheckChallengeResponse(req) => serde_json::to_vec(req),
            PeerRequest::BindLinkageTag(req) => serde_json::to_vec(req),
        };
        Ok(body?)
    }

    /// Decodes the JSON body of a request for `op`.
    pub fn decode(op: Operation, body: &[u8]) -> Result<Self> {
        let request = match op {
            Operation::BeginChallengeGeneration => {
                PeerRequest::BeginChallengeGeneration(serde_json::from_slice(body)?)
            }
            Operation::FinishChallengeGeneration => {
                PeerRequest::FinishChallengeGeneration(serde_json::from_slice(body)?)
            }
            Operation::CheckChallengeResponse => {
                PeerRequest::CheckChallengeResponse(serde_json::from_slice(body)?)
            }
            Operation::BindLinkageTag => PeerRequest::BindLinkageTag(serde_json::from_slice(body)?),
        };
        Ok(request)
    }
}

/// A typed reply from one internal operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerResponse {
    Share(SignedShare),
    Challenge(SignedChallenge),
    Proof(ProofReply),
    Binding(BindReply),
}

impl PeerResponse {
    /// The operation that produces this reply.
    pub fn operation(&self) -> Operation {
        match self {
            PeerResponse::Share(_) => Operation::BeginChallengeGeneration,
            PeerResponse::Challenge(_) => Operation::FinishChallengeGeneration,
            PeerResponse::Proof(_) => Operation::CheckChallengeResponse,
            PeerResponse::Binding(_) => Operation::BindLinkageTag,
        }
    }

    /// JSON body of the reply.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let body = match self {
            PeerResponse::Share(reply) => serde_json::to_vec(reply),
            PeerResponse::Challenge(reply) => serde_json::to_vec(reply),
            PeerResponse::Proof(reply) => serde_json::to_vec(reply),
            PeerResponse::Binding(reply) => serde_json::to_vec(reply),
        };
        Ok(body?)
    }

    /// Decodes the JSON reply of `op` sent by `server`.
    ///
    /// Anything that does not parse is a `PeerProtocolError`.
    pub fn decode(op: Operation, server: ServerIndex, body: &[u8]) -> Result<Self> {
        let decoded = match op {
            Operation::BeginChallengeGeneration => {
                serde_json::from_slice(body).map(PeerResponse::Share)
            }
            Operation::FinishChallengeGeneration => {
                serde_json::from_slice(body).map(PeerResponse::Challenge)
            }
            Operation::CheckChallengeResponse => {
                serde_json::from_slice(body).map(PeerResponse::Proof)
            }
            Operation::BindLinkageTag => serde_json::from_slice(body).map(PeerResponse::Binding),
        };
        decoded.map_err(|e| Error::PeerProtocolError {
            server,
            reason: format!("Undecodable {op} reply: {e}"),
        })
    }

    pub(crate) fn into_share(self, server: ServerIndex) -> Result<SignedShare> {
        match self {
            PeerResponse::Share(share) => Ok(share),
            other => Err(other.mismatch(server, Operation::BeginChallengeGeneration)),
        }
    }

    pub(crate) fn into_challenge(self, server: ServerIndex) -> Result<SignedChallenge> {
        match self {
            PeerResponse::Challenge(challenge) => Ok(challenge),
            other => Err(other.mismatch(server, Operation::FinishChallengeGeneration)),
        }
    }

    pub(crate) fn into_proof(self, server: ServerIndex) -> Result<ProofReply> {
        match self {
            PeerResponse::Proof(proof) => Ok(proof),
            other => Err(other.mismatch(server, Operation::CheckChallengeResponse)),
        }
    }

    pub(crate) fn into_binding(self, server: ServerIndex) -> Result<BindReply> {
        match self {
            PeerResponse::Binding(binding) => Ok(binding),
            other => Err(other.mismatch(server, Operation::BindLinkageTag)),
        }
    }

    fn mismatch(&self, server: ServerIndex, expected: Operation) -> Error {
        Error::PeerProtocolError {
            server,
            reason: format!(
                "Expected a {expected} reply, got a {} reply",
                self.operation()
            ),
        }
    }
}

/// Remote leg of the dispatcher.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Sends `request` to server `target` of group `group` and returns its reply.
    ///
    /// Transport failures are `PeerUnreachable`, malformed replies
    /// `PeerProtocolError`, and errors reported by the peer `Error::Peer`.
    async fn call(
        &self,
        group: &Uuid,
        target: ServerIndex,
        request: &PeerRequest,
    ) -> Result<PeerResponse>;
}

/// Routes a request to this process's own service or to a peer.
///
/// A process may sit at a different index in each group it hosts, so the local
/// index is looked up per call from the group membership.
#[derive(Clone)]
pub struct Dispatcher {
    local: Arc<PeerService>,
    transport: Arc<dyn PeerTransport>,
    timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher over the in-process service `local`.
    pub fn new(local: Arc<PeerService>, transport: Arc<dyn PeerTransport>, timeout: Duration) -> Self {
        Self {
            local,
            transport,
            timeout,
        }
    }

    /// The in-process service.
    pub fn local(&self) -> &Arc<PeerService> {
        &self.local
    }

    /// Index this process holds in `group`.
    pub fn local_index(&self, group: &Uuid) -> Result<ServerIndex> {
        Ok(self.local.membership(group)?.secret.index())
    }

    /// Invokes `request` on server `target` of `group`.
    ///
    /// Calls to this process's own index run in-process. Remote calls are bounded
    /// by the configured timeout; expiry is reported as `PeerUnreachable`.
    pub async fn call(
        &self,
        group: &Uuid,
        target: ServerIndex,
        request: PeerRequest,
    ) -> Result<PeerResponse> {
        let op = request.operation();

        if target == self.local_index(group)? {
            debug!(server = target, operation = %op, "Dispatching locally");
            return self.local.handle(request).await;
        }

        debug!(server = target, operation = %op, "Dispatching to peer");
        match timeout(self.timeout, self.transport.call(group, target, &request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::PeerUnreachable {
                server: target,
                reason: format!("{op} timed out after {} ms", self.timeout.as_millis()),
            }),
        }
    }
}
