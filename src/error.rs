//! Error types for the DAGA node.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Server index within an authentication context (position in its server list).
pub type ServerIndex = usize;

/// Main error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A participant's signature failed verification.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The client proof or a server proof link failed chain verification.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No session exists for the given authentication id.
    #[error("Unknown session '{0}'")]
    UnknownSession(String),

    /// A session with this authentication id already progressed past creation.
    #[error("Duplicate session '{0}'")]
    DuplicateSession(String),

    /// The linkage tag was already bound.
    #[error("Linkage tag {0} is already bound")]
    DuplicateTag(String),

    /// The session outlived its time to live.
    #[error("Session '{0}' expired")]
    SessionExpired(String),

    /// The requested phase is not allowed from the session's current state.
    #[error("Session '{auth_id}' is {actual}, expected {expected}")]
    InvalidState {
        /// Session identifier.
        auth_id: String,
        /// State(s) the operation accepts.
        expected: &'static str,
        /// State the session is in.
        actual: String,
    },

    /// This process hosts no server for the group.
    #[error("Unknown authentication group {0}")]
    UnknownGroup(String),

    /// A request is malformed for the authentication context it targets.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The session store is full.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The caller exceeded the request rate.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// A peer could not be reached or did not answer in time.
    #[error("Peer {server} unreachable: {reason}")]
    PeerUnreachable {
        /// Index of the peer.
        server: ServerIndex,
        /// Transport failure description.
        reason: String,
    },

    /// A peer answered with something that is not a valid protocol response.
    #[error("Peer {server} protocol error: {reason}")]
    PeerProtocolError {
        /// Index of the peer.
        server: ServerIndex,
        /// What was wrong with the answer.
        reason: String,
    },

    /// A peer rejected the request with a protocol error of its own.
    #[error("Peer {server} rejected request ({kind}): {message}")]
    Peer {
        /// Index of the peer.
        server: ServerIndex,
        /// Error kind reported by the peer.
        kind: ErrorKind,
        /// Error message reported by the peer.
        message: String,
    },

    /// Invalid group parameters or key material were provided.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A scalar value is invalid or out of range.
    #[error("Invalid scalar: {0}")]
    InvalidScalar(String),

    /// A group element is invalid.
    #[error("Invalid group element: {0}")]
    InvalidGroupElement(String),

    /// Configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Descriptor file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Descriptor or payload is not valid JSON for its type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// Stable, serialisable classification of an [`Error`].
///
/// This is what travels between peers and to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSignature,
    AuthenticationFailed,
    UnknownSession,
    DuplicateSession,
    DuplicateTag,
    SessionExpired,
    InvalidState,
    UnknownGroup,
    InvalidRequest,
    CapacityExceeded,
    RateLimited,
    PeerUnreachable,
    PeerProtocolError,
    Internal,
}

impl ErrorKind {
    /// The snake_case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidSignature => "invalid_signature",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::UnknownSession => "unknown_session",
            ErrorKind::DuplicateSession => "duplicate_session",
            ErrorKind::DuplicateTag => "duplicate_tag",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::UnknownGroup => "unknown_group",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::PeerUnreachable => "peer_unreachable",
            ErrorKind::PeerProtocolError => "peer_protocol_error",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classifies the error. Errors relayed from a peer keep the peer's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Error::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Error::UnknownSession(_) => ErrorKind::UnknownSession,
            Error::DuplicateSession(_) => ErrorKind::DuplicateSession,
            Error::DuplicateTag(_) => ErrorKind::DuplicateTag,
            Error::SessionExpired(_) => ErrorKind::SessionExpired,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::UnknownGroup(_) => ErrorKind::UnknownGroup,
            Error::InvalidRequest(_)
            | Error::InvalidScalar(_)
            | Error::InvalidGroupElement(_)
            | Error::Json(_) => ErrorKind::InvalidRequest,
            Error::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            Error::RateLimited => ErrorKind::RateLimited,
            Error::PeerUnreachable { .. } => ErrorKind::PeerUnreachable,
            Error::PeerProtocolError { .. } => ErrorKind::PeerProtocolError,
            Error::Peer { kind, .. } => *kind,
            Error::InvalidParams(_) | Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Index of the peer that failed, when the failure happened on a remote leg.
    pub fn failed_peer(&self) -> Option<ServerIndex> {
        match self {
            Error::PeerUnreachable { server, .. }
            | Error::PeerProtocolError { server, .. }
            | Error::Peer { server, .. } => Some(*server),
            _ => None,
        }
    }
}
