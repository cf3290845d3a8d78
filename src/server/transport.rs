use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::coordinator::{ErrorBody, PeerRequest, PeerResponse, PeerTransport};
use crate::error::ServerIndex;
use crate::{Error, Result};

const MAX_ERROR_BODY: usize = 256;

/// JSON-over-HTTP transport to peer nodes.
///
/// Request `op` for server `i` is a POST of the JSON body to `{peers[i]}{op.path()}`.
/// Groups registered with [`HttpTransport::with_group_peers`] use their own list,
/// every other group the default one.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    peers: Vec<String>,
    group_peers: HashMap<Uuid, Vec<String>>,
}

impl HttpTransport {
    /// Creates a transport addressing `peers` in server index order.
    pub fn new(peers: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("daga-server/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self::with_client(client, peers))
    }

    /// Creates a transport over an existing client.
    pub fn with_client(client: Client, peers: Vec<String>) -> Self {
        Self {
            client,
            peers,
            group_peers: HashMap::new(),
        }
    }

    /// Addresses the servers of `group` through `peers` instead of the default list.
    pub fn with_group_peers(mut self, group: Uuid, peers: Vec<String>) -> Self {
        self.group_peers.insert(group, peers);
        self
    }

    /// Base URL of server `target` in `group`.
    pub fn peer_url(&self, group: &Uuid, target: ServerIndex) -> Option<&str> {
        self.group_peers
            .get(group)
            .unwrap_or(&self.peers)
            .get(target)
            .map(String::as_str)
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn call(
        &self,
        group: &Uuid,
        target: ServerIndex,
        request: &PeerRequest,
    ) -> Result<PeerResponse> {
        let op = request.operation();
        let base = self.peer_url(group, target).ok_or_else(|| Error::PeerUnreachable {
            server: target,
            reason: "No address configured".to_string(),
        })?;
        let url = format!("{base}{}", op.path());
        debug!(server = target, %url, "Calling peer");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(request.to_json()?)
            .send()
            .await
            .map_err(|e| Error::PeerUnreachable {
                server: target,
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| Error::PeerUnreachable {
            server: target,
            reason: e.to_string(),
        })?;

        if status.is_success() {
            return PeerResponse::decode(op, target, &body);
        }

        match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(error) => Err(Error::Peer {
                server: target,
                kind: error.error,
                message: error.message,
            }),
            Err(_) => Err(Error::PeerProtocolError {
                server: target,
                reason: format!(
                    "Unexpected status {status}: {}",
                    truncate_body(&String::from_utf8_lossy(&body))
                ),
            }),
        }
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
