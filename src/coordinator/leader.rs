use std::sync::Arc;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use super::messages::{
    AuthenticateRequest, AuthenticationResult, BeginChallengeRequest, BindRequest,
    ChallengeGrant, CheckResponseRequest, FinishChallengeRequest,
};
use super::peer::PeerService;
use super::rpc::{Dispatcher, PeerRequest};
use super::session::AuthId;
use crate::protocol::ClientInit;
use crate::{Error, Result};

/// Client-facing entry point of one server.
///
/// Any server can lead a round: it calls every server, itself included, in
/// ascending index order and feeds each reply into the next call. The first
/// failure aborts the round; state already committed on earlier servers stays.
#[derive(Clone)]
pub struct Coordinator {
    dispatcher: Dispatcher,
}

impl Coordinator {
    /// Creates a coordinator over `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// The service this coordinator runs in-process.
    pub fn local(&self) -> &Arc<PeerService> {
        self.dispatcher.local()
    }

    /// Runs challenge generation on every server.
    #[instrument(skip(self, client_data), fields(group = %client_data.group_id, auth_id = tracing::field::Empty))]
    pub async fn request_challenge(&self, client_data: ClientInit) -> Result<ChallengeGrant> {
        let start = Instant::now();
        counter!("daga.request_challenge.requests").increment(1);

        let result = self.run_challenge_round(client_data).await;

        histogram!("daga.request_challenge.duration").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(grant) => {
                counter!("daga.request_challenge.success").increment(1);
                info!(auth_id = %grant.auth_id, "Challenge issued");
            }
            Err(e) => {
                counter!("daga.request_challenge.failure").increment(1);
                warn!(error = %e, "Challenge generation failed");
            }
        }
        result
    }

    /// Runs response verification and tag binding on every server.
    #[instrument(skip(self, request), fields(auth_id = %request.auth_id))]
    pub async fn authenticate(&self, request: AuthenticateRequest) -> Result<AuthenticationResult> {
        let start = Instant::now();
        counter!("daga.authenticate.requests").increment(1);

        let result = self.run_authentication_round(request).await;

        histogram!("daga.authenticate.duration").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => {
                counter!("daga.authenticate.success").increment(1);
                info!(tag = %outcome.tag, "Authentication bound");
            }
            Err(e) => {
                counter!("daga.authenticate.failure").increment(1);
                warn!(error = %e, "Authentication failed");
            }
        }
        result
    }

    async fn run_challenge_round(&self, client_data: ClientInit) -> Result<ChallengeGrant> {
        let group = client_data.group_id;
        let servers = self.local().membership(&group)?.context.server_count();
        let auth_id = AuthId::generate();
        tracing::Span::current().record("auth_id", auth_id.as_str());

        let mut parts = Vec::with_capacity(servers);
        for server in 0..servers {
            let request = PeerRequest::BeginChallengeGeneration(BeginChallengeRequest {
                auth_id: auth_id.clone(),
                client_data: client_data.clone(),
            });
            parts.push(
                self.dispatcher
                    .call(&group, server, request)
                    .await?
                    .into_share(server)?,
            );
        }

        let mut challenge = None;
        let mut sigs = Vec::with_capacity(servers);
        for server in 0..servers {
            let request = PeerRequest::FinishChallengeGeneration(FinishChallengeRequest {
                auth_id: auth_id.clone(),
                parts: parts.clone(),
            });
            let signed = self
                .dispatcher
                .call(&group, server, request)
                .await?
                .into_challenge(server)?;

            if *challenge.get_or_insert(signed.challenge) != signed.challenge {
                return Err(Error::PeerProtocolError {
                    server,
                    reason: "Server computed a different challenge".to_string(),
                });
            }
            sigs.push(signed.sig);
        }

        let challenge = challenge.ok_or_else(|| {
            Error::InvalidParams("Authentication context lists no servers".to_string())
        })?;
        Ok(ChallengeGrant {
            auth_id,
            challenge,
            sigs,
        })
    }

    async fn run_authentication_round(
        &self,
        request: AuthenticateRequest,
    ) -> Result<AuthenticationResult> {
        let AuthenticateRequest {
            auth_id,
            response,
            bind,
        } = request;

        // Fails with UnknownSession before any peer is contacted.
        let session = self.local().store().get(&auth_id).await?;
        let group = session.group_id;
        let servers = self.local().membership(&group)?.context.server_count();

        let mut proofs = Vec::with_capacity(servers);
        for server in 0..servers {
            let request = PeerRequest::CheckChallengeResponse(CheckResponseRequest {
                auth_id: auth_id.clone(),
                response: response.clone(),
                server_proofs: proofs.clone(),
            });
            let reply = self
                .dispatcher
                .call(&group, server, request)
                .await?
                .into_proof(server)?;
            proofs.push(reply.proof);
        }

        let mut tag = None;
        let mut tag_sigs = Vec::with_capacity(servers);
        let mut binding_sigs = Vec::with_capacity(servers);
        for server in 0..servers {
            let request = PeerRequest::BindLinkageTag(BindRequest {
                auth_id: auth_id.clone(),
                bind: bind.clone(),
                server_proofs: proofs.clone(),
            });
            let reply = self
                .dispatcher
                .call(&group, server, request)
                .await?
                .into_binding(server)?;

            if *tag.get_or_insert(reply.tag) != reply.tag {
                return Err(Error::PeerProtocolError {
                    server,
                    reason: "Server bound a different linkage tag".to_string(),
                });
            }
            tag_sigs.push(reply.tag_sig);
            binding_sigs.push(reply.binding_sig);
        }

        let tag = tag.ok_or_else(|| {
            Error::InvalidParams("Authentication context lists no servers".to_string())
        })?;
        Ok(AuthenticationResult {
            tag,
            tag_sigs,
            binding_sigs,
        })
    }
}
