use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::messages::{BindReply, ProofReply, SignedChallenge, SignedShare};
use super::rpc::{PeerRequest, PeerResponse};
use super::session::{AuthId, BindingRecord, SessionState};
use super::store::SessionStore;
use crate::primitives::{Scalar, ShareSource, SignatureLabel};
use crate::protocol::{
    attest, authenticate_client, AuthenticationContext, ClientInit, ClientProof, ServerProof,
    ServerSecret, VerificationChain,
};
use crate::{Error, Result, SecureRng};

/// One group this server takes part in.
#[derive(Clone)]
pub struct Membership {
    pub context: Arc<AuthenticationContext>,
    pub secret: Arc<ServerSecret>,
}

/// The four internal operations of one server.
///
/// Every server runs the same service whether the call comes from itself acting as
/// leader or from a peer. Session mutations are committed only after the
/// operation's checks pass, while the session lock is held.
pub struct PeerService {
    groups: HashMap<Uuid, Membership>,
    store: SessionStore,
    shares: Arc<dyn ShareSource>,
}

impl PeerService {
    /// Creates a service with no groups.
    pub fn new(store: SessionStore, shares: Arc<dyn ShareSource>) -> Self {
        Self {
            groups: HashMap::new(),
            store,
            shares,
        }
    }

    /// Adds a group after checking the secret against its context.
    pub fn with_group(mut self, context: AuthenticationContext, secret: ServerSecret) -> Result<Self> {
        secret.check_against(&context)?;
        self.groups.insert(
            context.group_id(),
            Membership {
                context: Arc::new(context),
                secret: Arc::new(secret),
            },
        );
        Ok(self)
    }

    /// Session store of this server.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Membership for `group_id`.
    pub fn membership(&self, group_id: &Uuid) -> Result<&Membership> {
        self.groups
            .get(group_id)
            .ok_or_else(|| Error::UnknownGroup(group_id.to_string()))
    }

    /// Ids of every hosted group.
    pub fn group_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.groups.keys()
    }

    /// Runs one internal operation.
    pub async fn handle(&self, request: PeerRequest) -> Result<PeerResponse> {
        let start = Instant::now();
        let op = request.operation();
        counter!("daga.peer.requests", "operation" => op.name()).increment(1);

        let result = match request {
            PeerRequest::BeginChallengeGeneration(req) => self
                .begin_challenge_generation(req.auth_id, req.client_data)
                .await
                .map(PeerResponse::Share),
            PeerRequest::FinishChallengeGeneration(req) => self
                .finish_challenge_generation(&req.auth_id, &req.parts)
                .await
                .map(PeerResponse::Challenge),
            PeerRequest::CheckChallengeResponse(req) => self
                .check_challenge_response(&req.auth_id, req.response, req.server_proofs)
                .await
                .map(|proof| PeerResponse::Proof(ProofReply { proof })),
            PeerRequest::BindLinkageTag(req) => self
                .bind_linkage_tag(&req.auth_id, req.bind, req.server_proofs)
                .await
                .map(PeerResponse::Binding),
        };

        histogram!("daga.peer.duration", "operation" => op.name())
            .record(start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            counter!("daga.peer.failures", "operation" => op.name(), "kind" => e.kind().as_str())
                .increment(1);
            warn!(operation = %op, error = %e, "Peer operation failed");
        }

        result
    }

    /// Stores the client data, draws a share and signs it.
    ///
    /// A repeated call for a session that has not finished challenge generation
    /// draws a new share and replaces the stored data.
    #[instrument(skip(self, client_data), fields(group = %client_data.group_id))]
    pub async fn begin_challenge_generation(
        &self,
        auth_id: AuthId,
        client_data: ClientInit,
    ) -> Result<SignedShare> {
        let member = self.membership(&client_data.group_id)?;
        client_data.check_shape(&member.context)?;

        let share = self.shares.draw();
        let sig = member.secret.sign(
            SignatureLabel::Share,
            &attest::share_payload(auth_id.as_str(), &share),
        );
        self.store.open(auth_id, client_data, share).await?;

        debug!(server = member.secret.index(), "Challenge share drawn");
        Ok(SignedShare { n: share, sig })
    }

    /// Verifies every server's share, sums them into the joint challenge and signs it.
    #[instrument(skip(self, parts))]
    pub async fn finish_challenge_generation(
        &self,
        auth_id: &AuthId,
        parts: &[SignedShare],
    ) -> Result<SignedChallenge> {
        let mut session = self.store.lock(auth_id).await?;
        if session.state != SessionState::Created {
            return Err(Error::InvalidState {
                auth_id: auth_id.to_string(),
                expected: "created",
                actual: session.state.to_string(),
            });
        }
        let member = self.membership(&session.group_id)?;
        let ac = &member.context;
        let me = member.secret.index();

        if parts.len() != ac.server_count() {
            return Err(Error::InvalidRequest(format!(
                "Expected {} challenge parts, got {}",
                ac.server_count(),
                parts.len()
            )));
        }
        for (j, part) in parts.iter().enumerate() {
            ac.verify_server_signature(
                j,
                SignatureLabel::Share,
                &attest::share_payload(auth_id.as_str(), &part.n),
                &part.sig,
            )?;
        }
        if parts[me].n != session.share {
            return Err(Error::InvalidRequest(format!(
                "Part {me} is not the share this server drew"
            )));
        }

        let challenge: Scalar = parts.iter().map(|part| part.n).sum();
        session.challenge = Some(challenge);
        session.state = SessionState::ChallengeIssued;

        debug!(server = me, "Joint challenge issued");
        let sig = member.secret.sign(
            SignatureLabel::Challenge,
            &attest::challenge_payload(auth_id.as_str(), &challenge),
        );
        Ok(SignedChallenge { challenge, sig })
    }

    /// Verifies the client response and the links of earlier servers, then appends
    /// this server's link.
    #[instrument(skip(self, response, prior))]
    pub async fn check_challenge_response(
        &self,
        auth_id: &AuthId,
        response: ClientProof,
        prior: Vec<ServerProof>,
    ) -> Result<ServerProof> {
        let mut session = self.store.lock(auth_id).await?;
        let challenge = match (session.state, session.challenge) {
            (SessionState::ChallengeIssued | SessionState::ResponseVerified { .. }, Some(c)) => c,
            (state, _) => {
                return Err(Error::InvalidState {
                    auth_id: auth_id.to_string(),
                    expected: "challenge_issued or response_verified",
                    actual: state.to_string(),
                })
            }
        };
        let member = self.membership(&session.group_id)?;

        let mut chain = VerificationChain::new(
            challenge,
            session.client_data.clone(),
            response.clone(),
        )
        .with_server_proofs(prior);
        let proof = authenticate_client(
            &member.context,
            &member.secret,
            &mut chain,
            &mut SecureRng::new(),
        )?;

        let links = chain.server_proofs().len();
        session.response = Some(response);
        session.state = SessionState::ResponseVerified { links };

        debug!(server = member.secret.index(), links, "Client response verified");
        Ok(proof)
    }

    /// Re-verifies the complete chain and binds its linkage tag to `bind`.
    #[instrument(skip(self, bind, proofs))]
    pub async fn bind_linkage_tag(
        &self,
        auth_id: &AuthId,
        bind: String,
        proofs: Vec<ServerProof>,
    ) -> Result<BindReply> {
        let mut session = self.store.lock(auth_id).await?;
        let (challenge, response) = match (session.state, &session.challenge, &session.response) {
            (SessionState::ResponseVerified { .. }, Some(c), Some(r)) => (*c, r.clone()),
            (state, _, _) => {
                return Err(Error::InvalidState {
                    auth_id: auth_id.to_string(),
                    expected: "response_verified",
                    actual: state.to_string(),
                })
            }
        };
        let member = self.membership(&session.group_id)?;
        let ac = &member.context;

        let chain = VerificationChain::new(challenge, session.client_data.clone(), response)
            .with_server_proofs(proofs);
        chain.verify_all(ac)?;
        let tag = chain.linkage_tag().ok_or_else(|| {
            Error::AuthenticationFailed("Chain carries no linkage tag".to_string())
        })?;

        let tag_sig = member
            .secret
            .sign(SignatureLabel::Tag, &attest::tag_payload(&ac.group_id(), &tag));
        let binding_sig = member
            .secret
            .sign(SignatureLabel::Binding, &attest::binding_payload(&tag, &bind));

        self.store
            .bind_tag(BindingRecord {
                tag,
                bind,
                signature: binding_sig,
                auth_id: auth_id.clone(),
                bound_at: SystemTime::now(),
            })
            .await?;
        session.state = SessionState::Bound;

        debug!(server = member.secret.index(), %tag, "Linkage tag bound");
        Ok(BindReply {
            tag,
            tag_sig,
            binding_sig,
        })
    }
}
