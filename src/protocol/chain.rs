use rand_core::CryptoRngCore;

use super::client_proof::dh_secret;
use super::{
    AuthenticationContext, ClientInit, ClientProof, LinkStatement, ServerProof, ServerSecret,
};
use crate::error::ServerIndex;
use crate::primitives::{Element, Scalar, Transcript};
use crate::{Error, Result};

/// The client proof followed by the server proofs produced so far, in server order.
#[derive(Clone, Debug)]
pub struct VerificationChain {
    challenge: Scalar,
    init: ClientInit,
    client_proof: ClientProof,
    server_proofs: Vec<ServerProof>,
}

impl VerificationChain {
    /// Starts a chain with no server links.
    pub fn new(challenge: Scalar, init: ClientInit, client_proof: ClientProof) -> Self {
        Self {
            challenge,
            init,
            client_proof,
            server_proofs: Vec::new(),
        }
    }

    /// Appends links produced by earlier servers.
    pub fn with_server_proofs(mut self, proofs: Vec<ServerProof>) -> Self {
        self.server_proofs.extend(proofs);
        self
    }

    /// The joint challenge the client answered.
    pub fn challenge(&self) -> &Scalar {
        &self.challenge
    }

    /// Links in chain order.
    pub fn server_proofs(&self) -> &[ServerProof] {
        &self.server_proofs
    }

    /// Consumes the chain, returning its links.
    pub fn into_server_proofs(self) -> Vec<ServerProof> {
        self.server_proofs
    }

    /// Tag carried by the last link, if any.
    pub fn linkage_tag(&self) -> Option<Element> {
        self.server_proofs.last().map(|proof| proof.tag)
    }

    /// Verifies the client's OR-proof.
    pub fn verify_client_proof(&self, ac: &AuthenticationContext) -> Result<()> {
        self.client_proof.verify(ac, &self.init, &self.challenge)
    }

    /// Verifies link `index` against the context and the link before it.
    pub fn check_server_proof(&self, ac: &AuthenticationContext, index: ServerIndex) -> Result<()> {
        let proof = self.server_proofs.get(index).ok_or_else(|| {
            Error::AuthenticationFailed(format!("Chain has no link for server {index}"))
        })?;
        let statement = self.statement(ac, index, proof.tag)?;

        proof
            .verify(&statement, self.link_transcript(index))
            .map_err(|_| {
                Error::AuthenticationFailed(format!("Proof of server {index} does not verify"))
            })
    }

    /// Verifies the client proof and every link present, in order.
    pub fn verify_prefix(&self, ac: &AuthenticationContext) -> Result<()> {
        if self.server_proofs.len() > ac.server_count() {
            return Err(Error::AuthenticationFailed(format!(
                "Chain has {} links for {} servers",
                self.server_proofs.len(),
                ac.server_count()
            )));
        }
        self.verify_client_proof(ac)?;
        (0..self.server_proofs.len()).try_for_each(|index| self.check_server_proof(ac, index))
    }

    /// Verifies a complete chain: the client proof and exactly one link per server.
    pub fn verify_all(&self, ac: &AuthenticationContext) -> Result<()> {
        if self.server_proofs.len() != ac.server_count() {
            return Err(Error::AuthenticationFailed(format!(
                "Chain has {} links, expected {}",
                self.server_proofs.len(),
                ac.server_count()
            )));
        }
        self.verify_prefix(ac)
    }

    fn statement(
        &self,
        ac: &AuthenticationContext,
        index: ServerIndex,
        tag: Element,
    ) -> Result<LinkStatement> {
        let out_of_range =
            || Error::AuthenticationFailed(format!("Server {index} is outside the group"));

        let randomness = *ac.server_randomness().get(index).ok_or_else(out_of_range)?;
        let prev_commitment = *self.init.commitments.get(index).ok_or_else(out_of_range)?;
        let commitment = *self.init.commitments.get(index + 1).ok_or_else(out_of_range)?;

        Ok(LinkStatement {
            randomness,
            prev_commitment,
            commitment,
            prev_tag: self.previous_tag(index),
            tag,
        })
    }

    fn previous_tag(&self, index: ServerIndex) -> Element {
        match index.checked_sub(1) {
            Some(prev) => self.server_proofs[prev].tag,
            None => self.init.initial_linkage_tag,
        }
    }

    fn link_transcript(&self, index: ServerIndex) -> Transcript {
        let mut transcript = Transcript::new();
        transcript.append_context(self.init.group_id.as_bytes());
        transcript.append_scalar(b"challenge", &self.challenge);
        transcript.append_element(b"Z", &self.init.ephemeral_public_key);
        transcript.append_element(b"T0", &self.init.initial_linkage_tag);
        transcript.append_index(index);
        transcript
    }
}

/// Validates the chain so far and appends this server's link.
///
/// The chain must hold exactly the links of servers `0..server.index()`. Returns the
/// appended proof. Nothing is appended if validation fails.
pub fn authenticate_client<R: CryptoRngCore>(
    ac: &AuthenticationContext,
    server: &ServerSecret,
    chain: &mut VerificationChain,
    rng: &mut R,
) -> Result<ServerProof> {
    let index = server.index();
    if index >= ac.server_count() {
        return Err(Error::InvalidParams(format!(
            "Server {index} is outside the group of {}",
            ac.server_count()
        )));
    }
    if chain.server_proofs.len() != index {
        return Err(Error::AuthenticationFailed(format!(
            "Server {index} expects {index} prior links, got {}",
            chain.server_proofs.len()
        )));
    }
    chain.verify_prefix(ac)?;

    let s = dh_secret(&(chain.init.ephemeral_public_key * *server.secret()));
    let prev_commitment = chain.init.commitments[index];
    if prev_commitment * s != chain.init.commitments[index + 1] {
        return Err(Error::AuthenticationFailed(format!(
            "Commitment {} was not derived from the secret shared with server {index}",
            index + 1
        )));
    }
    let s_inv = s.invert().ok_or_else(|| {
        Error::AuthenticationFailed("Shared secret is zero".to_string())
    })?;

    let tag = chain.previous_tag(index) * (*server.secret() * s_inv);
    let statement = chain.statement(ac, index, tag)?;
    let proof = ServerProof::prove(
        &statement,
        server.secret(),
        &s,
        chain.link_transcript(index),
        rng,
    );

    chain.server_proofs.push(proof.clone());
    Ok(proof)
}
