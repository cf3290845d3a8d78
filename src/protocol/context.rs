use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ServerIndex;
use crate::primitives::{
    Element, Scalar, ServerSigningKey, ServerVerifyingKey, Signature, SignatureLabel,
};
use crate::{Error, Result};

/// Shared, read-only description of one authentication group.
///
/// Client `k` is identified by its public key `X_k` and its generator `h_k`;
/// server `j` by its signature key and its randomness commitment `R_j = r_j·G`.
/// Positions in these lists are the indices used throughout the protocol.
#[derive(Clone, Debug)]
pub struct AuthenticationContext {
    group_id: Uuid,
    client_keys: Vec<Element>,
    generators: Vec<Element>,
    server_keys: Vec<ServerVerifyingKey>,
    server_randomness: Vec<Element>,
}

impl AuthenticationContext {
    /// Builds a context, checking that the per-client and per-server lists line up.
    pub fn new(
        group_id: Uuid,
        client_keys: Vec<Element>,
        generators: Vec<Element>,
        server_keys: Vec<ServerVerifyingKey>,
        server_randomness: Vec<Element>,
    ) -> Result<Self> {
        if client_keys.is_empty() {
            return Err(Error::InvalidParams(
                "Authentication context lists no clients".to_string(),
            ));
        }
        if server_keys.is_empty() {
            return Err(Error::InvalidParams(
                "Authentication context lists no servers".to_string(),
            ));
        }
        if client_keys.len() != generators.len() {
            return Err(Error::InvalidParams(format!(
                "{} client keys but {} generators",
                client_keys.len(),
                generators.len()
            )));
        }
        if server_keys.len() != server_randomness.len() {
            return Err(Error::InvalidParams(format!(
                "{} server keys but {} randomness commitments",
                server_keys.len(),
                server_randomness.len()
            )));
        }
        if client_keys
            .iter()
            .chain(&generators)
            .chain(&server_randomness)
            .any(Element::is_identity)
        {
            return Err(Error::InvalidParams(
                "Authentication context contains the identity element".to_string(),
            ));
        }

        Ok(Self {
            group_id,
            client_keys,
            generators,
            server_keys,
            server_randomness,
        })
    }

    /// Group identifier (`uuid` on the wire).
    pub fn group_id(&self) -> Uuid {
        self.group_id
    }

    /// Number of clients `n`.
    pub fn client_count(&self) -> usize {
        self.client_keys.len()
    }

    /// Number of servers `N`.
    pub fn server_count(&self) -> usize {
        self.server_keys.len()
    }

    /// Client public keys in index order.
    pub fn client_keys(&self) -> &[Element] {
        &self.client_keys
    }

    /// Per-client generators in index order.
    pub fn generators(&self) -> &[Element] {
        &self.generators
    }

    /// Server verification keys in index order.
    pub fn server_keys(&self) -> &[ServerVerifyingKey] {
        &self.server_keys
    }

    /// Server randomness commitments in index order.
    pub fn server_randomness(&self) -> &[Element] {
        &self.server_randomness
    }

    /// Verification key of server `index`.
    pub fn server_key(&self, index: ServerIndex) -> Option<&ServerVerifyingKey> {
        self.server_keys.get(index)
    }

    /// Checks `signature` by server `index` over `label || payload`.
    pub fn verify_server_signature(
        &self,
        index: ServerIndex,
        label: SignatureLabel,
        payload: &[u8],
        signature: &Signature,
    ) -> Result<()> {
        let key = self.server_key(index).ok_or_else(|| {
            Error::InvalidRequest(format!(
                "Server index {index} is outside the group of {}",
                self.server_count()
            ))
        })?;

        if key.verify(label, payload, signature) {
            Ok(())
        } else {
            Err(Error::InvalidSignature(format!(
                "{label:?} signature of server {index} does not verify"
            )))
        }
    }
}

/// This node's private material for one authentication group.
///
/// The randomness secret `r` is wiped on drop; the signing key wipes itself.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerSecret {
    #[zeroize(skip)]
    index: ServerIndex,
    #[zeroize(skip)]
    signing_key: ServerSigningKey,
    secret: Scalar,
}

impl ServerSecret {
    /// Bundles a server's index, signing key and randomness secret.
    pub fn new(index: ServerIndex, signing_key: ServerSigningKey, secret: Scalar) -> Self {
        Self {
            index,
            signing_key,
            secret,
        }
    }

    /// Position of this server in the context's server list.
    pub fn index(&self) -> ServerIndex {
        self.index
    }

    /// The randomness secret `r_j`.
    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    /// Public verification key.
    pub fn verifying_key(&self) -> ServerVerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signs `payload` under `label`.
    pub fn sign(&self, label: SignatureLabel, payload: &[u8]) -> Signature {
        self.signing_key.sign(label, payload)
    }

    /// Checks that this secret is the one the context lists at `index`.
    pub fn check_against(&self, ac: &AuthenticationContext) -> Result<()> {
        let key = ac.server_key(self.index).ok_or_else(|| {
            Error::InvalidParams(format!(
                "Server index {} is outside the group of {}",
                self.index,
                ac.server_count()
            ))
        })?;

        if *key != self.verifying_key() {
            return Err(Error::InvalidParams(format!(
                "Signing key does not match server {} in group {}",
                self.index,
                ac.group_id()
            )));
        }
        if ac.server_randomness()[self.index] != Element::mul_base(&self.secret) {
            return Err(Error::InvalidParams(format!(
                "Randomness secret does not match server {} in group {}",
                self.index,
                ac.group_id()
            )));
        }

        Ok(())
    }
}

impl core::fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServerSecret")
            .field("index", &self.index)
            .field("verifying_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}
