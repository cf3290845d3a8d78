//! Client side of an authentication.
//!
//! A client owns one of the group's key pairs. It prepares its commitments with
//! [`ClientSecret::begin`], sends the resulting [`ClientInit`] to any node, and
//! answers the joint challenge with [`PendingAuthentication::respond`]. The
//! signature checks in this module let the client confirm that every server
//! attested to the same challenge and tag.

use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::protocol::attest;
use crate::protocol::client_proof::dh_secret;
use crate::protocol::{AuthenticationContext, ClientInit, ClientProof};
use crate::primitives::{Element, Scalar, Signature, SignatureLabel};
use crate::{Error, Result};

/// A client's private key and position in the group.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClientSecret {
    #[zeroize(skip)]
    index: usize,
    private_key: Scalar,
}

impl ClientSecret {
    /// Wraps the private key of client `index`.
    pub fn new(index: usize, private_key: Scalar) -> Self {
        Self { index, private_key }
    }

    /// Position of this client in the context's client list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Public key `X = x·G`.
    pub fn public_key(&self) -> Element {
        Element::mul_base(&self.private_key)
    }

    /// Checks that the context lists this client's public key at its index.
    pub fn check_against(&self, ac: &AuthenticationContext) -> Result<()> {
        match ac.client_keys().get(self.index) {
            Some(key) if *key == self.public_key() => Ok(()),
            Some(_) => Err(Error::InvalidParams(format!(
                "Private key does not match client {} in group {}",
                self.index,
                ac.group_id()
            ))),
            None => Err(Error::InvalidParams(format!(
                "Client index {} is outside the group of {}",
                self.index,
                ac.client_count()
            ))),
        }
    }

    /// Derives the commitments for a new attempt and commits to the OR-proof.
    pub fn begin<R: CryptoRngCore>(
        &self,
        ac: &AuthenticationContext,
        rng: &mut R,
    ) -> Result<PendingAuthentication> {
        self.check_against(ac)?;

        let g = Element::generator();
        let i = self.index;
        let mut z = Scalar::random(rng);

        let mut commitments = Vec::with_capacity(ac.server_count() + 1);
        commitments.push(g);
        let mut tag_secret = Scalar::ONE;
        let mut prev = g;
        for r_j in ac.server_randomness() {
            let s_j = dh_secret(&(*r_j * z));
            prev = prev * s_j;
            commitments.push(prev);
            tag_secret = tag_secret * s_j;
        }
        let ephemeral_public_key = Element::mul_base(&z);
        z.zeroize();

        let t0 = ac.generators()[i] * tag_secret;
        let s_n = prev;

        let n = ac.client_count();
        let mut simulated_c = vec![Scalar::ZERO; n];
        let mut simulated_r = vec![Scalar::ZERO; 2 * n];
        let mut proof_commitments = Vec::with_capacity(3 * n);
        let v1 = Scalar::random(rng);
        let v2 = Scalar::random(rng);

        for (k, (x_k, h_k)) in ac.client_keys().iter().zip(ac.generators()).enumerate() {
            if k == i {
                proof_commitments.extend([g * v1, *h_k * v2, g * v2]);
                continue;
            }
            let c_k = Scalar::random(rng);
            let r_a = Scalar::random(rng);
            let r_b = Scalar::random(rng);
            proof_commitments.extend([
                g * r_a - *x_k * c_k,
                *h_k * r_b - t0 * c_k,
                g * r_b - s_n * c_k,
            ]);
            simulated_c[k] = c_k;
            simulated_r[2 * k] = r_a;
            simulated_r[2 * k + 1] = r_b;
        }

        Ok(PendingAuthentication {
            init: ClientInit {
                group_id: ac.group_id(),
                ephemeral_public_key,
                commitments,
                initial_linkage_tag: t0,
                proof_commitments,
            },
            index: i,
            private_key: self.private_key,
            tag_secret,
            v1,
            v2,
            simulated_c,
            simulated_r,
        })
    }
}

/// An attempt waiting for its joint challenge.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PendingAuthentication {
    #[zeroize(skip)]
    init: ClientInit,
    #[zeroize(skip)]
    index: usize,
    private_key: Scalar,
    tag_secret: Scalar,
    v1: Scalar,
    v2: Scalar,
    simulated_c: Vec<Scalar>,
    simulated_r: Vec<Scalar>,
}

impl PendingAuthentication {
    /// The data to send with `request_challenge`.
    pub fn client_data(&self) -> &ClientInit {
        &self.init
    }

    /// Answers the joint challenge.
    pub fn respond(&self, challenge: &Scalar) -> ClientProof {
        let i = self.index;
        let others: Scalar = self.simulated_c.iter().sum();
        let c_i = *challenge - others;

        let mut c = self.simulated_c.clone();
        let mut r = self.simulated_r.clone();
        c[i] = c_i;
        r[2 * i] = self.v1 + c_i * self.private_key;
        r[2 * i + 1] = self.v2 + c_i * self.tag_secret;

        ClientProof { c, r }
    }
}

/// Checks that every server signed `challenge` for `auth_id`, in server order.
pub fn verify_challenge_signatures(
    ac: &AuthenticationContext,
    auth_id: &str,
    challenge: &Scalar,
    sigs: &[Signature],
) -> Result<()> {
    check_signature_count(ac, sigs.len())?;
    let payload = attest::challenge_payload(auth_id, challenge);
    sigs.iter().enumerate().try_for_each(|(j, sig)| {
        ac.verify_server_signature(j, SignatureLabel::Challenge, &payload, sig)
    })
}

/// Checks that every server signed `tag` and bound `bind` to it, in server order.
pub fn verify_tag_signatures(
    ac: &AuthenticationContext,
    tag: &Element,
    bind: &str,
    tag_sigs: &[Signature],
    binding_sigs: &[Signature],
) -> Result<()> {
    check_signature_count(ac, tag_sigs.len())?;
    check_signature_count(ac, binding_sigs.len())?;

    let tag_payload = attest::tag_payload(&ac.group_id(), tag);
    let binding_payload = attest::binding_payload(tag, bind);
    for (j, (tag_sig, binding_sig)) in tag_sigs.iter().zip(binding_sigs).enumerate() {
        ac.verify_server_signature(j, SignatureLabel::Tag, &tag_payload, tag_sig)?;
        ac.verify_server_signature(j, SignatureLabel::Binding, &binding_payload, binding_sig)?;
    }
    Ok(())
}

fn check_signature_count(ac: &AuthenticationContext, count: usize) -> Result<()> {
    if count == ac.server_count() {
        Ok(())
    } else {
        Err(Error::InvalidSignature(format!(
            "Expected {} server signatures, got {count}",
            ac.server_count()
        )))
    }
}
