use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthenticationContext;
use crate::primitives::{Element, Scalar};
use crate::{Error, Result};

const DH_SECRET_LABEL: &[u8] = b"daga/dh-secret";

/// Data the client submits when it asks for a challenge (`client_data` on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInit {
    /// Authentication group this attempt belongs to.
    #[serde(rename = "uuid")]
    pub group_id: Uuid,
    /// Ephemeral Diffie-Hellman key `Z = z·G`.
    pub ephemeral_public_key: Element,
    /// Commitments `S_0..S_N` with `S_0 = G`.
    pub commitments: Vec<Element>,
    /// Initial linkage tag `T_0`.
    pub initial_linkage_tag: Element,
    /// Proof commitments, three per client.
    #[serde(rename = "T")]
    pub proof_commitments: Vec<Element>,
}

impl ClientInit {
    /// Checks the dimensions of the submission against the group.
    pub fn check_shape(&self, ac: &AuthenticationContext) -> Result<()> {
        if self.group_id != ac.group_id() {
            return Err(Error::InvalidRequest(format!(
                "Client data targets group {}, not {}",
                self.group_id,
                ac.group_id()
            )));
        }
        if self.commitments.len() != ac.server_count() + 1 {
            return Err(Error::InvalidRequest(format!(
                "Expected {} commitments, got {}",
                ac.server_count() + 1,
                self.commitments.len()
            )));
        }
        if self.commitments[0] != Element::generator() {
            return Err(Error::InvalidRequest(
                "First commitment must be the group generator".to_string(),
            ));
        }
        if self.proof_commitments.len() != 3 * ac.client_count() {
            return Err(Error::InvalidRequest(format!(
                "Expected {} proof commitments, got {}",
                3 * ac.client_count(),
                self.proof_commitments.len()
            )));
        }
        if self.initial_linkage_tag.is_identity() || self.ephemeral_public_key.is_identity() {
            return Err(Error::InvalidRequest(
                "Ephemeral key and initial linkage tag must not be the identity".to_string(),
            ));
        }
        Ok(())
    }

    /// The last commitment `S_N`.
    pub fn final_commitment(&self) -> Option<&Element> {
        self.commitments.last()
    }
}

/// The client's answer to the joint challenge.
///
/// `C` holds one challenge split per client (summing to the joint challenge),
/// `R` two responses per client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProof {
    #[serde(rename = "C")]
    pub c: Vec<Scalar>,
    #[serde(rename = "R")]
    pub r: Vec<Scalar>,
}

impl ClientProof {
    /// Verifies the OR-proof that the submitter owns one of the group's client keys
    /// and derived `T_0` and `S_N` from the same secret under that client's generator.
    pub fn verify(
        &self,
        ac: &AuthenticationContext,
        init: &ClientInit,
        challenge: &Scalar,
    ) -> Result<()> {
        let n = ac.client_count();
        if self.c.len() != n || self.r.len() != 2 * n {
            return Err(Error::AuthenticationFailed(format!(
                "Client proof has {} challenge splits and {} responses for {} clients",
                self.c.len(),
                self.r.len(),
                n
            )));
        }
        init.check_shape(ac)
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;

        let total: Scalar = self.c.iter().sum();
        if total != *challenge {
            return Err(Error::AuthenticationFailed(
                "Client challenge splits do not sum to the joint challenge".to_string(),
            ));
        }

        let g = Element::generator();
        let t0 = init.initial_linkage_tag;
        let s_n = init.commitments[ac.server_count()];

        for (k, (x_k, h_k)) in ac.client_keys().iter().zip(ac.generators()).enumerate() {
            let c_k = self.c[k];
            let (r_a, r_b) = (self.r[2 * k], self.r[2 * k + 1]);

            let t_key = g * r_a - *x_k * c_k;
            let t_tag = *h_k * r_b - t0 * c_k;
            let t_commit = g * r_b - s_n * c_k;

            let expected = &init.proof_commitments[3 * k..3 * k + 3];
            if expected != [t_key, t_tag, t_commit] {
                return Err(Error::AuthenticationFailed(format!(
                    "Client proof does not verify for branch {k}"
                )));
            }
        }

        Ok(())
    }
}

/// Hashes a Diffie-Hellman point shared between the client and a server to `s_j`.
pub(crate) fn dh_secret(shared: &Element) -> Scalar {
    Scalar::hash_from(DH_SECRET_LABEL, &shared.to_bytes())
}
