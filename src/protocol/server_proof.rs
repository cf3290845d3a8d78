use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::primitives::{Element, Scalar, Transcript};
use crate::{Error, Result};

/// One server's link in the verification chain.
///
/// `T` is the linkage tag after this server's step; `(c, r1, r2)` is a
/// non-interactive proof that the step used the server's randomness secret and
/// the Diffie-Hellman secret it shares with the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProof {
    #[serde(rename = "T")]
    pub tag: Element,
    pub c: Scalar,
    pub r1: Scalar,
    pub r2: Scalar,
}

/// Public values a link proves a relation over.
///
/// The prover knows `r` and `s` such that `R = r·G`, `S = s·S_prev` and
/// `s·T = r·T_prev`.
#[derive(Clone, Copy, Debug)]
pub struct LinkStatement {
    pub randomness: Element,
    pub prev_commitment: Element,
    pub commitment: Element,
    pub prev_tag: Element,
    pub tag: Element,
}

impl LinkStatement {
    fn append_to(&self, transcript: &mut Transcript) {
        transcript.append_element(b"R", &self.randomness);
        transcript.append_element(b"S_prev", &self.prev_commitment);
        transcript.append_element(b"S", &self.commitment);
        transcript.append_element(b"T_prev", &self.prev_tag);
        transcript.append_element(b"T", &self.tag);
    }
}

/// Secret nonces of a link proof.
///
/// Automatically zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
struct LinkNonce {
    v1: Scalar,
    v2: Scalar,
}

impl ServerProof {
    /// Proves a link. `transcript` must already carry the chain context.
    pub fn prove<R: CryptoRngCore>(
        statement: &LinkStatement,
        randomness_secret: &Scalar,
        dh_secret: &Scalar,
        mut transcript: Transcript,
        rng: &mut R,
    ) -> Self {
        let nonce = LinkNonce {
            v1: Scalar::random(rng),
            v2: Scalar::random(rng),
        };

        let a1 = Element::mul_base(&nonce.v1);
        let a2 = statement.prev_commitment * nonce.v2;
        let a3 = statement.tag * nonce.v2 - statement.prev_tag * nonce.v1;

        statement.append_to(&mut transcript);
        append_commitments(&mut transcript, &a1, &a2, &a3);
        let c = transcript.challenge_scalar();

        Self {
            tag: statement.tag,
            c,
            r1: nonce.v1 + c * *randomness_secret,
            r2: nonce.v2 + c * *dh_secret,
        }
    }

    /// Verifies a link against its statement. `transcript` must carry the same
    /// chain context the prover used.
    pub fn verify(&self, statement: &LinkStatement, mut transcript: Transcript) -> Result<()> {
        if statement.tag != self.tag {
            return Err(Error::AuthenticationFailed(
                "Proof tag does not match its statement".to_string(),
            ));
        }
        if self.tag.is_identity() {
            return Err(Error::AuthenticationFailed(
                "Linkage tag is the identity".to_string(),
            ));
        }

        let a1 = Element::mul_base(&self.r1) - statement.randomness * self.c;
        let a2 = statement.prev_commitment * self.r2 - statement.commitment * self.c;
        let a3 = statement.tag * self.r2 - statement.prev_tag * self.r1;

        statement.append_to(&mut transcript);
        append_commitments(&mut transcript, &a1, &a2, &a3);

        if transcript.challenge_scalar() != self.c {
            return Err(Error::AuthenticationFailed(
                "Server proof does not verify".to_string(),
            ));
        }

        Ok(())
    }
}

fn append_commitments(transcript: &mut Transcript, a1: &Element, a2: &Element, a3: &Element) {
    transcript.append_element(b"A1", a1);
    transcript.append_element(b"A2", a2);
    transcript.append_element(b"A3", a3);
}
