//! Server signatures over protocol values.
//!
//! Every signed message is `label || payload` so a signature over a challenge share
//! can never be presented as a signature over a linkage tag or a binding.

use core::fmt;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand_core::CryptoRngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::{Error, Result};

const SECRET_KEY_BYTES: usize = 32;
const PUBLIC_KEY_BYTES: usize = 32;
const SIGNATURE_BYTES: usize = 64;

/// What a signature attests to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureLabel {
    /// One server's random challenge share.
    Share,
    /// The combined challenge.
    Challenge,
    /// The final linkage tag.
    Tag,
    /// The client-chosen binding payload.
    Binding,
}

impl SignatureLabel {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            SignatureLabel::Share => b"daga/share/v1:",
            SignatureLabel::Challenge => b"daga/challenge/v1:",
            SignatureLabel::Tag => b"daga/tag/v1:",
            SignatureLabel::Binding => b"daga/binding/v1:",
        }
    }

    fn message(self, payload: &[u8]) -> Vec<u8> {
        let prefix = self.as_bytes();
        let mut message = Vec::with_capacity(prefix.len() + payload.len());
        message.extend_from_slice(prefix);
        message.extend_from_slice(payload);
        message
    }
}

/// A server's private signing key.
#[derive(Clone)]
pub struct ServerSigningKey(SigningKey);

/// A server's public verification key, as listed in the authentication context.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ServerVerifyingKey(VerifyingKey);

/// Ed25519 signature produced by a server.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl ServerSigningKey {
    /// Generates a fresh signing key.
    pub fn generate<R: CryptoRngCore>(rng: &mut R) -> Self {
        let mut seed = [0u8; SECRET_KEY_BYTES];
        rng.fill_bytes(&mut seed);
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self(key)
    }

    /// Decodes a 32-byte secret key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; SECRET_KEY_BYTES] = bytes.try_into().map_err(|_| {
            Error::InvalidParams(format!(
                "Signing key must be {} bytes, got {}",
                SECRET_KEY_BYTES,
                bytes.len()
            ))
        })?;
        Ok(Self(SigningKey::from_bytes(&seed)))
    }

    /// Encodes the secret key.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_BYTES] {
        self.0.to_bytes()
    }

    /// Returns the matching verification key.
    pub fn verifying_key(&self) -> ServerVerifyingKey {
        ServerVerifyingKey(self.0.verifying_key())
    }

    /// Signs `payload` under `label`.
    pub fn sign(&self, label: SignatureLabel, payload: &[u8]) -> Signature {
        Signature(self.0.sign(&label.message(payload)))
    }
}

impl fmt::Debug for ServerSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServerSigningKey")
            .field(&self.verifying_key())
            .finish()
    }
}

impl ServerVerifyingKey {
    /// Decodes a 32-byte public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_BYTES] = bytes.try_into().map_err(|_| {
            Error::InvalidParams(format!(
                "Verifying key must be {} bytes, got {}",
                PUBLIC_KEY_BYTES,
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&arr)
            .map(Self)
            .map_err(|e| Error::InvalidParams(format!("Invalid verifying key: {e}")))
    }

    /// Encodes the public key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_BYTES] {
        self.0.to_bytes()
    }

    /// Checks `signature` over `label || payload`.
    pub fn verify(&self, label: SignatureLabel, payload: &[u8], signature: &Signature) -> bool {
        self.0
            .verify_strict(&label.message(payload), &signature.0)
            .is_ok()
    }
}

impl fmt::Debug for ServerVerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerVerifyingKey({})", hex::encode(self.to_bytes()))
    }
}

impl Signature {
    /// Decodes a 64-byte signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_BYTES] = bytes.try_into().map_err(|_| {
            Error::InvalidParams(format!(
                "Signature must be {} bytes, got {}",
                SIGNATURE_BYTES,
                bytes.len()
            ))
        })?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }

    /// Encodes the signature.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_BYTES] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.to_bytes()))
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> core::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.to_bytes()))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> core::result::Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
                <$ty>::from_bytes(&bytes).map_err(D::Error::custom)
            }
        }
    };
}

hex_serde!(ServerSigningKey);
hex_serde!(ServerVerifyingKey);
hex_serde!(Signature);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecureRng;

    #[test]
    fn sign_and_verify() {
        let key = ServerSigningKey::generate(&mut SecureRng::new());
        let sig = key.sign(SignatureLabel::Share, b"payload");
        assert!(key
            .verifying_key()
            .verify(SignatureLabel::Share, b"payload", &sig));
    }

    #[test]
    fn labels_are_not_interchangeable() {
        let key = ServerSigningKey::generate(&mut SecureRng::new());
        let sig = key.sign(SignatureLabel::Share, b"payload");
        assert!(!key
            .verifying_key()
            .verify(SignatureLabel::Tag, b"payload", &sig));
    }

    #[test]
    fn rejects_other_key() {
        let mut rng = SecureRng::new();
        let key = ServerSigningKey::generate(&mut rng);
        let other = ServerSigningKey::generate(&mut rng);
        let sig = key.sign(SignatureLabel::Challenge, b"c");
        assert!(!other
            .verifying_key()
            .verify(SignatureLabel::Challenge, b"c", &sig));
    }

    #[test]
    fn signing_key_bytes_round_trip() {
        let key = ServerSigningKey::generate(&mut SecureRng::new());
        let restored = ServerSigningKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(restored.verifying_key(), key.verifying_key());
        assert!(ServerSigningKey::from_bytes(&[0u8; 3]).is_err());
    }

    #[test]
    fn signature_json_is_hex() {
        let key = ServerSigningKey::generate(&mut SecureRng::new());
        let sig = key.sign(SignatureLabel::Binding, b"bind");
        let json = serde_json::to_value(sig).unwrap();
        assert_eq!(json.as_str().unwrap().len(), SIGNATURE_BYTES * 2);
        let decoded: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, sig);
    }
}
