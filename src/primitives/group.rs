use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul, Neg, Sub};

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar as DalekScalar;
use curve25519_dalek::traits::Identity;
use rand_core::CryptoRngCore;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::{Error, Result};

/// Number of bytes in a Ristretto255 scalar or compressed element (32 bytes).
pub const RISTRETTO_BYTES: usize = 32;

/// Number of bytes used for wide scalar reduction (64 bytes).
const WIDE_REDUCTION_BYTES: usize = 64;

/// Domain separation prefix for hashing onto the group and its scalar field.
const HASH_DST: &[u8] = b"daga-ristretto255-v1";

/// Scalar modulo the Ristretto255 group order `Q`.
///
/// Secret scalars are wiped by the types that own them; the scalar itself is a
/// plain value so shares and challenges can be summed and cloned freely.
#[derive(Clone, Copy, Eq, PartialEq, Zeroize)]
pub struct Scalar(DalekScalar);

/// Element (point) of the Ristretto255 group.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Element(RistrettoPoint);

impl Scalar {
    /// The additive identity.
    pub const ZERO: Scalar = Scalar(DalekScalar::ZERO);

    /// The multiplicative identity.
    pub const ONE: Scalar = Scalar(DalekScalar::ONE);

    /// Embeds a small integer, reduced modulo `Q`.
    pub fn from_u64(value: u64) -> Self {
        Self(DalekScalar::from(value))
    }

    /// Draws a uniformly random scalar using wide reduction.
    pub fn random<R: CryptoRngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; WIDE_REDUCTION_BYTES];
        rng.fill_bytes(&mut bytes);
        let scalar = Self(DalekScalar::from_bytes_mod_order_wide(&bytes));
        bytes.zeroize();
        scalar
    }

    /// Hashes `data` under `label` to a uniformly distributed scalar.
    pub fn hash_from(label: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(HASH_DST);
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label);
        hasher.update(data);
        Self(DalekScalar::from_bytes_mod_order_wide(&hasher.finalize().into()))
    }

    /// Reduces 64 uniformly random bytes to a scalar.
    pub fn from_wide_bytes(bytes: &[u8; WIDE_REDUCTION_BYTES]) -> Self {
        Self(DalekScalar::from_bytes_mod_order_wide(bytes))
    }

    /// Decodes a canonical 32-byte little-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; RISTRETTO_BYTES] = bytes.try_into().map_err(|_| {
            Error::InvalidScalar(format!(
                "Expected {} bytes, got {}",
                RISTRETTO_BYTES,
                bytes.len()
            ))
        })?;

        Option::<DalekScalar>::from(DalekScalar::from_canonical_bytes(arr))
            .map(Self)
            .ok_or_else(|| Error::InvalidScalar("Bytes do not represent a valid scalar".to_string()))
    }

    /// Encodes the scalar as 32 little-endian bytes.
    pub fn to_bytes(&self) -> [u8; RISTRETTO_BYTES] {
        self.0.to_bytes()
    }

    /// Returns the multiplicative inverse, or `None` for zero.
    pub fn invert(&self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(Self(self.0.invert()))
        }
    }

    /// Checks if the scalar is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == DalekScalar::ZERO
    }
}

impl Element {
    /// The standard Ristretto255 base point `G`.
    pub fn generator() -> Self {
        Self(RISTRETTO_BASEPOINT_POINT)
    }

    /// The identity element.
    pub fn identity() -> Self {
        Self(RistrettoPoint::identity())
    }

    /// Hashes `data` under `label` onto the group.
    ///
    /// The result has no known discrete logarithm with respect to `G`.
    pub fn hash_from(label: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(HASH_DST);
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label);
        hasher.update(data);
        Self(RistrettoPoint::from_uniform_bytes(&hasher.finalize().into()))
    }

    /// Computes `scalar · G` using the base point.
    pub fn mul_base(scalar: &Scalar) -> Self {
        Self(RISTRETTO_BASEPOINT_POINT * scalar.0)
    }

    /// Decodes a compressed 32-byte element.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; RISTRETTO_BYTES] = bytes.try_into().map_err(|_| {
            Error::InvalidGroupElement(format!(
                "Expected {} bytes, got {}",
                RISTRETTO_BYTES,
                bytes.len()
            ))
        })?;

        CompressedRistretto(arr).decompress().map(Self).ok_or_else(|| {
            Error::InvalidGroupElement("Bytes do not represent a valid Ristretto point".to_string())
        })
    }

    /// Encodes the element in compressed form.
    pub fn to_bytes(&self) -> [u8; RISTRETTO_BYTES] {
        self.0.compress().to_bytes()
    }

    /// Checks if the element is the identity.
    pub fn is_identity(&self) -> bool {
        self.0 == RistrettoPoint::identity()
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;

    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

impl Sum for Scalar {
    fn sum<I: Iterator<Item = Scalar>>(iter: I) -> Scalar {
        iter.fold(Scalar::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Scalar> for Scalar {
    fn sum<I: Iterator<Item = &'a Scalar>>(iter: I) -> Scalar {
        iter.copied().sum()
    }
}

impl Add for Element {
    type Output = Element;

    fn add(self, rhs: Element) -> Element {
        Element(self.0 + rhs.0)
    }
}

impl Sub for Element {
    type Output = Element;

    fn sub(self, rhs: Element) -> Element {
        Element(self.0 - rhs.0)
    }
}

impl Mul<Scalar> for Element {
    type Output = Element;

    fn mul(self, rhs: Scalar) -> Element {
        Element(self.0 * rhs.0)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        Scalar::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        Element::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecureRng;

    #[test]
    fn small_scalars_sum_modulo_order() {
        let total: Scalar = [10u64, 20, 30].into_iter().map(Scalar::from_u64).sum();
        assert_eq!(total, Scalar::from_u64(60));
    }

    #[test]
    fn sum_wraps_at_group_order() {
        let mut rng = SecureRng::new();
        let a = Scalar::random(&mut rng);
        assert_eq!(a + (-a), Scalar::ZERO);
    }

    #[test]
    fn scalar_inversion() {
        let mut rng = SecureRng::new();
        let a = Scalar::random(&mut rng);
        let a_inv = a.invert().unwrap();
        assert_eq!(a * a_inv, Scalar::ONE);
        assert!(Scalar::ZERO.invert().is_none());
    }

    #[test]
    fn scalar_rejects_non_canonical_bytes() {
        assert!(Scalar::from_bytes(&[0xFF; 32]).is_err());
        assert!(Scalar::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn element_rejects_invalid_encoding() {
        assert!(Element::from_bytes(&[0xFF; 32]).is_err());
        assert!(Element::from_bytes(&[1u8; 5]).is_err());
    }

    #[test]
    fn mul_base_matches_generator_multiplication() {
        let mut rng = SecureRng::new();
        let x = Scalar::random(&mut rng);
        assert_eq!(Element::mul_base(&x), Element::generator() * x);
    }

    #[test]
    fn element_distributes_over_scalar_addition() {
        let mut rng = SecureRng::new();
        let a = Scalar::random(&mut rng);
        let b = Scalar::random(&mut rng);
        let g = Element::generator();
        assert_eq!(g * a + g * b, g * (a + b));
    }

    #[test]
    fn hashed_elements_are_domain_separated() {
        let h1 = Element::hash_from(b"generator", b"0");
        let h2 = Element::hash_from(b"generator", b"1");
        let h3 = Element::hash_from(b"other", b"0");
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
        assert!(!h1.is_identity());
    }

    #[test]
    fn hex_serde_round_trip() {
        let g = Element::generator();
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(json, format!("\"{}\"", hex::encode(g.to_bytes())));
        let decoded: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, g);

        let bad: core::result::Result<Scalar, _> = serde_json::from_str("\"zz\"");
        assert!(bad.is_err());
    }
}
