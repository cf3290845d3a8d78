//! Randomness sources.

use rand_core::{CryptoRng, OsRng, RngCore};

use super::Scalar;

/// Cryptographically secure random number generator.
///
/// Thin wrapper around `OsRng` so every component draws randomness the same way.
pub struct SecureRng(OsRng);

impl SecureRng {
    /// Creates a new cryptographically secure random number generator.
    pub fn new() -> Self {
        Self(OsRng)
    }
}

impl Default for SecureRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl CryptoRng for SecureRng {}

/// Source of challenge shares, one draw per `begin_challenge_generation`.
///
/// Production nodes use [`RandomShares`]; tests substitute deterministic shares.
pub trait ShareSource: Send + Sync {
    /// Draws the next share, an element of `Z_Q`.
    fn draw(&self) -> Scalar;
}

/// Uniformly random shares from the operating system RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomShares;

impl ShareSource for RandomShares {
    fn draw(&self) -> Scalar {
        Scalar::random(&mut SecureRng::new())
    }
}
