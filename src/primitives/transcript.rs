//! Fiat-Shamir transcript for the server proof links.
//!
//! Provides domain-separated, transcript-based challenge generation using Merlin.

use merlin::Transcript as MerlinTranscript;

use super::{Element, Scalar};

/// Protocol label for transcript initialization.
const PROTOCOL_LABEL: &[u8] = b"DAGA server proof v1";

/// Domain separation tag for protocol name.
const PROTOCOL_DST: &[u8] = b"daga-ristretto255";

/// Domain separation tag for challenge generation.
const CHALLENGE_DST: &[u8] = b"challenge";

/// Number of bytes for wide reduction when generating Ristretto scalars.
const WIDE_REDUCTION_BYTES: usize = 64;

/// Transcript wrapper for Fiat-Shamir transformation.
pub struct Transcript(MerlinTranscript);

impl Transcript {
    /// Creates a new transcript.
    pub fn new() -> Self {
        let mut transcript = MerlinTranscript::new(PROTOCOL_LABEL);
        transcript.append_message(b"protocol", PROTOCOL_DST);
        Self(transcript)
    }

    /// Appends application-specific context (group id, session binding).
    pub fn append_context(&mut self, context: &[u8]) {
        self.0.append_message(b"context", context);
    }

    /// Appends the position of a link in the verification chain.
    pub fn append_index(&mut self, index: usize) {
        self.0.append_u64(b"index", index as u64);
    }

    /// Appends a labelled group element.
    pub fn append_element(&mut self, label: &'static [u8], element: &Element) {
        self.0.append_message(label, &element.to_bytes());
    }

    /// Appends a labelled scalar.
    pub fn append_scalar(&mut self, label: &'static [u8], scalar: &Scalar) {
        self.0.append_message(label, &scalar.to_bytes());
    }

    /// Generates a challenge scalar.
    ///
    /// Uses wide reduction (64 bytes) to ensure uniform distribution.
    pub fn challenge_scalar(&mut self) -> Scalar {
        let mut buf = [0u8; WIDE_REDUCTION_BYTES];
        self.0.challenge_bytes(CHALLENGE_DST, &mut buf);
        Scalar::from_wide_bytes(&buf)
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_scalar_deterministic() {
        let g = Element::generator();

        let mut t1 = Transcript::new();
        t1.append_context(b"group");
        t1.append_index(2);
        t1.append_element(b"R", &g);
        let c1 = t1.challenge_scalar();

        let mut t2 = Transcript::new();
        t2.append_context(b"group");
        t2.append_index(2);
        t2.append_element(b"R", &g);
        let c2 = t2.challenge_scalar();

        assert_eq!(c1, c2);
    }

    #[test]
    fn challenge_depends_on_index() {
        let mut t1 = Transcript::new();
        t1.append_index(0);
        let mut t2 = Transcript::new();
        t2.append_index(1);

        assert_ne!(t1.challenge_scalar(), t2.challenge_scalar());
    }
}
