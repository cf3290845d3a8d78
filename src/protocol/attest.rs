//! Byte layouts of the values servers sign.
//!
//! Shares and challenges are bound to the authentication attempt they belong to.
//! Tags are bound to the group only, so every attempt by the same client yields
//! comparable evidence.

use uuid::Uuid;

use crate::primitives::{Element, Scalar};

/// Payload of a challenge share signature.
pub fn share_payload(auth_id: &str, share: &Scalar) -> Vec<u8> {
    session_payload(auth_id, &share.to_bytes())
}

/// Payload of a combined challenge signature.
pub fn challenge_payload(auth_id: &str, challenge: &Scalar) -> Vec<u8> {
    session_payload(auth_id, &challenge.to_bytes())
}

/// Payload of a linkage tag signature.
pub fn tag_payload(group_id: &Uuid, tag: &Element) -> Vec<u8> {
    let mut payload = Vec::with_capacity(48);
    payload.extend_from_slice(group_id.as_bytes());
    payload.extend_from_slice(&tag.to_bytes());
    payload
}

/// Payload of a binding signature: the tag followed by the client's payload.
pub fn binding_payload(tag: &Element, bind: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(32 + bind.len());
    payload.extend_from_slice(&tag.to_bytes());
    payload.extend_from_slice(bind.as_bytes());
    payload
}

fn session_payload(auth_id: &str, value: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + auth_id.len() + value.len());
    payload.extend_from_slice(&(auth_id.len() as u64).to_be_bytes());
    payload.extend_from_slice(auth_id.as_bytes());
    payload.extend_from_slice(value);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_payload_is_bound_to_session() {
        let share = Scalar::from_u64(10);
        assert_ne!(share_payload("a", &share), share_payload("b", &share));
    }

    #[test]
    fn auth_id_boundary_is_unambiguous() {
        let x = Scalar::from_u64(1);
        assert_ne!(share_payload("ab", &x), share_payload("a", &x));
    }
}
