#![no_main]

use daga_server::coordinator::{Operation, PeerRequest, PeerResponse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let op = Operation::ALL[usize::from(selector) % Operation::ALL.len()];

    if let Ok(request) = PeerRequest::decode(op, body) {
        assert_eq!(request.operation(), op);
        let encoded = request.to_json().unwrap();
        let again = PeerRequest::decode(op, &encoded).unwrap();
        assert_eq!(again.auth_id(), request.auth_id());
    }
    let _ = PeerResponse::decode(op, 0, body);
});
