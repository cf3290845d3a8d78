#![no_main]

use daga_server::coordinator::AuthenticateRequest;
use daga_server::protocol::ClientInit;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(init) = serde_json::from_slice::<ClientInit>(data) {
        let _ = init.final_commitment();
    }
    let _ = serde_json::from_slice::<AuthenticateRequest>(data);
});
