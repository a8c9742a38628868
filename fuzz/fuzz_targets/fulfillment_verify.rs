#![no_main]

use libfuzzer_sys::fuzz_target;
use raffle_engine::{verify_fulfillment, Fulfillment, FulfillmentProof, RequestId, U256};

fuzz_target!(|data: &[u8]| {
    // Arbitrary key, alpha, proof and words must never verify or panic
    if data.len() < 32 + 80 + 8 {
        return;
    }
    let mut pk = [0u8; 32];
    pk.copy_from_slice(&data[..32]);
    let mut pi = [0u8; 80];
    pi.copy_from_slice(&data[32..112]);
    let mut id = [0u8; 8];
    id.copy_from_slice(&data[112..120]);
    let rest = &data[120..];

    let f = Fulfillment {
        request_id: RequestId(u64::from_le_bytes(id)),
        random_words: rest.chunks(32).map(U256::from_big_endian).collect(),
        proof: Some(FulfillmentProof { alpha: rest.to_vec(), pi }),
    };
    assert!(verify_fulfillment(&pk, &f).is_err());
});
