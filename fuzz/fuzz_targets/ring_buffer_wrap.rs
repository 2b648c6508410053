//! Fuzz target for RingBuffer wrap-around behavior.
//!
//! Tests:
//! - Arbitrary capacities and push/clear sequences
//! - `to_vec` always equals the last `min(n, capacity)` pushed values, oldest first
//! - Length never exceeds capacity

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rocket_telemetry::data::ring_buffer::RingBuffer;

#[derive(Debug, Arbitrary)]
struct WrapInput {
    capacity: u8,
    operations: Vec<WrapOp>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum WrapOp {
    Push(i32),
    Clear,
    Read,
}

fuzz_target!(|input: WrapInput| {
    let capacity = usize::from(input.capacity).max(1);
    let mut rb = RingBuffer::<i64>::new(capacity);
    // Plain Vec model of everything pushed since the last clear.
    let mut model: Vec<i64> = Vec::new();

    for op in input.operations.iter().take(2000) {
        match *op {
            WrapOp::Push(v) => {
                rb.push(i64::from(v));
                model.push(i64::from(v));
            }
            WrapOp::Clear => {
                rb.clear();
                model.clear();
            }
            WrapOp::Read => {
                let start = model.len().saturating_sub(capacity);
                assert_eq!(rb.to_vec(), model[start..].to_vec());
            }
        }
        assert!(rb.len() <= rb.capacity());
    }
});
