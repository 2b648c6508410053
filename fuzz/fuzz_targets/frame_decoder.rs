//! Fuzz target for the frame decoder.
//!
//! Tests:
//! - Arbitrary bytes as binary frames and as JSON text never panic
//! - Successfully decoded frames always have equal-length arrays

#![no_main]

use libfuzzer_sys::fuzz_target;
use rocket_telemetry::network::protocol::RawFrame;
use rocket_telemetry::network::FrameDecoder;
use rocket_telemetry::projector::StateProjector;

fuzz_target!(|data: &[u8]| {
    let decoder = FrameDecoder::new();
    let mut projector = StateProjector::default();

    let mut frames = vec![RawFrame::Binary(data.to_vec())];
    if let Ok(text) = std::str::from_utf8(data) {
        frames.push(RawFrame::Text(text.to_string()));
    }

    for frame in &frames {
        let Ok(decoded) = decoder.decode(frame) else {
            continue;
        };
        let update = decoded.update;
        if let (Some(states), Some(actions)) = (&update.states, &update.actions) {
            assert_eq!(states.len(), actions.len());
        }
        projector.apply(update);
    }
});
