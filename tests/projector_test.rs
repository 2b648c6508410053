//! Integration tests for merging updates into the snapshot and history.

use rocket_telemetry::data::history::{Metric, TelemetryHistoryStore};
use rocket_telemetry::network::decoder::{encode_telemetry_frame, TelemetryRecord};
use rocket_telemetry::network::protocol::{Action, LandingStatus, RawFrame, SimulationUpdate};
use rocket_telemetry::network::FrameDecoder;
use rocket_telemetry::projector::StateProjector;

fn frame_for(tick: u32, entities: usize) -> Vec<u8> {
    let records: Vec<TelemetryRecord> = (0..entities)
        .map(|index| {
            let t = tick as f32;
            let i = index as f32;
            TelemetryRecord {
                y: 1000.0 - t * 10.0 - i,
                vx: i,
                vy: -t,
                angle: 0.25 * i,
                mass: 900.0,
                fuel_mass: 100.0 - t,
                reward: t + i * 100.0,
                throttle: 0.5,
                is_active: 1.0,
                ..Default::default()
            }
        })
        .collect();
    encode_telemetry_frame(&records)
}

fn apply_text(projector: &mut StateProjector, text: &str) -> u64 {
    let decoded = FrameDecoder::new()
        .decode(&RawFrame::Text(text.to_string()))
        .unwrap();
    projector.apply(decoded.update)
}

#[test]
fn test_five_frames_two_entities() {
    let decoder = FrameDecoder::new();
    let mut projector = StateProjector::new(TelemetryHistoryStore::new(100));

    for tick in 1..=5u32 {
        let decoded = decoder.decode_binary(&frame_for(tick, 2)).unwrap();
        projector.apply(decoded.update);
    }

    for index in 0..2usize {
        let history = projector.history().entity(index).unwrap();
        assert_eq!(history.ticks(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        for metric in Metric::ALL {
            assert_eq!(history.series(metric).len(), 5, "metric {}", metric.key());
        }
        let expected_rewards: Vec<f64> = (1..=5).map(|t| f64::from(t) + index as f64 * 100.0).collect();
        assert_eq!(history.series(Metric::Reward), expected_rewards);
        assert_eq!(
            history.series(Metric::Vy),
            vec![-1.0, -2.0, -3.0, -4.0, -5.0]
        );
    }

    let snapshot = projector.snapshot();
    assert_eq!(snapshot.tick, 5);
    assert_eq!(snapshot.rewards, vec![Some(5.0), Some(105.0)]);
    let last = snapshot.states[1].unwrap();
    assert_eq!(last.vy, -5.0);
    assert_eq!(last.fuel_mass, 95.0);
}

#[test]
fn test_speed_only_message_leaves_arrays_untouched() {
    let mut projector = StateProjector::default();
    apply_text(
        &mut projector,
        r#"{"state": [{"vx": 3, "vy": 4}], "action": [{"throttle": 0.5, "coldGas": 0}],
            "reward": [2.0], "landing": ["good"]}"#,
    );
    let before = projector.snapshot().clone();

    let decoded = FrameDecoder::new()
        .decode(&RawFrame::Text(r#"{"speed": 2.0}"#.into()))
        .unwrap();
    projector.apply(decoded.update);

    let after = projector.snapshot();
    assert_eq!(after.states, before.states);
    assert_eq!(after.actions, before.actions);
    assert_eq!(after.rewards, before.rewards);
    assert_eq!(after.landing, before.landing);
    assert_eq!(after.tick, before.tick + 1);
}

#[test]
fn test_tick_advances_by_one_per_update() {
    let mut projector = StateProjector::default();
    let updates = [
        SimulationUpdate::default(),
        SimulationUpdate {
            actions: Some(vec![Action::default()]),
            ..Default::default()
        },
        SimulationUpdate {
            landing: Some(vec![Some(LandingStatus::Ok)]),
            ..Default::default()
        },
    ];
    for (expected, update) in (1u64..).zip(updates) {
        assert_eq!(projector.apply(update), expected);
    }
}

#[test]
fn test_missing_rewards_record_zero() {
    let mut projector = StateProjector::default();
    apply_text(&mut projector, r#"{"state": [{"vy": -1}]}"#);
    apply_text(&mut projector, r#"{"state": [{"vy": -2}], "reward": [null]}"#);

    let history = projector.history().entity(0).unwrap();
    assert_eq!(history.series(Metric::Reward), vec![0.0, 0.0]);
}

#[test]
fn test_inactive_slots_skip_history_but_keep_alignment() {
    let mut projector = StateProjector::default();
    apply_text(&mut projector, r#"{"state": [{"vy": -1}, {"vy": -10}]}"#);
    apply_text(&mut projector, r#"{"state": [null, {"vy": -20}]}"#);

    assert_eq!(projector.history().entity(0).unwrap().len(), 1);
    let second = projector.history().entity(1).unwrap();
    assert_eq!(second.ticks(), vec![1.0, 2.0]);
    assert_eq!(second.series(Metric::Vy), vec![-10.0, -20.0]);
    assert_eq!(projector.snapshot().active_count(), 1);
}

#[test]
fn test_shrinking_fleet_drops_removed_histories() {
    let mut projector = StateProjector::default();
    apply_text(&mut projector, r#"{"state": [{"vy": 1}, {"vy": 2}, {"vy": 3}]}"#);
    apply_text(&mut projector, r#"{"state": [{"vy": 4}]}"#);

    assert_eq!(projector.history().tracked_entities(), 1);
    assert_eq!(
        projector.history().entity(0).unwrap().series(Metric::Vy),
        vec![1.0, 4.0]
    );

    // Growing again starts the new slot from scratch.
    apply_text(&mut projector, r#"{"state": [{"vy": 5}, {"vy": 6}]}"#);
    assert_eq!(projector.history().entity(1).unwrap().ticks(), vec![3.0]);
}

#[test]
fn test_history_is_bounded() {
    let decoder = FrameDecoder::new();
    let mut projector = StateProjector::new(TelemetryHistoryStore::new(10));
    for tick in 1..=25u32 {
        projector.apply(decoder.decode_binary(&frame_for(tick, 1)).unwrap().update);
    }

    let history = projector.history().entity(0).unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(history.ticks().first(), Some(&16.0));
    assert_eq!(history.ticks().last(), Some(&25.0));
}

#[test]
fn test_reset_clears_history_and_tick() {
    let mut projector = StateProjector::default();
    apply_text(&mut projector, r#"{"state": [{"vy": 1}]}"#);
    apply_text(&mut projector, r#"{"state": [{"vy": 2}]}"#);

    projector.reset();
    assert_eq!(projector.tick(), 0);
    assert!(projector.history().entity(0).unwrap().is_empty());

    projector.reset();
    assert_eq!(apply_text(&mut projector, r#"{"state": [{"vy": 3}]}"#), 1);
    assert_eq!(projector.history().entity(0).unwrap().ticks(), vec![1.0]);
}

#[test]
fn test_nan_reward_clears_snapshot_slot_and_records_zero() {
    let decoder = FrameDecoder::new();
    let mut projector = StateProjector::default();
    let frame = |reward: f32| {
        encode_telemetry_frame(&[TelemetryRecord {
            vy: -1.0,
            reward,
            is_active: 1.0,
            ..Default::default()
        }])
    };

    projector.apply(decoder.decode_binary(&frame(5.0)).unwrap().update);
    projector.apply(decoder.decode_binary(&frame(f32::NAN)).unwrap().update);

    assert_eq!(projector.snapshot().rewards, vec![None]);
    assert_eq!(
        projector.history().entity(0).unwrap().series(Metric::Reward),
        vec![5.0, 0.0]
    );
}
