//! Integration tests for the connection state machine, driven with explicit instants.

use rocket_telemetry::config::ConnectionConfig;
use rocket_telemetry::network::protocol::{ClientMessage, Command, ControlSignals, SimStatus};
use rocket_telemetry::network::reconnect::{
    ConnectionManager, ConnectionStatus, ExponentialBackoff,
};
use rocket_telemetry::network::transport::MockConnector;
use std::time::{Duration, Instant};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn manager() -> (ConnectionManager<MockConnector>, MockConnector) {
    let connector = MockConnector::new();
    let manager = ConnectionManager::new(connector.clone(), &ConnectionConfig::default());
    (manager, connector)
}

/// Connect and complete the handshake at `t0`.
fn connected(t0: Instant) -> (ConnectionManager<MockConnector>, MockConnector) {
    let (mut m, connector) = manager();
    assert!(m.connect(t0));
    assert!(m.handle_open(m.generation(), t0));
    (m, connector)
}

#[test]
fn test_starts_disconnected_without_timers() {
    let (m, connector) = manager();
    assert_eq!(m.status(), ConnectionStatus::Disconnected);
    assert_eq!(m.next_deadline(), None);
    assert_eq!(connector.open_count(), 0);
}

#[test]
fn test_double_connect_opens_one_link() {
    let t0 = Instant::now();
    let (mut m, connector) = manager();

    assert!(m.connect(t0));
    assert!(!m.connect(t0 + ms(10)));
    assert_eq!(m.status(), ConnectionStatus::Connecting);
    assert_eq!(connector.open_count(), 1);
    assert_eq!(connector.live_links(), 1);

    m.handle_open(m.generation(), t0 + ms(20));
    assert!(!m.connect(t0 + ms(30)));
    assert_eq!(connector.open_count(), 1);
}

#[test]
fn test_open_cancels_grace_timer() {
    let t0 = Instant::now();
    let (mut m, _connector) = manager();
    m.connect(t0);
    assert_eq!(m.next_deadline(), Some(t0 + ms(3000)));

    m.handle_open(m.generation(), t0 + ms(1000));
    assert_eq!(m.status(), ConnectionStatus::Connected);
    // Only the ping timer is left.
    assert_eq!(m.next_deadline(), Some(t0 + ms(3000)));

    m.handle_timers(t0 + ms(3000));
    assert_eq!(m.status(), ConnectionStatus::Connected);
}

#[test]
fn test_grace_expiry_moves_to_error_and_abandons_link() {
    let t0 = Instant::now();
    let (mut m, connector) = manager();
    m.connect(t0);
    let abandoned = m.generation();

    m.handle_timers(t0 + ms(2999));
    assert_eq!(m.status(), ConnectionStatus::Connecting);

    m.handle_timers(t0 + ms(3000));
    assert_eq!(m.status(), ConnectionStatus::Error);
    assert_eq!(connector.live_links(), 0);
    assert_eq!(m.reconnect_at(), Some(t0 + ms(6000)));

    // The abandoned link finishing late must not flip the state.
    assert!(!m.handle_open(abandoned, t0 + ms(3500)));
    assert_eq!(m.status(), ConnectionStatus::Error);
}

#[test]
fn test_abnormal_close_schedules_exactly_one_reconnect() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);
    let t1 = t0 + ms(500);

    m.handle_close(m.generation(), false, t1);
    assert_eq!(m.status(), ConnectionStatus::Error);
    assert_eq!(m.reconnect_at(), Some(t1 + ms(3000)));
    assert_eq!(connector.live_links(), 0);

    m.handle_timers(t1 + ms(2999));
    assert_eq!(connector.open_count(), 1);

    m.handle_timers(t1 + ms(3000));
    assert_eq!(connector.open_count(), 2);
    assert_eq!(m.status(), ConnectionStatus::Connecting);
    assert_eq!(m.reconnect_at(), None);

    m.handle_timers(t1 + ms(3001));
    assert_eq!(connector.open_count(), 2);
    assert_eq!(connector.live_links(), 1);
}

#[test]
fn test_disconnect_before_delay_prevents_reconnect() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);

    m.handle_close(m.generation(), false, t0 + ms(100));
    m.disconnect();
    assert_eq!(m.status(), ConnectionStatus::Disconnected);
    assert_eq!(m.next_deadline(), None);

    m.handle_timers(t0 + ms(60_000));
    assert_eq!(connector.open_count(), 1);
    assert_eq!(m.status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_disconnect_while_connected_closes_link() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);
    let generation = m.generation();

    m.disconnect();
    assert_eq!(connector.live_links(), 0);
    assert_eq!(m.status(), ConnectionStatus::Disconnected);

    // The close echo from the link we just closed is stale.
    m.handle_close(generation, true, t0 + ms(10));
    assert_eq!(m.status(), ConnectionStatus::Disconnected);
    assert_eq!(m.next_deadline(), None);
}

#[test]
fn test_clean_close_while_connected_is_terminal() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);

    m.handle_close(m.generation(), true, t0 + ms(100));
    assert_eq!(m.status(), ConnectionStatus::Disconnected);
    assert_eq!(m.next_deadline(), None);

    m.handle_timers(t0 + ms(60_000));
    assert_eq!(connector.open_count(), 1);
}

#[test]
fn test_close_before_open_is_a_failure() {
    let t0 = Instant::now();
    let (mut m, _connector) = manager();
    m.connect(t0);

    m.handle_close(m.generation(), true, t0 + ms(50));
    assert_eq!(m.status(), ConnectionStatus::Error);
    assert_eq!(m.reconnect_at(), Some(t0 + ms(3050)));
    assert_eq!(m.state().reconnect_attempt, 1);
}

#[test]
fn test_stale_close_is_ignored() {
    let t0 = Instant::now();
    let (mut m, _connector) = manager();
    m.connect(t0);
    let first = m.generation();

    m.handle_timers(t0 + ms(3000));
    m.handle_timers(t0 + ms(6000));
    assert_eq!(m.status(), ConnectionStatus::Connecting);
    assert_ne!(m.generation(), first);

    m.handle_close(first, false, t0 + ms(6100));
    assert_eq!(m.status(), ConnectionStatus::Connecting);

    assert!(m.handle_open(m.generation(), t0 + ms(6200)));
    assert_eq!(m.status(), ConnectionStatus::Connected);
    assert_eq!(m.state().reconnect_attempt, 0);
}

#[test]
fn test_manual_connect_from_error_skips_the_wait() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);
    m.handle_close(m.generation(), false, t0 + ms(100));

    assert!(m.connect(t0 + ms(200)));
    assert_eq!(connector.open_count(), 2);
    assert_eq!(m.reconnect_at(), None);
    assert_eq!(m.status(), ConnectionStatus::Connecting);
}

#[test]
fn test_ping_pong_measures_latency() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);

    m.handle_timers(t0 + ms(2000));
    assert_eq!(connector.sent(), vec![r#"{"command":"ping"}"#.to_string()]);
    assert_eq!(m.next_deadline(), Some(t0 + ms(4000)));

    let latency = m.handle_pong(t0 + ms(2040)).unwrap();
    assert!((latency - 40.0).abs() < 1e-6);
    assert!((m.state().latency_ms.unwrap() - 40.0).abs() < 1e-6);

    // No ping outstanding.
    assert_eq!(m.handle_pong(t0 + ms(2100)), None);
}

#[test]
fn test_pings_stop_after_close() {
    let t0 = Instant::now();
    let (mut m, connector) = connected(t0);
    m.handle_close(m.generation(), true, t0 + ms(100));

    m.handle_timers(t0 + ms(10_000));
    assert!(connector.sent().is_empty());
}

#[test]
fn test_sends_only_while_connected() {
    let t0 = Instant::now();
    let (mut m, connector) = manager();
    let speed = ClientMessage::speed(2.0);

    assert!(!m.send(&speed));
    m.connect(t0);
    assert!(!m.send(&speed));
    m.handle_open(m.generation(), t0);
    assert!(m.send(&speed));
    assert!(m.send(&ClientMessage::command(Command::Pause)));

    assert_eq!(
        connector.sent(),
        vec![
            r#"{"speed":2.0}"#.to_string(),
            r#"{"command":"pause"}"#.to_string()
        ]
    );
}

#[test]
fn test_exhausted_policy_stays_in_error() {
    let t0 = Instant::now();
    let (mut m, connector) = manager();
    m.set_retry_policy(Box::new(ExponentialBackoff {
        initial_delay: ms(100),
        max_delay: ms(1000),
        backoff_multiplier: 2.0,
        max_attempts: 1,
    }));

    m.connect(t0);
    m.handle_close(m.generation(), false, t0);
    assert_eq!(m.reconnect_at(), Some(t0 + ms(100)));

    m.handle_timers(t0 + ms(100));
    assert_eq!(connector.open_count(), 2);
    m.handle_close(m.generation(), false, t0 + ms(150));

    assert_eq!(m.status(), ConnectionStatus::Error);
    assert_eq!(m.reconnect_at(), None);
    assert_eq!(m.next_deadline(), None);
}

#[test]
fn test_manual_connect_after_exhaustion_restores_retries() {
    let t0 = Instant::now();
    let (mut m, connector) = manager();
    m.set_retry_policy(Box::new(ExponentialBackoff {
        initial_delay: ms(100),
        max_delay: ms(1000),
        backoff_multiplier: 2.0,
        max_attempts: 1,
    }));

    m.connect(t0);
    m.handle_close(m.generation(), false, t0);
    m.handle_timers(t0 + ms(100));
    m.handle_close(m.generation(), false, t0 + ms(150));
    assert_eq!(m.reconnect_at(), None);

    let t1 = t0 + ms(10_000);
    assert!(m.connect(t1));
    assert_eq!(m.state().reconnect_attempt, 0);
    assert_eq!(connector.open_count(), 3);

    m.handle_close(m.generation(), false, t1 + ms(50));
    assert_eq!(m.status(), ConnectionStatus::Error);
    assert_eq!(m.state().reconnect_attempt, 1);
    assert_eq!(m.reconnect_at(), Some(t1 + ms(150)));
}

#[test]
fn test_server_flags_are_mirrored() {
    let (mut m, _connector) = manager();
    m.apply_signals(&ControlSignals {
        sim_status: Some(SimStatus::Playing),
        speed: Some(4.0),
        agent_enabled: Some(false),
        ..Default::default()
    });

    let state = m.state();
    assert!(state.sim_playing);
    assert_eq!(state.speed, 4.0);
    assert!(!state.agent_enabled);

    m.apply_signals(&ControlSignals::default());
    assert!(m.state().sim_playing);
}
