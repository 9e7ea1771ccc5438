//! End-to-end emulator runs
//!
//! Runs both endpoints on their own engine threads. Timing varies between
//! runs, so these tests check log shapes rather than exact contents.

use abp::{emulate, emulate_with, EmulatorConfig, EmulatorError, Event, EventLog, Tag};
use abp_emulator::ConfigError;
use std::time::Duration;

fn acks_received(log: &EventLog) -> usize {
    log.count(Event::AckReceived(Tag::A0)) + log.count(Event::AckReceived(Tag::A1))
}

fn acks_sent(log: &EventLog) -> usize {
    log.count(Event::AckSent(Tag::A0)) + log.count(Event::AckSent(Tag::A1))
}

fn own_slots_strictly_increase(log: &EventLog) -> bool {
    let owner = log.owner();
    log.entries()
        .windows(2)
        .all(|w| w[0].timestamp.get(owner) < w[1].timestamp.get(owner))
}

#[test]
fn test_rejects_non_positive_config() {
    assert!(matches!(
        emulate(0.0, 1.0),
        Err(EmulatorError::Config(ConfigError::NonPositiveTimeout(_)))
    ));
    assert!(matches!(
        emulate(1.0, 0.0),
        Err(EmulatorError::Config(ConfigError::NonPositiveDuration(_)))
    ));
    assert!(matches!(
        emulate(-0.5, 1.0),
        Err(EmulatorError::Config(ConfigError::NonPositiveTimeout(_)))
    ));
    assert!(matches!(
        emulate(0.5, f64::NAN),
        Err(EmulatorError::Config(ConfigError::NonPositiveDuration(_)))
    ));
}

#[test]
fn test_long_timeout_runs_clean_rounds() {
    let config = EmulatorConfig::from_secs(10.0, 0.2)
        .unwrap()
        .with_tick(Duration::from_millis(1));
    let report = emulate_with(&config).unwrap();

    let sender = report.sender_log.labels();
    let receiver = report.receiver_log.labels();
    assert_eq!(&sender[..2], ["send_m", "M!m0"]);
    assert_eq!(&receiver[..3], ["M?m0", "recv_m", "A!a0"]);

    // Nothing times out, so both logs follow the two-round cycle exactly
    let sender_cycle = ["send_m", "M!m0", "A?a0", "send_m", "M!m1", "A?a1"];
    let receiver_cycle = ["M?m0", "recv_m", "A!a0", "M?m1", "recv_m", "A!a1"];
    for (i, label) in sender.iter().enumerate() {
        assert_eq!(label, sender_cycle[i % 6]);
    }
    for (i, label) in receiver.iter().enumerate() {
        assert_eq!(label, receiver_cycle[i % 6]);
    }
    assert_eq!(sender.len(), receiver.len());
    assert_eq!(sender.len() % 3, 0);
    assert_eq!(report.sender_stats.timeouts, 0);
    assert_eq!(report.receiver_stats.duplicates, 0);
}

#[test]
fn test_late_receiver_forces_retransmission() {
    let config = EmulatorConfig::from_secs(0.01, 0.2)
        .unwrap()
        .with_receiver_start_delay(Duration::from_millis(50));
    let report = emulate_with(&config).unwrap();
    let sender = report.sender_log.labels();

    let first_ack = sender
        .iter()
        .position(|l| l == "A?a0")
        .expect("sender never saw a0");
    let before_ack = &sender[..first_ack];
    let first_timeout = before_ack
        .iter()
        .position(|l| l == "timeout")
        .expect("no timeout before the first ack");
    assert!(before_ack[first_timeout..].iter().any(|l| l == "M!m0"));

    assert!(report.sender_stats.retransmissions >= 1);
    assert!(report.receiver_stats.duplicates >= 1);
    assert_eq!(
        report.sender_log.count(Event::SendM),
        report.receiver_log.count(Event::RecvM)
    );
}

#[test]
fn test_shutdown_leaves_nothing_in_flight() {
    let config = EmulatorConfig::from_secs(0.005, 0.1)
        .unwrap()
        .with_tick(Duration::ZERO);
    let report = emulate_with(&config).unwrap();

    assert!(!report.sender_engine.running);
    assert!(!report.receiver_engine.running);
    assert!(matches!(report.sender_engine.state, 0 | 3));
    assert!(matches!(report.receiver_engine.state, 0 | 3));

    // Every ack the receiver sent shows up in the sender's log
    assert_eq!(
        acks_received(&report.sender_log),
        acks_sent(&report.receiver_log)
    );
    if let Some(last) = report.sender_log.last() {
        assert!(matches!(last.event, Event::AckReceived(_)));
    }
    assert_eq!(
        report.sender_log.count(Event::SendM),
        report.receiver_log.count(Event::RecvM)
    );
    assert!(report.elapsed < Duration::from_secs(5));
}

#[test]
fn test_logs_are_causally_consistent() {
    let (sender_log, receiver_log) = emulate(0.01, 0.1).unwrap();

    assert!(own_slots_strictly_increase(&sender_log));
    assert!(own_slots_strictly_increase(&receiver_log));

    // Every logged reception follows some transmission of the same tag
    for entry in receiver_log.iter() {
        if let Event::DataReceived(tag) = entry.event {
            assert!(sender_log.iter().any(|s| {
                s.event == Event::DataSent(tag) && s.timestamp.happens_before(&entry.timestamp)
            }));
        }
    }
}
