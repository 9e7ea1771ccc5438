//! Statistics display and formatting

use abp_emulator::RunReport;
use std::time::Duration;

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if micros >= 1_000 {
        format!("{:.2}ms", micros as f64 / 1_000.0)
    } else {
        format!("{}µs", micros)
    }
}

/// Compact one-line summary of a run
pub fn format_run_summary(report: &RunReport) -> String {
    let s = &report.sender_stats;
    let r = &report.receiver_stats;
    format!(
        "units={} tx={} retx={} timeouts={} acks={} stale_acks={} | delivered={} dup={} acks_sent={} | trailing_acks={} elapsed={}",
        s.units_generated,
        s.transmissions,
        s.retransmissions,
        s.timeouts,
        s.acks_received,
        s.stale_acks,
        r.delivered,
        r.duplicates,
        r.acks_sent,
        report.trailing_acks,
        format_duration(report.elapsed),
    )
}

/// Log run statistics at debug level
pub fn display_run_stats(report: &RunReport) {
    tracing::debug!(
        steps = report.sender_engine.steps,
        state = report.sender_engine.state,
        "Sender engine"
    );
    tracing::debug!(
        steps = report.receiver_engine.steps,
        state = report.receiver_engine.state,
        "Receiver engine"
    );
    tracing::debug!("{}", format_run_summary(report));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(500)), "500µs");
        assert_eq!(format_duration(Duration::from_micros(1_500)), "1.50ms");
        assert_eq!(format_duration(Duration::from_millis(2_250)), "2.25s");
    }

    #[test]
    fn test_run_summary_mentions_counters() {
        let config = abp_emulator::EmulatorConfig::from_secs(10.0, 0.02)
            .unwrap()
            .with_tick(Duration::from_millis(1));
        let report = abp_emulator::emulate_with(&config).unwrap();
        let summary = format_run_summary(&report);

        assert!(summary.starts_with(&format!(
            "units={}",
            report.sender_stats.units_generated
        )));
        assert!(summary.contains(&format!("delivered={}", report.receiver_stats.delivered)));
    }
}
