//! Writing event logs to files and terminals

use abp_protocol::{EventLog, LogFormat};
use std::io::{self, Write};

/// Line written between two runs in a trace file
pub const RUN_SEPARATOR: &str = "--";

/// Write one log, one entry per line, optionally preceded by a separator
pub fn write_log<W: Write>(
    out: &mut W,
    log: &EventLog,
    format: LogFormat,
    separator: bool,
) -> io::Result<()> {
    if separator {
        writeln!(out, "{}", RUN_SEPARATOR)?;
    }
    out.write_all(log.render(format).as_bytes())
}

/// Write both logs of a single run under headings
pub fn write_report<W: Write>(
    out: &mut W,
    sender_log: &EventLog,
    receiver_log: &EventLog,
    format: LogFormat,
) -> io::Result<()> {
    writeln!(out, "# Sender's log:")?;
    write_log(out, sender_log, format, false)?;
    writeln!(out)?;
    writeln!(out, "# Receiver's log:")?;
    write_log(out, receiver_log, format, false)?;
    out.flush()
}

/// Pick a log format from a timestamps flag
pub fn log_format(timestamps: bool) -> LogFormat {
    if timestamps {
        LogFormat::Timestamped
    } else {
        LogFormat::Plain
    }
}
