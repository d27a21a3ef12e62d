// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only event trace for post-hoc debugging.
//!
//! One line per handled stage of each inbound event, written best-effort
//! to a rolling file in the system temp directory. Failures to append are
//! themselves recorded in a sibling `.err` file; tracing must never
//! affect event handling.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};

/// Fields identifying one inbound event in the trace.
#[derive(Debug, Default, Clone)]
pub struct TraceFields<'a> {
    pub event_id: &'a str,
    pub message_id: &'a str,
    pub chat_type: &'a str,
    pub open_id: &'a str,
}

/// Best-effort append-only trace writer.
#[derive(Debug, Clone)]
pub struct TraceWriter {
    log_path: PathBuf,
    err_path: PathBuf,
}

impl TraceWriter {
    /// Trace under the system temp directory (the default location).
    pub fn in_temp_dir() -> Self {
        let dir = std::env::temp_dir();
        Self {
            log_path: dir.join("larkbridge-event-trace.log"),
            err_path: dir.join("larkbridge-event-trace.err"),
        }
    }

    /// Trace at an explicit path (tests).
    pub fn at(log_path: PathBuf) -> Self {
        let err_path = log_path.with_extension("err");
        Self { log_path, err_path }
    }

    /// Appends one tagged line for an event. Never fails; IO errors land
    /// in the sibling error file.
    pub fn append(&self, tag: &str, fields: &TraceFields<'_>) {
        let mut line = String::new();
        let _ = write!(
            line,
            "{} pid={} tag={} event_id={} message_id={} chat_type={} open_id={}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            std::process::id(),
            tag,
            fields.event_id,
            fields.message_id,
            fields.chat_type,
            fields.open_id,
        );

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
        {
            Ok(mut file) => {
                let _ = file.write_all(line.as_bytes());
            }
            Err(open_err) => {
                let err_line = format!(
                    "{} open_error={open_err}\n",
                    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
                );
                let _ = std::fs::write(&self.err_path, err_line);
                let _ = std::fs::write(&self.log_path, line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_writes_tagged_lines() {
        let dir = tempdir().unwrap();
        let trace = TraceWriter::at(dir.path().join("trace.log"));

        let fields = TraceFields {
            event_id: "ev-1",
            message_id: "om-1",
            chat_type: "p2p",
            open_id: "ou-1",
        };
        trace.append("ws_recv", &fields);
        trace.append("handler_async", &fields);

        let content = std::fs::read_to_string(dir.path().join("trace.log")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("tag=ws_recv"));
        assert!(lines[0].contains("event_id=ev-1"));
        assert!(lines[0].contains("message_id=om-1"));
        assert!(lines[0].contains("chat_type=p2p"));
        assert!(lines[0].contains("open_id=ou-1"));
        assert!(lines[0].contains(&format!("pid={}", std::process::id())));
        assert!(lines[1].contains("tag=handler_async"));
    }

    #[test]
    fn append_never_panics_on_bad_path() {
        let trace = TraceWriter::at(PathBuf::from("/nonexistent-dir/trace.log"));
        trace.append("ws_recv", &TraceFields::default());
    }
}
