//! Append-only JSONL event log, timestamps and plan ids.

use super::TraceEvent;
use crate::core::error::Result;
use std::io::{BufRead, Write};
use std::path::Path;

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Generate a fresh plan id.
pub fn generate_plan_id() -> String {
    format!("plan-{}", uuid::Uuid::new_v4())
}

/// Append events to a JSONL file, one object per line. Creates parent dirs.
pub fn append_events(path: &Path, events: &[TraceEvent]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    for event in events {
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
    }

    Ok(())
}

/// Read back every event from a JSONL file. Blank lines are skipped.
pub fn read_events(path: &Path) -> Result<Vec<TraceEvent>> {
    let file = std::fs::File::open(path)?;
    let mut events = Vec::new();
    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}
