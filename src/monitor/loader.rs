use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::models::{AgentStatus, SessionRecord, StatusSnapshot, WindowRef};

/// Session ids carrying this suffix are internal sub-records written around
/// shell executions, not sessions of their own.
const SHELL_SUFFIX: &str = "_shell";

/// Records whose `saved_at` is at least this old are considered dead.
const STALE_AFTER_SECS: i64 = 3600;

/// Raw on-disk shape of one sessions-file entry. Every field is optional;
/// the writer has changed shape over time.
#[derive(Debug, Deserialize)]
struct RawSessionEntry {
    #[serde(default)]
    saved_at: Option<String>,
    #[serde(default)]
    cursor_window: Option<WindowRef>,
    #[serde(default)]
    saved_window: Option<WindowRef>,
    #[serde(default)]
    status: Option<AgentStatus>,
}

/// Reads the status and sessions files maintained by the external focus
/// utility. All failure modes degrade to "nothing is happening" rather than
/// surfacing errors to the poll loop.
pub struct SessionLoader {
    status_path: PathBuf,
    sessions_path: PathBuf,
}

impl SessionLoader {
    pub fn new(status_path: PathBuf, sessions_path: PathBuf) -> Self {
        Self {
            status_path,
            sessions_path,
        }
    }

    /// Global status snapshot; missing or malformed input yields the idle
    /// default.
    pub fn load_status(&self) -> StatusSnapshot {
        match fs::read_to_string(&self.status_path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => StatusSnapshot::default(),
        }
    }

    /// Currently active session records.
    pub fn load_active(&self, now: DateTime<Utc>) -> Vec<SessionRecord> {
        match fs::read_to_string(&self.sessions_path) {
            Ok(contents) => parse_sessions(&contents, now),
            Err(_) => Vec::new(),
        }
    }
}

/// Parse the sessions file, dropping `_shell` sub-records and stale entries.
pub fn parse_sessions(json: &str, now: DateTime<Utc>) -> Vec<SessionRecord> {
    let entries: BTreeMap<String, RawSessionEntry> = match serde_json::from_str(json) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("sessions file unreadable, treating as empty: {err}");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter(|(id, _)| !id.ends_with(SHELL_SUFFIX))
        .filter_map(|(id, raw)| {
            let saved_at = match raw.saved_at.as_deref() {
                Some(text) => parse_saved_at(text).unwrap_or_else(|| {
                    // Lossy fallback: better a session with a reset clock
                    // than a dropped one.
                    warn!("unparseable saved_at {text:?} for session {id}; substituting now");
                    now
                }),
                None => now,
            };

            if (now - saved_at).num_seconds() >= STALE_AFTER_SECS {
                return None;
            }

            Some(SessionRecord {
                id,
                title: raw.cursor_window.map(|w| w.title).unwrap_or_default(),
                secondary: raw.saved_window.unwrap_or_default(),
                status: raw.status.unwrap_or(AgentStatus::Working),
                saved_at,
            })
        })
        .collect()
}

/// The writing side has emitted at least three timestamp encodings over its
/// life; try each before giving up.
pub fn parse_saved_at(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ") {
        return Some(naive.and_utc());
    }
    if let Ok(fixed) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.9f%z") {
        return Some(fixed.with_timezone(&Utc));
    }
    None
}
