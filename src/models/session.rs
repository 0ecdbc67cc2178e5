use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Headline state of the external agent, as written by the focus utility.
/// Unknown tags from newer writers deserialize as `Idle`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    ApprovalNeeded,
}

impl Default for AgentStatus {
    fn default() -> Self {
        AgentStatus::Idle
    }
}

impl<'de> Deserialize<'de> for AgentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(match tag.as_str() {
            "working" => AgentStatus::Working,
            "approval_needed" => AgentStatus::ApprovalNeeded,
            _ => AgentStatus::Idle,
        })
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::ApprovalNeeded => "approval_needed",
        }
    }
}

/// App/title pair naming a window the user was in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowRef {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub title: String,
}

/// Contents of the global status file. A missing file, malformed JSON, or
/// missing fields all degrade to this type's default (idle, everything empty).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusSnapshot {
    pub status: AgentStatus,
    pub cursor_state: Option<String>,
    pub secondary_app: Option<String>,
    pub secondary_title: Option<String>,
    pub media_playing: bool,
}

/// One active session as read from the sessions file during a single poll.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    /// Title of the session's own editor window.
    pub title: String,
    /// The window the user was in when the record was last saved.
    pub secondary: WindowRef,
    pub status: AgentStatus,
    /// Rewritten by the external process on every save; drifts forward over
    /// the session's life. The reconciler pins the true start.
    pub saved_at: DateTime<Utc>,
}

/// A session paired with its reconciled start time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionOverview {
    pub record: SessionRecord,
    /// Earliest `saved_at` ever observed for this session id.
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: i64,
}

/// Snapshot published to the presentation side once per poll cycle.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SessionBoard {
    pub status: StatusSnapshot,
    pub sessions: Vec<SessionOverview>,
    /// `None` only before the first poll completes.
    pub generated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_status_parses_known_and_unknown_tags() {
        let working: AgentStatus = serde_json::from_str("\"working\"").unwrap();
        assert_eq!(working, AgentStatus::Working);

        let approval: AgentStatus = serde_json::from_str("\"approval_needed\"").unwrap();
        assert_eq!(approval, AgentStatus::ApprovalNeeded);

        let unknown: AgentStatus = serde_json::from_str("\"resting\"").unwrap();
        assert_eq!(unknown, AgentStatus::Idle);
    }

    #[test]
    fn status_snapshot_defaults_missing_fields() {
        let snapshot: StatusSnapshot =
            serde_json::from_str(r#"{"status":"working","timestamp":1754000000}"#).unwrap();

        assert_eq!(snapshot.status, AgentStatus::Working);
        assert_eq!(snapshot.secondary_app, None);
        assert!(!snapshot.media_playing);
    }
}
