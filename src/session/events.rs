//! Session lifecycle events
//!
//! Each legal transition of a [`Session`](super::Session) is described by a
//! [`SessionEvent`]. Events are plain values: their fields are private and
//! there are no setters, so an event reads the same for its whole lifetime.
//! Events do not check business rules; the session applying them does.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Context, SessionId};

/// The transition an event records, with the fields relevant to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEventKind {
    /// Session begins; state becomes active
    Started {
        project: String,
        task: Option<String>,
    },
    /// Terminal transition
    Ended { outcome: String, duration: Duration },
    Paused,
    Resumed,
    /// Context merged; state unchanged
    ContextUpdated { updates: Context },
}

impl SessionEventKind {
    /// Stable name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Ended { .. } => "ended",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::ContextUpdated { .. } => "context_updated",
        }
    }
}

/// An immutable record of one session transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    session_id: SessionId,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    kind: SessionEventKind,
}

impl SessionEvent {
    fn now(session_id: SessionId, kind: SessionEventKind) -> Self {
        Self::at(session_id, Utc::now(), kind)
    }

    /// Build an event with an explicit timestamp, e.g. when importing
    /// transitions recorded elsewhere
    pub fn at(session_id: SessionId, timestamp: DateTime<Utc>, kind: SessionEventKind) -> Self {
        Self {
            session_id,
            timestamp,
            kind,
        }
    }

    pub fn started(session_id: SessionId, project: impl Into<String>, task: Option<String>) -> Self {
        Self::now(
            session_id,
            SessionEventKind::Started {
                project: project.into(),
                task,
            },
        )
    }

    pub fn ended(session_id: SessionId, outcome: impl Into<String>, duration: Duration) -> Self {
        Self::now(
            session_id,
            SessionEventKind::Ended {
                outcome: outcome.into(),
                duration,
            },
        )
    }

    pub fn paused(session_id: SessionId) -> Self {
        Self::now(session_id, SessionEventKind::Paused)
    }

    pub fn resumed(session_id: SessionId) -> Self {
        Self::now(session_id, SessionEventKind::Resumed)
    }

    pub fn context_updated(session_id: SessionId, updates: Context) -> Self {
        Self::now(session_id, SessionEventKind::ContextUpdated { updates })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// When the event was constructed
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> &SessionEventKind {
        &self.kind
    }

    /// Project of a `Started` event
    pub fn project(&self) -> Option<&str> {
        match &self.kind {
            SessionEventKind::Started { project, .. } => Some(project),
            _ => None,
        }
    }

    /// Task of a `Started` event
    pub fn task(&self) -> Option<&str> {
        match &self.kind {
            SessionEventKind::Started { task, .. } => task.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {}",
            self.session_id.short(),
            self.kind.name(),
            self.timestamp.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ContextValue;
    use chrono::Duration as TimeDelta;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sid(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[test]
    fn test_started_event_fields() {
        let before = Utc::now();
        let event = SessionEvent::started(sid("s1"), "flow-cli", Some("write docs".to_string()));
        let after = Utc::now();

        assert_eq!(event.session_id().as_str(), "s1");
        assert_eq!(event.project(), Some("flow-cli"));
        assert_eq!(event.task(), Some("write docs"));
        assert!(event.timestamp() >= before && event.timestamp() <= after);
        assert!(Utc::now() - event.timestamp() < TimeDelta::seconds(5));
    }

    #[test]
    fn test_variant_fields() {
        let ended = SessionEvent::ended(sid("s1"), "completed", Duration::from_secs(90));
        assert_eq!(
            ended.kind(),
            &SessionEventKind::Ended {
                outcome: "completed".to_string(),
                duration: Duration::from_secs(90)
            }
        );
        assert_eq!(ended.project(), None);

        assert_eq!(SessionEvent::paused(sid("s1")).kind(), &SessionEventKind::Paused);
        assert_eq!(SessionEvent::resumed(sid("s1")).kind(), &SessionEventKind::Resumed);

        let mut updates = Context::new();
        updates.insert("ticket".to_string(), ContextValue::from("FLOW-7"));
        let ctx = SessionEvent::context_updated(sid("s1"), updates.clone());
        assert_eq!(ctx.kind(), &SessionEventKind::ContextUpdated { updates });
        assert_eq!(ctx.kind().name(), "context_updated");
    }

    #[test]
    fn test_event_json_shape() {
        let event = SessionEvent::paused(sid("s1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "paused");
        assert_eq!(json["session_id"], "s1");

        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_display() {
        let event = SessionEvent::resumed(sid("abcdefghijkl"));
        assert!(event.to_string().starts_with("abcdefgh resumed at "));
    }

    proptest! {
        #[test]
        fn prop_started_reads_back_constructor_values(
            id in "[a-z0-9-]{1,36}",
            project in "[A-Za-z0-9 _-]{0,40}",
            task in proptest::option::of("[A-Za-z0-9 ]{0,40}"),
        ) {
            let event = SessionEvent::started(sid(&id), project.clone(), task.clone());
            let copy = event.clone();

            prop_assert_eq!(event.session_id().as_str(), id.as_str());
            prop_assert_eq!(event.project(), Some(project.as_str()));
            prop_assert_eq!(event.task(), task.as_deref());
            prop_assert_eq!(&copy, &event);
            prop_assert_eq!(copy.timestamp(), event.timestamp());
        }
    }
}
