//! Core session types
//!
//! Defines the session aggregate and its value types:
//! - `SessionId` identifies a session
//! - `Session` is the aggregate, mutated only by applying `SessionEvent`s
//! - `ContextValue` is the closed set of values a session context can hold

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{SessionEvent, SessionEventKind};
use crate::error::SessionError;

/// Unique identifier for a session
///
/// Opaque non-empty text; freshly created sessions get a UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse an existing ID, rejecting empty input
    pub fn parse(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for compact display
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Work is in progress
    Active,
    /// Work is on hold and can be resumed
    Paused,
    /// Terminal state
    Ended,
}

impl SessionState {
    /// Check if the session can be paused
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the session can be resumed
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Check if the session can still change (end, context updates)
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "ended" => Ok(Self::Ended),
            other => Err(format!("unknown session state '{}'", other)),
        }
    }
}

/// A value stored in a session's context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    String(String),
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl FromStr for ContextValue {
    type Err = std::convert::Infallible;

    /// Infer the value kind from CLI text: booleans, numbers and RFC 3339
    /// timestamps are recognized, everything else is kept as a string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => {
                if let Some(n) = s.parse::<f64>().ok().filter(|n| n.is_finite()) {
                    Self::Number(n)
                } else if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                    Self::Timestamp(ts.with_timezone(&Utc))
                } else {
                    Self::String(s.to_string())
                }
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for ContextValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Key-value context attached to a session
pub type Context = BTreeMap<String, ContextValue>;

/// A tracked unit of work
///
/// Fields are read through accessors. The only way to change a session is
/// to apply a [`SessionEvent`], which checks that the transition is legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    project: String,
    #[serde(default)]
    task: Option<String>,
    state: SessionState,
    start_time: DateTime<Utc>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    duration: Option<Duration>,
    #[serde(default)]
    outcome: Option<String>,
    /// When the current pause began
    #[serde(default)]
    paused_at: Option<DateTime<Utc>>,
    /// Sum of completed pauses
    #[serde(default)]
    paused_total: Duration,
    #[serde(default)]
    context: Context,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session, returning it with the `Started` event it emitted
    pub fn start(
        id: SessionId,
        project: impl Into<String>,
        task: Option<String>,
    ) -> (Self, SessionEvent) {
        let project = project.into();
        let event = SessionEvent::started(id.clone(), project.clone(), task.clone());
        let session = Self::new_active(id, project, task, event.timestamp());
        (session, event)
    }

    /// Build a session from a previously recorded `Started` event
    pub fn open(event: &SessionEvent) -> Result<Self, SessionError> {
        match event.kind() {
            SessionEventKind::Started { project, task } => Ok(Self::new_active(
                event.session_id().clone(),
                project.clone(),
                task.clone(),
                event.timestamp(),
            )),
            other => Err(SessionError::NotAStartEvent(other.name())),
        }
    }

    fn new_active(
        id: SessionId,
        project: String,
        task: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project,
            task,
            state: SessionState::Active,
            start_time: at,
            end_time: None,
            duration: None,
            outcome: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            context: Context::new(),
            updated_at: at,
        }
    }

    /// Pause an active session
    pub fn pause(&mut self) -> Result<SessionEvent, SessionError> {
        let event = SessionEvent::paused(self.id.clone());
        self.apply(&event)?;
        Ok(event)
    }

    /// Resume a paused session
    pub fn resume(&mut self) -> Result<SessionEvent, SessionError> {
        let event = SessionEvent::resumed(self.id.clone());
        self.apply(&event)?;
        Ok(event)
    }

    /// End the session; the recorded duration excludes paused time
    pub fn end(&mut self, outcome: impl Into<String>) -> Result<SessionEvent, SessionError> {
        let duration = self.elapsed(Utc::now());
        let event = SessionEvent::ended(self.id.clone(), outcome, duration);
        self.apply(&event)?;
        Ok(event)
    }

    /// Merge entries into the session context
    pub fn update_context(&mut self, updates: Context) -> Result<SessionEvent, SessionError> {
        let event = SessionEvent::context_updated(self.id.clone(), updates);
        self.apply(&event)?;
        Ok(event)
    }

    /// Apply a transition event
    ///
    /// Illegal transitions leave the session untouched and return
    /// [`SessionError::InvalidTransition`].
    pub fn apply(&mut self, event: &SessionEvent) -> Result<(), SessionError> {
        if event.session_id() != &self.id {
            return Err(SessionError::EventMismatch {
                session: self.id.clone(),
                event: event.session_id().clone(),
            });
        }

        let at = event.timestamp();
        match event.kind() {
            SessionEventKind::Started { .. } => return Err(self.reject(event)),
            SessionEventKind::Paused => {
                if !self.state.can_pause() {
                    return Err(self.reject(event));
                }
                self.state = SessionState::Paused;
                self.paused_at = Some(at);
            }
            SessionEventKind::Resumed => {
                if !self.state.can_resume() {
                    return Err(self.reject(event));
                }
                self.close_pause(at);
                self.state = SessionState::Active;
            }
            SessionEventKind::Ended { outcome, duration } => {
                if !self.state.is_open() {
                    return Err(self.reject(event));
                }
                self.close_pause(at);
                self.state = SessionState::Ended;
                self.end_time = Some(at);
                self.duration = Some(*duration);
                self.outcome = Some(outcome.clone());
            }
            SessionEventKind::ContextUpdated { updates } => {
                if !self.state.is_open() {
                    return Err(self.reject(event));
                }
                self.context
                    .extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        self.updated_at = at;
        Ok(())
    }

    fn reject(&self, event: &SessionEvent) -> SessionError {
        SessionError::InvalidTransition {
            id: self.id.clone(),
            state: self.state,
            event: event.kind().name(),
        }
    }

    fn close_pause(&mut self, at: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += (at - paused_at).to_std().unwrap_or_default();
        }
    }

    /// Worked time up to `now`, excluding pauses
    ///
    /// Ended sessions report their recorded duration.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        if let Some(duration) = self.duration {
            return duration;
        }

        let gross = (now - self.start_time).to_std().unwrap_or_default();
        let open_pause = self
            .paused_at
            .map(|p| (now - p).to_std().unwrap_or_default())
            .unwrap_or_default();

        gross
            .saturating_sub(self.paused_total)
            .saturating_sub(open_pause)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn outcome(&self) -> Option<&str> {
        self.outcome.as_deref()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Format a duration as `1h 05m 03s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use pretty_assertions::assert_eq;

    fn sid(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    fn started_at(id: &str, at: DateTime<Utc>) -> Session {
        let event = SessionEvent::at(
            sid(id),
            at,
            SessionEventKind::Started {
                project: "flow-cli".to_string(),
                task: Some("write docs".to_string()),
            },
        );
        Session::open(&event).unwrap()
    }

    #[test]
    fn test_session_id_rejects_empty() {
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("   ").is_err());
        assert_eq!(sid("s1").as_str(), "s1");
    }

    #[test]
    fn test_session_id_deserialize_validates() {
        let id: SessionId = serde_json::from_str("\"s1\"").unwrap();
        assert_eq!(id, sid("s1"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"s1\"");

        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());

        let session = started_at("s1", Utc::now());
        let mut value = serde_json::to_value(&session).unwrap();
        value["id"] = serde_json::Value::String(String::new());
        assert!(serde_json::from_value::<Session>(value).is_err());
    }

    #[test]
    fn test_session_id_short() {
        let id = SessionId::new();
        assert_eq!(id.short().len(), 8);
        assert_eq!(sid("s1").short(), "s1");
    }

    #[test]
    fn test_session_state_transitions() {
        assert!(SessionState::Active.can_pause());
        assert!(!SessionState::Active.can_resume());
        assert!(SessionState::Paused.can_resume());
        assert!(!SessionState::Paused.can_pause());
        assert!(!SessionState::Ended.is_open());
        assert_eq!("PAUSED".parse::<SessionState>(), Ok(SessionState::Paused));
    }

    #[test]
    fn test_start_emits_started_event() {
        let (session, event) = Session::start(sid("s1"), "flow-cli", Some("write docs".into()));

        assert_eq!(session.id(), &sid("s1"));
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.start_time(), event.timestamp());
        assert_eq!(event.kind().name(), "started");
        assert!(session.end_time().is_none());
    }

    #[test]
    fn test_open_rejects_non_start_event() {
        let err = Session::open(&SessionEvent::paused(sid("s1"))).unwrap_err();
        assert!(matches!(err, SessionError::NotAStartEvent("paused")));
    }

    #[test]
    fn test_pause_resume_end_cycle() {
        let (mut session, _) = Session::start(sid("s1"), "flow-cli", None);

        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);

        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Active);

        let event = session.end("completed").unwrap();
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.outcome(), Some("completed"));
        assert_eq!(session.end_time(), Some(event.timestamp()));
        assert!(session.duration().is_some());
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let (mut session, _) = Session::start(sid("s1"), "flow-cli", None);

        assert!(matches!(
            session.resume(),
            Err(SessionError::InvalidTransition { event: "resumed", .. })
        ));

        session.end("done").unwrap();
        let before = session.clone();

        assert!(session.end("again").is_err());
        assert!(session.pause().is_err());
        assert!(session.update_context(Context::new()).is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn test_apply_rejects_foreign_event() {
        let (mut session, _) = Session::start(sid("s1"), "flow-cli", None);
        let err = session.apply(&SessionEvent::paused(sid("s2"))).unwrap_err();
        assert!(matches!(err, SessionError::EventMismatch { .. }));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_elapsed_excludes_pauses() {
        let t0 = Utc::now() - TimeDelta::hours(2);
        let mut session = started_at("s1", t0);

        session
            .apply(&SessionEvent::at(sid("s1"), t0 + TimeDelta::minutes(30), SessionEventKind::Paused))
            .unwrap();
        session
            .apply(&SessionEvent::at(sid("s1"), t0 + TimeDelta::minutes(50), SessionEventKind::Resumed))
            .unwrap();

        let worked = session.elapsed(t0 + TimeDelta::minutes(60));
        assert_eq!(worked, Duration::from_secs(40 * 60));
    }

    #[test]
    fn test_elapsed_while_paused_is_frozen() {
        let t0 = Utc::now() - TimeDelta::hours(1);
        let mut session = started_at("s1", t0);
        session
            .apply(&SessionEvent::at(sid("s1"), t0 + TimeDelta::minutes(10), SessionEventKind::Paused))
            .unwrap();

        assert_eq!(
            session.elapsed(t0 + TimeDelta::minutes(45)),
            Duration::from_secs(10 * 60)
        );
    }

    #[test]
    fn test_context_updates_merge() {
        let (mut session, _) = Session::start(sid("s1"), "flow-cli", None);

        let mut first = Context::new();
        first.insert("ticket".into(), "FLOW-1".into());
        first.insert("focus".into(), true.into());
        session.update_context(first).unwrap();

        let mut second = Context::new();
        second.insert("ticket".into(), "FLOW-2".into());
        session.update_context(second).unwrap();

        assert_eq!(session.context().len(), 2);
        assert_eq!(session.context()["ticket"], ContextValue::from("FLOW-2"));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_context_value_inference() {
        assert_eq!("true".parse::<ContextValue>(), Ok(ContextValue::Bool(true)));
        assert_eq!("42".parse::<ContextValue>(), Ok(ContextValue::Number(42.0)));
        assert_eq!("NaN".parse::<ContextValue>(), Ok(ContextValue::from("NaN")));
        assert!(matches!(
            "2026-01-02T03:04:05Z".parse::<ContextValue>(),
            Ok(ContextValue::Timestamp(_))
        ));
        assert_eq!("hello".parse::<ContextValue>(), Ok(ContextValue::from("hello")));
    }

    #[test]
    fn test_session_serialization_roundtrip() {
        let (mut session, _) = Session::start(sid("s1"), "flow-cli", Some("task".into()));
        let mut ctx = Context::new();
        ctx.insert("points".into(), 3.0.into());
        session.update_context(ctx).unwrap();

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"state\":\"active\""));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
