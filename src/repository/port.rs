//! Session repository trait.
//!
//! Defines the storage contract the session layer depends on. Adapters
//! (JSON file, in-memory, a database) implement every method; there are no
//! default bodies, so a half-written adapter does not compile.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{RepositoryError, Result};
use crate::session::{Session, SessionId, SessionState};

/// An abstract repository for session persistence.
///
/// Lookups that find nothing return `Ok(None)` (or `Ok(false)` for
/// [`delete`](SessionRepository::delete)); `Err` is reserved for storage
/// failures and constraint violations.
///
/// # Active session uniqueness
///
/// Adapters must reject a `save` that would leave two sessions in the
/// [`SessionState::Active`] state with
/// [`RepositoryError::ActiveConflict`](crate::error::RepositoryError::ActiveConflict).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Finds the session currently in the active state, if any.
    async fn find_active(&self) -> Result<Option<Session>>;

    /// Lists every session of a project, oldest first.
    async fn find_by_project(&self, project: &str) -> Result<Vec<Session>>;

    /// Creates or updates a session keyed by its ID.
    ///
    /// # Returns
    ///
    /// The session as persisted.
    async fn save(&self, session: &Session) -> Result<Session>;

    /// Deletes a session.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: a record was removed
    /// - `Ok(false)`: no record with that ID existed
    async fn delete(&self, id: &SessionId) -> Result<bool>;

    /// Lists sessions matching the filter, sorted and limited per the filter.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>>;

    /// Counts sessions matching the filter. `limit` is ignored.
    async fn count(&self, filter: &SessionFilter) -> Result<usize>;

    /// Sessions whose start time falls within `[start, end]`, oldest first.
    async fn find_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>>;
}

/// Field used to order [`SessionRepository::list`] results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    StartTime,
    Duration,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "start-time" | "start" => Ok(Self::StartTime),
            "duration" => Ok(Self::Duration),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartTime => write!(f, "start-time"),
            Self::Duration => write!(f, "duration"),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// Filter options shared by [`SessionRepository::list`] and
/// [`SessionRepository::count`]
///
/// Every constraint is optional; `since` and `until` bound the start time
/// inclusively. Defaults to newest first with no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub state: Option<SessionState>,
    pub project: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub order_by: SortField,
    pub order: SortOrder,
}

impl SessionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: SessionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.order_by = field;
        self.order = order;
        self
    }

    /// Check the non-paging constraints against one session
    pub fn matches(&self, session: &Session) -> bool {
        self.state.is_none_or(|s| session.state() == s)
            && self.project.as_deref().is_none_or(|p| session.project() == p)
            && self.since.is_none_or(|t| session.start_time() >= t)
            && self.until.is_none_or(|t| session.start_time() <= t)
    }

    /// Filter, sort and limit a set of sessions
    ///
    /// Adapters that hold sessions in memory use this so they all agree on
    /// ordering. Sessions without a duration sort before those with one in
    /// ascending duration order; ties fall back to start time, then ID.
    pub fn select<I>(&self, sessions: I) -> Vec<Session>
    where
        I: IntoIterator<Item = Session>,
    {
        let mut selected: Vec<Session> = sessions.into_iter().filter(|s| self.matches(s)).collect();

        selected.sort_by(|a, b| {
            let primary = match self.order_by {
                SortField::StartTime => a.start_time().cmp(&b.start_time()),
                SortField::Duration => a.duration().cmp(&b.duration()),
            };
            let ordering = primary
                .then_with(|| a.start_time().cmp(&b.start_time()))
                .then_with(|| a.id().cmp(b.id()));
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }

    /// The same filter without a limit, as used by `count`
    pub fn unlimited(&self) -> Self {
        Self {
            limit: None,
            ..self.clone()
        }
    }
}

/// Order sessions oldest first
pub(crate) fn by_start_time(a: &Session, b: &Session) -> Ordering {
    a.start_time()
        .cmp(&b.start_time())
        .then_with(|| a.id().cmp(b.id()))
}

/// Reject saving `session` as active while a different session is active
pub(crate) fn check_active_conflict<'a>(
    existing: impl IntoIterator<Item = &'a Session>,
    session: &Session,
) -> std::result::Result<(), RepositoryError> {
    if session.state() != SessionState::Active {
        return Ok(());
    }
    match existing
        .into_iter()
        .find(|s| s.state() == SessionState::Active && s.id() != session.id())
    {
        Some(active) => Err(RepositoryError::ActiveConflict {
            existing: active.id().clone(),
            incoming: session.id().clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionEvent, SessionEventKind};
    use chrono::Duration as TimeDelta;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn session_at(id: &str, project: &str, at: DateTime<Utc>) -> Session {
        let event = SessionEvent::at(
            SessionId::parse(id).unwrap(),
            at,
            SessionEventKind::Started {
                project: project.to_string(),
                task: None,
            },
        );
        Session::open(&event).unwrap()
    }

    fn ended(mut session: Session, minutes: u64) -> Session {
        let at = session.start_time() + TimeDelta::minutes(minutes as i64);
        let event = SessionEvent::at(
            session.id().clone(),
            at,
            SessionEventKind::Ended {
                outcome: "completed".to_string(),
                duration: Duration::from_secs(minutes * 60),
            },
        );
        session.apply(&event).unwrap();
        session
    }

    fn ids(sessions: &[Session]) -> Vec<&str> {
        sessions.iter().map(|s| s.id().as_str()).collect()
    }

    fn fixture() -> Vec<Session> {
        let t0 = Utc::now() - TimeDelta::days(3);
        vec![
            ended(session_at("a", "alpha", t0), 30),
            ended(session_at("b", "beta", t0 + TimeDelta::days(1)), 10),
            session_at("c", "alpha", t0 + TimeDelta::days(2)),
        ]
    }

    #[test]
    fn test_default_is_newest_first() {
        let filter = SessionFilter::new();
        assert_eq!(ids(&filter.select(fixture())), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_filters_combine() {
        let filter = SessionFilter::new()
            .project("alpha")
            .state(SessionState::Ended);
        assert_eq!(ids(&filter.select(fixture())), vec!["a"]);
    }

    #[test]
    fn test_since_until_are_inclusive() {
        let sessions = fixture();
        let filter = SessionFilter::new()
            .since(sessions[1].start_time())
            .until(sessions[2].start_time())
            .order_by(SortField::StartTime, SortOrder::Asc);
        assert_eq!(ids(&filter.select(sessions)), vec!["b", "c"]);
    }

    #[test]
    fn test_sort_by_duration() {
        let asc = SessionFilter::new().order_by(SortField::Duration, SortOrder::Asc);
        assert_eq!(ids(&asc.select(fixture())), vec!["c", "b", "a"]);

        let desc = SessionFilter::new()
            .order_by(SortField::Duration, SortOrder::Desc)
            .limit(2);
        assert_eq!(ids(&desc.select(fixture())), vec!["a", "b"]);
    }

    #[test]
    fn test_unlimited_drops_limit_only() {
        let filter = SessionFilter::new().project("alpha").limit(1);
        let unlimited = filter.unlimited();
        assert_eq!(unlimited.limit, None);
        assert_eq!(unlimited.project.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_parse_sort_options() {
        assert_eq!("start_time".parse::<SortField>(), Ok(SortField::StartTime));
        assert_eq!("Duration".parse::<SortField>(), Ok(SortField::Duration));
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_check_active_conflict() {
        let stored = fixture();
        let now = Utc::now();

        // "c" is the stored active session; re-saving it is fine
        assert!(check_active_conflict(&stored, &stored[2]).is_ok());
        assert!(check_active_conflict(&stored, &ended(session_at("d", "beta", now), 5)).is_ok());

        match check_active_conflict(&stored, &session_at("d", "beta", now)) {
            Err(RepositoryError::ActiveConflict { existing, incoming }) => {
                assert_eq!(existing.as_str(), "c");
                assert_eq!(incoming.as_str(), "d");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}
