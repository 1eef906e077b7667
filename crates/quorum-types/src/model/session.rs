//! Survey-taking sessions.
//!
//! # State Machine
//!
//! ```text
//! NotStarted ──► InProgress ──► Completed
//!     │              │
//!     ├──────────────┼────────► Abandoned
//!     └──────────────┴────────► Expired
//! ```
//!
//! Transitions are one-way. No state returns to `NotStarted` and the three
//! terminal states are final.

use super::{Entity, EntityKind};
use crate::{IdentityId, SessionId, SurveyId, TenantId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
    Expired,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
            Self::Expired => "EXPIRED",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned | Self::Expired)
    }

    /// Returns `true` if `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (NotStarted, InProgress | Abandoned | Expired)
                | (InProgress, Completed | Abandoned | Expired)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal session state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session cannot move from {from} to {to}")]
pub struct IllegalTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub survey_id: SurveyId,
    pub tenant_id: TenantId,
    /// `None` for anonymous respondents.
    #[serde(default)]
    pub identity_id: Option<IdentityId>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub answered: u32,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(
        survey_id: SurveyId,
        tenant_id: TenantId,
        identity_id: Option<IdentityId>,
        total_questions: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            survey_id,
            tenant_id,
            identity_id,
            status: SessionStatus::NotStarted,
            answered: 0,
            total_questions,
            started_at: None,
            last_activity_at: now,
            completed_at: None,
            created_at: now,
        }
    }

    /// Progress in whole percent, capped at 100.
    ///
    /// A survey with no questions reports 0 until explicitly completed.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.total_questions == 0 {
            return if self.status == SessionStatus::Completed { 100 } else { 0 };
        }
        let pct = u64::from(self.answered) * 100 / u64::from(self.total_questions);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }

    /// Returns `true` if the session may still accept answers.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Returns `true` if the inactivity deadline has passed at `now`.
    #[must_use]
    pub fn is_past_deadline(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now - self.last_activity_at > timeout
    }

    /// Applies a status change, enforcing the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] for backwards or post-terminal moves.
    pub fn transition(
        &mut self,
        next: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), IllegalTransition> {
        if !self.status.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        if next == SessionStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next == SessionStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = next;
        self.last_activity_at = now;
        Ok(())
    }

    /// Records `answered` answers and advances the state machine.
    ///
    /// The first answer moves a fresh session to `InProgress`; reaching
    /// 100% completes it.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if the session is already terminal.
    pub fn record_progress(
        &mut self,
        answered: u32,
        now: DateTime<Utc>,
    ) -> Result<(), IllegalTransition> {
        if self.status.is_terminal() {
            return Err(IllegalTransition {
                from: self.status,
                to: SessionStatus::InProgress,
            });
        }
        if self.status == SessionStatus::NotStarted {
            self.transition(SessionStatus::InProgress, now)?;
        }
        // Progress never moves backwards.
        self.answered = self.answered.max(answered.min(self.total_questions));
        self.last_activity_at = now;
        if self.total_questions > 0 && self.answered >= self.total_questions {
            self.transition(SessionStatus::Completed, now)?;
        }
        Ok(())
    }
}

impl Entity for Session {
    type Id = SessionId;
    const KIND: EntityKind = EntityKind::Session;

    fn id(&self) -> SessionId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total: u32) -> Session {
        Session::new(SurveyId::new(), TenantId::new(), None, total)
    }

    #[test]
    fn transitions_are_one_way() {
        use SessionStatus::*;
        let all = [NotStarted, InProgress, Completed, Abandoned, Expired];
        for to in all {
            assert!(!to.can_transition_to(NotStarted));
        }
        for from in [Completed, Abandoned, Expired] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(NotStarted.can_transition_to(InProgress));
        assert!(!NotStarted.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(InProgress));
    }

    #[test]
    fn progress_completes_at_hundred_percent() {
        let now = Utc::now();
        let mut s = session(2);
        s.record_progress(1, now).unwrap();
        assert_eq!(s.status, SessionStatus::InProgress);
        assert_eq!(s.progress_percent(), 50);
        assert!(s.started_at.is_some());

        s.record_progress(2, now).unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.progress_percent(), 100);
        assert!(s.completed_at.is_some());

        assert!(s.record_progress(2, now).is_err());
    }

    #[test]
    fn progress_does_not_regress_or_overflow() {
        let now = Utc::now();
        let mut s = session(4);
        s.record_progress(3, now).unwrap();
        s.record_progress(1, now).unwrap();
        assert_eq!(s.answered, 3);
        s.record_progress(99, now).unwrap();
        assert_eq!(s.answered, 4);
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[test]
    fn deadline_detection() {
        let mut s = session(3);
        let later = s.last_activity_at + Duration::minutes(31);
        assert!(s.is_past_deadline(Duration::minutes(30), later));
        assert!(!s.is_past_deadline(Duration::minutes(60), later));
        s.transition(SessionStatus::Abandoned, later).unwrap();
        assert!(!s.is_past_deadline(Duration::minutes(30), later + Duration::days(1)));
    }
}
