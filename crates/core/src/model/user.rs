use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::UserId;
use crate::model::level::LanguageLevel;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserValidationError {
    #[error("full name cannot be empty")]
    NameEmpty,

    #[error("email address {provided:?} is not usable")]
    EmailInvalid { provided: String },

    #[error("a test cannot start at {level}")]
    StartLevelNotTestable { level: LanguageLevel },
}

/// A cursor move that breaks the single-open-batch bookkeeping.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CursorError {
    #[error("a batch must contain at least one step")]
    EmptyBatch,

    #[error("cannot open a batch while steps {current}..={end} are still pending")]
    BatchStillOpen { current: u32, end: u32 },

    #[error("no batch is open")]
    NoOpenBatch,

    #[error("already at the last step of the batch ({end})")]
    AtBatchEnd { end: u32 },
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// Registration input before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub full_name: String,
    pub start_level: LanguageLevel,
}

impl UserDraft {
    /// Checks the registration fields.
    ///
    /// The email check is deliberately shallow: one `@` with something on
    /// both sides. Deliverability is someone else's problem; storing
    /// garbage that can never be contacted is ours.
    ///
    /// # Errors
    ///
    /// Returns `UserValidationError` for a blank name, an unusable email,
    /// or a start level outside the testable ladder.
    pub fn validate(
        self,
        public_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ValidatedUser, UserValidationError> {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            return Err(UserValidationError::NameEmpty);
        }

        let email = self.email.trim();
        let usable = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !usable {
            return Err(UserValidationError::EmailInvalid {
                provided: self.email.clone(),
            });
        }

        if !self.start_level.is_testable() {
            return Err(UserValidationError::StartLevelNotTestable {
                level: self.start_level,
            });
        }

        Ok(ValidatedUser {
            public_id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            start_level: self.start_level,
            created_at: now,
        })
    }
}

/// A registration that passed validation but has no row identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUser {
    pub public_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub start_level: LanguageLevel,
    pub created_at: DateTime<Utc>,
}

impl ValidatedUser {
    #[must_use]
    pub fn assign_id(self, id: UserId) -> User {
        User {
            id,
            public_id: self.public_id,
            email: self.email,
            full_name: self.full_name,
            start_level: self.start_level,
            created_at: self.created_at,
        }
    }
}

/// A registered test taker.
///
/// `public_id` is the only identifier handed out past the service boundary;
/// results are looked up by it, so internal row ids never leak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub public_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub start_level: LanguageLevel,
    pub created_at: DateTime<Utc>,
}

//
// ─── SESSION CURSOR ────────────────────────────────────────────────────────────
//

/// Where a taker currently stands in their test.
///
/// The cursor is the whole per-user flow state: the step being (or about to
/// be) answered and the end of the batch it belongs to. Step numbers are
/// 1-based; a current step of 0 means no question has been served yet.
/// There is never more than one open batch.
///
/// Moves are functional: each returns the successor cursor, so the caller
/// decides when a move becomes the persisted truth.
///
/// # Examples
///
/// ```
/// use placement_core::model::{SessionCursor, UserId};
///
/// let cursor = SessionCursor::start(UserId::new(1)).with_batch(4)?;
/// let cursor = cursor.advance()?;
/// assert_eq!(cursor.current_step(), 1);
/// assert_eq!(cursor.batch_end(), Some(4));
/// assert!(!cursor.at_batch_end());
/// # Ok::<(), placement_core::model::CursorError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCursor {
    user_id: UserId,
    current_step: u32,
    batch_end: Option<u32>,
}

impl SessionCursor {
    /// Cursor for a freshly registered taker: nothing served, no batch.
    #[must_use]
    pub fn start(user_id: UserId) -> Self {
        Self {
            user_id,
            current_step: 0,
            batch_end: None,
        }
    }

    /// Rebuilds a cursor from stored fields without bookkeeping checks.
    #[must_use]
    pub fn from_persisted(user_id: UserId, current_step: u32, batch_end: Option<u32>) -> Self {
        Self {
            user_id,
            current_step,
            batch_end,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The step currently being answered; 0 before the first question.
    #[must_use]
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Last step of the open batch, if one is open.
    #[must_use]
    pub fn batch_end(&self) -> Option<u32> {
        self.batch_end
    }

    /// True once the current step is the last of its batch.
    #[must_use]
    pub fn at_batch_end(&self) -> bool {
        self.batch_end == Some(self.current_step)
    }

    /// Opens a batch of `len` steps directly after the current step.
    ///
    /// # Errors
    ///
    /// - `EmptyBatch` if `len` is zero
    /// - `BatchStillOpen` if the previous batch has steps left
    pub fn with_batch(self, len: u32) -> Result<Self, CursorError> {
        if len == 0 {
            return Err(CursorError::EmptyBatch);
        }
        if let Some(end) = self.batch_end {
            if self.current_step < end {
                return Err(CursorError::BatchStillOpen {
                    current: self.current_step,
                    end,
                });
            }
        }
        Ok(Self {
            batch_end: Some(self.current_step + len),
            ..self
        })
    }

    /// Moves to the next step of the open batch.
    ///
    /// # Errors
    ///
    /// - `NoOpenBatch` before the first batch is opened
    /// - `AtBatchEnd` when the batch has no further steps
    pub fn advance(self) -> Result<Self, CursorError> {
        let end = self.batch_end.ok_or(CursorError::NoOpenBatch)?;
        if self.current_step >= end {
            return Err(CursorError::AtBatchEnd { end });
        }
        Ok(Self {
            current_step: self.current_step + 1,
            ..self
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft() -> UserDraft {
        UserDraft {
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
            start_level: LanguageLevel::A1_1,
        }
    }

    #[test]
    fn user_draft_happy_path() {
        let public_id = Uuid::new_v4();
        let user = draft()
            .validate(public_id, fixed_now())
            .unwrap()
            .assign_id(UserId::new(3));

        assert_eq!(user.id, UserId::new(3));
        assert_eq!(user.public_id, public_id);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.start_level, LanguageLevel::A1_1);
    }

    #[test]
    fn user_draft_trims_fields() {
        let mut d = draft();
        d.email = " ada@example.com ".to_string();
        d.full_name = "  Ada Lovelace ".to_string();

        let validated = d.validate(Uuid::new_v4(), fixed_now()).unwrap();
        assert_eq!(validated.email, "ada@example.com");
        assert_eq!(validated.full_name, "Ada Lovelace");
    }

    #[test]
    fn user_draft_rejects_blank_name() {
        let mut d = draft();
        d.full_name = "   ".to_string();
        let err = d.validate(Uuid::new_v4(), fixed_now()).unwrap_err();
        assert_eq!(err, UserValidationError::NameEmpty);
    }

    #[test]
    fn user_draft_rejects_unusable_emails() {
        for email in ["", "plainaddress", "@nolocal.com", "nodomain@"] {
            let mut d = draft();
            d.email = email.to_string();
            let err = d.validate(Uuid::new_v4(), fixed_now()).unwrap_err();
            assert!(matches!(err, UserValidationError::EmailInvalid { .. }));
        }
    }

    #[test]
    fn user_draft_rejects_sentinel_start_level() {
        let mut d = draft();
        d.start_level = LanguageLevel::A0;
        let err = d.validate(Uuid::new_v4(), fixed_now()).unwrap_err();
        assert_eq!(
            err,
            UserValidationError::StartLevelNotTestable {
                level: LanguageLevel::A0
            }
        );
    }

    #[test]
    fn cursor_starts_before_the_first_step() {
        let cursor = SessionCursor::start(UserId::new(1));
        assert_eq!(cursor.current_step(), 0);
        assert_eq!(cursor.batch_end(), None);
        assert!(!cursor.at_batch_end());
    }

    #[test]
    fn cursor_walks_a_batch_to_its_end() {
        let mut cursor = SessionCursor::start(UserId::new(1)).with_batch(3).unwrap();
        assert_eq!(cursor.batch_end(), Some(3));

        for expected in 1..=3 {
            cursor = cursor.advance().unwrap();
            assert_eq!(cursor.current_step(), expected);
        }
        assert!(cursor.at_batch_end());

        let err = cursor.advance().unwrap_err();
        assert_eq!(err, CursorError::AtBatchEnd { end: 3 });
    }

    #[test]
    fn cursor_rejects_advance_without_a_batch() {
        let err = SessionCursor::start(UserId::new(1)).advance().unwrap_err();
        assert_eq!(err, CursorError::NoOpenBatch);
    }

    #[test]
    fn cursor_rejects_empty_batches() {
        let err = SessionCursor::start(UserId::new(1))
            .with_batch(0)
            .unwrap_err();
        assert_eq!(err, CursorError::EmptyBatch);
    }

    #[test]
    fn cursor_allows_one_open_batch_at_a_time() {
        let cursor = SessionCursor::start(UserId::new(1)).with_batch(2).unwrap();
        let err = cursor.with_batch(2).unwrap_err();
        assert_eq!(err, CursorError::BatchStillOpen { current: 0, end: 2 });

        // once the batch is exhausted a new one may open
        let cursor = cursor.advance().unwrap().advance().unwrap();
        let cursor = cursor.with_batch(4).unwrap();
        assert_eq!(cursor.batch_end(), Some(6));
        assert_eq!(cursor.current_step(), 2);
    }

    #[test]
    fn cursor_round_trips_through_persistence() {
        let cursor = SessionCursor::start(UserId::new(9))
            .with_batch(4)
            .unwrap()
            .advance()
            .unwrap();
        let restored =
            SessionCursor::from_persisted(cursor.user_id(), cursor.current_step(), cursor.batch_end());
        assert_eq!(restored, cursor);
    }
}
