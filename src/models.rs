use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SrsError;

/// Initial ease factor for a card that has never been reviewed
pub const INITIAL_EASE: f32 = 2.5;

/// Learner's self-assessed recall quality for one review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "camelCase")]
pub enum Rating {
    Fail = 0,
    Hard = 1,
    Good = 2,
    Easy = 3,
}

impl Rating {
    /// Convert a raw rating value (as stored or sent by a client) into a
    /// `Rating`, rejecting anything outside the known range.
    pub fn from_raw(raw: i64) -> Result<Self, SrsError> {
        match raw {
            0 => Ok(Rating::Fail),
            1 => Ok(Rating::Hard),
            2 => Ok(Rating::Good),
            3 => Ok(Rating::Easy),
            other => Err(SrsError::InvalidRating(other)),
        }
    }

    /// SM-2 quality score for a successful rating (Hard=3, Good=4, Easy=5).
    /// Fail has no quality score; it takes the lapse path instead.
    pub fn quality(self) -> Option<i32> {
        match self {
            Rating::Fail => None,
            Rating::Hard => Some(3),
            Rating::Good => Some(4),
            Rating::Easy => Some(5),
        }
    }
}

/// Convert a raw rating value into a `Rating`, for callers that store
/// ratings as plain integers
#[uniffi::export]
pub fn rating_from_raw(raw: i64) -> Result<Rating, SrsError> {
    Rating::from_raw(raw)
}

/// Per-card memory state tracked by the scheduler
///
/// A card with no `MemoryState` row is "new". The state is replaced
/// wholesale on every review; it is never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Consecutive successful reviews since the last lapse
    #[serde(default)]
    pub repetitions: u32,
    /// Spacing in whole days until the next review
    #[serde(default)]
    pub interval_days: u32,
    /// Short relearn spacing in minutes; when non-zero it takes
    /// precedence over `interval_days`
    #[serde(default)]
    pub interval_minutes: u32,
    /// SM-2 ease factor, kept within [1.3, 3.0]
    #[serde(default = "default_ease")]
    pub ease: f32,
    /// Calendar date of the next review (`YYYY-MM-DD`, local), kept for
    /// backward-compatible display
    pub due_date: String,
    /// Precise due instant (RFC 3339, UTC); authoritative over `due_date`
    /// when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
    /// Timestamp of the most recent review (RFC 3339, UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review_at: Option<String>,
    /// Number of Fail ratings ever recorded
    #[serde(default)]
    pub lapses: u32,
}

fn default_ease() -> f32 {
    INITIAL_EASE
}

impl MemoryState {
    /// The "new" baseline: what a card without a state row is equivalent
    /// to for scheduling purposes. No row is persisted until the first
    /// review.
    pub fn baseline(today: NaiveDate) -> Self {
        Self {
            repetitions: 0,
            interval_days: 0,
            interval_minutes: 0,
            ease: INITIAL_EASE,
            due_date: today.format("%Y-%m-%d").to_string(),
            due_at: None,
            last_review_at: None,
            lapses: 0,
        }
    }
}

/// Where a card stands relative to a reference instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "camelCase")]
pub enum DueClass {
    /// Never reviewed, no state row
    New,
    /// Due instant has passed
    DueNow,
    /// Scheduled for a future instant
    DueLater,
}

/// Status tag accompanying a relative-time label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Enum)]
#[serde(rename_all = "camelCase")]
pub enum DueStatus {
    None,
    Today,
    Future,
    Overdue,
}

/// Human-readable summary of time-to-due or time-overdue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct DueLabel {
    pub text: String,
    pub status: DueStatus,
}

/// Which of the two label behaviors a call site wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LabelStyle {
    /// Collapse anything due on the current calendar day to "due today"
    DueToday,
    /// Always report explicit elapsed/remaining time, even same-day
    Exact,
}

/// One row of the due-selector's working set: a card plus its optional
/// scheduling state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct CardCandidate {
    pub card_id: String,
    pub front: String,
    pub back: String,
    /// RFC 3339 creation timestamp, used as the final ordering tie-break
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<MemoryState>,
}

/// Preview of the state each rating would produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct NextStates {
    pub fail: MemoryState,
    pub hard: MemoryState,
    pub good: MemoryState,
    pub easy: MemoryState,
}

/// Per-deck review workload, for the deck list screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    pub deck_id: String,
    pub total_cards: u32,
    /// Cards already due plus cards never reviewed
    pub due_now: u32,
    /// Earliest future due instant, if any card is scheduled ahead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due_at: Option<String>,
}

/// Outcome of a batch reset over one deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct DeckResetReport {
    pub reset_count: u32,
    /// Cards whose reset failed; empty on full success
    pub failed_card_ids: Vec<String>,
}
