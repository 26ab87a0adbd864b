//! SM-2 review engine
//!
//! Pure state transitions: (current state, rating, now) → next state.
//! `now` is always caller-supplied; nothing here reads a clock, touches
//! storage, or keeps state of its own. Persisting the result is the
//! caller's job.
//!
//! Quality scale (classic SM-2): Hard=3, Good=4, Easy=5. Fail does not
//! map to a quality score; it resets the repetition streak and schedules
//! a short relearn delay in minutes instead of days.

use chrono::TimeDelta;

use crate::error::SrsError;
use crate::models::{MemoryState, NextStates, Rating};
use crate::time;

/// Minimum ease factor allowed
pub const MIN_EASE: f32 = 1.3;

/// Maximum ease factor allowed
pub const MAX_EASE: f32 = 3.0;

/// Fixed short-relearn delay after a lapse, in minutes
pub const RELEARN_MINUTES: u32 = 30;

/// Ease penalty applied on a lapse
const FAIL_EASE_PENALTY: f32 = 0.2;

/// Interval after the first successful review, in days
const FIRST_INTERVAL_DAYS: u32 = 1;

/// Interval after the second successful review, in days
const SECOND_INTERVAL_DAYS: u32 = 6;

/// Apply one review to a card's memory state.
///
/// # Arguments
/// * `state` - Current state, or `None` for a card never reviewed
/// * `rating` - Learner's recall quality for this review
/// * `now` - The instant the review occurred, RFC 3339
///
/// # Returns
/// The replacement `MemoryState`, with `due_at` in UTC and `due_date` in
/// the calendar of `now`'s UTC offset.
#[uniffi::export]
pub fn review(
    state: Option<MemoryState>,
    rating: Rating,
    now: String,
) -> Result<MemoryState, SrsError> {
    let now = time::parse_timestamp(&now)?;
    let current = state.unwrap_or_else(|| MemoryState::baseline(now.date_naive()));

    let mut repetitions = current.repetitions;
    let mut interval_days = current.interval_days;
    let interval_minutes;
    let mut ease = current.ease;
    let mut lapses = current.lapses;

    match rating.quality() {
        None => {
            // Lapse: reset the streak and fall back to the short relearn
            // delay. The delay is flat; it does not escalate across
            // repeated lapses.
            repetitions = 0;
            interval_days = 0;
            interval_minutes = RELEARN_MINUTES;
            ease = (ease - FAIL_EASE_PENALTY).max(MIN_EASE);
            lapses += 1;
        }
        Some(q) => {
            // Ease is updated before the interval, as SM-2 prescribes:
            // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
            let spread = (5 - q) as f32;
            ease = (ease + (0.1 - spread * (0.08 + spread * 0.02))).clamp(MIN_EASE, MAX_EASE);

            interval_days = match repetitions {
                0 => FIRST_INTERVAL_DAYS,
                1 => SECOND_INTERVAL_DAYS,
                _ => ((interval_days as f32 * ease).round() as u32).max(1),
            };
            interval_minutes = 0;
            repetitions += 1;
        }
    }

    let due_instant = if interval_minutes > 0 {
        now + TimeDelta::minutes(i64::from(interval_minutes))
    } else {
        now + TimeDelta::days(i64::from(interval_days))
    };

    Ok(MemoryState {
        repetitions,
        interval_days,
        interval_minutes,
        ease,
        due_date: time::format_local_date(&due_instant),
        due_at: Some(time::format_utc(&due_instant)),
        last_review_at: Some(time::format_utc(&now)),
        lapses,
    })
}

/// Preview the state every rating would produce, without committing any.
///
/// Used by the study screen to show per-button intervals before the
/// learner answers.
#[uniffi::export]
pub fn next_states(state: Option<MemoryState>, now: String) -> Result<NextStates, SrsError> {
    Ok(NextStates {
        fail: review(state.clone(), Rating::Fail, now.clone())?,
        hard: review(state.clone(), Rating::Hard, now.clone())?,
        good: review(state.clone(), Rating::Good, now.clone())?,
        easy: review(state, Rating::Easy, now)?,
    })
}
