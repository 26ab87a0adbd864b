//! Relative-time due labels
//!
//! Renders a state's time-to-due or time-overdue for list rows and deck
//! headers. Under 72 hours the label reports hours and minutes; past
//! that it rounds up to whole days. The deck list collapses same-day
//! cards to "due today" while the card list always shows the explicit
//! remainder; `LabelStyle` selects between the two.

use chrono::TimeDelta;

use crate::error::SrsError;
use crate::models::{DueLabel, DueStatus, LabelStyle, MemoryState};
use crate::time::{self, NEAR_WINDOW_HOURS};

/// Produce the display label for a card's due state at `now`.
#[uniffi::export]
pub fn due_label(
    state: Option<MemoryState>,
    now: String,
    style: LabelStyle,
) -> Result<DueLabel, SrsError> {
    let now = time::parse_timestamp(&now)?;

    let Some(state) = state else {
        return Ok(DueLabel {
            text: "new".to_string(),
            status: DueStatus::None,
        });
    };

    let due = time::effective_due(&state, &now)?;
    let due_local = due.with_timezone(now.offset());

    if style == LabelStyle::DueToday && due_local.date_naive() == now.date_naive() {
        return Ok(DueLabel {
            text: "due today".to_string(),
            status: DueStatus::Today,
        });
    }

    let remaining = due - now;
    if remaining > TimeDelta::zero() {
        let text = if remaining < TimeDelta::hours(NEAR_WINDOW_HOURS) {
            format!("in {}", time::format_hm(remaining))
        } else {
            format!("in {}d", time::ceil_days(remaining))
        };
        Ok(DueLabel {
            text,
            status: DueStatus::Future,
        })
    } else {
        let late = -remaining;
        let text = if late < TimeDelta::hours(NEAR_WINDOW_HOURS) {
            format!("overdue by {}", time::format_hm(late))
        } else {
            format!("overdue by {}d", time::ceil_days(late))
        };
        Ok(DueLabel {
            text,
            status: DueStatus::Overdue,
        })
    }
}
