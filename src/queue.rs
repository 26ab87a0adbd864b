//! Due selection and queue ordering
//!
//! Decides which cards are actionable at a reference instant and in what
//! order they should be presented. One policy applies everywhere: the
//! due-now bucket (overdue and never-reviewed cards) sorts before
//! upcoming cards; inside it, scheduled overdue cards come before
//! brand-new ones; the final tie-break is newest-created first.

use std::cmp::Reverse;

use chrono::{DateTime, FixedOffset};

use crate::error::SrsError;
use crate::models::{CardCandidate, DueClass, MemoryState};
use crate::time;

/// Classify a card's standing at `now`.
///
/// No state means the card was never reviewed. Otherwise the effective
/// due instant (`due_at`, or `due_date` at local midnight) is compared
/// against `now` as a full instant, even when both fall on the same
/// calendar day.
#[uniffi::export]
pub fn classify(state: Option<MemoryState>, now: String) -> Result<DueClass, SrsError> {
    let now = time::parse_timestamp(&now)?;
    classify_at(state.as_ref(), &now)
}

fn classify_at(
    state: Option<&MemoryState>,
    now: &DateTime<FixedOffset>,
) -> Result<DueClass, SrsError> {
    let Some(state) = state else {
        return Ok(DueClass::New);
    };

    let due = time::effective_due(state, now)?;
    if due <= *now {
        Ok(DueClass::DueNow)
    } else {
        Ok(DueClass::DueLater)
    }
}

/// Order a working set for presentation and return the card ids.
#[uniffi::export]
pub fn order_queue(cards: Vec<CardCandidate>, now: String) -> Result<Vec<String>, SrsError> {
    let now = time::parse_timestamp(&now)?;
    let ordered = order_candidates(cards, &now)?;
    Ok(ordered.into_iter().map(|c| c.card_id).collect())
}

/// Sort candidates by the presentation order.
///
/// Sort key, ascending: due-now-or-new bucket before due-later; within a
/// bucket the effective due instant, with stateless cards last in the
/// due-now bucket; then creation time, newest first. Any malformed
/// timestamp fails the whole call rather than sorting the card
/// arbitrarily.
pub fn order_candidates(
    cards: Vec<CardCandidate>,
    now: &DateTime<FixedOffset>,
) -> Result<Vec<CardCandidate>, SrsError> {
    let mut keyed = Vec::with_capacity(cards.len());
    for card in cards {
        let created = time::parse_timestamp(&card.created_at)?.timestamp_millis();
        let key = match &card.state {
            // New cards join the due-now bucket but sort after every
            // scheduled overdue card
            None => (0u8, i64::MAX, Reverse(created)),
            Some(state) => {
                let due = time::effective_due(state, now)?;
                let bucket = if due <= *now { 0u8 } else { 1u8 };
                (bucket, due.timestamp_millis(), Reverse(created))
            }
        };
        keyed.push((key, card));
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, card)| card).collect())
}
