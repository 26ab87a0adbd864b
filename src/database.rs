//! SQLite-backed scheduling store
//!
//! The storage collaborator the core needs: one state row per card,
//! loaded and replaced wholesale around each review. Rows are validated
//! on load; anything outside the representable domain is an error, never
//! silently coerced into a usable state.
//!
//! The connection sits behind a mutex, so every read-modify-write cycle
//! (`answer_card`) is serialized. Reviews of different cards need no
//! coordination, but a coarser lock than strictly required is fine here:
//! each operation is a handful of point queries.

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::SrsError;
use crate::models::{CardCandidate, DeckResetReport, DeckSummary, MemoryState, Rating};
use crate::queue;
use crate::scheduler::{self, MAX_EASE, MIN_EASE};
use crate::time;

/// Cap on the due-now working set returned by `list_candidates`
const CANDIDATE_BATCH_SIZE: i64 = 100;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cards (
        id TEXT PRIMARY KEY,
        deck_id TEXT NOT NULL,
        front TEXT NOT NULL,
        back TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_cards_deck_id ON cards(deck_id);

    CREATE TABLE IF NOT EXISTS scheduling_state (
        card_id TEXT PRIMARY KEY REFERENCES cards(id) ON DELETE CASCADE,
        repetitions INTEGER NOT NULL DEFAULT 0,
        interval_days INTEGER NOT NULL DEFAULT 0,
        interval_minutes INTEGER NOT NULL DEFAULT 0,
        ease REAL NOT NULL DEFAULT 2.5,
        due_date TEXT NOT NULL,
        due_at TEXT,
        last_review_at TEXT,
        lapses INTEGER NOT NULL DEFAULT 0
    );
";

/// Scheduling store over a local SQLite database
#[derive(Debug, uniffi::Object)]
pub struct SchedulingStore {
    conn: Mutex<Connection>,
}

/// Open (or create) a scheduling store at the given path
#[uniffi::export]
pub fn open_store(path: String) -> Result<Arc<SchedulingStore>, SrsError> {
    Ok(Arc::new(SchedulingStore::open(path)?))
}

impl SchedulingStore {
    /// Open a store backed by a database file, creating it if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SrsError> {
        Self::init(Connection::open(path)?)
    }

    /// Open a transient store; used by tests
    pub fn open_in_memory() -> Result<Self, SrsError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SrsError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        debug!("scheduling store ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[uniffi::export]
impl SchedulingStore {
    /// Insert a card. Scheduling state is not created here; a card stays
    /// "new" until its first review.
    pub fn put_card(
        &self,
        card_id: String,
        deck_id: String,
        front: String,
        back: String,
        created_at: String,
    ) -> Result<(), SrsError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO cards (id, deck_id, front, back, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![card_id, deck_id, front, back, created_at],
        )?;
        Ok(())
    }

    /// Delete a card along with its scheduling state
    pub fn delete_card(&self, card_id: String) -> Result<(), SrsError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM scheduling_state WHERE card_id = ?1",
            params![card_id],
        )?;
        conn.execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
        Ok(())
    }

    /// Load a card's scheduling state, or `None` for a new card
    pub fn load_state(&self, card_id: String) -> Result<Option<MemoryState>, SrsError> {
        let conn = self.conn.lock().unwrap();
        load_state_with(&conn, &card_id)
    }

    /// Persist a card's scheduling state, replacing any previous row
    pub fn save_state(&self, card_id: String, state: MemoryState) -> Result<(), SrsError> {
        let conn = self.conn.lock().unwrap();
        save_state_with(&conn, &card_id, &state)
    }

    /// Apply one review: load the current state, run the scheduler, and
    /// persist the replacement. The whole cycle runs under the store
    /// lock, so two reviews of the same card cannot lose an update.
    pub fn answer_card(
        &self,
        card_id: String,
        rating: Rating,
        now: String,
    ) -> Result<MemoryState, SrsError> {
        let conn = self.conn.lock().unwrap();
        let current = load_state_with(&conn, &card_id)?;
        let next = scheduler::review(current, rating, now)?;
        save_state_with(&conn, &card_id, &next)?;
        Ok(next)
    }

    /// The due-now working set: cards that are overdue or never reviewed,
    /// optionally restricted to one deck, capped to a bounded batch.
    ///
    /// Date-only rows are compared as midnight here, mirroring how the
    /// app's legacy rows were stored; rows written by this crate always
    /// carry a precise `due_at`.
    pub fn list_candidates(
        &self,
        deck_id: Option<String>,
        now: String,
    ) -> Result<Vec<CardCandidate>, SrsError> {
        let now = time::parse_timestamp(&now)?;
        let now_utc = time::format_utc(&now);

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.front, c.back, c.created_at,
                    s.repetitions, s.interval_days, s.interval_minutes, s.ease,
                    s.due_date, s.due_at, s.last_review_at, s.lapses
               FROM cards c
          LEFT JOIN scheduling_state s ON s.card_id = c.id
              WHERE (?1 IS NULL OR c.deck_id = ?1)
                AND (s.card_id IS NULL
                     OR COALESCE(s.due_at, s.due_date || 'T00:00:00') <= ?2)
              LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![deck_id, now_utc, CANDIDATE_BATCH_SIZE], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                RawState {
                    repetitions: row.get(4)?,
                    interval_days: row.get(5)?,
                    interval_minutes: row.get(6)?,
                    ease: row.get(7)?,
                    due_date: row.get(8)?,
                    due_at: row.get(9)?,
                    last_review_at: row.get(10)?,
                    lapses: row.get(11)?,
                },
            ))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (card_id, front, back, created_at, raw) = row?;
            let state = raw.into_state(&card_id)?;
            candidates.push(CardCandidate {
                card_id,
                front,
                back,
                created_at,
                state,
            });
        }

        Ok(candidates)
    }

    /// The due-now working set in presentation order
    pub fn load_due_queue(
        &self,
        deck_id: Option<String>,
        now: String,
    ) -> Result<Vec<CardCandidate>, SrsError> {
        let parsed = time::parse_timestamp(&now)?;
        let candidates = self.list_candidates(deck_id, now)?;
        queue::order_candidates(candidates, &parsed)
    }

    /// Reset a card to the "new" baseline. Idempotent: applying it twice
    /// writes the same row twice.
    pub fn reset_state(&self, card_id: String, now: String) -> Result<(), SrsError> {
        let now = time::parse_timestamp(&now)?;
        let baseline = MemoryState::baseline(now.date_naive());

        let conn = self.conn.lock().unwrap();
        save_state_with(&conn, &card_id, &baseline)
    }

    /// Reset every card in a deck. Each card is reset independently; the
    /// report names the cards whose reset failed.
    pub fn reset_deck(&self, deck_id: String, now: String) -> Result<DeckResetReport, SrsError> {
        let now = time::parse_timestamp(&now)?;
        let baseline = MemoryState::baseline(now.date_naive());

        let conn = self.conn.lock().unwrap();
        let card_ids: Vec<String> = {
            let mut stmt = conn.prepare("SELECT id FROM cards WHERE deck_id = ?1")?;
            let rows = stmt.query_map(params![deck_id], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut reset_count = 0;
        let mut failed_card_ids = Vec::new();
        for card_id in card_ids {
            match save_state_with(&conn, &card_id, &baseline) {
                Ok(()) => reset_count += 1,
                Err(e) => {
                    warn!("reset failed for card {card_id}: {e}");
                    failed_card_ids.push(card_id);
                }
            }
        }

        Ok(DeckResetReport {
            reset_count,
            failed_card_ids,
        })
    }

    /// Per-deck workload: total cards, due-now count, and the next future
    /// due instant
    pub fn list_deck_summaries(&self, now: String) -> Result<Vec<DeckSummary>, SrsError> {
        let now = time::parse_timestamp(&now)?;
        let now_utc = time::format_utc(&now);

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.deck_id,
                    COUNT(c.id),
                    SUM(CASE
                          WHEN s.card_id IS NULL THEN 1
                          WHEN COALESCE(s.due_at, s.due_date || 'T00:00:00') <= ?1 THEN 1
                          ELSE 0
                        END),
                    MIN(CASE
                          WHEN COALESCE(s.due_at, s.due_date || 'T00:00:00') > ?1
                          THEN COALESCE(s.due_at, s.due_date || 'T00:00:00')
                        END)
               FROM cards c
          LEFT JOIN scheduling_state s ON s.card_id = c.id
              GROUP BY c.deck_id
              ORDER BY c.deck_id",
        )?;

        let rows = stmt.query_map(params![now_utc], |row| {
            Ok(DeckSummary {
                deck_id: row.get(0)?,
                total_cards: row.get::<_, i64>(1)? as u32,
                due_now: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u32,
                next_due_at: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<Result<_, _>>()?)
    }
}

/// Raw scheduling row as stored, before domain validation
struct RawState {
    repetitions: Option<i64>,
    interval_days: Option<i64>,
    interval_minutes: Option<i64>,
    ease: Option<f64>,
    due_date: Option<String>,
    due_at: Option<String>,
    last_review_at: Option<String>,
    lapses: Option<i64>,
}

impl RawState {
    /// Convert a raw row into a validated `MemoryState`.
    ///
    /// A row with no `due_date` is an absent state (LEFT JOIN miss).
    /// Present rows must be fully in-domain; a corrupted row is rejected
    /// so the caller can decide how to treat the card.
    fn into_state(self, card_id: &str) -> Result<Option<MemoryState>, SrsError> {
        let Some(due_date) = self.due_date else {
            return Ok(None);
        };

        let corrupt = |reason: &str| {
            warn!("rejecting scheduling row for card {card_id}: {reason}");
            SrsError::CorruptState(format!("card {card_id}: {reason}"))
        };

        let counter = |value: Option<i64>, field: &str| -> Result<u32, SrsError> {
            let value = value.unwrap_or(0);
            u32::try_from(value).map_err(|_| corrupt(&format!("{field} out of range: {value}")))
        };

        let repetitions = counter(self.repetitions, "repetitions")?;
        let interval_days = counter(self.interval_days, "interval_days")?;
        let interval_minutes = counter(self.interval_minutes, "interval_minutes")?;
        let lapses = counter(self.lapses, "lapses")?;

        let ease = self.ease.unwrap_or(f64::from(crate::models::INITIAL_EASE));
        if ease < f64::from(MIN_EASE) - 1e-6 || ease > f64::from(MAX_EASE) + 1e-6 {
            return Err(corrupt(&format!("ease out of range: {ease}")));
        }

        time::parse_due_date(&due_date)?;
        if let Some(due_at) = &self.due_at {
            time::parse_timestamp(due_at)?;
        }
        if let Some(last_review_at) = &self.last_review_at {
            time::parse_timestamp(last_review_at)?;
        }

        Ok(Some(MemoryState {
            repetitions,
            interval_days,
            interval_minutes,
            ease: ease as f32,
            due_date,
            due_at: self.due_at,
            last_review_at: self.last_review_at,
            lapses,
        }))
    }
}

fn load_state_with(conn: &Connection, card_id: &str) -> Result<Option<MemoryState>, SrsError> {
    let raw = conn
        .query_row(
            "SELECT repetitions, interval_days, interval_minutes, ease,
                    due_date, due_at, last_review_at, lapses
               FROM scheduling_state
              WHERE card_id = ?1",
            params![card_id],
            |row| {
                Ok(RawState {
                    repetitions: row.get(0)?,
                    interval_days: row.get(1)?,
                    interval_minutes: row.get(2)?,
                    ease: row.get(3)?,
                    due_date: row.get(4)?,
                    due_at: row.get(5)?,
                    last_review_at: row.get(6)?,
                    lapses: row.get(7)?,
                })
            },
        )
        .optional()?;

    match raw {
        Some(raw) => raw.into_state(card_id),
        None => Ok(None),
    }
}

fn save_state_with(conn: &Connection, card_id: &str, state: &MemoryState) -> Result<(), SrsError> {
    conn.execute(
        "INSERT INTO scheduling_state
            (card_id, repetitions, interval_days, interval_minutes, ease,
             due_date, due_at, last_review_at, lapses)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(card_id) DO UPDATE SET
            repetitions = excluded.repetitions,
            interval_days = excluded.interval_days,
            interval_minutes = excluded.interval_minutes,
            ease = excluded.ease,
            due_date = excluded.due_date,
            due_at = excluded.due_at,
            last_review_at = excluded.last_review_at,
            lapses = excluded.lapses",
        params![
            card_id,
            state.repetitions,
            state.interval_days,
            state.interval_minutes,
            state.ease,
            state.due_date,
            state.due_at,
            state.last_review_at,
            state.lapses,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::INITIAL_EASE;

    const NOW: &str = "2024-01-10T12:00:00Z";

    fn store() -> SchedulingStore {
        SchedulingStore::open_in_memory().unwrap()
    }

    fn add_card(store: &SchedulingStore, id: &str, deck: &str, created_at: &str) {
        store
            .put_card(
                id.to_string(),
                deck.to_string(),
                "front".to_string(),
                "back".to_string(),
                created_at.to_string(),
            )
            .unwrap();
    }

    #[test]
    fn test_load_state_missing_is_none() {
        let store = store();
        add_card(&store, "c1", "d1", "2024-01-01T00:00:00Z");
        assert_eq!(store.load_state("c1".to_string()).unwrap(), None);
    }

    #[test]
    fn test_answer_card_round_trip() {
        let store = store();
        add_card(&store, "c1", "d1", "2024-01-01T00:00:00Z");

        let next = store
            .answer_card("c1".to_string(), Rating::Good, NOW.to_string())
            .unwrap();
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.due_at.as_deref(), Some("2024-01-11T12:00:00Z"));

        let loaded = store.load_state("c1".to_string()).unwrap();
        assert_eq!(loaded, Some(next));
    }

    #[test]
    fn test_answer_unknown_card_fails() {
        let store = store();
        // No card row; the foreign key constraint must refuse the state
        let result = store.answer_card("ghost".to_string(), Rating::Good, NOW.to_string());
        assert!(matches!(result, Err(SrsError::DatabaseError(_))));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srs.db");

        {
            let store = SchedulingStore::open(&path).unwrap();
            add_card(&store, "c1", "d1", "2024-01-01T00:00:00Z");
            store
                .answer_card("c1".to_string(), Rating::Easy, NOW.to_string())
                .unwrap();
        }

        let reopened = SchedulingStore::open(&path).unwrap();
        let state = reopened.load_state("c1".to_string()).unwrap().unwrap();
        assert_eq!(state.repetitions, 1);
    }

    #[test]
    fn test_list_candidates_due_or_new_only() {
        let store = store();
        add_card(&store, "new", "d1", "2024-01-02T00:00:00Z");
        add_card(&store, "overdue", "d1", "2024-01-01T00:00:00Z");
        add_card(&store, "future", "d1", "2024-01-03T00:00:00Z");

        // Reviewed nine days ago: due well before NOW
        store
            .answer_card(
                "overdue".to_string(),
                Rating::Good,
                "2024-01-01T12:00:00Z".to_string(),
            )
            .unwrap();
        // Reviewed just now: due tomorrow
        store
            .answer_card("future".to_string(), Rating::Good, NOW.to_string())
            .unwrap();

        let mut ids: Vec<String> = store
            .list_candidates(Some("d1".to_string()), NOW.to_string())
            .unwrap()
            .into_iter()
            .map(|c| c.card_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["new", "overdue"]);
    }

    #[test]
    fn test_list_candidates_deck_filter_and_all_decks() {
        let store = store();
        add_card(&store, "a1", "deck-a", "2024-01-01T00:00:00Z");
        add_card(&store, "b1", "deck-b", "2024-01-01T00:00:00Z");

        let only_a = store
            .list_candidates(Some("deck-a".to_string()), NOW.to_string())
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].card_id, "a1");

        let all = store.list_candidates(None, NOW.to_string()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_list_candidates_is_capped() {
        let store = store();
        for i in 0..120 {
            add_card(&store, &format!("c{i}"), "d1", "2024-01-01T00:00:00Z");
        }

        let candidates = store.list_candidates(None, NOW.to_string()).unwrap();
        assert_eq!(candidates.len(), CANDIDATE_BATCH_SIZE as usize);
    }

    #[test]
    fn test_load_due_queue_orders_overdue_before_new() {
        let store = store();
        add_card(&store, "new", "d1", "2024-01-02T00:00:00Z");
        add_card(&store, "overdue", "d1", "2024-01-01T00:00:00Z");
        store
            .answer_card(
                "overdue".to_string(),
                Rating::Good,
                "2024-01-01T12:00:00Z".to_string(),
            )
            .unwrap();

        let queue = store.load_due_queue(None, NOW.to_string()).unwrap();
        let ids: Vec<&str> = queue.iter().map(|c| c.card_id.as_str()).collect();
        assert_eq!(ids, vec!["overdue", "new"]);
    }

    #[test]
    fn test_reset_state_is_idempotent() {
        let store = store();
        add_card(&store, "c1", "d1", "2024-01-01T00:00:00Z");
        store
            .answer_card("c1".to_string(), Rating::Fail, NOW.to_string())
            .unwrap();

        store.reset_state("c1".to_string(), NOW.to_string()).unwrap();
        let first = store.load_state("c1".to_string()).unwrap().unwrap();

        store.reset_state("c1".to_string(), NOW.to_string()).unwrap();
        let second = store.load_state("c1".to_string()).unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.repetitions, 0);
        assert_eq!(first.interval_days, 0);
        assert_eq!(first.interval_minutes, 0);
        assert_eq!(first.ease, INITIAL_EASE);
        assert_eq!(first.due_date, "2024-01-10");
        assert_eq!(first.due_at, None);
        assert_eq!(first.last_review_at, None);
        assert_eq!(first.lapses, 0);
    }

    #[test]
    fn test_delete_card_removes_state() {
        let store = store();
        add_card(&store, "c1", "d1", "2024-01-01T00:00:00Z");
        store
            .answer_card("c1".to_string(), Rating::Good, NOW.to_string())
            .unwrap();

        store.delete_card("c1".to_string()).unwrap();
        assert_eq!(store.load_state("c1".to_string()).unwrap(), None);
        assert!(store.list_candidates(None, NOW.to_string()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let store = store();
        add_card(&store, "c1", "d1", "2024-01-01T00:00:00Z");

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO scheduling_state (card_id, repetitions, ease, due_date)
                 VALUES ('c1', 1, 0.5, '2024-01-10')",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            store.load_state("c1".to_string()),
            Err(SrsError::CorruptState(_))
        ));

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE scheduling_state SET ease = 2.5, repetitions = -3 WHERE card_id = 'c1'",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            store.load_state("c1".to_string()),
            Err(SrsError::CorruptState(_))
        ));

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE scheduling_state SET repetitions = 1, due_at = 'whenever' WHERE card_id = 'c1'",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            store.load_state("c1".to_string()),
            Err(SrsError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_reset_deck_reports_counts() {
        let store = store();
        for i in 0..3 {
            add_card(&store, &format!("c{i}"), "d1", "2024-01-01T00:00:00Z");
            store
                .answer_card(format!("c{i}"), Rating::Good, NOW.to_string())
                .unwrap();
        }
        add_card(&store, "other", "d2", "2024-01-01T00:00:00Z");

        let report = store.reset_deck("d1".to_string(), NOW.to_string()).unwrap();
        assert_eq!(report.reset_count, 3);
        assert!(report.failed_card_ids.is_empty());

        // The other deck is untouched
        assert_eq!(store.load_state("other".to_string()).unwrap(), None);
    }

    #[test]
    fn test_deck_summaries() {
        let store = store();
        add_card(&store, "a-new", "deck-a", "2024-01-01T00:00:00Z");
        add_card(&store, "a-future", "deck-a", "2024-01-01T00:00:00Z");
        add_card(&store, "b-overdue", "deck-b", "2024-01-01T00:00:00Z");

        store
            .answer_card("a-future".to_string(), Rating::Good, NOW.to_string())
            .unwrap();
        store
            .answer_card(
                "b-overdue".to_string(),
                Rating::Good,
                "2024-01-01T12:00:00Z".to_string(),
            )
            .unwrap();

        let summaries = store.list_deck_summaries(NOW.to_string()).unwrap();
        assert_eq!(summaries.len(), 2);

        let deck_a = &summaries[0];
        assert_eq!(deck_a.deck_id, "deck-a");
        assert_eq!(deck_a.total_cards, 2);
        assert_eq!(deck_a.due_now, 1);
        assert_eq!(deck_a.next_due_at.as_deref(), Some("2024-01-11T12:00:00Z"));

        let deck_b = &summaries[1];
        assert_eq!(deck_b.deck_id, "deck-b");
        assert_eq!(deck_b.total_cards, 1);
        assert_eq!(deck_b.due_now, 1);
        assert_eq!(deck_b.next_due_at, None);
    }
}
