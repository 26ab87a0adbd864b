//! SM2 Swift - SM-2 spaced repetition scheduler and review queue
//!
//! This library provides the scheduling core of a flashcard app:
//! - SM-2 memory model: (current state, rating, now) → next state
//! - Due classification and presentation ordering for review queues
//! - Relative-time due labels ("in 2h 30m", "overdue by 3d")
//! - SQLite-backed scheduling store (one state row per card)
//!
//! Every operation takes an explicit `now`; nothing here reads the
//! system clock, so the whole surface is deterministic and testable.
//!
//! Designed for integration with Swift via UniFFI bindings.

pub mod database;
pub mod error;
pub mod label;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod time;

// Re-export main types
pub use database::SchedulingStore;
pub use error::SrsError as Error;
pub use label::due_label;
pub use models::{
    CardCandidate, DueClass, DueLabel, DueStatus, LabelStyle, MemoryState, NextStates, Rating,
};
pub use queue::{classify, order_queue};
pub use scheduler::{next_states, review};

// Setup UniFFI scaffolding using proc-macros
uniffi::setup_scaffolding!();
