//! Task progress
//!
//! Each engagement task moves through a small state machine:
//!
//! ```text
//! NotOpened ──open──▶ Opened ──verify──▶ Verifying ──ok──▶ Completed
//!     │                                   ▲     │
//!     └────────────verify─────────────────┘     └─fail─▶ Error ──verify──▶ Verifying
//! ```
//!
//! `Completed` is terminal: every event leaves it unchanged. The server-side
//! copy of this state is authoritative; clients only mirror it.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain::Address;
use crate::types::ActionKind;

pub use store::{InMemoryProgressStore, ProgressStore, StoreConfig, StoreError, VerificationAttempt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    NotOpened,
    Opened,
    Verifying,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    /// User was sent to the post
    Open,
    /// Verification request started
    BeginVerification,
    VerificationSucceeded,
    /// Verifier said no, or could not answer
    VerificationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event:?} to a task in state {from:?}")]
pub struct TransitionError {
    pub from: TaskState,
    pub event: TaskEvent,
}

impl TaskState {
    /// Next state after `event`.
    pub fn apply(self, event: TaskEvent) -> Result<TaskState, TransitionError> {
        use TaskEvent::*;
        use TaskState::*;

        match (self, event) {
            (Completed, _) => Ok(Completed),
            (NotOpened, Open) => Ok(Opened),
            // Re-opening the link changes nothing
            (state, Open) => Ok(state),
            (NotOpened | Opened | Error, BeginVerification) => Ok(Verifying),
            (Verifying, VerificationSucceeded) => Ok(Completed),
            (Verifying, VerificationFailed) => Ok(Error),
            (from, event) => Err(TransitionError { from, event }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed)
    }
}

/// An engagement task as sourced from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub post_reference: String,
    pub required_action: ActionKind,
    pub required_user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<Address>,
    #[serde(default)]
    pub state: TaskState,
}

/// Persisted state of one task for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub state: TaskState,
    pub updated_at: DateTime<Utc>,
    /// Incremented by every admitted `BeginVerification`
    #[serde(default)]
    pub attempt: u64,
}

/// All task records for one user, keyed by task id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub tasks: BTreeMap<String, TaskRecord>,
}

impl TaskProgress {
    pub fn state(&self, task_id: &str) -> TaskState {
        self.tasks
            .get(task_id)
            .map(|record| record.state)
            .unwrap_or_default()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|record| record.state.is_terminal())
            .count()
    }
}
