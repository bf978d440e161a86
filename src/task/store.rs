//! Progress storage
//!
//! Every state change goes through the store, which applies the event to the
//! current state and persists the result as one step. Transitions for the
//! same user are serialized.
//!
//! Verification runs as numbered attempts. [`ProgressStore::begin_verification`]
//! hands out an attempt id and [`ProgressStore::finish_verification`] only
//! records a failure for the attempt that currently holds the task, so an
//! attempt whose lease was reclaimed cannot overwrite the newer outcome.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Task, TaskEvent, TaskProgress, TaskRecord, TaskState, TransitionError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("progress store unavailable: {0}")]
    Backend(String),
}

/// An admitted verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationAttempt {
    pub id: u64,
    /// `Verifying`, or `Completed` if the task was already done
    pub state: TaskState,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Task definition by id
    async fn task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    /// Insert or replace a task definition
    async fn put_task(&self, task: Task) -> Result<(), StoreError>;

    /// Current state of one task (`NotOpened` if never touched)
    async fn state(&self, user_id: u64, task_id: &str) -> Result<TaskState, StoreError>;

    /// Every recorded task for a user
    async fn progress(&self, user_id: u64) -> Result<TaskProgress, StoreError>;

    /// Apply `event` and persist the resulting state
    async fn transition(
        &self,
        user_id: u64,
        task_id: &str,
        event: TaskEvent,
    ) -> Result<TaskState, StoreError>;

    /// Move the task into `Verifying` and start a new attempt
    async fn begin_verification(
        &self,
        user_id: u64,
        task_id: &str,
    ) -> Result<VerificationAttempt, StoreError>;

    /// Record the outcome of `attempt`.
    ///
    /// Success always completes the task. Failure is dropped when a newer
    /// attempt has taken over.
    async fn finish_verification(
        &self,
        user_id: u64,
        task_id: &str,
        attempt: u64,
        succeeded: bool,
    ) -> Result<TaskState, StoreError>;
}

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a `Verifying` record blocks a new verification before it is
    /// treated as abandoned (default: 5 minutes)
    pub verifying_lease: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            verifying_lease: Duration::from_secs(300),
        }
    }
}

type UserTasks = Arc<Mutex<BTreeMap<String, TaskRecord>>>;

/// Process-local progress store
pub struct InMemoryProgressStore {
    config: StoreConfig,
    definitions: DashMap<String, Task>,
    users: DashMap<u64, UserTasks>,
}

impl InMemoryProgressStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            definitions: DashMap::new(),
            users: DashMap::new(),
        }
    }

    fn user(&self, user_id: u64) -> UserTasks {
        Arc::clone(self.users.entry(user_id).or_default().value())
    }

    fn lease_expired(&self, record: &TaskRecord) -> bool {
        let age = Utc::now().signed_duration_since(record.updated_at);
        age.to_std()
            .map(|age| age >= self.config.verifying_lease)
            .unwrap_or(false)
    }

    /// Apply one event under the user's lock.
    ///
    /// `attempt` is set for verification outcomes that belong to a numbered
    /// attempt.
    async fn apply(
        &self,
        user_id: u64,
        task_id: &str,
        event: TaskEvent,
        attempt: Option<u64>,
    ) -> Result<TaskRecord, StoreError> {
        let user = self.user(user_id);
        let mut tasks = user.lock().await;

        let current = tasks.get(task_id).copied();
        let from = current.map(|record| record.state).unwrap_or_default();
        let current_attempt = current.map(|record| record.attempt).unwrap_or(0);

        let next = match (current, event, attempt) {
            (_, TaskEvent::VerificationSucceeded, Some(_)) => TaskState::Completed,
            (Some(record), TaskEvent::VerificationFailed, Some(id)) if id != current_attempt => {
                debug!(user_id, task_id = %task_id, attempt = id, current = current_attempt, "Dropping superseded verification failure");
                return Ok(record);
            }
            // Abandoned verification: let a new attempt take over
            (Some(record), TaskEvent::BeginVerification, _)
                if record.state == TaskState::Verifying && self.lease_expired(&record) =>
            {
                warn!(user_id, task_id = %task_id, attempt = record.attempt, "Reclaiming stale verification");
                TaskState::Verifying
            }
            _ => from.apply(event)?,
        };

        let changed = from != next || (event == TaskEvent::BeginVerification && from != TaskState::Completed);
        let record = match current {
            Some(record) if !changed => record,
            _ if !changed => TaskRecord {
                state: next,
                updated_at: Utc::now(),
                attempt: 0,
            },
            _ => {
                let attempt = if event == TaskEvent::BeginVerification {
                    current_attempt + 1
                } else {
                    current_attempt
                };
                let record = TaskRecord {
                    state: next,
                    updated_at: Utc::now(),
                    attempt,
                };
                tasks.insert(task_id.to_string(), record);
                record
            }
        };

        debug!(user_id, task_id = %task_id, from = ?from, event = ?event, to = ?next, "Task transition");
        Ok(record)
    }
}

impl Default for InMemoryProgressStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.definitions.get(task_id).map(|entry| entry.value().clone()))
    }

    async fn put_task(&self, task: Task) -> Result<(), StoreError> {
        self.definitions.insert(task.id.clone(), task);
        Ok(())
    }

    async fn state(&self, user_id: u64, task_id: &str) -> Result<TaskState, StoreError> {
        let Some(tasks) = self.users.get(&user_id).map(|entry| Arc::clone(entry.value())) else {
            return Ok(TaskState::NotOpened);
        };
        let tasks = tasks.lock().await;
        Ok(tasks.get(task_id).map(|record| record.state).unwrap_or_default())
    }

    async fn progress(&self, user_id: u64) -> Result<TaskProgress, StoreError> {
        let Some(tasks) = self.users.get(&user_id).map(|entry| Arc::clone(entry.value())) else {
            return Ok(TaskProgress::default());
        };
        let tasks = tasks.lock().await;
        Ok(TaskProgress {
            tasks: tasks.clone(),
        })
    }

    async fn transition(
        &self,
        user_id: u64,
        task_id: &str,
        event: TaskEvent,
    ) -> Result<TaskState, StoreError> {
        Ok(self.apply(user_id, task_id, event, None).await?.state)
    }

    async fn begin_verification(
        &self,
        user_id: u64,
        task_id: &str,
    ) -> Result<VerificationAttempt, StoreError> {
        let record = self
            .apply(user_id, task_id, TaskEvent::BeginVerification, None)
            .await?;
        Ok(VerificationAttempt {
            id: record.attempt,
            state: record.state,
        })
    }

    async fn finish_verification(
        &self,
        user_id: u64,
        task_id: &str,
        attempt: u64,
        succeeded: bool,
    ) -> Result<TaskState, StoreError> {
        let event = if succeeded {
            TaskEvent::VerificationSucceeded
        } else {
            TaskEvent::VerificationFailed
        };
        Ok(self.apply(user_id, task_id, event, Some(attempt)).await?.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionKind;

    fn stale_store() -> InMemoryProgressStore {
        InMemoryProgressStore::new(StoreConfig {
            verifying_lease: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_untouched_task_is_not_opened() {
        let store = InMemoryProgressStore::default();
        assert_eq!(store.state(1, "t1").await.unwrap(), TaskState::NotOpened);
        assert!(store.progress(1).await.unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_task_definitions() {
        let store = InMemoryProgressStore::default();
        assert!(store.task("t1").await.unwrap().is_none());

        let task = Task {
            id: "t1".into(),
            post_reference: "0xabcdef01".into(),
            required_action: ActionKind::Like,
            required_user_id: 1,
            token_address: None,
            state: TaskState::NotOpened,
        };
        store.put_task(task.clone()).await.unwrap();
        assert_eq!(store.task("t1").await.unwrap(), Some(task));
    }

    #[tokio::test]
    async fn test_full_lifecycle_persists() {
        let store = InMemoryProgressStore::default();
        store.transition(1, "t1", TaskEvent::Open).await.unwrap();
        store.transition(1, "t1", TaskEvent::BeginVerification).await.unwrap();
        store.transition(1, "t1", TaskEvent::VerificationSucceeded).await.unwrap();

        assert_eq!(store.state(1, "t1").await.unwrap(), TaskState::Completed);
        // Other users are unaffected
        assert_eq!(store.state(2, "t1").await.unwrap(), TaskState::NotOpened);

        let progress = store.progress(1).await.unwrap();
        assert_eq!(progress.completed_count(), 1);
    }

    #[tokio::test]
    async fn test_completed_never_regresses() {
        let store = InMemoryProgressStore::default();
        store.transition(1, "t1", TaskEvent::BeginVerification).await.unwrap();
        store.transition(1, "t1", TaskEvent::VerificationSucceeded).await.unwrap();

        let state = store.transition(1, "t1", TaskEvent::VerificationFailed).await.unwrap();
        assert_eq!(state, TaskState::Completed);
        assert_eq!(store.state(1, "t1").await.unwrap(), TaskState::Completed);
    }

    #[tokio::test]
    async fn test_completed_record_is_not_rewritten() {
        let store = InMemoryProgressStore::default();
        let attempt = store.begin_verification(1, "t1").await.unwrap();
        store.finish_verification(1, "t1", attempt.id, true).await.unwrap();
        let before = store.progress(1).await.unwrap().tasks["t1"];

        tokio::time::sleep(Duration::from_millis(5)).await;
        let again = store.begin_verification(1, "t1").await.unwrap();
        store.transition(1, "t1", TaskEvent::Open).await.unwrap();

        assert_eq!(again.state, TaskState::Completed);
        assert_eq!(store.progress(1).await.unwrap().tasks["t1"], before);
    }

    #[tokio::test]
    async fn test_concurrent_begin_admits_one() {
        let store = Arc::new(InMemoryProgressStore::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.transition(7, "t1", TaskEvent::BeginVerification).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_stale_verification_is_reclaimed() {
        let store = stale_store();
        let first = store.begin_verification(1, "t1").await.unwrap();
        let second = store.begin_verification(1, "t1").await.unwrap();
        assert_eq!(second.state, TaskState::Verifying);
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_superseded_failure_does_not_override_newer_attempt() {
        let store = stale_store();
        let first = store.begin_verification(1, "t1").await.unwrap();
        let second = store.begin_verification(1, "t1").await.unwrap();

        // The reclaimed attempt fails late while the new one is still running
        let state = store.finish_verification(1, "t1", first.id, false).await.unwrap();
        assert_eq!(state, TaskState::Verifying);

        let state = store.finish_verification(1, "t1", second.id, true).await.unwrap();
        assert_eq!(state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_late_success_completes_after_newer_failure() {
        let store = stale_store();
        let first = store.begin_verification(1, "t1").await.unwrap();
        let second = store.begin_verification(1, "t1").await.unwrap();

        store.finish_verification(1, "t1", second.id, false).await.unwrap();
        assert_eq!(store.state(1, "t1").await.unwrap(), TaskState::Error);

        let state = store.finish_verification(1, "t1", first.id, true).await.unwrap();
        assert_eq!(state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_state() {
        let store = InMemoryProgressStore::default();
        tokio_test::assert_ok!(store.transition(1, "t1", TaskEvent::Open).await);
        let err = tokio_test::assert_err!(
            store
                .transition(1, "t1", TaskEvent::VerificationSucceeded)
                .await
        );
        assert!(matches!(err, StoreError::Transition(_)));
        assert_eq!(store.state(1, "t1").await.unwrap(), TaskState::Opened);
    }
}
