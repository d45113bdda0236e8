//! The read-modify-write cycle that appends one submission to the table.
//!
//! Every append fetches the whole table, pushes one row and commits the whole
//! table back against the fetched revision. A lost race surfaces as
//! [`Error::Conflict`]; the cycle is then restarted from a fresh fetch, so the
//! other writer's row is never overwritten.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{RemoteStore, Revision};
use crate::submission::Submission;
use crate::table::AnswerTable;

/// Bounds on how often a conflicting append is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Attempt `n` sleeps `n * backoff` before retrying.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from the `[retry]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry.max_attempts.max(1),
            backoff: config.backoff(),
        }
    }

    /// A policy that retries immediately.
    #[must_use]
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::ZERO,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Revision written by the winning commit.
    pub revision: Revision,
    /// Rows in the table after the append.
    pub rows: usize,
    /// Attempts used, 1 when there was no conflict.
    pub attempts: u32,
}

/// Appends submissions to a [`RemoteStore`] and reads the table back.
#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("store", &self.store.name())
            .field("location", &self.store.location())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Recorder {
    /// Create a recorder over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// The retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Read every stored submission.
    ///
    /// # Errors
    ///
    /// Returns the store error if the table cannot be fetched.
    pub async fn list(&self) -> Result<AnswerTable> {
        Ok(self.store.fetch().await?.table)
    }

    /// Append `submission`, retrying the whole cycle on conflicts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetriesExhausted`] if every attempt conflicted, or the
    /// first non-conflict store error unchanged.
    #[instrument(name = "append", skip(self, submission), fields(store = self.store.name()))]
    pub async fn append(&self, submission: &Submission) -> Result<AppendOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_append(submission).await {
                Ok((revision, rows)) => {
                    info!(attempt, rows, "Submission stored");
                    return Ok(AppendOutcome {
                        revision,
                        rows,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_conflict() => {
                    if attempt >= self.policy.max_attempts {
                        warn!(attempt, "Giving up after repeated conflicts");
                        return Err(Error::RetriesExhausted { attempts: attempt });
                    }
                    let delay = self.policy.delay_after(attempt);
                    debug!(attempt, ?delay, "Table changed underneath us, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_append(&self, submission: &Submission) -> Result<(Revision, usize)> {
        let snapshot = self.store.fetch().await?;
        let mut table = snapshot.table;
        table.push(submission.clone());
        let revision = self
            .store
            .commit(&table, snapshot.revision.as_ref())
            .await?;
        Ok((revision, table.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Snapshot};
    use crate::submission::FormInput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn submission(name: &str, a1: &str) -> Submission {
        Submission::from_input(FormInput {
            name: name.to_string(),
            answer1: a1.to_string(),
            ..FormInput::default()
        })
        .unwrap()
    }

    /// Lets another writer slip a row in between our fetch and our commit,
    /// `races` times.
    struct RacingStore {
        inner: MemoryStore,
        races: AtomicU32,
    }

    #[async_trait]
    impl RemoteStore for RacingStore {
        fn name(&self) -> &'static str {
            "racing"
        }

        fn location(&self) -> String {
            self.inner.location()
        }

        async fn fetch(&self) -> Result<Snapshot> {
            let snapshot = self.inner.fetch().await?;
            if self
                .races
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                let mut theirs = snapshot.table.clone();
                theirs.push(submission("Outro", "concurrent"));
                self.inner
                    .commit(&theirs, snapshot.revision.as_ref())
                    .await?;
            }
            Ok(snapshot)
        }

        async fn commit(&self, table: &AnswerTable, revision: Option<&Revision>) -> Result<Revision> {
            self.inner.commit(table, revision).await
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RemoteStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn location(&self) -> String {
            "nowhere".to_string()
        }

        async fn fetch(&self) -> Result<Snapshot> {
            Err(Error::remote_store(Some(401), "Bad credentials"))
        }

        async fn commit(&self, _: &AnswerTable, _: Option<&Revision>) -> Result<Revision> {
            Err(Error::internal("commit must not be reached"))
        }
    }

    fn racing(races: u32) -> Arc<RacingStore> {
        Arc::new(RacingStore {
            inner: MemoryStore::new(),
            races: AtomicU32::new(races),
        })
    }

    #[tokio::test]
    async fn test_append_to_missing_table() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::new(store.clone(), RetryPolicy::default());

        let outcome = recorder.append(&submission("Ana", "a")).await.unwrap();

        assert_eq!(outcome.rows, 1);
        assert_eq!(outcome.attempts, 1);
        let table = recorder.list().await.unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_append_adds_exactly_one_row() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::new(store.clone(), RetryPolicy::default());
        recorder.append(&submission("", "first")).await.unwrap();

        let before = recorder.list().await.unwrap();
        let entry = submission("Bia", "second");
        recorder.append(&entry).await.unwrap();
        let after = recorder.list().await.unwrap();

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after.rows()[..before.len()], before.rows());
        assert_eq!(after.rows().last(), Some(&entry));
    }

    #[tokio::test]
    async fn test_conflict_is_retried_without_losing_rows() {
        let store = racing(1);
        let recorder = Recorder::new(store.clone(), RetryPolicy::without_backoff(3));

        let outcome = recorder.append(&submission("Ana", "mine")).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.rows, 2);
        let table = store.inner.fetch().await.unwrap().table;
        let answers: Vec<&str> = table.iter().map(|s| s.answers[0].as_str()).collect();
        assert_eq!(answers, vec!["concurrent", "mine"]);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let store = racing(u32::MAX);
        let recorder = Recorder::new(store.clone(), RetryPolicy::without_backoff(3));

        let err = recorder.append(&submission("Ana", "mine")).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 3 }));
        let table = store.inner.fetch().await.unwrap().table;
        assert!(table.iter().all(|s| s.answers[0] != "mine"));
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_store_error_is_not_retried() {
        let recorder = Recorder::new(Arc::new(FailingStore), RetryPolicy::without_backoff(5));

        let err = recorder.append(&submission("Ana", "a")).await.unwrap_err();

        assert_eq!(err.remote_status(), Some(401));
    }

    #[tokio::test]
    async fn test_two_writers_same_revision() {
        let store = Arc::new(MemoryStore::new());
        let first = Recorder::new(store.clone(), RetryPolicy::default());
        first.append(&submission("", "seed")).await.unwrap();

        let snap_a = store.fetch().await.unwrap();
        let snap_b = store.fetch().await.unwrap();
        assert_eq!(snap_a.revision, snap_b.revision);

        let mut table_a = snap_a.table;
        table_a.push(submission("A", "from a"));
        let mut table_b = snap_b.table;
        table_b.push(submission("B", "from b"));

        store
            .commit(&table_a, snap_a.revision.as_ref())
            .await
            .unwrap();
        let err = store
            .commit(&table_b, snap_b.revision.as_ref())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // The loser retries the whole cycle through the recorder.
        let retry = Recorder::new(store.clone(), RetryPolicy::without_backoff(3));
        retry.append(&submission("B", "from b")).await.unwrap();

        let answers: Vec<String> = store
            .fetch()
            .await
            .unwrap()
            .table
            .iter()
            .map(|s| s.answers[0].clone())
            .collect();
        assert_eq!(answers, vec!["seed", "from a", "from b"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_row() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::new(store.clone(), RetryPolicy::without_backoff(50));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .append(&submission("", &format!("answer {i}")))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(recorder.list().await.unwrap().len(), 8);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = Config::default();
        config.retry.max_attempts = 4;
        config.retry.backoff_ms = 250;

        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_after(2), Duration::from_millis(500));
    }

    #[test]
    fn test_recorder_debug_names_store() {
        let recorder = Recorder::new(Arc::new(MemoryStore::new()), RetryPolicy::default());
        let debug_str = format!("{recorder:?}");
        assert!(debug_str.contains("memory"));
    }
}
