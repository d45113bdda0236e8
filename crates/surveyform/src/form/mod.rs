//! The survey form: validation, the submission state machine and page rendering.

mod page;

use tracing::debug;

use crate::error::{Error, Result};
use crate::recorder::{AppendOutcome, Recorder};
use crate::submission::{FormInput, Submission};
use crate::table::AnswerTable;

pub use page::{escape_html, render_page, PageView, QUESTIONS};

/// Where one submission is in its lifecycle.
///
/// `Submitting` only exists while the fetch-append-commit cycle runs; callers
/// observe one of the other three states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    /// The form is being filled in. A warning explains a rejected submit.
    Collecting {
        /// Why the last submit was rejected, if it was.
        warning: Option<String>,
    },
    /// The submission is being written to the store.
    Submitting,
    /// The submission was stored.
    Succeeded {
        /// Rows in the table after the append.
        rows: usize,
        /// Attempts the append needed.
        attempts: u32,
    },
    /// The store rejected or could not take the submission.
    Failed {
        /// Error shown to the respondent.
        reason: String,
    },
}

impl Default for SubmissionState {
    fn default() -> Self {
        Self::Collecting { warning: None }
    }
}

impl SubmissionState {
    /// Map the result of a submit to the state shown to the respondent.
    #[must_use]
    pub fn from_result(result: &Result<AppendOutcome>) -> Self {
        match result {
            Ok(outcome) => Self::Succeeded {
                rows: outcome.rows,
                attempts: outcome.attempts,
            },
            Err(Error::Validation { message }) => Self::Collecting {
                warning: Some(message.clone()),
            },
            Err(err) => Self::Failed {
                reason: err.to_string(),
            },
        }
    }

    /// Whether the submission ended up in the table.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Collects form input and hands valid submissions to the recorder.
#[derive(Debug, Clone)]
pub struct FormCollector {
    recorder: Recorder,
}

impl FormCollector {
    /// Create a collector writing through `recorder`.
    #[must_use]
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }

    /// The recorder submissions are written through.
    #[must_use]
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Validate `input`, stamp it and append it to the table.
    ///
    /// Invalid input is rejected before the store is contacted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty answers, otherwise whatever the
    /// recorder returns.
    pub async fn submit(&self, input: FormInput) -> Result<AppendOutcome> {
        let submission = Submission::from_input(input)?;
        debug!(state = ?SubmissionState::Submitting, timestamp = %submission.timestamp);
        self.recorder.append(&submission).await
    }

    /// Submit and report the resulting state.
    pub async fn handle(&self, input: FormInput) -> SubmissionState {
        let result = self.submit(input).await;
        let state = SubmissionState::from_result(&result);
        debug!(?state, "Submission finished");
        state
    }

    /// Every stored submission, for the read-only answers view.
    ///
    /// # Errors
    ///
    /// Returns the store error if the table cannot be fetched.
    pub async fn list(&self) -> Result<AnswerTable> {
        self.recorder.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RetryPolicy;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn collector(store: &Arc<MemoryStore>) -> FormCollector {
        FormCollector::new(Recorder::new(store.clone(), RetryPolicy::default()))
    }

    fn input(name: &str, a1: &str, a2: &str, a3: &str) -> FormInput {
        FormInput {
            name: name.to_string(),
            answer1: a1.to_string(),
            answer2: a2.to_string(),
            answer3: a3.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_answers_never_reach_the_store() {
        let store = Arc::new(MemoryStore::new());
        let form = collector(&store);

        let state = form.handle(input("Ana", "", "", "")).await;

        assert!(matches!(
            state,
            SubmissionState::Collecting { warning: Some(_) }
        ));
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_answer_is_stored_verbatim() {
        let store = Arc::new(MemoryStore::new());
        let form = collector(&store);

        let state = form.handle(input("", "", " ", "")).await;

        assert!(state.is_success());
        let table = form.list().await.unwrap();
        assert_eq!(table.rows()[0].answers[1], " ");
    }

    #[tokio::test]
    async fn test_two_submissions_in_order() {
        let store = Arc::new(MemoryStore::new());
        let form = collector(&store);

        let state = form.handle(input("Ana", "a", "", "")).await;
        assert_eq!(
            state,
            SubmissionState::Succeeded {
                rows: 1,
                attempts: 1
            }
        );

        let table = form.list().await.unwrap();
        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.name.as_deref(), Some("Ana"));
        assert_eq!(row.answers[0], "a");
        assert_eq!(row.answers[1], "");
        assert_eq!(row.answers[2], "");

        form.handle(input("", "", "b", "")).await;
        let table = form.list().await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].answers[0], "a");
        assert_eq!(table.rows()[1].answers[1], "b");
        assert!(table.rows()[1].name.is_none());
    }

    #[test]
    fn test_state_from_store_error() {
        let result = Err(Error::remote_store(Some(500), "boom"));
        let state = SubmissionState::from_result(&result);
        assert!(matches!(state, SubmissionState::Failed { reason } if reason.contains("boom")));
    }

    #[test]
    fn test_state_from_exhausted_retries() {
        let result = Err(Error::RetriesExhausted { attempts: 3 });
        let state = SubmissionState::from_result(&result);
        assert!(!state.is_success());
        assert!(matches!(state, SubmissionState::Failed { .. }));
    }

    #[test]
    fn test_default_state_is_collecting() {
        assert_eq!(
            SubmissionState::default(),
            SubmissionState::Collecting { warning: None }
        );
    }
}
