//! `surveyform` - A survey web form that appends answers to a CSV file kept in
//! a GitHub repository.
//!
//! Each submission runs a fetch-append-commit cycle against the remote file,
//! guarded by the file's revision token, and is retried a bounded number of
//! times when another writer got there first.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod logging;
pub mod recorder;
pub mod server;
pub mod store;
pub mod submission;
pub mod table;

pub use config::{Config, StoreBackend};
pub use error::{Error, Result};
pub use form::{FormCollector, SubmissionState};
pub use logging::init_logging;
pub use recorder::{AppendOutcome, Recorder, RetryPolicy};
pub use store::{GitHubStore, MemoryStore, RemoteStore, Revision, Snapshot};
pub use submission::{FormInput, Submission};
pub use table::AnswerTable;
