use thiserror::Error;
use uuid::Uuid;

use crate::checkin::MAX_NOTE_CHARS;

/// Failures of a check-in submission. The `Display` strings for the
/// validation variants are shown to the submitter verbatim; persistence
/// causes are logged for operators and surfaced generically.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a valid student id is required")]
    InvalidInput,
    #[error("emotion must be one of: happy, neutral, normal, stressed, sleepy")]
    InvalidEmotion,
    #[error("note must be {MAX_NOTE_CHARS} characters or fewer")]
    NoteTooLong,
    #[error("this student has already checked in today")]
    AlreadyCheckedInToday,
    #[error("no student exists with that id")]
    StudentNotFound,
    #[error("storage failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// Failures of a pattern evaluation. Never surfaced to the original
/// submitter; the fire-and-forget wrapper logs them instead.
#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("student {0} not found")]
    StudentNotFound(Uuid),
    #[error("storage failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// Failures of an outbound alert dispatch. Reported to the evaluation
/// caller as `sent = false`, never raised past it.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification channel is not configured")]
    NotConfigured,
    #[error("notification request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("notification API rejected the message ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}
