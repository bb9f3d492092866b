use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a generated question was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub(crate) enum QuestionIssueKind {
    NoOptions,
    NoCorrectOption,
    MultipleCorrect(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct QuestionIssue {
    /// Zero-based position of the question in the upstream response.
    pub(crate) index: usize,
    pub(crate) question: String,
    pub(crate) kind: QuestionIssueKind,
}

impl fmt::Display for QuestionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QuestionIssueKind::NoOptions => {
                write!(f, "question {} has no options", self.index + 1)
            }
            QuestionIssueKind::NoCorrectOption => {
                write!(f, "question {} has no option matching correct_answer", self.index + 1)
            }
            QuestionIssueKind::MultipleCorrect(count) => {
                write!(f, "question {} has {count} options matching correct_answer", self.index + 1)
            }
        }
    }
}

/// Rejected upstream output. Always carries the raw text for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ValidationFailure {
    pub(crate) reason: String,
    pub(crate) issues: Vec<QuestionIssue>,
    pub(crate) raw_response: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub(crate) enum QuizError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("upstream error: {message}")]
    Upstream { message: String, status: Option<u16>, retryable: bool },
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal consistency error: {0}")]
    Consistency(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub(crate) type QuizResult<T> = Result<T, QuizError>;

impl QuizError {
    /// Log the underlying error with context and return a `Consistency` variant.
    pub(crate) fn internal(err: impl fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Consistency(context.to_string())
    }

    pub(crate) fn upstream_status(service: &str, status: u16, body: &str) -> Self {
        Self::Upstream {
            message: format!("{service} returned status {status}: {}", truncate(body, 512)),
            status: Some(status),
            retryable: status == 429 || status >= 500,
        }
    }

    pub(crate) fn upstream_transport(service: &str, err: impl fmt::Display) -> Self {
        Self::Upstream {
            message: format!("failed to reach {service}: {err}"),
            status: None,
            retryable: true,
        }
    }

    /// Whether a caller may retry the same request later.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream { retryable: true, .. })
    }

    /// Whether the message is meant for the end user rather than operators.
    pub(crate) fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Consistency(_) | Self::Database(_))
    }

    pub(crate) fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Validation(failure) => Some(failure.raw_response.as_str()),
            _ => None,
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
