//! Saga bookkeeping for operations spanning the vector index and the catalog.
//!
//! The two stores share no transaction. Each coordinator records every step
//! it commits in a [`SagaLog`]; when a later step fails it undoes the
//! recorded steps in reverse and reports one of three outcomes:
//!
//! | Outcome | Meaning |
//! |---------|---------|
//! | [`SagaError::Unchanged`] | failed before anything was committed |
//! | [`SagaError::Compensated`] | committed steps were undone |
//! | [`SagaError::PartiallyApplied`] | stores disagree; manual reconciliation needed |

use std::fmt;

use thiserror::Error;

use crate::error::Error;
use crate::models::FileId;

/// A committed mutation of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A catalog document row was created.
    DocumentRegistered { file_id: FileId },
    /// Chunks were removed from the vector index.
    ChunksRemoved { file_id: FileId, chunks: usize },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::DocumentRegistered { file_id } => write!(f, "registered document {}", file_id),
            Step::ChunksRemoved { file_id, chunks } => {
                write!(f, "removed {} chunks of document {}", chunks, file_id)
            }
        }
    }
}

fn describe(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn compensation_note(compensation: &Option<Error>) -> String {
    match compensation {
        Some(e) => format!("; compensation failed: {}", e),
        None => String::new(),
    }
}

/// Terminal failure of a saga.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SagaError {
    #[error("{cause} (nothing was changed)")]
    Unchanged { cause: Error },

    #[error("{cause} (rolled back: {})", describe(.undone))]
    Compensated { cause: Error, undone: Vec<Step> },

    #[error(
        "{cause} (PARTIALLY APPLIED, manual reconciliation needed; committed: {}{})",
        describe(.committed),
        compensation_note(.compensation)
    )]
    PartiallyApplied {
        cause: Error,
        committed: Vec<Step>,
        compensation: Option<Error>,
    },
}

impl SagaError {
    /// The failure that stopped the saga.
    pub fn cause(&self) -> &Error {
        match self {
            SagaError::Unchanged { cause }
            | SagaError::Compensated { cause, .. }
            | SagaError::PartiallyApplied { cause, .. } => cause,
        }
    }

    /// Whether the stores may now disagree.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, SagaError::PartiallyApplied { .. })
    }

    /// Short outcome label for logs and CLI output.
    pub fn outcome(&self) -> &'static str {
        match self {
            SagaError::Unchanged { .. } => "unchanged",
            SagaError::Compensated { .. } => "compensated",
            SagaError::PartiallyApplied { .. } => "partially_applied",
        }
    }
}

impl From<Error> for SagaError {
    fn from(cause: Error) -> Self {
        SagaError::Unchanged { cause }
    }
}

/// Ordered record of committed steps.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SagaLog {
    committed: Vec<Step>,
}

impl SagaLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step) {
        self.committed.push(step);
    }

    pub fn committed(&self) -> &[Step] {
        &self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Steps to undo, most recent first.
    pub fn pending_compensation(&self) -> impl Iterator<Item = &Step> {
        self.committed.iter().rev()
    }

    /// Classify a failure given the result of running compensation.
    pub fn fail(self, cause: Error, compensation: Result<(), Error>) -> SagaError {
        if self.committed.is_empty() {
            return SagaError::Unchanged { cause };
        }
        match compensation {
            Ok(()) => SagaError::Compensated {
                cause,
                undone: self.committed,
            },
            Err(e) => SagaError::PartiallyApplied {
                cause,
                committed: self.committed,
                compensation: Some(e),
            },
        }
    }

    /// A failure after a step that has no compensating action.
    pub fn fail_uncompensated(self, cause: Error) -> SagaError {
        if self.committed.is_empty() {
            return SagaError::Unchanged { cause };
        }
        SagaError::PartiallyApplied {
            cause,
            committed: self.committed,
            compensation: None,
        }
    }
}
