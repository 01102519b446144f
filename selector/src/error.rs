use std::{io, path::PathBuf};

use strum::Display;
use thiserror::Error;

/// Stage of the audit an error or log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Metrics,
    Dashboards,
    DashboardDetails,
    Alerts,
}

/// Failure reported by a [`QueryExecutor`](crate::QueryExecutor): network,
/// HTTP status, authentication, or GraphQL-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    /// Malformed input, always reported before any network activity.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{phase}: query failed: {source}")]
    Transport {
        phase: Phase,
        #[source]
        source: TransportError,
    },

    /// The executor answered but the payload did not have the expected shape.
    #[error("{phase}: unexpected response shape: {source}")]
    Decode {
        phase: Phase,
        #[source]
        source: serde_json::Error,
    },

    #[error("{phase}: server returned the same cursor {cursor:?} twice")]
    StalledPagination { phase: Phase, cursor: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AuditError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn transport(phase: Phase, source: TransportError) -> Self {
        Self::Transport { phase, source }
    }

    pub(crate) fn decode(phase: Phase, source: serde_json::Error) -> Self {
        Self::Decode { phase, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type Result<T, E = AuditError> = std::result::Result<T, E>;
