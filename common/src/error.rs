use std::error::Error as StdError;
use std::fmt::Formatter;
use std::io;

use serde::{Deserialize, Serialize};
use strum::Display;

/// The tagged error kinds from the control plane's error-handling design: each kind tells
/// the workflow engine whether the condition is retryable and whether it should be shown to
/// the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    SourceMissing,
    AuthDenied,
    BuildFailure,
    RegistryUnavailable,
    RolloutTimeout,
    OrchestratorTransient,
    Conflict,
    NotFound,
    Internal,
    Database,
    Io,
}

impl ErrorKind {
    /// Whether the workflow engine should retry an activity that failed with this kind,
    /// per the error handling design table.
    pub fn retryable(self) -> bool {
        matches!(self, Self::RegistryUnavailable | Self::OrchestratorTransient)
    }

    /// Whether the failure should be shown to the end user as-is, rather than being
    /// swallowed as an internal/expected condition.
    pub fn user_visible(self) -> bool {
        !matches!(self, Self::Conflict | Self::NotFound)
    }
}

/// Server-side errors that do not have to do with user-supplied source code should be
/// [`Error`]s. All [`Error`]s have an [`ErrorKind`] and an optional source.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Sync + Send + 'static>>,
}

impl Error {
    pub fn source<E: StdError + Sync + Send + 'static>(kind: ErrorKind, err: E) -> Self {
        Self {
            kind,
            source: Some(Box::new(err)),
        }
    }

    pub fn custom<S: AsRef<str>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(io::Error::new(
                io::ErrorKind::Other,
                message.as_ref().to_string(),
            ))),
        }
    }

    pub fn from_kind(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::source(ErrorKind::Io, err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::from_kind(ErrorKind::NotFound),
            _ => Self::source(ErrorKind::Database, err),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(source) = self.source.as_ref() {
            write!(f, ": ")?;
            source.fmt(f)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_design_table() {
        assert!(ErrorKind::RegistryUnavailable.retryable());
        assert!(ErrorKind::OrchestratorTransient.retryable());
        assert!(!ErrorKind::BuildFailure.retryable());
        assert!(!ErrorKind::Conflict.retryable());
    }

    #[test]
    fn conflict_and_not_found_are_not_user_visible() {
        assert!(!ErrorKind::Conflict.user_visible());
        assert!(!ErrorKind::NotFound.user_visible());
        assert!(ErrorKind::BuildFailure.user_visible());
    }

    #[test]
    fn display_includes_source() {
        let err = Error::custom(ErrorKind::BuildFailure, "exit code 1");
        assert_eq!(err.to_string(), "build-failure: exit code 1");
    }
}
