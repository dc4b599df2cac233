//! Error types for the finanzas library.
//!
//! Internally, functions return `Res<T>`, which is an `anyhow::Result`. At the public boundary
//! errors are converted into `Error`, which carries an `ErrorType` so that callers can tell a
//! missing credential apart from a flaky network or a missing cache file.

use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies an `Error` by where in the pipeline it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Missing credential or data source id, or an unusable configuration file.
    Config,
    /// The remote service rejected the credential or does not know the data source.
    Authentication,
    /// The remote service could not be reached, even after retrying.
    Network,
    /// The remote service answered with something we could not use.
    Remote,
    /// There is no cache file to load.
    CacheMissing,
    /// The cache file could not be read or written.
    Cache,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub(crate) fn msg(error_type: ErrorType, message: impl Display) -> Self {
        Self::new(error_type, anyhow::anyhow!("{message}"))
    }

    /// What kind of failure this is.
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Transient failures are worth retrying, everything else is not.
    pub fn is_transient(&self) -> bool {
        self.error_type == ErrorType::Network
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.error_type, self.source)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:#}", self.error_type, self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Converts an internal result into a public `Result` tagged with an `ErrorType`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| match e.downcast::<Error>() {
            // Keep the more specific classification when one was already made.
            Ok(inner) => inner,
            Err(e) => Error::new(error_type, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn pub_result_tags_plain_errors() {
        let res: Res<()> = Err(anyhow::anyhow!("boom"));
        let err = res.pub_result(ErrorType::Cache).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Cache);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn pub_result_keeps_inner_type() {
        let res: Res<()> = Err(Error::msg(ErrorType::Authentication, "401").into());
        let err = res.pub_result(ErrorType::Internal).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Authentication);
    }

    #[test]
    fn display_includes_context_chain() {
        let res: Res<()> = Err(anyhow::anyhow!("inner")).context("outer");
        let err = res.pub_result(ErrorType::Remote).unwrap_err();
        let s = err.to_string();
        assert!(s.starts_with("remote error"), "{s}");
        assert!(s.contains("outer") && s.contains("inner"), "{s}");
    }

    #[test]
    fn only_network_is_transient() {
        assert!(Error::msg(ErrorType::Network, "x").is_transient());
        assert!(!Error::msg(ErrorType::Authentication, "x").is_transient());
    }
}
