//! Error types for the library and the commands.
//!
//! Internally we pass `anyhow::Error` around using the `Res<T>` alias. At the boundary of the
//! library (commands, HTTP handlers) errors are classified with an `ErrorType` so that callers can
//! decide what to do with them, e.g. which HTTP status to respond with.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A coarse classification of what went wrong.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The configuration directory or file is missing or invalid.
    Config,
    /// The caller is not signed in, or presented bad credentials.
    Auth,
    /// The request was malformed.
    Request,
    /// The thing that was asked for does not exist.
    NotFound,
    /// The document store failed.
    Storage,
    /// The Plaid API failed or rejected a request.
    Aggregator,
    /// The Google Sheets or Drive API failed.
    Sheets,
    /// Reading or writing a local file failed.
    Io,
    #[default]
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type. It carries an `ErrorType` along with the full `anyhow` context chain.
#[derive(Debug)]
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    /// Create an error from a plain message.
    pub fn msg(error_type: ErrorType, message: impl Display) -> Self {
        Self::new(error_type, anyhow::anyhow!("{message}"))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// The outermost context message, without the chain of causes.
    pub fn message(&self) -> String {
        self.source.to_string()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

impl From<anyhow::Error> for Error {
    fn from(source: anyhow::Error) -> Self {
        Self::new(ErrorType::Internal, source)
    }
}

/// Converts an internal `Res<T>` (or any result with a std error) into a public `Result<T>`.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_type_and_chain() {
        let res: Res<()> = Err(anyhow::anyhow!("disk on fire")).context("Unable to save");
        let e = res.pub_result(ErrorType::Io).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Io);
        assert_eq!(e.message(), "Unable to save");
        assert_eq!(e.to_string(), "Unable to save: disk on fire");
    }

    #[test]
    fn test_from_anyhow_is_internal() {
        let e: Error = anyhow::anyhow!("boom").into();
        assert_eq!(e.error_type(), ErrorType::Internal);
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::NotFound.to_string(), "not_found");
        assert_eq!("aggregator".parse::<ErrorType>().unwrap(), ErrorType::Aggregator);
    }
}
