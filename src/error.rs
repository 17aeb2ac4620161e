//! Unified error type.

use thiserror::Error;

/// Shorthand used by every fallible operation in actio.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by actio's fallible operations.
///
/// Application-level outcomes (404, 422, etc.) are expressed as
/// [`ActionResult`](crate::ActionResult) values, and lookups that find nothing
/// return `Ok(None)`. This type surfaces contract violations and
/// infrastructure failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),

    #[error("configuration: {0}")]
    Config(String),

    /// The number of values does not match the number of fields in a
    /// criteria expression or field list.
    #[error("expected {expected} value(s) for the field specification, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("invalid criteria expression: {0}")]
    Expression(String),

    /// A write addressed an entity that is not in storage.
    #[error("entity not found in {collection}: {id}")]
    NotFound { collection: String, id: String },

    #[error("storage: {0}")]
    Storage(String),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid cookie: {0}")]
    InvalidCookie(String),

    #[error("invalid locale `{0}`")]
    InvalidLocale(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported charset `{0}`")]
    UnsupportedCharset(String),

    #[error("response already started")]
    ResponseStarted,

    #[error("response already committed")]
    ResponseCommitted,

    /// The server side of the exchange went away (client disconnected or the
    /// dispatcher dropped the response).
    #[error("exchange closed")]
    ExchangeClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_names_both_counts() {
        let e = Error::Arity { expected: 2, actual: 3 };
        assert_eq!(e.to_string(), "expected 2 value(s) for the field specification, got 3");
    }

    #[test]
    fn io_errors_convert() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy").into();
        assert!(matches!(e, Error::Io(_)));
    }
}
