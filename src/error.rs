//! # Error taxonomy
//!
//! Every fallible operation in the crate returns [`VaultError`]. The first
//! five variants are the domain failures callers are expected to match on;
//! the rest carry lower-level causes (Diesel, I/O, the ANN index) upward.
//!
//! Missing targets of rename/update/delete are deliberately **not** errors:
//! those operations resolve absent rows as silent no-ops. Anchor search is
//! the exception — there the caller supplied an explicit reference, so
//! absence surfaces as [`VaultError::NotFound`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Error, Debug)]
pub enum VaultError {
    /// Uniqueness violation on `cwes.id`, `cwes.name`, or `cves.id`.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// A referenced CWE or CVE is absent where the operation requires it.
    #[error("not found: {0}")]
    NotFound(String),

    /// Query vector of the wrong dimension, or otherwise unusable query input.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A CVE insert whose weakness category could not be resolved or created.
    #[error("referential violation: {0}")]
    Referential(String),

    /// The embedding provider failed; the enclosing mutation was aborted.
    #[error("embedding provider: {0}")]
    Provider(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("vector index error: {0}")]
    Index(&'static str),

    #[error("embedding codec error: {0}")]
    Codec(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<candle_core::Error> for VaultError {
    fn from(err: candle_core::Error) -> Self {
        VaultError::Provider(err.to_string())
    }
}
