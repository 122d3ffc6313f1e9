//! Core error types for djene.
//!
//! [`DjeneError`] covers every error the framework surfaces: lookup and
//! session configuration problems, field validation failures, the ORM
//! cardinality errors (`DoesNotExist` / `MultipleObjectsReturned`), and
//! database-level failures. Nothing in the framework swallows or retries
//! an error; everything propagates to the immediate caller.

use thiserror::Error;

/// The primary error type for djene.
///
/// Each variant maps to an HTTP status code via [`DjeneError::status_code`],
/// which the HTTP session middleware uses when translating framework errors
/// into responses.
#[derive(Error, Debug)]
pub enum DjeneError {
    // ── Configuration ────────────────────────────────────────────────
    /// A filter lookup or value was malformed (unknown operator suffix,
    /// a `range` without exactly two elements, a pattern lookup given a
    /// non-string value). Raised immediately at the call that detected it.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The framework is improperly configured: no active session scope,
    /// or no database engine registered.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Validation ───────────────────────────────────────────────────
    /// A filter or ordering referenced a field that does not exist on the
    /// model.
    #[error("Validation error: {0}")]
    ValidationError(String),

    // ── ORM cardinality ──────────────────────────────────────────────
    /// A query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    // ── Database ─────────────────────────────────────────────────────
    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// An operational database error (connection failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── IO ───────────────────────────────────────────────────────────
    /// An I/O error occurred (settings file loading, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DjeneError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `ValidationError`, `ConfigurationError` -> 400
    /// - `DoesNotExist` -> 404
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_) | Self::ConfigurationError(_) => 400,
            Self::DoesNotExist(_) => 404,
            Self::ImproperlyConfigured(_)
            | Self::MultipleObjectsReturned(_)
            | Self::DatabaseError(_)
            | Self::OperationalError(_)
            | Self::IoError(_) => 500,
        }
    }
}

/// A convenience type alias for `Result<T, DjeneError>`.
pub type DjeneResult<T> = Result<T, DjeneError>;
