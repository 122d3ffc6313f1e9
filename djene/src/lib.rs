//! # djene
//!
//! A lazy Django-style queryset layer for Rust.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient
//! access. You can depend on `djene` to get the whole stack, or depend on
//! individual crates for finer-grained control.

/// Core types: errors, settings, and logging setup.
pub use djene_core as core;

/// Queryset layer: the Model trait, `QuerySet`, Manager, and sessions.
pub use djene_db as db;

/// Database backends: `SQLite`.
pub use djene_db_backends as db_backends;

/// HTTP integration: request-scoped sessions for axum.
pub use djene_http as http;

/// The most commonly used items, for a one-line import.
pub mod prelude {
    pub use djene_core::{DjeneError, DjeneResult};
    pub use djene_db::model::Model;
    pub use djene_db::query::queryset::{Manager, QuerySet};
    pub use djene_db::session::{self, Session, SessionProvider};
    pub use djene_db::value::Value;
}
