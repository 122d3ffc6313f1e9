//! # djene-db-backends
//!
//! Concrete database backends for djene. Each backend implements
//! [`SessionProvider`](djene_db::session::SessionProvider) and produces
//! sessions the queryset layer executes against.
//!
//! Currently ships the SQLite backend (feature `sqlite`, on by default).

#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::significant_drop_tightening)]

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteSession};

use std::sync::Arc;

use djene_core::settings::DatabaseSettings;
use djene_core::{DjeneError, DjeneResult};
use djene_db::session::SessionProvider;

/// Opens the database described by the settings and returns its session
/// provider.
///
/// # Errors
///
/// Returns [`DjeneError::ConfigurationError`] for an unknown engine and
/// an operational error if the database cannot be opened.
pub fn open_database(settings: &DatabaseSettings) -> DjeneResult<Arc<dyn SessionProvider>> {
    match settings.engine.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteDatabase::open(settings.name.clone())?)),
        other => Err(DjeneError::ConfigurationError(format!(
            "Unknown database engine: {other}"
        ))),
    }
}
