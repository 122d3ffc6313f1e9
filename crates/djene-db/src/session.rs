//! Database sessions and ambient request-scoped session propagation.
//!
//! A [`Session`] is a handle to one unit of work against a database: it
//! runs queries and statements and ends in a commit or a rollback.
//! Sessions are produced by a [`SessionProvider`] (an engine bound to one
//! database) and carried through async call chains via a tokio task-local,
//! so querysets and managers can reach the active session without it being
//! threaded through every signature.
//!
//! # Scoping
//!
//! [`scope`] runs a future with a session installed as the ambient
//! session; [`current`] retrieves it. [`with_session`] is the transactional
//! convenience wrapper: it opens a session from a provider, runs the
//! future, and commits on success or rolls back on error.
//!
//! ```no_run
//! # async fn demo(engine: std::sync::Arc<dyn djene_db::session::SessionProvider>) -> djene_core::DjeneResult<()> {
//! use djene_db::session;
//!
//! session::with_session(engine.as_ref(), async {
//!     let db = session::current()?;
//!     db.execute("DELETE FROM \"audit_log\"", &[]).await?;
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::query::compiler::{DatabaseBackendType, Row};
use crate::value::Value;
use djene_core::{DjeneError, DjeneResult};

/// Minimal async interface a database session implements.
///
/// Backends in `djene-db-backends` implement this trait; the queryset
/// layer only ever talks to it through a [`Session`] handle.
#[async_trait::async_trait]
pub trait SessionBackend: Send + Sync {
    /// Returns the backend type for SQL compilation.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> DjeneResult<Vec<Row>>;

    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> DjeneResult<u64>;

    /// Executes an INSERT and returns the last inserted row ID.
    ///
    /// Backends provide a default implementation using `execute` plus a
    /// follow-up query, but should override for correctness on backends
    /// where `last_insert_rowid()` does not apply.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> DjeneResult<Value> {
        self.execute(sql, params).await?;
        let rows = self.query("SELECT last_insert_rowid() AS id", &[]).await?;
        rows.into_iter().next().map_or_else(
            || {
                Err(DjeneError::DatabaseError(
                    "Failed to retrieve last inserted ID".to_string(),
                ))
            },
            |row| row.get::<Value>("id"),
        )
    }

    /// Commits the session's transaction.
    async fn commit(&self) -> DjeneResult<()>;

    /// Rolls back the session's transaction.
    async fn rollback(&self) -> DjeneResult<()>;
}

/// A cloneable handle to an open database session.
///
/// Cloning a `Session` clones the handle, not the underlying transaction;
/// all clones observe and affect the same unit of work.
#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn SessionBackend>,
}

impl Session {
    /// Wraps a backend session in a handle.
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Returns the backend type for SQL compilation.
    pub fn backend_type(&self) -> DatabaseBackendType {
        self.backend.backend_type()
    }

    /// Runs a SQL query and returns all result rows.
    pub async fn query(&self, sql: &str, params: &[Value]) -> DjeneResult<Vec<Row>> {
        self.backend.query(sql, params).await
    }

    /// Runs a SQL statement that does not return rows.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DjeneResult<u64> {
        self.backend.execute(sql, params).await
    }

    /// Executes an INSERT and returns the last inserted row ID.
    pub async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> DjeneResult<Value> {
        self.backend.insert_returning_id(sql, params).await
    }

    /// Commits the session's transaction.
    pub async fn commit(&self) -> DjeneResult<()> {
        self.backend.commit().await
    }

    /// Rolls back the session's transaction.
    pub async fn rollback(&self) -> DjeneResult<()> {
        self.backend.rollback().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend_type", &self.backend_type())
            .finish_non_exhaustive()
    }
}

/// A factory for sessions, bound to one database.
///
/// One provider per configured database; middleware and [`with_session`]
/// call [`session`](SessionProvider::session) to open a fresh unit of
/// work.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Opens a new session (begins a transaction).
    async fn session(&self) -> DjeneResult<Session>;
}

tokio::task_local! {
    static CURRENT_SESSION: Session;
}

/// Runs a future with `session` installed as the ambient session.
///
/// The session is visible to [`current`] from the future and everything
/// it awaits on the same task, and is automatically unset when the future
/// completes. Scopes nest; the innermost wins.
pub async fn scope<F>(session: Session, f: F) -> F::Output
where
    F: std::future::Future,
{
    CURRENT_SESSION.scope(session, f).await
}

/// Returns the ambient session for the current task.
///
/// # Errors
///
/// Returns [`DjeneError::ImproperlyConfigured`] when called outside a
/// [`scope`].
pub fn current() -> DjeneResult<Session> {
    CURRENT_SESSION.try_with(Clone::clone).map_err(|_| {
        DjeneError::ImproperlyConfigured(
            "No active session; wrap the call in a session scope".to_string(),
        )
    })
}

/// Opens a session, runs `f` inside its scope, and finalizes it.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. The
/// original error is returned even if the rollback itself fails; the
/// rollback failure is logged.
pub async fn with_session<T, F>(provider: &dyn SessionProvider, f: F) -> DjeneResult<T>
where
    F: std::future::Future<Output = DjeneResult<T>>,
{
    let session = provider.session().await?;
    let result = scope(session.clone(), f).await;
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "session rollback failed");
            }
            Err(err)
        }
    }
}
