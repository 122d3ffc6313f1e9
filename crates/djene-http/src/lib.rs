//! # djene-http
//!
//! HTTP integration for djene. Provides [`session_middleware`], an axum
//! middleware layer that opens a database session per request, installs it
//! as the ambient session for the handler, and commits it after the
//! handler responds. Handlers reach the session through the usual
//! [`Manager`](djene_db::query::Manager) / [`session::current`] API
//! without any per-request plumbing.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{middleware, routing::get, Router};
//! use djene_db::session::SessionProvider;
//! use djene_http::session_middleware;
//!
//! fn router(provider: Arc<dyn SessionProvider>) -> Router {
//!     Router::new()
//!         .route("/health", get(|| async { "ok" }))
//!         .layer(middleware::from_fn_with_state(
//!             provider.clone(),
//!             session_middleware,
//!         ))
//! }
//! ```

#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use djene_core::DjeneError;
use djene_db::session::{self, SessionProvider};

/// A framework error carried through an axum handler.
///
/// Wraps [`DjeneError`] so handlers can return `Result<_, AppError>` and
/// use `?` on queryset operations; the response status comes from
/// [`DjeneError::status_code`].
#[derive(Debug)]
pub struct AppError(pub DjeneError);

impl From<DjeneError> for AppError {
    fn from(err: DjeneError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_response(&self.0)
    }
}

fn error_response(err: &DjeneError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}

/// Opens a database session for the request and scopes the rest of the
/// stack inside it.
///
/// The session is committed once the handler has produced its response,
/// whatever its status; a failed open or commit becomes an error
/// response. Handlers that need rollback-on-error semantics for part of
/// their work use [`session::with_session`] for an inner transactional
/// scope.
pub async fn session_middleware(
    State(provider): State<Arc<dyn SessionProvider>>,
    request: Request,
    next: Next,
) -> Response {
    let session = match provider.session().await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "failed to open database session");
            return error_response(&err);
        }
    };

    let response = session::scope(session.clone(), next.run(request)).await;

    if let Err(err) = session.commit().await {
        tracing::error!(error = %err, "failed to commit request session");
        return error_response(&err);
    }

    response
}
