//! # djene-db
//!
//! The queryset layer of djene. Provides the [`Model`](model::Model) trait
//! for mapping structs to tables, [`QuerySet`](query::QuerySet) for building
//! and executing lazy queries, [`Manager`](query::Manager) for model-level
//! operations, and [`session`] for request-scoped session propagation.
//!
//! ## Architecture
//!
//! The layer is designed around lazy evaluation. A
//! [`QuerySet`](query::QuerySet) accumulates parsed filter clauses and a
//! [`Query`](query::Query) AST through method chaining without touching the
//! database. SQL is only generated when a terminal method (`.results()`,
//! `.get()`, `.count()`, etc.) is called, at which point the
//! [`SqlCompiler`](query::SqlCompiler) translates the AST into parameterized
//! SQL for the session's backend, and the fetched instances are cached on
//! the queryset.
//!
//! ## Module Overview
//!
//! - [`model`] - The [`Model`](model::Model) trait
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`query`] - Lookups, the queryset, and SQL compilation
//! - [`session`] - Sessions, providers, and the ambient session scope

// These clippy lints are intentionally allowed for the queryset crate:
// - result_large_err: DjeneError is the framework error type and should be used consistently
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - too_many_lines: the SQL compiler methods are inherently large due to many match arms
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::use_self)]

pub mod model;
pub mod query;
pub mod session;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use model::Model;
pub use query::{
    DatabaseBackendType, FilterClause, Lookup, Manager, OrderBy, Query, QuerySet, Row, SqlCompiler,
    WhereNode,
};
pub use session::{Session, SessionBackend, SessionProvider};
pub use value::Value;
