//! Query building, compilation, and execution.

pub mod compiler;
pub mod lookups;
pub mod queryset;

pub use compiler::{DatabaseBackendType, OrderBy, Query, Row, SqlCompiler, WhereNode};
pub use lookups::{FilterClause, Lookup};
pub use queryset::{Manager, QuerySet};
