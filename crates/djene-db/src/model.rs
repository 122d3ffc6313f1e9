//! The Model trait: the entity-type collaborator of the queryset layer.
//!
//! A [`Model`] maps a Rust struct to a database table. The queryset layer
//! needs very little from it: the table name, the set of field names (for
//! validating filters and ordering), the primary key column, and a way to
//! materialize an instance from a [`Row`].

use crate::query::compiler::Row;
use djene_core::DjeneError;

/// The core trait for all mapped entity types.
///
/// Implemented by hand per model; there is no derive macro in this
/// workspace.
///
/// # Examples
///
/// ```
/// use djene_db::model::Model;
/// use djene_db::query::compiler::Row;
/// use djene_core::DjeneError;
///
/// #[derive(Debug, Clone)]
/// struct Soldier {
///     id: i64,
///     name: String,
///     rank: Option<String>,
/// }
///
/// impl Model for Soldier {
///     fn table_name() -> &'static str {
///         "soldier"
///     }
///
///     fn field_names() -> &'static [&'static str] {
///         &["id", "name", "rank"]
///     }
///
///     fn from_row(row: &Row) -> Result<Self, DjeneError> {
///         Ok(Self {
///             id: row.get("id")?,
///             name: row.get("name")?,
///             rank: row.get("rank")?,
///         })
///     }
/// }
/// ```
pub trait Model: Send + Sync + 'static {
    /// Returns the database table name.
    fn table_name() -> &'static str;

    /// Returns the names of all mapped fields, used to validate filter and
    /// ordering references.
    fn field_names() -> &'static [&'static str];

    /// Returns the name of the primary key field.
    fn pk_field_name() -> &'static str {
        "id"
    }

    /// Constructs a model instance from a database row.
    fn from_row(row: &Row) -> Result<Self, DjeneError>
    where
        Self: Sized;

    /// Returns `true` if the model has a field with the given name.
    fn has_field(name: &str) -> bool {
        Self::field_names().contains(&name)
    }
}
