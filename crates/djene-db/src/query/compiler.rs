//! SQL query AST and compiler.
//!
//! [`Query`] is the AST a queryset accumulates (table, WHERE clause,
//! ordering, pagination); [`SqlCompiler`] translates it into parameterized
//! SQL. Two placeholder dialects are supported: PostgreSQL (`$1, $2, ...`)
//! and SQLite (`?`).

use super::lookups::Lookup;
use crate::value::Value;
use djene_core::DjeneError;

/// The type of database backend, used by the compiler to generate
/// backend-specific SQL syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackendType {
    /// PostgreSQL (uses `$1, $2, ...` placeholders).
    PostgreSQL,
    /// SQLite (uses `?` placeholders).
    SQLite,
}

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A WHERE clause node in the query AST.
#[derive(Debug, Clone)]
pub enum WhereNode {
    /// A single column condition.
    Condition {
        /// The column name.
        column: String,
        /// The lookup type.
        lookup: Lookup,
    },
    /// Logical AND of conditions. Empty means "match everything".
    And(Vec<WhereNode>),
    /// Logical NOT of a condition (an `exclude` clause).
    Not(Box<WhereNode>),
}

/// The query AST representing a SELECT statement over one table.
#[derive(Debug, Clone)]
pub struct Query {
    /// The table name.
    pub table: String,
    /// WHERE clause.
    pub where_clause: Option<WhereNode>,
    /// ORDER BY clauses.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<usize>,
    /// OFFSET.
    pub offset: Option<usize>,
}

impl Query {
    /// Creates a new query for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

/// A generic database row for passing data between backends and the
/// queryset layer.
///
/// `Row` holds a list of column names and their corresponding values, with
/// typed access via [`get`](Row::get).
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot
    /// be converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, DjeneError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| {
                DjeneError::DatabaseError(format!("Column '{column}' not found in row"))
            })?;
        T::from_value(&self.values[idx])
    }

    /// Gets a typed value by column index.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> Result<T, DjeneError> {
        if idx >= self.values.len() {
            return Err(DjeneError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            )));
        }
        T::from_value(&self.values[idx])
    }

    /// Returns a reference to the raw value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> Result<Self, DjeneError>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(DjeneError::DatabaseError(format!(
                "Expected Int, got {value:?}"
            ))),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::Int(i) => Self::try_from(*i)
                .map_err(|e| DjeneError::DatabaseError(format!("Int value out of i32 range: {e}"))),
            _ => Err(DjeneError::DatabaseError(format!(
                "Expected Int, got {value:?}"
            ))),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Ok(*i as Self),
            _ => Err(DjeneError::DatabaseError(format!(
                "Expected Float, got {value:?}"
            ))),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::Bool(b) => Ok(*b),
            // SQLite stores booleans as integers.
            Value::Int(i) => Ok(*i != 0),
            _ => Err(DjeneError::DatabaseError(format!(
                "Expected Bool, got {value:?}"
            ))),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(DjeneError::DatabaseError(format!(
                "Expected String, got {value:?}"
            ))),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => Self::parse_str(s)
                .map_err(|e| DjeneError::DatabaseError(format!("Invalid UUID string: {e}"))),
            _ => Err(DjeneError::DatabaseError(format!(
                "Expected Uuid, got {value:?}"
            ))),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, DjeneError> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

/// The SQL compiler translates a [`Query`] AST into parameterized SQL.
pub struct SqlCompiler {
    backend: DatabaseBackendType,
}

impl SqlCompiler {
    /// Creates a new compiler for the given backend type.
    pub const fn new(backend: DatabaseBackendType) -> Self {
        Self { backend }
    }

    /// Returns a parameter placeholder for the given 1-based index.
    fn placeholder(&self, index: usize) -> String {
        match self.backend {
            DatabaseBackendType::PostgreSQL => format!("${index}"),
            DatabaseBackendType::SQLite => "?".to_string(),
        }
    }

    /// Compiles a SELECT query into SQL and parameters.
    pub fn compile_select(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params: Vec<Value> = Vec::new();
        let mut sql = format!("SELECT * FROM \"{}\"", query.table);

        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &mut sql, &mut params);
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { " DESC" } else { " ASC" };
                    format!("\"{}\"{dir}", o.column)
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        // SQLite only accepts OFFSET after a LIMIT clause.
        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => match self.backend {
                DatabaseBackendType::SQLite => {
                    sql.push_str(&format!(" LIMIT -1 OFFSET {offset}"));
                }
                DatabaseBackendType::PostgreSQL => sql.push_str(&format!(" OFFSET {offset}")),
            },
            (None, None) => {}
        }

        (sql, params)
    }

    /// Compiles an INSERT statement.
    pub fn compile_insert(&self, table: &str, fields: &[(&str, Value)]) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let columns: Vec<String> = fields.iter().map(|(name, _)| format!("\"{name}\"")).collect();
        let placeholders: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, (_, val))| {
                params.push(val.clone());
                self.placeholder(i + 1)
            })
            .collect();

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, params)
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(
        &self,
        table: &str,
        fields: &[(&str, Value)],
        where_clause: &WhereNode,
    ) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_parts: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(i, (name, val))| {
                params.push(val.clone());
                let ph = self.placeholder(i + 1);
                format!("\"{name}\" = {ph}")
            })
            .collect();

        let mut sql = format!("UPDATE \"{}\" SET {} WHERE ", table, set_parts.join(", "));
        self.compile_where_node(where_clause, &mut sql, &mut params);

        (sql, params)
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(&self, table: &str, where_clause: &WhereNode) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM \"{table}\" WHERE ");
        self.compile_where_node(where_clause, &mut sql, &mut params);
        (sql, params)
    }

    /// Compiles a `WhereNode` into SQL, appending to the provided string.
    fn compile_where_node(&self, node: &WhereNode, sql: &mut String, params: &mut Vec<Value>) {
        match node {
            WhereNode::Condition { column, lookup } => {
                self.compile_lookup(column, lookup, sql, params);
            }
            WhereNode::And(children) => {
                if children.is_empty() {
                    sql.push_str("1=1");
                    return;
                }
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    self.compile_where_node(child, sql, params);
                }
                sql.push(')');
            }
            WhereNode::Not(inner) => {
                sql.push_str("NOT (");
                self.compile_where_node(inner, sql, params);
                sql.push(')');
            }
        }
    }

    /// Compiles a single lookup into SQL.
    fn compile_lookup(
        &self,
        column: &str,
        lookup: &Lookup,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        match lookup {
            Lookup::Exact(val) => {
                if val.is_null() {
                    sql.push_str(&format!("\"{column}\" IS NULL"));
                } else {
                    params.push(val.clone());
                    let ph = self.placeholder(params.len());
                    sql.push_str(&format!("\"{column}\" = {ph}"));
                }
            }
            Lookup::Gt(val) => {
                params.push(val.clone());
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" > {ph}"));
            }
            Lookup::Gte(val) => {
                params.push(val.clone());
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" >= {ph}"));
            }
            Lookup::Lt(val) => {
                params.push(val.clone());
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" < {ph}"));
            }
            Lookup::Lte(val) => {
                params.push(val.clone());
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" <= {ph}"));
            }
            Lookup::In(vals) => {
                let placeholders: Vec<String> = vals
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        self.placeholder(params.len())
                    })
                    .collect();
                sql.push_str(&format!("\"{column}\" IN ({})", placeholders.join(", ")));
            }
            Lookup::IsNull(is_null) => {
                if *is_null {
                    sql.push_str(&format!("\"{column}\" IS NULL"));
                } else {
                    sql.push_str(&format!("\"{column}\" IS NOT NULL"));
                }
            }
            Lookup::Between(low, high) => {
                params.push(low.clone());
                let ph_low = self.placeholder(params.len());
                params.push(high.clone());
                let ph_high = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" BETWEEN {ph_low} AND {ph_high}"));
            }
            Lookup::Like(pattern) => {
                params.push(Value::String(pattern.clone()));
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" LIKE {ph}"));
            }
            Lookup::ILike(pattern) => {
                params.push(Value::String(pattern.clone()));
                let ph = self.placeholder(params.len());
                match self.backend {
                    DatabaseBackendType::PostgreSQL => {
                        sql.push_str(&format!("\"{column}\" ILIKE {ph}"));
                    }
                    DatabaseBackendType::SQLite => {
                        sql.push_str(&format!("LOWER(\"{column}\") LIKE LOWER({ph})"));
                    }
                }
            }
            Lookup::Contains(val) => {
                params.push(Value::String(format!("%{val}%")));
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" LIKE {ph}"));
            }
            Lookup::StartsWith(val) => {
                params.push(Value::String(format!("{val}%")));
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" LIKE {ph}"));
            }
            Lookup::EndsWith(val) => {
                params.push(Value::String(format!("%{val}")));
                let ph = self.placeholder(params.len());
                sql.push_str(&format!("\"{column}\" LIKE {ph}"));
            }
        }
    }
}
