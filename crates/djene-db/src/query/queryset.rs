//! QuerySet and Manager for building and executing database queries.
//!
//! The [`QuerySet`] represents a lazy database query. Chain methods
//! (`filter`, `exclude`, `order_by`, `limit`, `offset`) accumulate state
//! into a fresh queryset without touching the database; SQL is compiled
//! and executed only when a terminal method is called (`results`, `get`,
//! `count`, ...), and the fetched instances are cached so repeated
//! terminal calls on the same queryset hit the database once.
//!
//! The [`Manager`] is the model-level entry point, equivalent to Django's
//! `Model.objects`; it binds fresh querysets to the ambient session.
//!
//! # Examples
//!
//! ```no_run
//! # use djene_db::model::Model;
//! # use djene_db::query::compiler::Row;
//! # use djene_core::DjeneError;
//! # #[derive(Debug, Clone)]
//! # struct Soldier { id: i64, name: String, rank: Option<String> }
//! # impl Model for Soldier {
//! #     fn table_name() -> &'static str { "soldier" }
//! #     fn field_names() -> &'static [&'static str] { &["id", "name", "rank"] }
//! #     fn from_row(row: &Row) -> Result<Self, DjeneError> {
//! #         Ok(Self { id: row.get("id")?, name: row.get("name")?, rank: row.get("rank")? })
//! #     }
//! # }
//! # async fn demo() -> djene_core::DjeneResult<()> {
//! use djene_db::query::queryset::Manager;
//! use djene_db::value::Value;
//!
//! let soldiers = Manager::<Soldier>::new();
//! let first_class = soldiers
//!     .filter(&[("rank", Value::from("1st Class"))])?
//!     .order_by(&["name"])?;
//! // Nothing has hit the database yet.
//! let all = first_class.results().await?;
//! # let _ = all;
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;

use once_cell::sync::OnceCell;

use super::compiler::{Query, SqlCompiler, WhereNode};
use super::lookups::FilterClause;
use crate::model::Model;
use crate::session::{self, Session};
use crate::value::Value;
use djene_core::{DjeneError, DjeneResult};

/// The entry point for model-level query operations.
///
/// The `Manager` holds no query state of its own; each accessor opens a
/// fresh [`QuerySet`] bound to the ambient session, so it must be used
/// inside a [`session::scope`].
#[derive(Debug)]
pub struct Manager<M: Model> {
    _phantom: PhantomData<M>,
}

impl<M: Model> Default for Manager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Manager<M> {
    /// Creates a new manager.
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Returns a fresh queryset bound to the ambient session.
    ///
    /// # Errors
    ///
    /// Returns [`DjeneError::ImproperlyConfigured`] outside a session
    /// scope.
    pub fn queryset(&self) -> DjeneResult<QuerySet<M>> {
        Ok(QuerySet::new(session::current()?))
    }

    /// Returns a queryset matching all records.
    pub fn all(&self) -> DjeneResult<QuerySet<M>> {
        self.queryset()
    }

    /// Returns a queryset with the given filters applied.
    pub fn filter(&self, kwargs: &[(&str, Value)]) -> DjeneResult<QuerySet<M>> {
        self.queryset()?.filter(kwargs)
    }

    /// Returns a queryset with the given exclusions applied.
    pub fn exclude(&self, kwargs: &[(&str, Value)]) -> DjeneResult<QuerySet<M>> {
        self.queryset()?.exclude(kwargs)
    }

    /// Shortcut for `queryset()?.get(kwargs)`.
    pub async fn get(&self, kwargs: &[(&str, Value)]) -> DjeneResult<M>
    where
        M: Clone,
    {
        self.queryset()?.get(kwargs).await
    }

    /// Shortcut for `queryset()?.create(fields)`.
    pub async fn create(&self, fields: &[(&str, Value)]) -> DjeneResult<M>
    where
        M: Clone,
    {
        self.queryset()?.create(fields).await
    }
}

/// A lazy, composable database query over one model.
///
/// Chain methods borrow the queryset and return a new one; the original
/// is never mutated, so a shared base can be refined in several
/// directions. Cloning (and every chain call) produces a queryset with an
/// empty result cache.
pub struct QuerySet<M: Model> {
    model: PhantomData<M>,
    session: Session,
    query: Query,
    filters: Vec<FilterClause>,
    cache: OnceCell<Vec<M>>,
}

impl<M: Model> Clone for QuerySet<M> {
    /// Clones the builder state. The result cache is not carried over;
    /// the clone starts unexecuted.
    fn clone(&self) -> Self {
        Self {
            model: PhantomData,
            session: self.session.clone(),
            query: self.query.clone(),
            filters: self.filters.clone(),
            cache: OnceCell::new(),
        }
    }
}

impl<M: Model> std::fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("table", &self.query.table)
            .field("filters", &self.filters)
            .field("executed", &self.cache.get().is_some())
            .finish_non_exhaustive()
    }
}

impl<M: Model> QuerySet<M> {
    /// Creates a queryset matching all records, bound to the given
    /// session.
    pub fn new(session: Session) -> Self {
        Self {
            model: PhantomData,
            session,
            query: Query::new(M::table_name()),
            filters: Vec::new(),
            cache: OnceCell::new(),
        }
    }

    /// Returns `true` if this queryset has materialized its results.
    pub fn is_executed(&self) -> bool {
        self.cache.get().is_some()
    }

    // ── Chain methods (lazy) ─────────────────────────────────────────

    /// Returns an unexecuted copy of this queryset.
    pub fn all(&self) -> Self {
        self.clone()
    }

    /// Adds filter conditions from `field[__operator]` keywords.
    ///
    /// Keywords are parsed immediately; an unknown operator suffix or a
    /// malformed value is rejected here, not at execution time.
    ///
    /// # Errors
    ///
    /// Returns [`DjeneError::ConfigurationError`] for an unsupported
    /// lookup or a value of the wrong shape.
    pub fn filter(&self, kwargs: &[(&str, Value)]) -> DjeneResult<Self> {
        self.apply_filters(kwargs, false)
    }

    /// Alias for [`filter`](Self::filter).
    pub fn r#where(&self, kwargs: &[(&str, Value)]) -> DjeneResult<Self> {
        self.filter(kwargs)
    }

    /// Adds negated filter conditions (records matching them are
    /// excluded).
    pub fn exclude(&self, kwargs: &[(&str, Value)]) -> DjeneResult<Self> {
        self.apply_filters(kwargs, true)
    }

    fn apply_filters(&self, kwargs: &[(&str, Value)], exclude: bool) -> DjeneResult<Self> {
        let mut qs = self.clone();
        for (key, value) in kwargs {
            qs.filters
                .push(FilterClause::parse(key, value.clone(), exclude)?);
        }
        Ok(qs)
    }

    /// Appends ordering fields. A leading `-` sorts descending.
    ///
    /// # Errors
    ///
    /// Returns [`DjeneError::ValidationError`] if a field is not defined
    /// on the model.
    pub fn order_by(&self, fields: &[&str]) -> DjeneResult<Self> {
        let mut qs = self.clone();
        for field in fields {
            let (column, descending) = field
                .strip_prefix('-')
                .map_or((*field, false), |name| (name, true));
            if !M::has_field(column) {
                return Err(DjeneError::ValidationError(format!(
                    "Invalid field for ordering: {column}"
                )));
            }
            qs.query.order_by.push(super::compiler::OrderBy {
                column: column.to_string(),
                descending,
            });
        }
        Ok(qs)
    }

    /// Limits the number of results returned by the query.
    pub fn limit(&self, limit: usize) -> Self {
        let mut qs = self.clone();
        qs.query.limit = Some(limit);
        qs
    }

    /// Skips the given number of results before returning rows.
    pub fn offset(&self, offset: usize) -> Self {
        let mut qs = self.clone();
        qs.query.offset = Some(offset);
        qs
    }

    // ── SQL generation ───────────────────────────────────────────────

    /// Compiles the accumulated filters into a WHERE node, validating
    /// field references against the model.
    fn compile_filters(&self) -> DjeneResult<Option<WhereNode>> {
        let mut nodes = Vec::with_capacity(self.filters.len());
        for clause in &self.filters {
            if !M::has_field(&clause.field) {
                return Err(DjeneError::ValidationError(format!(
                    "{} is not a valid field name",
                    clause.field
                )));
            }
            let condition = WhereNode::Condition {
                column: clause.field.clone(),
                lookup: clause.lookup.clone(),
            };
            nodes.push(if clause.exclude {
                WhereNode::Not(Box::new(condition))
            } else {
                condition
            });
        }
        Ok(match nodes.len() {
            0 => None,
            1 => nodes.pop(),
            _ => Some(WhereNode::And(nodes)),
        })
    }

    fn build_query(&self) -> DjeneResult<Query> {
        let mut query = self.query.clone();
        query.where_clause = self.compile_filters()?;
        Ok(query)
    }

    /// Compiles the queryset to a SELECT statement for its session's
    /// backend, for inspection and debugging.
    ///
    /// # Errors
    ///
    /// Returns an error if a filter references an unknown field.
    pub fn to_sql(&self) -> DjeneResult<(String, Vec<Value>)> {
        let query = self.build_query()?;
        Ok(SqlCompiler::new(self.session.backend_type()).compile_select(&query))
    }

    // ── Terminal methods (execute and cache) ─────────────────────────

    /// Executes the query if needed and returns the cached instances.
    ///
    /// The first call compiles and runs the SELECT; later calls on the
    /// same queryset return the cached results without touching the
    /// database.
    pub async fn results(&self) -> DjeneResult<&[M]> {
        if let Some(items) = self.cache.get() {
            return Ok(items);
        }
        let (sql, params) = self.to_sql()?;
        tracing::debug!(table = M::table_name(), %sql, "materializing queryset");
        let rows = self.session.query(&sql, &params).await?;
        let items = rows.iter().map(M::from_row).collect::<Result<Vec<M>, _>>()?;
        Ok(self.cache.get_or_init(|| items))
    }

    /// Returns the number of matching records.
    pub async fn count(&self) -> DjeneResult<usize> {
        Ok(self.results().await?.len())
    }

    /// Returns `true` if any record matches.
    pub async fn exists(&self) -> DjeneResult<bool> {
        Ok(!self.results().await?.is_empty())
    }

    /// Returns the first matching record, or `None`.
    pub async fn first(&self) -> DjeneResult<Option<M>>
    where
        M: Clone,
    {
        Ok(self.results().await?.first().cloned())
    }

    /// Returns the last matching record, or `None`.
    ///
    /// With no explicit ordering this is the last row in whatever order
    /// the engine returned.
    pub async fn last(&self) -> DjeneResult<Option<M>>
    where
        M: Clone,
    {
        Ok(self.results().await?.last().cloned())
    }

    /// Returns exactly one record matching the given filters.
    ///
    /// A `limit`/`offset` already applied to the queryset is preserved:
    /// the cardinality check runs on the materialized window, so a
    /// `limit(1)` queryset never reports multiple objects even when more
    /// rows would match without the limit.
    ///
    /// # Errors
    ///
    /// Returns [`DjeneError::DoesNotExist`] when no record matches and
    /// [`DjeneError::MultipleObjectsReturned`] when more than one does.
    pub async fn get(&self, kwargs: &[(&str, Value)]) -> DjeneResult<M>
    where
        M: Clone,
    {
        let qs = self.filter(kwargs)?;
        let items = qs.results().await?;
        match items {
            [] => Err(DjeneError::DoesNotExist("No results found".to_string())),
            [one] => Ok(one.clone()),
            _ => Err(DjeneError::MultipleObjectsReturned(
                "Multiple results returned for `get`".to_string(),
            )),
        }
    }

    /// Like [`get`](Self::get), but returns `None` instead of
    /// [`DjeneError::DoesNotExist`] when nothing matches. More than one
    /// match is still [`DjeneError::MultipleObjectsReturned`].
    pub async fn get_or_none(&self, kwargs: &[(&str, Value)]) -> DjeneResult<Option<M>>
    where
        M: Clone,
    {
        match self.get(kwargs).await {
            Ok(item) => Ok(Some(item)),
            Err(DjeneError::DoesNotExist(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Inserts a new record and returns the stored instance.
    ///
    /// The instance is re-read from the database after the INSERT so
    /// that generated values (the primary key included) are populated.
    pub async fn create(&self, fields: &[(&str, Value)]) -> DjeneResult<M>
    where
        M: Clone,
    {
        let compiler = SqlCompiler::new(self.session.backend_type());
        let (sql, params) = compiler.compile_insert(M::table_name(), fields);
        tracing::debug!(table = M::table_name(), %sql, "inserting record");
        let pk = self.session.insert_returning_id(&sql, &params).await?;

        let fresh: QuerySet<M> = QuerySet::new(self.session.clone());
        fresh.get(&[(M::pk_field_name(), pk)]).await
    }

    /// Updates all matching records with the given field values.
    /// Returns the number of rows affected.
    pub async fn update(&self, fields: &[(&str, Value)]) -> DjeneResult<u64> {
        let where_clause = self
            .compile_filters()?
            .unwrap_or_else(|| WhereNode::And(vec![]));
        let compiler = SqlCompiler::new(self.session.backend_type());
        let (sql, params) = compiler.compile_update(M::table_name(), fields, &where_clause);
        tracing::debug!(table = M::table_name(), %sql, "updating records");
        self.session.execute(&sql, &params).await
    }

    /// Deletes all matching records. Returns the number of rows deleted.
    pub async fn delete(&self) -> DjeneResult<u64> {
        let where_clause = self
            .compile_filters()?
            .unwrap_or_else(|| WhereNode::And(vec![]));
        let compiler = SqlCompiler::new(self.session.backend_type());
        let (sql, params) = compiler.compile_delete(M::table_name(), &where_clause);
        tracing::debug!(table = M::table_name(), %sql, "deleting records");
        self.session.execute(&sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compiler::{DatabaseBackendType, Row};
    use crate::session::SessionBackend;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Soldier {
        id: i64,
        name: String,
        rank: Option<String>,
    }

    impl Model for Soldier {
        fn table_name() -> &'static str {
            "soldier"
        }

        fn field_names() -> &'static [&'static str] {
            &["id", "name", "rank"]
        }

        fn from_row(row: &Row) -> Result<Self, DjeneError> {
            Ok(Self {
                id: row.get("id")?,
                name: row.get("name")?,
                rank: row.get("rank")?,
            })
        }
    }

    fn soldier_row(id: i64, name: &str, rank: Option<&str>) -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string(), "rank".to_string()],
            vec![
                Value::Int(id),
                Value::String(name.to_string()),
                rank.map_or(Value::Null, |r| Value::String(r.to_string())),
            ],
        )
    }

    /// A backend that serves a fixed result set and counts queries.
    struct ScriptedSession {
        rows: Vec<Row>,
        queries: AtomicU64,
    }

    impl ScriptedSession {
        fn with_rows(rows: Vec<Row>) -> Self {
            Self {
                rows,
                queries: AtomicU64::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl SessionBackend for ScriptedSession {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> DjeneResult<Vec<Row>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.clone())
        }

        async fn execute(&self, _sql: &str, _params: &[Value]) -> DjeneResult<u64> {
            Ok(1)
        }

        async fn commit(&self) -> DjeneResult<()> {
            Ok(())
        }

        async fn rollback(&self) -> DjeneResult<()> {
            Ok(())
        }
    }

    fn scripted(rows: Vec<Row>) -> (Session, Arc<ScriptedSession>) {
        let backend = Arc::new(ScriptedSession::with_rows(rows));
        (Session::new(backend.clone()), backend)
    }

    #[test]
    fn test_chain_methods_do_not_execute() {
        let (session, backend) = scripted(vec![]);
        let qs = QuerySet::<Soldier>::new(session)
            .filter(&[("rank", Value::from("1st Class"))])
            .unwrap()
            .order_by(&["name"])
            .unwrap()
            .limit(10)
            .offset(2);
        assert!(!qs.is_executed());
        assert_eq!(backend.queries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_to_sql() {
        let (session, _) = scripted(vec![]);
        let qs = QuerySet::<Soldier>::new(session)
            .filter(&[("rank", Value::from("1st Class"))])
            .unwrap()
            .exclude(&[("name", Value::from("Sephiroth"))])
            .unwrap()
            .order_by(&["-id"])
            .unwrap()
            .limit(3);
        let (sql, params) = qs.to_sql().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"soldier\" WHERE (\"rank\" = ? AND NOT (\"name\" = ?)) \
             ORDER BY \"id\" DESC LIMIT 3"
        );
        assert_eq!(params.len(), 2);
    }

    #[tokio::test]
    async fn test_results_cached_single_query() {
        let (session, backend) = scripted(vec![
            soldier_row(1, "Cloud Strife", Some("1st Class")),
            soldier_row(3, "Sephiroth", Some("1st Class")),
        ]);
        let qs = QuerySet::<Soldier>::new(session);
        assert_eq!(qs.results().await.unwrap().len(), 2);
        assert_eq!(qs.count().await.unwrap(), 2);
        assert!(qs.exists().await.unwrap());
        assert!(qs.is_executed());
        // All three terminal calls share one database round trip.
        assert_eq!(backend.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clone_resets_cache() {
        let (session, backend) = scripted(vec![soldier_row(1, "Cloud Strife", None)]);
        let qs = QuerySet::<Soldier>::new(session);
        qs.results().await.unwrap();
        assert!(qs.is_executed());

        let clone = qs.all();
        assert!(!clone.is_executed());
        clone.results().await.unwrap();
        assert_eq!(backend.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chaining_leaves_base_untouched() {
        let (session, _) = scripted(vec![]);
        let base = QuerySet::<Soldier>::new(session);
        let narrowed = base.filter(&[("rank", Value::from("1st Class"))]).unwrap();
        assert_eq!(base.filters.len(), 0);
        assert_eq!(narrowed.filters.len(), 1);

        let (base_sql, _) = base.to_sql().unwrap();
        assert_eq!(base_sql, "SELECT * FROM \"soldier\"");
    }

    #[tokio::test]
    async fn test_first_and_last() {
        let (session, _) = scripted(vec![
            soldier_row(1, "Cloud Strife", Some("1st Class")),
            soldier_row(2, "Zack Fair", Some("1st Class")),
        ]);
        let qs = QuerySet::<Soldier>::new(session);
        assert_eq!(qs.first().await.unwrap().unwrap().name, "Cloud Strife");
        assert_eq!(qs.last().await.unwrap().unwrap().name, "Zack Fair");

        let (empty_session, _) = scripted(vec![]);
        let empty = QuerySet::<Soldier>::new(empty_session);
        assert_eq!(empty.first().await.unwrap(), None);
        assert_eq!(empty.last().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_cardinality() {
        let (session, _) = scripted(vec![soldier_row(1, "Cloud Strife", None)]);
        let qs = QuerySet::<Soldier>::new(session);
        let cloud = qs.get(&[("id", Value::from(1))]).await.unwrap();
        assert_eq!(cloud.id, 1);

        let (empty_session, _) = scripted(vec![]);
        let empty = QuerySet::<Soldier>::new(empty_session);
        let err = empty.get(&[("id", Value::from(9))]).await.unwrap_err();
        assert!(matches!(err, DjeneError::DoesNotExist(_)));

        let (multi_session, _) = scripted(vec![
            soldier_row(1, "Cloud Strife", None),
            soldier_row(2, "Zack Fair", None),
        ]);
        let multi = QuerySet::<Soldier>::new(multi_session);
        let err = multi
            .get(&[("rank", Value::Null)])
            .await
            .unwrap_err();
        assert!(matches!(err, DjeneError::MultipleObjectsReturned(_)));
    }

    #[tokio::test]
    async fn test_get_or_none() {
        let (empty_session, _) = scripted(vec![]);
        let empty = QuerySet::<Soldier>::new(empty_session);
        assert_eq!(
            empty.get_or_none(&[("id", Value::from(9))]).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_get_or_none_still_errors_on_multiple() {
        let (session, _) = scripted(vec![
            soldier_row(1, "Cloud Strife", Some("1st Class")),
            soldier_row(2, "Zack Fair", Some("1st Class")),
        ]);
        let qs = QuerySet::<Soldier>::new(session);
        let err = qs
            .get_or_none(&[("rank", Value::from("1st Class"))])
            .await
            .unwrap_err();
        assert!(matches!(err, DjeneError::MultipleObjectsReturned(_)));
    }

    #[test]
    fn test_unknown_lookup_rejected_at_filter_time() {
        let (session, _) = scripted(vec![]);
        let qs = QuerySet::<Soldier>::new(session);
        let err = qs
            .filter(&[("name__regex", Value::from("^C"))])
            .unwrap_err();
        assert!(matches!(err, DjeneError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn test_unknown_field_rejected_at_execution() {
        let (session, _) = scripted(vec![]);
        let qs = QuerySet::<Soldier>::new(session)
            .filter(&[("callsign", Value::from("x"))])
            .unwrap();
        let err = qs.results().await.unwrap_err();
        assert!(matches!(err, DjeneError::ValidationError(_)));
    }

    #[test]
    fn test_order_by_unknown_field_rejected_immediately() {
        let (session, _) = scripted(vec![]);
        let qs = QuerySet::<Soldier>::new(session);
        let err = qs.order_by(&["callsign"]).unwrap_err();
        assert!(matches!(err, DjeneError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_manager_requires_scope() {
        let manager = Manager::<Soldier>::new();
        let err = manager.all().unwrap_err();
        assert!(matches!(err, DjeneError::ImproperlyConfigured(_)));
    }

    #[tokio::test]
    async fn test_manager_uses_ambient_session() {
        let (session, backend) = scripted(vec![soldier_row(1, "Cloud Strife", None)]);
        session::scope(session, async {
            let manager = Manager::<Soldier>::new();
            let qs = manager.all().unwrap();
            assert_eq!(qs.count().await.unwrap(), 1);
        })
        .await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_compile_filters() {
        let (session, _) = scripted(vec![]);
        let qs = QuerySet::<Soldier>::new(session)
            .filter(&[("rank", Value::Null)])
            .unwrap();
        assert_eq!(
            qs.update(&[("rank", Value::from("3rd Class"))])
                .await
                .unwrap(),
            1
        );
        assert_eq!(qs.delete().await.unwrap(), 1);
    }
}
