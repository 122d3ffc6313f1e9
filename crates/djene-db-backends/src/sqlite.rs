//! SQLite session provider using `rusqlite`.
//!
//! [`SqliteDatabase`] owns a single `rusqlite` connection guarded by an
//! async mutex; all operations run via `tokio::task::spawn_blocking` to
//! avoid blocking the async runtime. Opening a [`Session`] issues `BEGIN`,
//! and the session ends with `COMMIT` or `ROLLBACK`.
//!
//! Features:
//! - WAL mode enabled by default for file-based databases
//! - In-memory database support via `:memory:` path (great for testing)

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use djene_core::{DjeneError, DjeneResult};
use djene_db::query::compiler::DatabaseBackendType;
use djene_db::session::{Session, SessionBackend, SessionProvider};
use djene_db::{Row, Value};

/// A SQLite database bound to one file (or `:memory:`).
///
/// Acts as the [`SessionProvider`] for SQLite: each [`session`] call
/// begins a transaction on the shared connection. With one connection,
/// sessions against the same database serialize on the internal mutex.
///
/// [`session`]: SessionProvider::session
pub struct SqliteDatabase {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteDatabase {
    /// Opens a SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    /// WAL journal mode is enabled by default for file-based databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> DjeneResult<Self> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| DjeneError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| DjeneError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> DjeneResult<Self> {
        Self::open(":memory:")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait::async_trait]
impl SessionProvider for SqliteDatabase {
    async fn session(&self) -> DjeneResult<Session> {
        tracing::debug!(path = %self.path.display(), "opening sqlite session");
        let backend = SqliteSession {
            conn: self.conn.clone(),
        };
        backend.run_execute("BEGIN".to_string(), vec![]).await?;
        Ok(Session::new(Arc::new(backend)))
    }
}

/// One SQLite unit of work: a transaction on the shared connection.
pub struct SqliteSession {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteSession {
    /// Binds `Value` parameters to a `rusqlite` statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> DjeneResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Bytes(b) => stmt.raw_bind_parameter(idx, b.as_slice()),
                Value::Date(d) => stmt.raw_bind_parameter(idx, d.to_string().as_str()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_string().as_str()),
                Value::Uuid(u) => stmt.raw_bind_parameter(idx, u.to_string().as_str()),
                Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string().as_str()),
                Value::List(vals) => {
                    let json = serde_json::to_string(
                        &vals.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    )
                    .map_err(|e| {
                        DjeneError::DatabaseError(format!("List parameter encoding failed: {e}"))
                    })?;
                    stmt.raw_bind_parameter(idx, json.as_str())
                }
            }
            .map_err(|e| DjeneError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to the generic `Row`.
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = (0..column_names.len())
            .map(|i| {
                let val_ref = sqlite_row
                    .get_ref(i)
                    .unwrap_or(rusqlite::types::ValueRef::Null);
                match val_ref {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                    rusqlite::types::ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
                }
            })
            .collect();

        Row::new(column_names.to_vec(), values)
    }

    async fn run_execute(&self, sql: String, params: Vec<Value>) -> DjeneResult<u64> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DjeneError::DatabaseError(format!("{e}")))?;
            Self::bind_params(&mut stmt, &params)?;
            let count = stmt
                .raw_execute()
                .map_err(|e| DjeneError::DatabaseError(format!("{e}")))?;
            Ok(count as u64)
        })
        .await
        .map_err(|e| DjeneError::DatabaseError(format!("Task join error: {e}")))?
    }
}

#[async_trait::async_trait]
impl SessionBackend for SqliteSession {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DjeneResult<Vec<Row>> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DjeneError::DatabaseError(format!("{e}")))?;

            let column_names: Vec<String> =
                stmt.column_names().into_iter().map(String::from).collect();

            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();
            let mut rows = Vec::new();
            while let Some(row) = raw_rows
                .next()
                .map_err(|e| DjeneError::DatabaseError(format!("{e}")))?
            {
                rows.push(Self::convert_row(row, &column_names));
            }

            Ok(rows)
        })
        .await
        .map_err(|e| DjeneError::DatabaseError(format!("Task join error: {e}")))?
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DjeneResult<u64> {
        self.run_execute(sql.to_string(), params.to_vec()).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> DjeneResult<Value> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DjeneError::DatabaseError(format!("{e}")))?;
            Self::bind_params(&mut stmt, &params)?;
            stmt.raw_execute()
                .map_err(|e| DjeneError::DatabaseError(format!("{e}")))?;
            Ok(Value::Int(conn.last_insert_rowid()))
        })
        .await
        .map_err(|e| DjeneError::DatabaseError(format!("Task join error: {e}")))?
    }

    async fn commit(&self) -> DjeneResult<()> {
        tracing::debug!("committing sqlite session");
        self.run_execute("COMMIT".to_string(), vec![]).await?;
        Ok(())
    }

    async fn rollback(&self) -> DjeneResult<()> {
        tracing::debug!("rolling back sqlite session");
        self.run_execute("ROLLBACK".to_string(), vec![]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_session() -> (SqliteDatabase, Session) {
        let db = SqliteDatabase::memory().unwrap();
        let session = db.session().await.unwrap();
        (db, session)
    }

    #[tokio::test]
    async fn test_memory_open() {
        let db = SqliteDatabase::memory().unwrap();
        assert_eq!(db.path().to_str().unwrap(), ":memory:");
    }

    #[tokio::test]
    async fn test_session_backend_type() {
        let (_db, session) = open_session().await;
        assert_eq!(session.backend_type(), DatabaseBackendType::SQLite);
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let (_db, session) = open_session().await;
        session
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)",
                &[],
            )
            .await
            .unwrap();

        session
            .execute(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::from(30)],
            )
            .await
            .unwrap();

        let rows = session
            .query("SELECT id, name, age FROM users", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get::<i64>("age").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_insert_returning_id() {
        let (_db, session) = open_session().await;
        session
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        let id = session
            .insert_returning_id("INSERT INTO t (val) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();
        assert_eq!(id, Value::Int(1));

        let id = session
            .insert_returning_id("INSERT INTO t (val) VALUES (?)", &[Value::from("b")])
            .await
            .unwrap();
        assert_eq!(id, Value::Int(2));
    }

    #[tokio::test]
    async fn test_null_handling() {
        let (_db, session) = open_session().await;
        session
            .execute(
                "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, bio TEXT)",
                &[],
            )
            .await
            .unwrap();
        session
            .execute(
                "INSERT INTO t (name, bio) VALUES (?, ?)",
                &[Value::from("Alice"), Value::Null],
            )
            .await
            .unwrap();

        let rows = session.query("SELECT name, bio FROM t", &[]).await.unwrap();
        assert_eq!(rows[0].get::<Option<String>>("bio").unwrap(), None);
    }

    #[tokio::test]
    async fn test_blob_round_trip() {
        let (_db, session) = open_session().await;
        session
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)", &[])
            .await
            .unwrap();

        let blob = vec![0xDE_u8, 0xAD, 0xBE, 0xEF];
        session
            .execute(
                "INSERT INTO t (data) VALUES (?)",
                &[Value::Bytes(blob.clone())],
            )
            .await
            .unwrap();

        let rows = session.query("SELECT data FROM t", &[]).await.unwrap();
        assert_eq!(rows[0].get_value("data"), Some(&Value::Bytes(blob)));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = SqliteDatabase::memory().unwrap();

        let setup = db.session().await.unwrap();
        setup
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();
        setup.commit().await.unwrap();

        let session = db.session().await.unwrap();
        session
            .execute("INSERT INTO t (val) VALUES (?)", &[Value::from("x")])
            .await
            .unwrap();
        session.rollback().await.unwrap();

        let check = db.session().await.unwrap();
        let rows = check.query("SELECT * FROM t", &[]).await.unwrap();
        assert!(rows.is_empty());
        check.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_persists_writes() {
        let db = SqliteDatabase::memory().unwrap();

        let setup = db.session().await.unwrap();
        setup
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();
        setup
            .execute("INSERT INTO t (val) VALUES (?)", &[Value::from("kept")])
            .await
            .unwrap();
        setup.commit().await.unwrap();

        let check = db.session().await.unwrap();
        let rows = check.query("SELECT val FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("val").unwrap(), "kept");
        check.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_boolean_stored_as_integer() {
        let (_db, session) = open_session().await;
        session
            .execute(
                "CREATE TABLE flags (id INTEGER PRIMARY KEY, active INTEGER)",
                &[],
            )
            .await
            .unwrap();
        session
            .execute("INSERT INTO flags (active) VALUES (?)", &[Value::Bool(true)])
            .await
            .unwrap();

        let rows = session
            .query("SELECT active FROM flags", &[])
            .await
            .unwrap();
        assert_eq!(rows[0].get::<i64>("active").unwrap(), 1);
        assert!(rows[0].get::<bool>("active").unwrap());
    }
}
