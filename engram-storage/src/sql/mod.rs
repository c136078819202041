//! Backend-neutral SQL building blocks.
//!
//! Queries are written once in SQLite flavour (`?` placeholders, integer
//! epoch-millis timestamps); [`placeholder::rewrite`] adapts them for
//! Postgres. Values cross the facade as [`SqlValue`]; rows come back as
//! [`SqlRow`] and are parsed into domain structs by per-table functions
//! in [`crate::queries`].

pub mod placeholder;

use chrono::{DateTime, TimeZone, Utc};
use engram_core::errors::{EngramError, EngramResult};

/// Which SQL dialect a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
}

/// A parameter or cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Bound as a JSON string on SQLite (which has no native JSON
    /// parameter binding) and as `jsonb` on Postgres.
    Json(serde_json::Value),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}
impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}
impl From<usize> for SqlValue {
    fn from(v: usize) -> Self {
        SqlValue::Integer(v as i64)
    }
}
impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}
impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}
impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}
impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}
impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}
impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}
impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    /// Parameter normalisation: absent values become SQL NULL.
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}

/// Build a parameter vector from heterogeneous values.
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::sql::SqlValue>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::sql::SqlValue::from($value)),+]
    };
}

/// One result row: column names plus values, positionally aligned.
#[derive(Debug, Clone)]
pub struct SqlRow {
    cols: Vec<String>,
    vals: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(cols: Vec<String>, vals: Vec<SqlValue>) -> Self {
        Self { cols, vals }
    }

    fn value(&self, name: &str) -> EngramResult<&SqlValue> {
        self.cols
            .iter()
            .position(|c| c == name)
            .map(|i| &self.vals[i])
            .ok_or_else(|| EngramError::internal(format!("missing column {name}")))
    }

    pub fn str(&self, name: &str) -> EngramResult<String> {
        match self.value(name)? {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(type_err(name, "text", other)),
        }
    }

    pub fn opt_str(&self, name: &str) -> EngramResult<Option<String>> {
        match self.value(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            other => Err(type_err(name, "text", other)),
        }
    }

    pub fn i64(&self, name: &str) -> EngramResult<i64> {
        match self.value(name)? {
            SqlValue::Integer(i) => Ok(*i),
            SqlValue::Real(f) => Ok(*f as i64),
            other => Err(type_err(name, "integer", other)),
        }
    }

    pub fn opt_i64(&self, name: &str) -> EngramResult<Option<i64>> {
        match self.value(name)? {
            SqlValue::Null => Ok(None),
            _ => self.i64(name).map(Some),
        }
    }

    pub fn f64(&self, name: &str) -> EngramResult<f64> {
        match self.value(name)? {
            SqlValue::Real(f) => Ok(*f),
            SqlValue::Integer(i) => Ok(*i as f64),
            other => Err(type_err(name, "real", other)),
        }
    }

    pub fn bool(&self, name: &str) -> EngramResult<bool> {
        Ok(self.i64(name)? != 0)
    }

    pub fn opt_blob(&self, name: &str) -> EngramResult<Option<Vec<u8>>> {
        match self.value(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Blob(b) => Ok(Some(b.clone())),
            other => Err(type_err(name, "blob", other)),
        }
    }

    pub fn blob(&self, name: &str) -> EngramResult<Vec<u8>> {
        self.opt_blob(name)?
            .ok_or_else(|| EngramError::internal(format!("column {name} is null")))
    }

    /// JSON column: native on Postgres, a JSON string on SQLite.
    pub fn json(&self, name: &str) -> EngramResult<serde_json::Value> {
        match self.value(name)? {
            SqlValue::Json(v) => Ok(v.clone()),
            SqlValue::Text(s) => serde_json::from_str(s)
                .map_err(|e| EngramError::internal(format!("column {name}: bad json: {e}"))),
            SqlValue::Null => Ok(serde_json::Value::Null),
            other => Err(type_err(name, "json", other)),
        }
    }

    /// Epoch-millis timestamp column.
    pub fn millis(&self, name: &str) -> EngramResult<DateTime<Utc>> {
        from_millis(self.i64(name)?)
    }

    pub fn opt_millis(&self, name: &str) -> EngramResult<Option<DateTime<Utc>>> {
        self.opt_i64(name)?.map(from_millis).transpose()
    }
}

fn type_err(name: &str, wanted: &str, got: &SqlValue) -> EngramError {
    EngramError::internal(format!("column {name}: expected {wanted}, got {got:?}"))
}

/// The storage boundary speaks integer milliseconds since epoch.
pub fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn from_millis(ms: i64) -> EngramResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| EngramError::internal(format!("timestamp out of range: {ms}")))
}

/// What both metadata backends (and open transactions on them) expose.
///
/// Domain query functions take `&dyn SqlExecutor`, so a caller holding a
/// transaction threads it straight through — nested transactions flatten
/// by construction.
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Execute a statement, returning the affected row count.
    async fn run(&self, sql: &str, params: &[SqlValue]) -> EngramResult<u64>;

    /// Fetch at most one row.
    async fn get(&self, sql: &str, params: &[SqlValue]) -> EngramResult<Option<SqlRow>>;

    /// Fetch all rows.
    async fn all(&self, sql: &str, params: &[SqlValue]) -> EngramResult<Vec<SqlRow>>;
}
