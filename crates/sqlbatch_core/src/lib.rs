//! Shared types and ports for sqlbatch.
//!
//! The engine crate builds transactions on top of the [`Database`] port; storage
//! adapters (e.g. `sqlbatch_storage_mem`) implement it.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

// -----------------------
// Values and rows
// -----------------------

/// A bind parameter or a column value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// Row collection handed back by the primitive.
///
/// Only positional access and a count are guaranteed; callers that need a
/// `Vec<Row>` materialize it by index.
pub trait RowList {
    fn len(&self) -> usize;
    fn item(&self, index: usize) -> Option<Row>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for dyn RowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowList(len={})", self.len())
    }
}

impl RowList for Vec<Row> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn item(&self, index: usize) -> Option<Row> {
        self.get(index).cloned()
    }
}

/// Outcome of one successfully executed statement.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    pub insert_id: Option<i64>,
    pub rows_affected: Option<u64>,
    pub rows: Option<Rc<dyn RowList>>,
}

impl ResultSet {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self { insert_id: None, rows_affected: Some(0), rows: Some(Rc::new(rows)) }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self { insert_id: None, rows_affected: Some(rows_affected), rows: None }
    }

    pub fn inserted(insert_id: i64) -> Self {
        Self { insert_id: Some(insert_id), rows_affected: Some(1), rows: None }
    }
}

// -----------------------
// Errors
// -----------------------

/// Classic SQL error codes reported by the primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    Unknown,
    Database,
    Version,
    TooLarge,
    Quota,
    Syntax,
    Constraint,
    Timeout,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Unknown => "unknown error",
            ErrorCode::Database => "database error",
            ErrorCode::Version => "version mismatch",
            ErrorCode::TooLarge => "result too large",
            ErrorCode::Quota => "quota exceeded",
            ErrorCode::Syntax => "syntax error",
            ErrorCode::Constraint => "constraint violation",
            ErrorCode::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Error value delivered by the primitive, for a whole batch or for one statement.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct DbError {
    pub code: ErrorCode,
    pub message: String,
    /// Text of the statement that failed, when the error belongs to one.
    pub query: Option<String>,
}

impl DbError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), query: None }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TxError {
    #[error("this transaction was already executed, create a new one or use copy()")]
    AlreadyExecuted,
    #[error("no queries queued, use query() first")]
    EmptyTransaction,
    #[error("invalid use of {0}")]
    InvalidUse(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

// -----------------------
// Primitive ports
// -----------------------

pub type StatementSuccess = Box<dyn FnOnce(ResultSet)>;
pub type StatementFailure = Box<dyn FnOnce(DbError)>;
pub type BatchRunner = Box<dyn FnOnce(&mut dyn StatementHandle)>;
pub type BatchFailure = Box<dyn FnOnce(DbError)>;
pub type BatchSuccess = Box<dyn FnOnce()>;

/// Per-batch handle through which statements are submitted.
///
/// Exactly one of `on_success`/`on_error` is invoked per submitted statement.
pub trait StatementHandle {
    fn execute_sql(
        &mut self,
        sql: &str,
        args: &[Value],
        on_success: StatementSuccess,
        on_error: StatementFailure,
    );
}

/// The underlying atomic-transaction primitive.
///
/// Both entry points invoke `runner` at most once, then exactly one of
/// `on_error`/`on_success` exactly once. Neither may complete synchronously.
pub trait Database {
    fn transaction(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess);
    fn read_transaction(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess);
}

/// Opens (or creates) a database handle.
pub trait Connector {
    fn open_database(
        &self,
        name: &str,
        version: &str,
        description: &str,
        size: u64,
    ) -> Result<Rc<dyn Database>, DbError>;
}
