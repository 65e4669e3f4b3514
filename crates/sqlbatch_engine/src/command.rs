//! Queued statements and their bind parameters.

use std::rc::Rc;

use tracing::warn;

use crate::types::{DbError, ResultSet, RowList, Value};

/// One statement queued on a [`crate::Transaction`].
///
/// Results are recorded at most once, by the statement's success or error
/// callback; a settled command is never touched again.
#[derive(Clone, Debug)]
pub struct QueryCommand {
    pub query: String,
    pub args: Vec<Value>,
    /// 1-based position in the batch
    pub sequence_id: usize,
    pub result: Option<ResultSet>,
    pub rows_affected: Option<u64>,
    pub rows: Option<Rc<dyn RowList>>,
    pub error: Option<DbError>,
}

impl QueryCommand {
    pub fn new(query: impl Into<String>, args: Vec<Value>, sequence_id: usize) -> Self {
        Self {
            query: query.into(),
            args,
            sequence_id,
            result: None,
            rows_affected: None,
            rows: None,
            error: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    pub(crate) fn record_success(&mut self, result: ResultSet) {
        if self.is_settled() {
            warn!(sequence_id = self.sequence_id, query = %self.query, "statement settled twice; ignoring result");
            return;
        }
        self.rows_affected = result.rows_affected;
        self.rows = result.rows.clone();
        self.result = Some(result);
    }

    /// Record a failure and return the error stamped with this statement's text.
    pub(crate) fn record_error(&mut self, err: DbError) -> Option<DbError> {
        if self.is_settled() {
            warn!(sequence_id = self.sequence_id, query = %self.query, "statement settled twice; ignoring error");
            return None;
        }
        let err = err.with_query(self.query.clone());
        self.error = Some(err.clone());
        Some(err)
    }
}

/// Bind parameters accepted by [`crate::Transaction::query`].
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    /// Explicit ordered bind values.
    Bind(Vec<Value>),
    /// A positional argument list whose last slot belongs to a callback;
    /// every element but the last becomes a bind value.
    Arguments(Vec<Value>),
}

impl Params {
    pub fn into_bind_args(self) -> Vec<Value> {
        match self {
            Params::Bind(args) => args,
            Params::Arguments(args) => params(&args),
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::Bind(Vec::new())
    }
}

impl From<Vec<Value>> for Params {
    fn from(args: Vec<Value>) -> Self {
        Params::Bind(args)
    }
}

impl From<&[Value]> for Params {
    fn from(args: &[Value]) -> Self {
        Params::Bind(args.to_vec())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Params {
    fn from(args: [T; N]) -> Self {
        Params::Bind(args.into_iter().map(Into::into).collect())
    }
}

/// Drop the trailing callback slot from an argument list.
pub fn params(args: &[Value]) -> Vec<Value> {
    // a lone element is just the callback
    if args.len() < 2 {
        return Vec::new();
    }
    args[..args.len() - 1].to_vec()
}
