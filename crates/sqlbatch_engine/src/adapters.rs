//! Completion-callback wrappers that shape a batch outcome into the common
//! single-query answers: all rows, the first row, or the generated id.
//!
//! Each adapter only looks at the first command; other statements in the batch
//! are ignored.

use tracing::debug;

use crate::command::QueryCommand;
use crate::tx::{BatchResult, Completion};
use crate::types::{Row, RowList, TxError};

/// Rows of the first statement plus the full command list.
#[derive(Clone, Debug)]
pub struct Selected {
    pub rows: Vec<Row>,
    pub commands: Vec<QueryCommand>,
}

/// Rows of the first statement, or `None` when it produced no row results.
pub fn single_select<F>(cb: F) -> impl FnOnce(Completion) + 'static
where
    F: FnOnce(Result<Option<Selected>, TxError>) + 'static,
{
    move |completion| cb(select_rows(completion))
}

/// First row of the first statement, if any.
pub fn single_value<F>(cb: F) -> impl FnOnce(Completion) + 'static
where
    F: FnOnce(Result<Option<Row>, TxError>) + 'static,
{
    move |completion| cb(first_row(completion))
}

/// Generated id of the first statement.
///
/// Faults instead of reading a missing id: the batch error comes first, then
/// a failed or id-less first statement is an `InvalidUse`.
pub fn single_insert<F>(cb: F) -> impl FnOnce(Completion) + 'static
where
    F: FnOnce(Result<i64, TxError>) + 'static,
{
    move |completion| cb(insert_id(completion))
}

fn finished(completion: Completion) -> Result<BatchResult, TxError> {
    match completion {
        Completion::Aborted(err) | Completion::Finished(BatchResult { error: Some(err), .. }) => {
            debug!(error = %err, query = ?err.query, "forwarding batch error");
            Err(err.into())
        }
        Completion::Finished(batch) => Ok(batch),
    }
}

/// Copy an indexable row collection into a `Vec`.
pub fn materialize(rows: &dyn RowList) -> Vec<Row> {
    (0..rows.len()).filter_map(|i| rows.item(i)).collect()
}

fn select_rows(completion: Completion) -> Result<Option<Selected>, TxError> {
    let batch = finished(completion)?;
    let Some(first) = batch.commands.first() else {
        return Ok(None);
    };
    match first.rows.as_deref() {
        Some(rows) => {
            let rows = materialize(rows);
            Ok(Some(Selected { rows, commands: batch.commands }))
        }
        None => Ok(None),
    }
}

fn first_row(completion: Completion) -> Result<Option<Row>, TxError> {
    let batch = finished(completion)?;
    let rows = batch.commands.first().and_then(|first| first.rows.as_deref());
    Ok(rows.and_then(|rows| rows.item(0)))
}

fn insert_id(completion: Completion) -> Result<i64, TxError> {
    let batch = finished(completion)?;
    let first = batch.commands.first().ok_or(TxError::InvalidUse("single_insert"))?;
    if let Some(err) = &first.error {
        return Err(err.clone().into());
    }
    first
        .result
        .as_ref()
        .and_then(|r| r.insert_id)
        .ok_or(TxError::InvalidUse("single_insert"))
}
