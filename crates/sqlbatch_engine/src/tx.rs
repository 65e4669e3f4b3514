//! Chainable transactions over the callback-based primitive.
//!
//! Statements are queued with [`Transaction::query`] and submitted as one batch
//! by [`Transaction::execute`]. The primitive drives everything after that:
//! it calls the batch runner, settles each statement through its own
//! callbacks, then signals the batch exactly once. The outcome reaches the
//! caller as a single [`Completion`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::command::{self, Params, QueryCommand};
use crate::mode::TxMode;
use crate::types::{
    Database, DbError, ResultSet, StatementFailure, StatementHandle, StatementSuccess, TxError, Value,
};

/// Lifecycle of a [`Transaction`]. There is no way back to `Building`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    Building,
    Executing,
    Completed,
}

/// Outcome of a finished batch.
#[derive(Clone, Debug)]
pub struct BatchResult {
    /// Last per-statement failure recorded during the batch, if any.
    pub error: Option<DbError>,
    pub commands: Vec<QueryCommand>,
}

impl BatchResult {
    /// Every per-statement failure, in submission order.
    pub fn statement_errors(&self) -> Vec<&DbError> {
        self.commands.iter().filter_map(|c| c.error.as_ref()).collect()
    }
}

/// What the completion callback receives.
#[derive(Clone, Debug)]
pub enum Completion {
    /// The primitive rejected the batch as a whole.
    Aborted(DbError),
    /// All submitted statements were processed.
    Finished(BatchResult),
}

impl Completion {
    pub fn error(&self) -> Option<&DbError> {
        match self {
            Completion::Aborted(err) => Some(err),
            Completion::Finished(batch) => batch.error.as_ref(),
        }
    }

    pub fn commands(&self) -> Option<&[QueryCommand]> {
        match self {
            Completion::Aborted(_) => None,
            Completion::Finished(batch) => Some(&batch.commands),
        }
    }

    /// Collapse into the commands, or the error the batch reported.
    pub fn into_result(self) -> Result<Vec<QueryCommand>, DbError> {
        match self {
            Completion::Aborted(err) => Err(err),
            Completion::Finished(BatchResult { error: Some(err), .. }) => Err(err),
            Completion::Finished(BatchResult { error: None, commands }) => Ok(commands),
        }
    }
}

type CompletionCallback = Box<dyn FnOnce(Completion)>;

struct TxInner {
    commands: Vec<QueryCommand>,
    state: TxState,
    batch_error: Option<DbError>,
    callback: Option<CompletionCallback>,
}

/// An ordered batch of statements bound to one database handle.
///
/// Executes exactly once; use [`Transaction::copy`] to run the same
/// statements again.
pub struct Transaction {
    db: Rc<dyn Database>,
    mode: TxMode,
    inner: Rc<RefCell<TxInner>>,
}

impl Transaction {
    /// Read-write transaction.
    pub fn new(db: Rc<dyn Database>) -> Self {
        Self::with_mode(db, TxMode::ReadWrite)
    }

    pub fn read_only(db: Rc<dyn Database>) -> Self {
        Self::with_mode(db, TxMode::ReadOnly)
    }

    pub fn with_mode(db: Rc<dyn Database>, mode: TxMode) -> Self {
        Self {
            db,
            mode,
            inner: Rc::new(RefCell::new(TxInner {
                commands: Vec::new(),
                state: TxState::Building,
                batch_error: None,
                callback: None,
            })),
        }
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == TxMode::ReadOnly
    }

    pub fn state(&self) -> TxState {
        self.inner.borrow().state
    }

    pub fn is_executed(&self) -> bool {
        self.state() != TxState::Building
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queued commands and whatever they have recorded so far.
    pub fn commands(&self) -> Vec<QueryCommand> {
        self.inner.borrow().commands.clone()
    }

    /// Queue a statement. Nothing runs until [`Transaction::execute`].
    pub fn query(&mut self, sql: impl Into<String>, args: impl Into<Params>) -> &mut Self {
        let mut inner = self.inner.borrow_mut();
        let sequence_id = inner.commands.len() + 1;
        inner.commands.push(QueryCommand::new(sql, args.into().into_bind_args(), sequence_id));
        drop(inner);
        self
    }

    /// Submit every queued statement as one batch.
    ///
    /// Fails synchronously, without touching the primitive, when the
    /// transaction was already executed or nothing is queued. Otherwise
    /// `callback` is invoked exactly once, later, from the primitive's
    /// batch signal.
    pub fn execute<F>(&mut self, callback: F) -> Result<(), TxError>
    where
        F: FnOnce(Completion) + 'static,
    {
        let queued = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != TxState::Building {
                return Err(TxError::AlreadyExecuted);
            }
            if inner.commands.is_empty() {
                return Err(TxError::EmptyTransaction);
            }
            inner.state = TxState::Executing;
            inner.callback = Some(Box::new(callback));
            inner.commands.len()
        };
        debug!(mode = %self.mode, commands = queued, "submitting batch");

        let runner_inner = Rc::clone(&self.inner);
        let error_inner = Rc::clone(&self.inner);
        let success_inner = Rc::clone(&self.inner);
        self.mode.submit(
            self.db.as_ref(),
            Box::new(move |handle: &mut dyn StatementHandle| run_batch(&runner_inner, handle)),
            Box::new(move |err| batch_failed(&error_inner, err)),
            Box::new(move || batch_succeeded(&success_inner)),
        );
        Ok(())
    }

    /// Fresh, unexecuted transaction of the same mode and handle with the
    /// same statements. Recorded results are not carried over.
    pub fn copy(&self) -> Transaction {
        let mut tx = Transaction::with_mode(Rc::clone(&self.db), self.mode);
        for cmd in self.inner.borrow().commands.iter() {
            tx.query(cmd.query.clone(), Params::Bind(cmd.args.clone()));
        }
        tx
    }

    /// Bind values from a positional argument list whose last slot is a callback.
    pub fn params(args: &[Value]) -> Vec<Value> {
        command::params(args)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Transaction")
            .field("mode", &self.mode)
            .field("state", &inner.state)
            .field("commands", &inner.commands.len())
            .finish()
    }
}

// -----------------------
// Primitive callbacks
// -----------------------

fn run_batch(inner: &Rc<RefCell<TxInner>>, handle: &mut dyn StatementHandle) {
    // Statement callbacks may fire re-entrantly, so release the borrow first.
    let pending: Vec<(usize, String, Vec<Value>)> = inner
        .borrow()
        .commands
        .iter()
        .enumerate()
        .map(|(index, cmd)| (index, cmd.query.clone(), cmd.args.clone()))
        .collect();

    for (index, sql, args) in pending {
        let ok_inner = Rc::clone(inner);
        let err_inner = Rc::clone(inner);
        let on_success: StatementSuccess = Box::new(move |result| statement_succeeded(&ok_inner, index, result));
        let on_error: StatementFailure = Box::new(move |err| statement_failed(&err_inner, index, err));
        handle.execute_sql(&sql, &args, on_success, on_error);
    }
}

fn statement_succeeded(inner: &Rc<RefCell<TxInner>>, index: usize, result: ResultSet) {
    let mut inner = inner.borrow_mut();
    if let Some(cmd) = inner.commands.get_mut(index) {
        trace!(sequence_id = cmd.sequence_id, rows_affected = ?result.rows_affected, "statement succeeded");
        cmd.record_success(result);
    }
}

fn statement_failed(inner: &Rc<RefCell<TxInner>>, index: usize, err: DbError) {
    let mut inner = inner.borrow_mut();
    let stamped = match inner.commands.get_mut(index) {
        Some(cmd) => cmd.record_error(err),
        None => return,
    };
    if let Some(err) = stamped {
        warn!(sequence_id = index + 1, query = ?err.query, error = %err, "statement failed");
        // single slot: the last failure wins
        inner.batch_error = Some(err);
    }
}

fn batch_failed(inner: &Rc<RefCell<TxInner>>, err: DbError) {
    let callback = {
        let mut inner = inner.borrow_mut();
        inner.state = TxState::Completed;
        inner.callback.take()
    };
    match callback {
        Some(callback) => {
            warn!(error = %err, "batch rejected");
            callback(Completion::Aborted(err));
        }
        None => warn!(error = %err, "batch error after completion; ignoring"),
    }
}

fn batch_succeeded(inner: &Rc<RefCell<TxInner>>) {
    let (callback, result) = {
        let mut inner = inner.borrow_mut();
        inner.state = TxState::Completed;
        let result = BatchResult { error: inner.batch_error.clone(), commands: inner.commands.clone() };
        (inner.callback.take(), result)
    };
    match callback {
        Some(callback) => {
            debug!(commands = result.commands.len(), failed = result.error.is_some(), "batch completed");
            callback(Completion::Finished(result));
        }
        None => warn!("batch success after completion; ignoring"),
    }
}
