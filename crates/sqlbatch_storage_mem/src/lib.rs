//! sqlbatch in-memory storage adapter
//! Implements the `Database` and `Connector` ports on top of an [`EventLoop`].
//!
//! Every callback is deferred: a batch's runner, then each statement in
//! submission order, then the batch signal. Nothing completes inside the call
//! that submitted it.

pub mod catalog;
pub mod event_loop;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sqlbatch_core::{
    BatchFailure, BatchRunner, BatchSuccess, Connector, Database, DbError, ErrorCode, ResultSet,
    StatementFailure, StatementHandle, StatementSuccess, Value,
};
use tracing::{debug, trace};

pub use catalog::Catalog;
pub use event_loop::EventLoop;

/// Scripted answer for a statement; `None` falls through to the built-in handling.
pub type Responder = Box<dyn FnMut(&str, &[Value]) -> Option<Result<ResultSet, DbError>>>;

const MUTATING: &[&str] = &["INSERT", "UPDATE", "DELETE", "REPLACE", "CREATE", "DROP", "ALTER"];

/// A statement as it reached the primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub sql: String,
    pub args: Vec<Value>,
    pub read_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchRecord {
    pub read_only: bool,
    pub aborted: bool,
}

#[derive(Default)]
struct MemState {
    catalog: Catalog,
    responder: Option<Responder>,
    submitted: Vec<Submission>,
    batches: Vec<BatchRecord>,
    fail_next: Option<DbError>,
    reject_next: Option<DbError>,
    next_insert_id: i64,
}

impl MemState {
    fn builtin(&mut self, sql: &str, verb: &str) -> Result<ResultSet, DbError> {
        if let Some(rest) = strip_prefix_ci(sql, "CREATE TABLE") {
            return self.catalog.create(rest, sql);
        }
        if let Some(rest) = strip_prefix_ci(sql, "DROP TABLE") {
            return self.catalog.drop_table(rest);
        }
        match verb {
            "SELECT" if sql.to_ascii_lowercase().contains("from sqlite_master") => {
                Ok(ResultSet::with_rows(self.catalog.master_rows()))
            }
            "SELECT" => Ok(ResultSet::with_rows(Vec::new())),
            "INSERT" | "REPLACE" => {
                self.next_insert_id += 1;
                Ok(ResultSet::inserted(self.next_insert_id))
            }
            _ => Ok(ResultSet::affected(0)),
        }
    }
}

fn evaluate(
    state: &RefCell<MemState>,
    sql: &str,
    args: &[Value],
    read_only: bool,
) -> Result<ResultSet, DbError> {
    let sql = sql.trim();
    let verb = sql.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
    if verb.is_empty() {
        return Err(DbError::new(ErrorCode::Syntax, "empty statement"));
    }
    if read_only && MUTATING.contains(&verb.as_str()) {
        return Err(DbError::new(ErrorCode::Database, "could not prepare statement (23 not authorized)"));
    }

    // the responder runs unborrowed so it may call back into the database
    let responder = state.borrow_mut().responder.take();
    if let Some(mut responder) = responder {
        let scripted = responder(sql, args);
        {
            let mut s = state.borrow_mut();
            if s.responder.is_none() {
                s.responder = Some(responder);
            }
        }
        if let Some(outcome) = scripted {
            return outcome;
        }
    }
    state.borrow_mut().builtin(sql, &verb)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) { Some(&s[prefix.len()..]) } else { None }
}

struct MemHandle {
    state: Rc<RefCell<MemState>>,
    event_loop: EventLoop,
    read_only: bool,
}

impl StatementHandle for MemHandle {
    fn execute_sql(
        &mut self,
        sql: &str,
        args: &[Value],
        on_success: StatementSuccess,
        on_error: StatementFailure,
    ) {
        self.state.borrow_mut().submitted.push(Submission {
            sql: sql.to_string(),
            args: args.to_vec(),
            read_only: self.read_only,
        });
        let state = Rc::clone(&self.state);
        let (sql, args, read_only) = (sql.to_string(), args.to_vec(), self.read_only);
        self.event_loop.defer(move || {
            let outcome = evaluate(&state, &sql, &args, read_only);
            match outcome {
                Ok(result) => {
                    trace!(sql = %sql, "statement ok");
                    on_success(result)
                }
                Err(err) => {
                    debug!(sql = %sql, error = %err, "statement failed");
                    on_error(err)
                }
            }
        });
    }
}

/// In-memory database handle.
pub struct MemDatabase {
    name: String,
    version: String,
    event_loop: EventLoop,
    state: Rc<RefCell<MemState>>,
}

impl MemDatabase {
    pub fn new(event_loop: &EventLoop) -> Self {
        Self::named(event_loop, "mem", "1.0")
    }

    pub fn named(event_loop: &EventLoop, name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            event_loop: event_loop.clone(),
            state: Rc::new(RefCell::new(MemState::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&str, &[Value]) -> Option<Result<ResultSet, DbError>> + 'static,
    {
        self.state.borrow_mut().responder = Some(Box::new(responder));
    }

    /// Abort the next batch after its statements ran; its catalog changes are rolled back.
    pub fn fail_next_batch(&self, err: DbError) {
        self.state.borrow_mut().fail_next = Some(err);
    }

    /// Refuse the next batch before its runner is invoked.
    pub fn reject_next_batch(&self, err: DbError) {
        self.state.borrow_mut().reject_next = Some(err);
    }

    pub fn submitted(&self) -> Vec<Submission> {
        self.state.borrow().submitted.clone()
    }

    pub fn batches(&self) -> Vec<BatchRecord> {
        self.state.borrow().batches.clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.borrow().catalog.table_names()
    }

    fn begin(&self, read_only: bool, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess) {
        let state = Rc::clone(&self.state);
        let event_loop = self.event_loop.clone();
        self.event_loop.defer(move || {
            let (batch, rejected, abort, snapshot) = {
                let mut s = state.borrow_mut();
                s.batches.push(BatchRecord { read_only, aborted: false });
                let (rejected, abort) = (s.reject_next.take(), s.fail_next.take());
                (s.batches.len() - 1, rejected, abort, s.catalog.clone())
            };
            if let Some(err) = rejected {
                debug!(batch, error = %err, "batch rejected before start");
                state.borrow_mut().batches[batch].aborted = true;
                on_error(err);
                return;
            }

            let mut handle = MemHandle { state: Rc::clone(&state), event_loop: event_loop.clone(), read_only };
            runner(&mut handle);

            // queued behind every statement the runner submitted
            event_loop.defer(move || match abort {
                Some(err) => {
                    debug!(batch, error = %err, "batch aborted, rolling back");
                    {
                        let mut s = state.borrow_mut();
                        s.catalog = snapshot;
                        s.batches[batch].aborted = true;
                    }
                    on_error(err)
                }
                None => on_success(),
            });
        });
    }
}

impl Database for MemDatabase {
    fn transaction(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess) {
        self.begin(false, runner, on_error, on_success)
    }

    fn read_transaction(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess) {
        self.begin(true, runner, on_error, on_success)
    }
}

/// Opens [`MemDatabase`]s by name; reopening returns the same database.
pub struct MemConnector {
    event_loop: EventLoop,
    databases: RefCell<HashMap<String, Rc<MemDatabase>>>,
}

impl MemConnector {
    pub fn new(event_loop: &EventLoop) -> Self {
        Self { event_loop: event_loop.clone(), databases: RefCell::new(HashMap::new()) }
    }

    pub fn database(&self, name: &str) -> Option<Rc<MemDatabase>> {
        self.databases.borrow().get(name).cloned()
    }
}

impl Connector for MemConnector {
    fn open_database(
        &self,
        name: &str,
        version: &str,
        _description: &str,
        _size: u64,
    ) -> Result<Rc<dyn Database>, DbError> {
        let mut databases = self.databases.borrow_mut();
        let db = match databases.get(name) {
            Some(db) if !version.is_empty() && db.version() != version => {
                return Err(DbError::new(
                    ErrorCode::Version,
                    format!("unable to open database {name}: version {} != {version}", db.version()),
                ));
            }
            Some(db) => Rc::clone(db),
            None => {
                let db = Rc::new(MemDatabase::named(&self.event_loop, name, version));
                databases.insert(name.to_string(), Rc::clone(&db));
                db
            }
        };
        let handle: Rc<dyn Database> = db;
        Ok(handle)
    }
}
