//! sqlbatch engine (library)
//! Chainable, queued transactions over a callback-based database primitive.

pub mod types;
pub mod config;
pub mod command;
pub mod mode;
pub mod tx;
pub mod adapters;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

pub use adapters::{single_insert, single_select, single_value, Selected};
pub use command::{Params, QueryCommand};
pub use config::{DbOptions, ResolvedOptions};
pub use mode::TxMode;
pub use tx::{BatchResult, Completion, Transaction, TxState};
pub use types::{Connector, Database, DbError, ErrorCode, ResultSet, Row, RowList, TxError, Value};

/// Entry point bound to one opened database handle.
pub struct SqlBatch {
    db: Rc<dyn Database>,
    options: ResolvedOptions,
}

impl SqlBatch {
    /// Validate `options` and open the database through `connector`.
    pub fn open(connector: &dyn Connector, options: &DbOptions) -> Result<Self, TxError> {
        let options = options.resolve()?;
        let db = connector.open_database(&options.name, &options.version, &options.description, options.size)?;
        debug!(name = %options.name, version = %options.version, size = options.size, "database opened");
        Ok(Self { db, options })
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn handle(&self) -> Rc<dyn Database> {
        Rc::clone(&self.db)
    }

    pub fn tx(&self) -> Transaction {
        Transaction::new(self.handle())
    }

    pub fn readonly_tx(&self) -> Transaction {
        Transaction::read_only(self.handle())
    }

    /// Alias of [`SqlBatch::readonly_tx`].
    pub fn rtx(&self) -> Transaction {
        self.readonly_tx()
    }

    /// Rows of `sqlite_master`.
    pub fn list_tables<F>(&self, cb: F) -> Result<(), TxError>
    where
        F: FnOnce(Result<Vec<Row>, TxError>) + 'static,
    {
        let mut tx = self.tx();
        tx.query("select * from sqlite_master", ());
        tx.execute(single_select(move |res| cb(res.map(|s| s.map(|s| s.rows).unwrap_or_default()))))
    }

    /// Drop every user table in one transaction.
    pub fn reset_db<F>(&self, cb: F) -> Result<(), TxError>
    where
        F: FnOnce(Result<(), TxError>) + 'static,
    {
        let db = self.handle();
        self.list_tables(move |tables| {
            let tables = match tables {
                Ok(t) => t,
                Err(e) => return cb(Err(e)),
            };
            let mut tx = Transaction::new(db);
            for name in tables.iter().filter_map(user_table_name) {
                tx.query(format!("DROP TABLE {name}"), ());
            }
            if tx.is_empty() {
                debug!("reset_db: no tables to drop");
                return cb(Ok(()));
            }
            execute_reporting(&mut tx, cb);
        })
    }
}

/// Execute `tx` and hand its outcome to `cb`, including a refused submission.
fn execute_reporting<F>(tx: &mut Transaction, cb: F)
where
    F: FnOnce(Result<(), TxError>) + 'static,
{
    let slot = Rc::new(RefCell::new(Some(cb)));
    let done = Rc::clone(&slot);
    let submitted = tx.execute(move |completion| {
        let cb = done.borrow_mut().take();
        if let Some(cb) = cb {
            cb(completion.into_result().map(|_| ()).map_err(TxError::from));
        }
    });
    if let Err(e) = submitted {
        warn!(error = %e, statements = tx.len(), "batch not submitted");
        let cb = slot.borrow_mut().take();
        if let Some(cb) = cb {
            cb(Err(e));
        }
    }
}

fn user_table_name(row: &Row) -> Option<&str> {
    if row.get("type").and_then(Value::as_str) != Some("table") {
        return None;
    }
    let name = row.get("name").and_then(Value::as_str)?;
    // sqlite and host bookkeeping tables cannot be dropped
    if name.starts_with("sqlite_") || name.starts_with("__WebKit") {
        return None;
    }
    Some(name)
}
