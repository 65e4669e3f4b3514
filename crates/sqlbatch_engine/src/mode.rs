//! Read-write vs read-only submission.
//!
//! A read-only transaction differs from a read-write one only in the primitive
//! entry point its batch goes through.

use std::fmt;

use crate::types::{BatchFailure, BatchRunner, BatchSuccess, Database};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TxMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl TxMode {
    pub(crate) fn submit(
        self,
        db: &dyn Database,
        runner: BatchRunner,
        on_error: BatchFailure,
        on_success: BatchSuccess,
    ) {
        match self {
            TxMode::ReadWrite => db.transaction(runner, on_error, on_success),
            TxMode::ReadOnly => db.read_transaction(runner, on_error, on_success),
        }
    }
}

impl fmt::Display for TxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxMode::ReadWrite => f.write_str("read-write"),
            TxMode::ReadOnly => f.write_str("read-only"),
        }
    }
}
