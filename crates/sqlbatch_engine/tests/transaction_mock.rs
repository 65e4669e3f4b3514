//! Transaction tests against a hand-written mock primitive
//!
//! The mock records what it was asked to do and replays the batch with
//! callbacks queued on its own task list, so tests control exactly when (and
//! how often) the primitive signals.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use proptest::prelude::*;
use sqlbatch_engine::{
    Completion, Database, DbError, ErrorCode, ResultSet, Transaction, TxError, Value,
};
use sqlbatch_engine::types::{BatchFailure, BatchRunner, BatchSuccess, StatementFailure, StatementHandle, StatementSuccess};

type Task = Box<dyn FnOnce()>;

/// Mock primitive; `misbehave` makes it signal both error and success.
#[derive(Default)]
struct MockDb {
    tasks: Rc<RefCell<VecDeque<Task>>>,
    queries: Rc<RefCell<Vec<(String, Vec<Value>)>>>,
    transaction_calls: RefCell<u32>,
    read_transaction_calls: RefCell<u32>,
    misbehave: bool,
}

struct MockHandle {
    tasks: Rc<RefCell<VecDeque<Task>>>,
    queries: Rc<RefCell<Vec<(String, Vec<Value>)>>>,
}

impl StatementHandle for MockHandle {
    fn execute_sql(&mut self, sql: &str, args: &[Value], on_success: StatementSuccess, _on_error: StatementFailure) {
        self.queries.borrow_mut().push((sql.to_string(), args.to_vec()));
        self.tasks.borrow_mut().push_back(Box::new(move || on_success(ResultSet::affected(1))));
    }
}

impl MockDb {
    fn run(&self) {
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    fn submit(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess) {
        let tasks = Rc::clone(&self.tasks);
        let queries = Rc::clone(&self.queries);
        let misbehave = self.misbehave;
        self.tasks.borrow_mut().push_back(Box::new(move || {
            runner(&mut MockHandle { tasks: Rc::clone(&tasks), queries });
            tasks.borrow_mut().push_back(Box::new(move || {
                if misbehave {
                    on_error(DbError::new(ErrorCode::Unknown, "test"));
                }
                on_success();
            }));
        }));
    }
}

impl Database for MockDb {
    fn transaction(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess) {
        *self.transaction_calls.borrow_mut() += 1;
        self.submit(runner, on_error, on_success);
    }

    fn read_transaction(&self, runner: BatchRunner, on_error: BatchFailure, on_success: BatchSuccess) {
        *self.read_transaction_calls.borrow_mut() += 1;
        self.submit(runner, on_error, on_success);
    }
}

fn collect() -> (Rc<RefCell<Vec<Completion>>>, impl FnOnce(Completion) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |c| sink.borrow_mut().push(c))
}

/// Test that the primitive sees every statement with its bind args
#[test]
fn mock_receives_statements_and_args() {
    let mock = Rc::new(MockDb::default());
    let db: Rc<dyn Database> = mock.clone();
    let (seen, cb) = collect();

    Transaction::new(db)
        .query("INSERT INTO t VALUES (?, ?)", [Value::from(1), Value::from("x")])
        .execute(cb)
        .unwrap();
    assert_eq!(*mock.transaction_calls.borrow(), 1);
    assert!(mock.queries.borrow().is_empty(), "runner must wait for the primitive");

    mock.run();
    assert_eq!(
        *mock.queries.borrow(),
        vec![("INSERT INTO t VALUES (?, ?)".to_string(), vec![Value::from(1), Value::from("x")])]
    );
    assert_eq!(seen.borrow().len(), 1);
}

/// Test that a primitive signalling twice still reaches the caller once
#[test]
fn completion_callback_fires_exactly_once() {
    let mock = Rc::new(MockDb { misbehave: true, ..Default::default() });
    let db: Rc<dyn Database> = mock.clone();
    let (seen, cb) = collect();

    Transaction::new(db).query("SELECT 1", ()).execute(cb).unwrap();
    mock.run();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], Completion::Aborted(e) if e.message == "test"));
}

/// Test that a failed usage check leaves the primitive untouched
#[test]
fn usage_faults_do_not_reach_the_primitive() {
    let mock = Rc::new(MockDb::default());
    let db: Rc<dyn Database> = mock.clone();

    let mut tx = Transaction::read_only(Rc::clone(&db));
    assert_eq!(tx.execute(|_| {}), Err(TxError::EmptyTransaction));
    assert_eq!(*mock.read_transaction_calls.borrow(), 0);

    tx.query("SELECT 1", ()).execute(|_| {}).unwrap();
    assert_eq!(tx.execute(|_| {}), Err(TxError::AlreadyExecuted));
    assert_eq!(*mock.read_transaction_calls.borrow(), 1);
    assert_eq!(*mock.transaction_calls.borrow(), 0);
}

proptest! {
    #[test]
    fn submission_order_and_sequence_ids_match_queue_order(
        statements in proptest::collection::vec("SELECT [a-z]{1,8}", 1..24)
    ) {
        let mock = Rc::new(MockDb::default());
        let db: Rc<dyn Database> = mock.clone();
        let (seen, cb) = collect();

        let mut tx = Transaction::new(db);
        for sql in &statements {
            tx.query(sql.as_str(), ());
        }
        tx.execute(cb).unwrap();
        mock.run();

        let submitted: Vec<String> = mock.queries.borrow().iter().map(|(sql, _)| sql.clone()).collect();
        prop_assert_eq!(&submitted, &statements);

        let seen = seen.borrow();
        let commands = seen[0].commands().unwrap();
        prop_assert_eq!(commands.len(), statements.len());
        for (i, cmd) in commands.iter().enumerate() {
            prop_assert_eq!(cmd.sequence_id, i + 1);
            prop_assert_eq!(&cmd.query, &statements[i]);
            prop_assert_eq!(cmd.rows_affected, Some(1));
        }
    }
}
