//! Scripted in-memory engine for tests.
//!
//! Statements are matched by their exact SQL text against registered
//! [`Script`]s. Unscripted SQL behaves as a non-query affecting zero rows.
//! Every engine primitive bumps a call counter so tests can assert which
//! engine calls were (or were not) made.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::bind::BindSet;
use super::connection::Settings;
use super::engine::{Engine, EngineResult, FetchStatus, RawConnection, RawStatement};
use super::error::EngineError;
use super::types::{self, Column, Value};

/// Scripted behaviour for one SQL text.
#[derive(Debug, Clone)]
pub enum Script {
    /// A query returning these rows.
    Rows {
        columns: Vec<Column>,
        rows: Vec<Vec<Option<Value>>>,
    },
    /// A non-query statement.
    Affected(u64),
    /// A query returning the bound parameters as its single row.
    Echo { columns: Vec<Column> },
    /// The engine rejects the statement text.
    FailPrepare(String),
    /// The engine rejects bind+execute.
    FailExecute(String),
    /// A query whose fetch fails after `after` rows.
    FailFetch {
        columns: Vec<Column>,
        rows: Vec<Vec<Option<Value>>>,
        after: usize,
        message: String,
    },
    /// A query that hands back raw column bytes as-is.
    RawRows {
        columns: Vec<Column>,
        rows: Vec<Vec<Option<Vec<u8>>>>,
    },
    /// A query whose engine drops the result slots after `after` rows.
    ShrinkRowAfter {
        columns: Vec<Column>,
        rows: Vec<Vec<Option<Value>>>,
        after: usize,
    },
}

/// Engine call counters.
#[derive(Debug, Default)]
pub struct Calls {
    pub library_inits: AtomicUsize,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub charsets: AtomicUsize,
    pub autocommits: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub statement_inits: AtomicUsize,
    pub prepares: AtomicUsize,
    pub bind_executes: AtomicUsize,
    pub bind_result_executes: AtomicUsize,
    pub fetches: AtomicUsize,
    pub statement_closes: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct StatementState {
    script: Option<Script>,
    /// Bytes of the parameters bound by the last execution
    bound: Vec<Option<Vec<u8>>>,
    pending: Vec<Vec<Option<Vec<u8>>>>,
    cursor: usize,
}

#[derive(Default)]
struct EngineState {
    scripts: HashMap<String, Script>,
    statements: HashMap<u64, StatementState>,
    open_connections: HashSet<u64>,
    connect_failures: usize,
    reject_charset: bool,
    fail_commit: bool,
    fail_rollback: bool,
    last_params: Vec<Option<Vec<u8>>>,
}

#[derive(Default)]
pub struct TestEngine {
    pub calls: Calls,
    state: Mutex<EngineState>,
    next_id: AtomicU64,
}

fn encode_rows(rows: &[Vec<Option<Value>>]) -> Vec<Vec<Option<Vec<u8>>>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|v| v.as_ref().filter(|v| !v.is_null()).map(types::encode))
                .collect()
        })
        .collect()
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

impl TestEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, sql: &str, script: Script) {
        self.state.lock().scripts.insert(sql.to_string(), script);
    }

    /// Make the next `n` connect calls fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().connect_failures = n;
    }

    pub fn reject_charset(&self) {
        self.state.lock().reject_charset = true;
    }

    pub fn fail_commit(&self) {
        self.state.lock().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.state.lock().fail_rollback = true;
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections.len()
    }

    pub fn open_statements(&self) -> usize {
        self.state.lock().statements.len()
    }

    /// Parameter bytes seen by the most recent bind+execute (`None` = NULL).
    pub fn last_params(&self) -> Vec<Option<Vec<u8>>> {
        self.state.lock().last_params.clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Engine for TestEngine {
    fn library_init(&self) -> EngineResult<()> {
        bump(&self.calls.library_inits);
        Ok(())
    }

    fn connect(&self, _settings: &Settings) -> EngineResult<RawConnection> {
        bump(&self.calls.connects);
        let mut state = self.state.lock();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(EngineError::new(2003, "Can't connect to MySQL server"));
        }
        let id = self.next_id();
        state.open_connections.insert(id);
        Ok(RawConnection(id))
    }

    fn set_character_set(&self, _conn: RawConnection, charset: &str) -> EngineResult<()> {
        bump(&self.calls.charsets);
        if self.state.lock().reject_charset {
            return Err(EngineError::new(2019, format!("Can't initialize character set {}", charset)));
        }
        Ok(())
    }

    fn close(&self, conn: RawConnection) {
        bump(&self.calls.closes);
        self.state.lock().open_connections.remove(&conn.0);
    }

    fn autocommit(&self, _conn: RawConnection, _enabled: bool) -> EngineResult<()> {
        bump(&self.calls.autocommits);
        Ok(())
    }

    fn commit(&self, _conn: RawConnection) -> EngineResult<()> {
        bump(&self.calls.commits);
        if self.state.lock().fail_commit {
            return Err(EngineError::new(1180, "Got error during COMMIT"));
        }
        Ok(())
    }

    fn rollback(&self, _conn: RawConnection) -> EngineResult<()> {
        bump(&self.calls.rollbacks);
        if self.state.lock().fail_rollback {
            return Err(EngineError::new(1181, "Got error during ROLLBACK"));
        }
        Ok(())
    }

    fn statement_init(&self, conn: RawConnection) -> EngineResult<RawStatement> {
        bump(&self.calls.statement_inits);
        let mut state = self.state.lock();
        if !state.open_connections.contains(&conn.0) {
            return Err(EngineError::new(2006, "MySQL server has gone away"));
        }
        let id = self.next_id();
        state.statements.insert(
            id,
            StatementState {
                script: None,
                bound: Vec::new(),
                pending: Vec::new(),
                cursor: 0,
            },
        );
        Ok(RawStatement(id))
    }

    fn prepare(&self, stmt: RawStatement, sql: &str) -> EngineResult<()> {
        bump(&self.calls.prepares);
        let mut state = self.state.lock();
        let script = state.scripts.get(sql).cloned();
        if let Some(Script::FailPrepare(message)) = &script {
            return Err(EngineError::new(1064, message.clone()));
        }
        let entry = state
            .statements
            .get_mut(&stmt.0)
            .ok_or_else(|| EngineError::new(2030, "Statement not prepared"))?;
        entry.script = script;
        Ok(())
    }

    fn bind_execute(&self, stmt: RawStatement, params: &BindSet) -> EngineResult<()> {
        bump(&self.calls.bind_executes);
        let bound: Vec<Option<Vec<u8>>> = params
            .slots()
            .iter()
            .map(|slot| (!slot.is_null()).then(|| slot.data().to_vec()))
            .collect();

        let mut state = self.state.lock();
        state.last_params = bound.clone();
        let entry = state
            .statements
            .get_mut(&stmt.0)
            .ok_or_else(|| EngineError::new(2030, "Statement not prepared"))?;
        if let Some(Script::FailExecute(message)) = &entry.script {
            return Err(EngineError::new(1366, message.clone()));
        }
        entry.bound = bound;
        Ok(())
    }

    fn result_metadata(&self, stmt: RawStatement) -> Option<Vec<Column>> {
        let state = self.state.lock();
        match state.statements.get(&stmt.0)?.script.as_ref()? {
            Script::Rows { columns, .. }
            | Script::Echo { columns }
            | Script::FailFetch { columns, .. }
            | Script::RawRows { columns, .. }
            | Script::ShrinkRowAfter { columns, .. } => Some(columns.clone()),
            _ => None,
        }
    }

    fn affected_rows(&self, stmt: RawStatement) -> u64 {
        let state = self.state.lock();
        match state.statements.get(&stmt.0).and_then(|s| s.script.as_ref()) {
            Some(Script::Affected(n)) => *n,
            _ => 0,
        }
    }

    fn bind_result_execute(&self, stmt: RawStatement, row: &mut BindSet) -> EngineResult<()> {
        bump(&self.calls.bind_result_executes);
        let mut state = self.state.lock();
        let entry = state
            .statements
            .get_mut(&stmt.0)
            .ok_or_else(|| EngineError::new(2030, "Statement not prepared"))?;
        if row.is_empty() {
            return Err(EngineError::new(2031, "No result columns bound"));
        }
        entry.pending = match entry.script.as_ref() {
            Some(Script::Rows { rows, .. })
            | Some(Script::FailFetch { rows, .. })
            | Some(Script::ShrinkRowAfter { rows, .. }) => encode_rows(rows),
            Some(Script::RawRows { rows, .. }) => rows.clone(),
            Some(Script::Echo { .. }) => vec![entry.bound.clone()],
            _ => Vec::new(),
        };
        entry.cursor = 0;
        Ok(())
    }

    fn fetch(&self, stmt: RawStatement, row: &mut BindSet) -> FetchStatus {
        bump(&self.calls.fetches);
        let mut state = self.state.lock();
        let Some(entry) = state.statements.get_mut(&stmt.0) else {
            return FetchStatus::Error(EngineError::new(2030, "Statement not prepared"));
        };

        match entry.script.as_ref() {
            Some(Script::FailFetch { after, message, .. }) if entry.cursor >= *after => {
                return FetchStatus::Error(EngineError::new(2013, message.clone()));
            }
            Some(Script::ShrinkRowAfter { after, .. }) if entry.cursor >= *after => {
                row.release();
            }
            _ => {}
        }

        let Some(values) = entry.pending.get(entry.cursor) else {
            return FetchStatus::NoData;
        };
        entry.cursor += 1;

        let mut truncated = false;
        for (slot, value) in row.slots_mut().iter_mut().zip(values) {
            match value {
                Some(bytes) => truncated |= !slot.fill(bytes),
                None => slot.set_null(),
            }
        }
        if truncated {
            FetchStatus::Truncated
        } else {
            FetchStatus::Row
        }
    }

    fn close_statement(&self, stmt: RawStatement) {
        bump(&self.calls.statement_closes);
        self.state.lock().statements.remove(&stmt.0);
    }
}
