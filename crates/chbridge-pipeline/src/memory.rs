//! Scripted in-memory [`Connection`].
//!
//! Queries are answered from responses registered by exact SQL text and
//! every `exec` call is recorded. Used by the test suites and by callers that
//! want to dry-run a transfer without a server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chbridge_model::{RawValue, TransferValue};

use crate::connection::{Connection, QueryContext, RowCursor};
use crate::error::ConnectionError;
use crate::sql::{SHOW_TABLES, describe_statement};

/// One recorded `exec` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecCall {
    pub sql: String,
    pub params: Vec<TransferValue>,
}

#[derive(Debug, Clone)]
enum Response {
    Rows {
        rows: Vec<Vec<RawValue>>,
        fail_after: Option<usize>,
    },
    Error(String),
}

#[derive(Debug, Default)]
struct CallLog {
    queried: Vec<String>,
    executed: Vec<ExecCall>,
    exec_attempts: usize,
}

#[derive(Debug, Default)]
pub struct MemoryConnection {
    responses: HashMap<String, Response>,
    fail_exec_at: Option<usize>,
    log: Mutex<CallLog>,
}

impl MemoryConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table's catalog description as `(name, raw type)` pairs.
    #[must_use]
    pub fn with_table(self, table: &str, columns: &[(&str, &str)]) -> Self {
        let rows = columns
            .iter()
            .map(|(name, raw_type)| vec![RawValue::from(*name), RawValue::from(*raw_type)])
            .collect();
        self.with_query(describe_statement(table), rows)
    }

    /// Register the table listing.
    #[must_use]
    pub fn with_tables(self, tables: &[&str]) -> Self {
        let rows = tables.iter().map(|name| vec![RawValue::from(*name)]).collect();
        self.with_query(SHOW_TABLES, rows)
    }

    /// Answer `sql` with `rows`.
    #[must_use]
    pub fn with_query(mut self, sql: impl Into<String>, rows: Vec<Vec<RawValue>>) -> Self {
        self.responses.insert(
            sql.into(),
            Response::Rows {
                rows,
                fail_after: None,
            },
        );
        self
    }

    /// Answer `sql` with the first `fail_after` rows, then a transport error.
    #[must_use]
    pub fn with_query_error_after(
        mut self,
        sql: impl Into<String>,
        rows: Vec<Vec<RawValue>>,
        fail_after: usize,
    ) -> Self {
        self.responses.insert(
            sql.into(),
            Response::Rows {
                rows,
                fail_after: Some(fail_after),
            },
        );
        self
    }

    /// Reject `sql` with a server error.
    #[must_use]
    pub fn with_failing_query(mut self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses
            .insert(sql.into(), Response::Error(message.into()));
        self
    }

    /// Fail the `call`-th `exec` (1-based). Earlier calls succeed.
    #[must_use]
    pub fn fail_exec_at(mut self, call: usize) -> Self {
        self.fail_exec_at = Some(call);
        self
    }

    /// Successful `exec` calls, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<ExecCall> {
        self.with_log(|log| log.executed.clone())
    }

    /// SQL of every query received, in order.
    #[must_use]
    pub fn queried(&self) -> Vec<String> {
        self.with_log(|log| log.queried.clone())
    }

    fn with_log<T>(&self, read: impl FnOnce(&CallLog) -> T) -> T {
        match self.log.lock() {
            Ok(log) => read(&log),
            Err(poisoned) => read(&poisoned.into_inner()),
        }
    }

    fn log(&self) -> Result<MutexGuard<'_, CallLog>, ConnectionError> {
        self.log
            .lock()
            .map_err(|_| ConnectionError::Transport("call log poisoned".to_string()))
    }
}

struct MemoryCursor {
    rows: std::vec::IntoIter<Vec<RawValue>>,
    remaining: Option<usize>,
}

impl RowCursor for MemoryCursor {
    fn next_row(&mut self) -> Result<Option<Vec<RawValue>>, ConnectionError> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(ConnectionError::Transport(
                    "connection reset while reading result".to_string(),
                ));
            }
            *remaining -= 1;
        }
        Ok(self.rows.next())
    }
}

impl Connection for MemoryConnection {
    fn query(
        &self,
        _context: &QueryContext,
        sql: &str,
        _params: &[TransferValue],
    ) -> Result<Box<dyn RowCursor + '_>, ConnectionError> {
        self.log()?.queried.push(sql.to_string());
        match self.responses.get(sql) {
            Some(Response::Rows { rows, fail_after }) => Ok(Box::new(MemoryCursor {
                rows: rows.clone().into_iter(),
                remaining: *fail_after,
            })),
            Some(Response::Error(message)) => Err(ConnectionError::Server {
                code: None,
                message: message.clone(),
            }),
            None => Err(ConnectionError::Server {
                code: Some(60),
                message: format!("no scripted response for: {sql}"),
            }),
        }
    }

    fn exec(
        &self,
        _context: &QueryContext,
        sql: &str,
        params: &[TransferValue],
    ) -> Result<(), ConnectionError> {
        let mut log = self.log()?;
        log.exec_attempts += 1;
        if self.fail_exec_at == Some(log.exec_attempts) {
            return Err(ConnectionError::Server {
                code: Some(53),
                message: "type mismatch".to_string(),
            });
        }
        log.executed.push(ExecCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(())
    }
}
