//! Scripted in-process database used by the integration tests
//!
//! Catalog queries are answered from registered table definitions; every
//! other statement is logged and answered from a queue of scripted results
//! (an empty row set when the queue is empty).

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relstore_core::config::{Config, ConfigBuilder};
use relstore_core::ports::{ConnectionParams, DriverError, DriverErrorKind, IConnector, ISqlConnection, Row};
use serde_json::{json, Value};
use tokio::time::Instant;

#[derive(Default)]
pub struct FakeDb {
    catalog: Mutex<HashMap<String, Vec<Row>>>,
    responses: Mutex<VecDeque<Result<Vec<Row>, DriverError>>>,
    log: Mutex<Vec<String>>,
    catalog_reads: Mutex<usize>,
    latency: Mutex<Duration>,
}

impl FakeDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a table as `(column, type)` pairs
    pub fn define_table(&self, schema: &str, table: &str, columns: &[(&str, &str)]) {
        let rows = columns
            .iter()
            .enumerate()
            .map(|(idx, (name, type_name))| {
                as_row(json!({
                    "SCHEMA_NAME": schema,
                    "TABLE_NAME": table,
                    "COLUMN_NAME": name,
                    "DATA_TYPE_ID": idx,
                    "DATA_TYPE_NAME": type_name,
                    "LENGTH": 0,
                    "NULLABLE": if *name == "id" { 0 } else { 1 },
                }))
            })
            .collect();
        self.catalog.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn push_rows(&self, rows: Vec<Value>) {
        let rows = rows.into_iter().map(as_row).collect();
        self.responses.lock().unwrap().push_back(Ok(rows));
    }

    pub fn push_error(&self, error: DriverError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Statements other than catalog lookups, in execution order
    /// Every statement waits this long before it is answered
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn catalog_reads(&self) -> usize {
        *self.catalog_reads.lock().unwrap()
    }

    fn answer(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        if let Some(rest) = sql.strip_prefix("SELECT * FROM SYS.TABLE_COLUMNS") {
            *self.catalog_reads.lock().unwrap() += 1;
            let table = rest
                .split("TABLE_NAME='")
                .nth(1)
                .and_then(|t| t.split('\'').next())
                .unwrap_or_default();
            return Ok(self
                .catalog
                .lock()
                .unwrap()
                .get(table)
                .cloned()
                .unwrap_or_default());
        }
        self.log.lock().unwrap().push(sql.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn as_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be an object, got {other}"),
    }
}

pub struct FakeConnection {
    db: Arc<FakeDb>,
    closed: Mutex<bool>,
}

#[async_trait::async_trait]
impl ISqlConnection for FakeConnection {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        if *self.closed.lock().unwrap() {
            return Err(DriverError::not_connected());
        }
        let latency = *self.db.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.db.answer(sql)
    }

    async fn close(&self) -> Result<(), DriverError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Connector whose connect outcomes are scripted; once the script runs out
/// every connect succeeds.
pub struct ScriptedConnector {
    pub db: Arc<FakeDb>,
    outcomes: Mutex<VecDeque<Option<DriverError>>>,
    attempts: Mutex<Vec<Instant>>,
}

impl ScriptedConnector {
    pub fn new(db: Arc<FakeDb>) -> Arc<Self> {
        Arc::new(Self {
            db,
            outcomes: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_next(&self, times: usize, kind: DriverErrorKind, message: &str) {
        let mut outcomes = self.outcomes.lock().unwrap();
        for _ in 0..times {
            outcomes.push_back(Some(DriverError::new(kind, message)));
        }
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl IConnector for ScriptedConnector {
    async fn connect(&self, _params: &ConnectionParams) -> Result<Arc<dyn ISqlConnection>, DriverError> {
        self.attempts.lock().unwrap().push(Instant::now());
        if let Some(Some(err)) = self.outcomes.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Arc::new(FakeConnection {
            db: Arc::clone(&self.db),
            closed: Mutex::new(false),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn test_config(schema: &str) -> Config {
    ConfigBuilder::new()
        .connection_driver("scripted")
        .connection_host("db.test")
        .connection_port(30015)
        .connection_schema(schema)
        .build()
}

/// Polls until `check` holds, yielding to the runtime between polls
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
