//! Connection lifecycle
//!
//! [`ConnectionManager`] owns the single logical connection of a store. It
//! connects on demand, classifies driver failures, and recovers from lost
//! connections with a background reconnect task.
//!
//! ## States
//!
//! ```text
//! Disconnected ──configure──▶ Connecting ──ok──▶ Connected
//!      ▲                          │                  │
//!      │ fatal                    │ transient        │ transient error
//!      └──────────────────────────┤                  ▼
//!                                 └────────────▶ Reconnecting ──ok──▶ Connected
//! ```
//!
//! Only one reconnect task runs at a time: neither `configure` nor a new
//! reconnect task starts while the manager is `Connecting` or `Reconnecting`,
//! and only the caller that actually drops a lost connection starts one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use relstore_core::config::ReconnectConfig;
use relstore_core::domain::StoreError;
use relstore_core::ports::{ConnectionParams, DriverError, DriverErrorKind, IConnector, ISqlConnection, Row};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metadata::CatalogSource;

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff: starts at `min`, doubles per call, capped at `max`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Returns the wait before the next attempt and advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Back to the minimum wait
    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// The wait the next call to [`Backoff::next_delay`] will return
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl From<&ReconnectConfig> for Backoff {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(config.min_wait(), config.max_wait())
    }
}

// ============================================================================
// Failure classification
// ============================================================================

/// Messages some drivers use for connection loss without a typed kind
const TRANSIENT_MESSAGES: &[&str] = &["econnrefused", "notconnected", "no open connections"];

/// Returns true if the error means the connection is gone, as opposed to a
/// statement the database rejected.
pub fn is_transient(err: &DriverError) -> bool {
    if err.kind != DriverErrorKind::Other {
        return true;
    }
    let message = err.message.to_lowercase();
    TRANSIENT_MESSAGES.iter().any(|m| message.contains(m))
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

struct Shared {
    connector: Arc<dyn IConnector>,
    params: ConnectionParams,
    state: Mutex<ConnectionState>,
    connection: RwLock<Option<Arc<dyn ISqlConnection>>>,
    backoff: Mutex<Backoff>,
    shutdown: CancellationToken,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    /// False after a fatal configure failure; reconnecting would not help
    recoverable: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    fn connection(&self) -> Option<Arc<dyn ISqlConnection>> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, connection: Arc<dyn ISqlConnection>) {
        *self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(connection);
        lock(&self.backoff).reset();
        self.set_state(ConnectionState::Connected);
    }

    /// Drops `lost` and moves to `Disconnected` if it is still the current
    /// connection. Returns false when another caller got there first.
    fn forget(&self, lost: &Arc<dyn ISqlConnection>) -> bool {
        let mut current = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let same = current
            .as_ref()
            .map(|c| Arc::as_ptr(c) as *const () == Arc::as_ptr(lost) as *const ())
            .unwrap_or(false);
        if same {
            *current = None;
            self.set_state(ConnectionState::Disconnected);
        }
        same
    }

    fn take_connection(&self) -> Option<Arc<dyn ISqlConnection>> {
        self.connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Owns the store's connection and its reconnect policy
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.shared.connector.name())
            .field("state", &self.shared.state())
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn IConnector>,
        params: ConnectionParams,
        reconnect: &ReconnectConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                params,
                state: Mutex::new(ConnectionState::Disconnected),
                connection: RwLock::new(None),
                backoff: Mutex::new(Backoff::from(reconnect)),
                shutdown: CancellationToken::new(),
                reconnect_task: Mutex::new(None),
                recoverable: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connection().is_some()
    }

    /// Current raw connection, if any
    pub fn connection(&self) -> Option<Arc<dyn ISqlConnection>> {
        self.shared.connection()
    }

    pub fn connector(&self) -> &dyn IConnector {
        self.shared.connector.as_ref()
    }

    pub fn schema(&self) -> &str {
        &self.shared.params.schema
    }

    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// - `Connection` when the failure is transient; a reconnect task is
    ///   started in the background.
    /// - `Configuration` for any other failure. No retry happens.
    /// - `Connection` without a connect attempt while another connect or the
    ///   reconnect task is in progress.
    pub async fn configure(&self) -> Result<(), StoreError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(StoreError::Connection("store is closed".into()));
        }

        {
            let mut state = lock(&self.shared.state);
            if matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Reconnecting
            ) {
                return Err(StoreError::Connection(format!(
                    "connect already in progress ({:?})",
                    *state
                )));
            }
            *state = ConnectionState::Connecting;
        }
        info!(
            driver = self.shared.connector.name(),
            host = %self.shared.params.host,
            schema = %self.shared.params.schema,
            "Connecting to database"
        );

        match self.shared.connector.connect(&self.shared.params).await {
            Ok(connection) => {
                self.shared.install(connection);
                self.shared.recoverable.store(true, Ordering::SeqCst);
                info!(driver = self.shared.connector.name(), "Database connection established");
                Ok(())
            }
            Err(err) if is_transient(&err) => {
                warn!(error = %err, "Database unreachable, reconnecting in background");
                self.shared.recoverable.store(true, Ordering::SeqCst);
                self.shared.set_state(ConnectionState::Disconnected);
                self.start_reconnect();
                Err(StoreError::Connection(err.message))
            }
            Err(err) => {
                self.shared.recoverable.store(false, Ordering::SeqCst);
                self.shared.set_state(ConnectionState::Disconnected);
                Err(StoreError::Configuration(err.message))
            }
        }
    }

    /// Runs one statement on the current connection.
    ///
    /// # Errors
    ///
    /// - `Connection` while disconnected, or when the driver reports that the
    ///   connection was lost. Either way a reconnect task is running
    ///   afterwards, unless the last configure failed fatally.
    /// - `Query` for any other driver failure.
    pub async fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        let Some(connection) = self.shared.connection() else {
            if self.shared.recoverable.load(Ordering::SeqCst) {
                self.start_reconnect();
            }
            return Err(StoreError::Connection(format!(
                "not connected ({:?})",
                self.state()
            )));
        };

        match connection.execute(sql).await {
            Ok(rows) => Ok(rows),
            Err(err) if is_transient(&err) => {
                if self.shared.forget(&connection) {
                    warn!(error = %err, "Database connection lost");
                    self.start_reconnect();
                }
                Err(StoreError::Connection(err.message))
            }
            Err(err) => Err(StoreError::Query(err.message)),
        }
    }

    /// Starts the background reconnect task unless one is already running
    /// or a connect is in progress. Returns whether a task was started.
    pub fn start_reconnect(&self) -> bool {
        {
            let mut state = lock(&self.shared.state);
            if matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Reconnecting
            ) || self.shared.shutdown.is_cancelled()
            {
                return false;
            }
            *state = ConnectionState::Reconnecting;
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(reconnect_loop(shared));
        *lock(&self.shared.reconnect_task) = Some(handle);
        true
    }

    /// The wait that precedes the next reconnect attempt
    pub fn current_wait(&self) -> Duration {
        lock(&self.shared.backoff).current()
    }

    /// Stops the reconnect task and closes the connection
    pub async fn close(&self) -> Result<(), StoreError> {
        self.shared.shutdown.cancel();
        let task = lock(&self.shared.reconnect_task).take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let connection = self.shared.take_connection();
        self.shared.set_state(ConnectionState::Disconnected);
        if let Some(connection) = connection {
            connection
                .close()
                .await
                .map_err(|e| StoreError::Connection(e.message))?;
            info!("Database connection closed");
        }
        Ok(())
    }
}

/// Waits, then tries to connect, until a connection is installed or the
/// manager shuts down. The wait doubles after every failed attempt.
async fn reconnect_loop(shared: Arc<Shared>) {
    loop {
        let wait = lock(&shared.backoff).next_delay();
        debug!(wait_ms = wait.as_millis() as u64, "Waiting before database reconnect");
        tokio::select! {
            _ = shared.shutdown.cancelled() => {
                debug!("Reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let attempt = tokio::select! {
            _ = shared.shutdown.cancelled() => return,
            attempt = shared.connector.connect(&shared.params) => attempt,
        };
        match attempt {
            Ok(connection) => {
                shared.install(connection);
                info!(driver = shared.connector.name(), "Database reconnected");
                return;
            }
            Err(err) => {
                debug!(error = %err, "Database reconnect failed");
            }
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for ConnectionManager {
    async fn fetch_columns(&self, schema: &str, table: &str) -> Result<Vec<Row>, StoreError> {
        let sql = self.shared.connector.catalog_query(schema, table);
        debug!(schema, table, sql = %sql, "Reading table metadata");
        self.execute(&sql).await
    }
}
