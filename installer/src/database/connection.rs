// Database connection management
//
// DbConnector trait for deterministic testing of connection failure paths without a real
// database. The installer holds one lazily opened MySQL connection for the whole run.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use std::time::Duration;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::time::timeout;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::error::InstallError;
use crate::models::settings::DatabaseSettings;

// =============================================================================
// DbConnector Trait
// =============================================================================

/// Error returned by connection attempts.
/// Keeps user-friendly messages separate from internal details.
#[derive(Debug, Clone)]
pub struct ConnectError {
    /// User-friendly message (safe to show)
    pub user_message: String,
    /// Internal details for logging (may contain masked info)
    pub internal_details: String,
    /// Whether another attempt can help (network/timeouts yes, bad credentials no)
    pub retryable: bool,
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message)
    }
}

impl std::error::Error for ConnectError {}

impl From<ConnectError> for InstallError {
    fn from(e: ConnectError) -> Self {
        InstallError::ConnectionFailed {
            user_message: e.user_message,
            internal_details: e.internal_details,
        }
    }
}

fn timed_out(attempt: usize) -> ConnectError {
    ConnectError {
        user_message: "Connection timed out. Check network connectivity and firewall.".to_string(),
        internal_details: format!("Timeout on attempt {}", attempt),
        retryable: true,
    }
}

/// Trait for database connection attempts.
/// Production code uses MySqlConnector; tests use stubs.
#[async_trait]
pub trait DbConnector: Send + Sync {
    type Connection: Send;

    async fn connect(&self) -> Result<Self::Connection, ConnectError>;

    /// Get the timeout duration for a single connection attempt.
    fn timeout_duration(&self) -> Duration {
        Duration::from_secs(20)
    }

    /// Get the maximum number of attempts.
    fn max_retries(&self) -> usize {
        3
    }

    /// Base of the exponential backoff between attempts.
    fn retry_base_delay_ms(&self) -> u64 {
        100
    }
}

/// Production connector. Connects to the server without selecting a schema, since the
/// schema may not exist yet.
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    pub fn from_settings(db: &DatabaseSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .charset("utf8mb4");
        Self { options }
    }
}

#[async_trait]
impl DbConnector for MySqlConnector {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, ConnectError> {
        MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| {
                let retryable = !matches!(e, sqlx::Error::Database(_) | sqlx::Error::Configuration(_));
                let user_message = if retryable {
                    "Unable to reach the database server. Verify host, port, and network access."
                } else {
                    "Unable to connect. Verify database credentials and permissions."
                };
                ConnectError {
                    user_message: user_message.to_string(),
                    internal_details: format!("Connection error: {}", e),
                    retryable,
                }
            })
    }
}

/// Connect with a per-attempt timeout and bounded, jittered exponential backoff.
/// Non-retryable failures (e.g. access denied) end the loop immediately.
pub async fn connect_with_retry<C: DbConnector>(
    connector: &C,
) -> Result<C::Connection, ConnectError> {
    let retry_strategy = ExponentialBackoff::from_millis(connector.retry_base_delay_ms())
        .factor(2)
        .max_delay(Duration::from_secs(2))
        .take(connector.max_retries().saturating_sub(1))
        .map(jitter);

    let counter = std::sync::atomic::AtomicUsize::new(0);
    let attempts = &counter;
    let attempt = move || async move {
        let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        match timeout(connector.timeout_duration(), connector.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                log::warn!(
                    "[PHASE: connect] [STEP: attempt_{}] {} ({})",
                    n,
                    e.user_message,
                    e.internal_details
                );
                Err(e)
            }
            Err(_) => {
                log::warn!("[PHASE: connect] [STEP: attempt_{}] timed out", n);
                Err(timed_out(n))
            }
        }
    };

    RetryIf::start(retry_strategy, attempt, |e: &ConnectError| e.retryable).await
}

// =============================================================================
// Lazy connection
// =============================================================================

/// Opens the connection on first use and keeps it for the rest of the run.
pub struct LazyConnection<C: DbConnector> {
    connector: C,
    slot: Mutex<Option<C::Connection>>,
}

impl<C: DbConnector> LazyConnection<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            slot: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) -> Result<MappedMutexGuard<'_, C::Connection>, ConnectError> {
        let mut guard = self.slot.lock().await;
        if guard.is_none() {
            let conn = connect_with_retry(&self.connector).await?;
            log::info!("[PHASE: connect] Database connection established");
            *guard = Some(conn);
        }

        MutexGuard::try_map(guard, |slot| slot.as_mut()).map_err(|_| ConnectError {
            user_message: "Database connection is not available.".to_string(),
            internal_details: "connection slot empty after connect".to_string(),
            retryable: false,
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
