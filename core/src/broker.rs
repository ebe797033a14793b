//! Connection broker - conditional acquisition and release of the device connection

use crate::context::ExecContext;
use crate::limits;
use crate::registry::ConnectionRequirement;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// An open channel to one device
#[async_trait]
pub trait DeviceConnection: Send {
    /// Human-readable description (port name, address)
    fn describe(&self) -> &str;

    /// Write raw bytes to the device
    async fn send(&mut self, data: &[u8]) -> anyhow::Result<()>;

    /// Close the connection. Called exactly once by the broker.
    async fn disconnect(&mut self) -> anyhow::Result<()>;

    /// Resolves once the device side has gone away
    ///
    /// Connections that cannot observe this never resolve.
    async fn closed(&mut self) {
        std::future::pending::<()>().await
    }
}

/// Factory for device connections
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Attempt to open a connection using the invocation's flags
    async fn connect(
        &self,
        ctx: &ExecContext,
    ) -> Result<Box<dyn DeviceConnection>, ConnectionError>;

    /// Human-readable name for this connector
    fn name(&self) -> &'static str;
}

/// Errors that can occur while acquiring a device connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("No device found")]
    NoDevice,

    #[error("Failed to open {port}")]
    Open {
        port: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Timed out after {0:?} waiting for device")]
    Timeout(Duration),

    #[error("Connection attempt cancelled")]
    Cancelled,
}

/// Decides whether a command gets a connection and owns the acquisition policy
pub struct ConnectionBroker {
    connector: Arc<dyn DeviceConnector>,
    connect_timeout: Duration,
    attempts: u32,
    retry_delay: Duration,
}

impl ConnectionBroker {
    /// Create a broker with the default acquisition policy
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            connect_timeout: limits::CONNECT_TIMEOUT,
            attempts: limits::CONNECT_ATTEMPTS,
            retry_delay: limits::CONNECT_RETRY_DELAY,
        }
    }

    /// Override the acquisition policy
    pub fn with_policy(
        mut self,
        connect_timeout: Duration,
        attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        self.connect_timeout = connect_timeout;
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Acquire a connection according to `requirement`
    ///
    /// Only `Required` surfaces an error; `Optional` degrades to `None`.
    pub async fn acquire_if_needed(
        &self,
        requirement: ConnectionRequirement,
        ctx: &ExecContext,
    ) -> Result<Option<Box<dyn DeviceConnection>>, ConnectionError> {
        match requirement {
            ConnectionRequirement::NotNeeded => {
                debug!("{}: no device connection needed", ctx.command());
                Ok(None)
            }
            ConnectionRequirement::Required => self.acquire(ctx).await.map(Some),
            ConnectionRequirement::Optional => match self.acquire(ctx).await {
                Ok(conn) => Ok(Some(conn)),
                Err(e) => {
                    info!("{}: continuing without device: {}", ctx.command(), e);
                    Ok(None)
                }
            },
        }
    }

    async fn acquire(
        &self,
        ctx: &ExecContext,
    ) -> Result<Box<dyn DeviceConnection>, ConnectionError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Connecting via {} (attempt {}/{})",
                self.connector.name(),
                attempt,
                self.attempts
            );

            let result = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(ConnectionError::Cancelled),
                result = timeout(self.connect_timeout, self.connector.connect(ctx)) => {
                    result.unwrap_or(Err(ConnectionError::Timeout(self.connect_timeout)))
                }
            };

            match result {
                Ok(conn) => {
                    info!("Connected to {} via {}", conn.describe(), self.connector.name());
                    return Ok(conn);
                }
                // Nothing to retry against
                Err(e @ (ConnectionError::NoDevice | ConnectionError::Cancelled)) => return Err(e),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    tokio::select! {
                        biased;
                        _ = ctx.cancelled() => return Err(ConnectionError::Cancelled),
                        _ = sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }

    /// Close an acquired connection
    ///
    /// Failures are logged, never returned, so they cannot mask the
    /// handler's own result.
    pub async fn release(&self, mut conn: Box<dyn DeviceConnection>) {
        let name = conn.describe().to_string();
        match conn.disconnect().await {
            Ok(()) => debug!("Disconnected from {}", name),
            Err(e) => warn!("Failed to disconnect from {}: {:#}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, FakeConnector, Reachability};
    use std::sync::atomic::Ordering;

    fn broker(connector: &Arc<FakeConnector>) -> ConnectionBroker {
        ConnectionBroker::new(connector.clone())
    }

    #[tokio::test]
    async fn test_not_needed_never_connects() {
        let connector = FakeConnector::new(Reachability::Reachable);
        let (ctx, _cancel) = context("help");

        let conn = broker(&connector)
            .acquire_if_needed(ConnectionRequirement::NotNeeded, &ctx)
            .await
            .unwrap();

        assert!(conn.is_none());
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_required_without_device_fails() {
        let connector = FakeConnector::new(Reachability::Absent);
        let (ctx, _cancel) = context("ls");

        let result = broker(&connector)
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await;

        assert!(matches!(result, Err(ConnectionError::NoDevice)));
        // NoDevice is not retried
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_optional_without_device_degrades() {
        let connector = FakeConnector::new(Reachability::Absent);
        let (ctx, _cancel) = context("console");

        let conn = broker(&connector)
            .acquire_if_needed(ConnectionRequirement::Optional, &ctx)
            .await
            .unwrap();

        assert!(conn.is_none());
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_disconnects_once() {
        let connector = FakeConnector::new(Reachability::Reachable);
        let (ctx, _cancel) = context("ls");
        let broker = broker(&connector);

        let conn = broker
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await
            .unwrap()
            .expect("connection");
        assert_eq!(conn.describe(), "fake0");

        broker.release(conn).await;
        assert_eq!(connector.disconnect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_failure_is_swallowed() {
        let connector = FakeConnector::new(Reachability::Reachable).failing_disconnect();
        let (ctx, _cancel) = context("ls");
        let broker = broker(&connector);

        let conn = broker
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await
            .unwrap()
            .unwrap();

        broker.release(conn).await;
        assert_eq!(connector.disconnect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_device_times_out_after_fixed_policy() {
        let connector = FakeConnector::new(Reachability::Hangs);
        let (ctx, _cancel) = context("ls");
        let broker = broker(&connector);
        assert_eq!(broker.connect_timeout(), Duration::from_secs(5));
        assert_eq!(broker.attempts(), 2);

        let started = tokio::time::Instant::now();
        let result = broker
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await;

        assert!(matches!(result, Err(ConnectionError::Timeout(d)) if d == Duration::from_secs(5)));
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 2);
        // two 5s attempts plus one 1s pause
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(11) && elapsed < Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_error_is_retried() {
        let connector = FakeConnector::new(Reachability::FailsFirst);
        let (ctx, _cancel) = context("ls");

        let conn = broker(&connector)
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await
            .unwrap();

        assert!(conn.is_some());
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_delay_stops_acquisition() {
        let connector = FakeConnector::new(Reachability::FailsFirst);
        let (ctx, cancel) = context("send");
        let broker = broker(&connector).with_policy(
            Duration::from_secs(5),
            2,
            Duration::from_secs(30),
        );
        assert_eq!(broker.attempts(), 2);

        let started = tokio::time::Instant::now();
        let acquire = broker.acquire_if_needed(ConnectionRequirement::Required, &ctx);
        let interrupt = async {
            sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(acquire, interrupt);

        assert!(matches!(result, Err(ConnectionError::Cancelled)));
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_ready_connection() {
        let connector = FakeConnector::new(Reachability::Reachable);
        let (ctx, cancel) = context("send");
        cancel.cancel();

        let result = broker(&connector)
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await;

        assert!(matches!(result, Err(ConnectionError::Cancelled)));
        assert_eq!(connector.connect_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_with_policy_keeps_at_least_one_attempt() {
        let connector = FakeConnector::new(Reachability::Reachable);
        let broker = broker(&connector).with_policy(Duration::from_secs(1), 0, Duration::ZERO);
        assert_eq!(broker.attempts(), 1);
        assert_eq!(broker.connect_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_open_error_message_leaves_cause_to_source() {
        use std::error::Error as _;

        let err = ConnectionError::Open {
            port: "/dev/ttyUSB0".into(),
            source: anyhow::anyhow!("permission denied"),
        };
        assert_eq!(err.to_string(), "Failed to open /dev/ttyUSB0");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("permission denied".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancel_aborts_acquisition() {
        let connector = FakeConnector::new(Reachability::Hangs);
        let (ctx, cancel) = context("ls");
        cancel.cancel();

        let result = broker(&connector)
            .acquire_if_needed(ConnectionRequirement::Required, &ctx)
            .await;

        assert!(matches!(result, Err(ConnectionError::Cancelled)));
    }
}
