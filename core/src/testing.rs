//! Test doubles shared by the broker and dispatcher tests

use crate::broker::{ConnectionError, DeviceConnection, DeviceConnector};
use crate::context::{Cancellation, ExecContext};
use crate::flags::FlagSet;
use crate::registry::{CommandHandler, CommandRegistry};
use crate::relay::ConsoleRelay;
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn context(command: &'static str) -> (ExecContext, Cancellation) {
    let cancel = Cancellation::new();
    let ctx = ExecContext::new(
        command,
        Vec::new(),
        Arc::new(FlagSet::new()),
        Arc::new(CommandRegistry::default()),
        ConsoleRelay::new(),
        cancel.subscribe(),
    );
    (ctx, cancel)
}

/// How the fake device behaves when connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    Absent,
    Hangs,
    /// First attempt fails with an open error, later ones succeed
    FailsFirst,
}

pub struct FakeConnector {
    reachability: Reachability,
    fail_disconnect: bool,
    pub connect_calls: Arc<AtomicUsize>,
    pub disconnect_calls: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(reachability: Reachability) -> Arc<Self> {
        Arc::new(Self {
            reachability,
            fail_disconnect: false,
            connect_calls: Arc::new(AtomicUsize::new(0)),
            disconnect_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing_disconnect(self: Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            reachability: self.reachability,
            fail_disconnect: true,
            connect_calls: self.connect_calls.clone(),
            disconnect_calls: self.disconnect_calls.clone(),
        })
    }
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    async fn connect(
        &self,
        _ctx: &ExecContext,
    ) -> Result<Box<dyn DeviceConnection>, ConnectionError> {
        let call = self.connect_calls.fetch_add(1, Ordering::SeqCst);
        match self.reachability {
            Reachability::Absent => Err(ConnectionError::NoDevice),
            Reachability::Hangs => std::future::pending().await,
            Reachability::FailsFirst if call == 0 => Err(ConnectionError::Open {
                port: "fake0".into(),
                source: anyhow!("device busy"),
            }),
            _ => Ok(Box::new(FakeConnection {
                disconnect_calls: self.disconnect_calls.clone(),
                fail_disconnect: self.fail_disconnect,
                sent: Vec::new(),
            })),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeConnection {
    disconnect_calls: Arc<AtomicUsize>,
    fail_disconnect: bool,
    sent: Vec<u8>,
}

#[async_trait]
impl DeviceConnection for FakeConnection {
    fn describe(&self) -> &str {
        "fake0"
    }

    async fn send(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.sent.extend_from_slice(data);
        Ok(())
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            Err(anyhow!("port vanished"))
        } else {
            Ok(())
        }
    }
}

/// What a recording handler does once invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
    /// Wait for cancellation, then fail
    WaitForCancel,
}

/// Handler that counts invocations and records whether it got a connection
pub struct RecordingHandler {
    behavior: Behavior,
    pub calls: AtomicUsize,
    pub with_connection: AtomicUsize,
}

impl RecordingHandler {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            with_connection: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn with_connection(&self) -> usize {
        self.with_connection.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn execute(
        &self,
        ctx: &ExecContext,
        conn: Option<&mut dyn DeviceConnection>,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(conn) = conn {
            self.with_connection.fetch_add(1, Ordering::SeqCst);
            conn.send(b"ping\n").await?;
        }

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(anyhow!("device said no")),
            Behavior::Panic => panic!("handler blew up"),
            Behavior::WaitForCancel => {
                ctx.cancelled().await;
                Err(anyhow!("interrupted"))
            }
        }
    }
}
