//! Device connection over any byte stream
//!
//! The stream is split: the write half stays with the connection for
//! handlers, the read half is drained by a background task that offers
//! everything the device prints to the console relay.

use anyhow::{Context, Result};
use async_trait::async_trait;
use devctl_core::{ConsoleRelay, DeviceConnection};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_BUF_SIZE: usize = 4096;

pub struct StreamConnection<S> {
    name: String,
    writer: WriteHalf<S>,
    reader: JoinHandle<()>,
    /// Flips to `true` when the read loop exits
    reader_done: watch::Receiver<bool>,
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Take ownership of an open stream and start relaying its output
    pub fn spawn(name: impl Into<String>, stream: S, relay: ConsoleRelay) -> Self {
        let name = name.into();
        let (reader, writer) = tokio::io::split(stream);
        let (done_tx, reader_done) = watch::channel(false);
        let reader = tokio::spawn(read_loop(name.clone(), reader, relay, done_tx));
        Self {
            name,
            writer,
            reader,
            reader_done,
        }
    }
}

async fn read_loop<R>(
    name: String,
    mut reader: R,
    relay: ConsoleRelay,
    done: watch::Sender<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("{}: device closed the stream", name);
                break;
            }
            Ok(n) => {
                relay.offer(&buf[..n]);
            }
            Err(e) => {
                warn!("{}: read error: {}", name, e);
                break;
            }
        }
    }
    done.send_replace(true);
}

#[async_trait]
impl<S> DeviceConnection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn describe(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .await
            .with_context(|| format!("Failed to write to {}", self.name))?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.reader.abort();
        self.writer
            .shutdown()
            .await
            .with_context(|| format!("Failed to close {}", self.name))
    }

    async fn closed(&mut self) {
        // An aborted reader drops the sender, which also ends the wait
        let _ = self.reader_done.wait_for(|&done| done).await;
    }
}

impl<S> Drop for StreamConnection<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
