//! Console display: prints device output relayed from the connection

use anyhow::Result;
use async_trait::async_trait;
use devctl_core::{CommandHandler, DeviceConnection, ExecContext};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Copy relayed chunks to `out` until cancelled, the device hangs up, or
/// `limit` elapses
///
/// Returns the number of bytes written.
pub async fn relay_output<W>(
    ctx: &ExecContext,
    conn: &mut dyn DeviceConnection,
    out: &mut W,
    limit: Option<Duration>,
) -> Result<usize>
where
    W: AsyncWrite + Unpin + Send,
{
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut written = 0;
    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!("{}: interrupted", ctx.command());
                break;
            }
            Some(chunk) = ctx.relay().recv() => {
                out.write_all(&chunk).await?;
                written += chunk.len();
            }
            _ = conn.closed() => {
                debug!("{}: {} hung up", ctx.command(), conn.describe());
                break;
            }
            _ = &mut deadline => break,
        }
        out.flush().await?;
    }

    // Whatever the reader queued before the loop ended
    while let Some(chunk) = ctx.relay().drain() {
        out.write_all(&chunk).await?;
        written += chunk.len();
    }
    out.flush().await?;

    let dropped = ctx.relay().dropped();
    if dropped > 0 {
        debug!("{} console chunks were dropped", dropped);
    }
    Ok(written)
}

/// `console`: show device output until Ctrl-C
pub struct Console;

#[async_trait]
impl CommandHandler for Console {
    async fn execute(
        &self,
        ctx: &ExecContext,
        conn: Option<&mut dyn DeviceConnection>,
    ) -> Result<()> {
        let Some(conn) = conn else {
            println!("No device connected, nothing to show");
            return Ok(());
        };

        eprintln!("Connected to {}. Press Ctrl-C to exit.", conn.describe());
        relay_output(ctx, conn, &mut tokio::io::stdout(), None).await?;
        Ok(())
    }
}

/// Default mode: interactive console when a device is present, overview otherwise
pub struct Interactive;

#[async_trait]
impl CommandHandler for Interactive {
    async fn execute(
        &self,
        ctx: &ExecContext,
        conn: Option<&mut dyn DeviceConnection>,
    ) -> Result<()> {
        match conn {
            Some(conn) => {
                eprintln!(
                    "Interactive console on {}. Press Ctrl-C to exit.",
                    conn.describe()
                );
                relay_output(ctx, conn, &mut tokio::io::stdout(), None).await?;
            }
            None => {
                println!("No device detected.\n");
                print!("{}", ctx.registry().usage(super::PROGRAM, false));
            }
        }
        Ok(())
    }
}
