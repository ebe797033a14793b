//! Raw send: write a line to the device and show what it prints back

use super::console::relay_output;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use devctl_core::{CommandHandler, DeviceConnection, ExecContext};
use std::time::Duration;

/// Default time to keep relaying output after sending
pub const DEFAULT_WAIT_SECS: u64 = 2;

/// `send`: requires `--data` and a device
pub struct SendLine;

/// Bytes written for a `--data` value: the text plus a trailing newline
pub fn line(data: &str) -> Vec<u8> {
    let mut bytes = data.as_bytes().to_vec();
    if !data.ends_with('\n') {
        bytes.push(b'\n');
    }
    bytes
}

#[async_trait]
impl CommandHandler for SendLine {
    async fn execute(
        &self,
        ctx: &ExecContext,
        conn: Option<&mut dyn DeviceConnection>,
    ) -> Result<()> {
        let conn = conn.ok_or_else(|| anyhow!("no device connection"))?;
        let data = ctx.flags().get("data").unwrap_or_default();
        let wait = ctx
            .flags()
            .get_parsed::<u64>("wait")?
            .unwrap_or(DEFAULT_WAIT_SECS);

        conn.send(&line(data))
            .await
            .with_context(|| format!("Sending to {}", conn.describe()))?;

        let limit = Some(Duration::from_secs(wait));
        relay_output(ctx, conn, &mut tokio::io::stdout(), limit).await?;
        Ok(())
    }
}
