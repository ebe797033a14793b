//! Serial port listing

use crate::transport::serial;
use anyhow::Result;
use async_trait::async_trait;
use devctl_core::{CommandHandler, DeviceConnection, ExecContext};

/// `ports`: show serial ports, USB adapters first
pub struct Ports;

#[async_trait]
impl CommandHandler for Ports {
    async fn execute(
        &self,
        _ctx: &ExecContext,
        _conn: Option<&mut dyn DeviceConnection>,
    ) -> Result<()> {
        let ports = serial::list_ports()?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            match port.description {
                Some(desc) => println!("{} ({})", port.name, desc),
                None => println!("{}", port.name),
            }
        }
        Ok(())
    }
}
