//! Connector that opens the device named by the `--port` flag

use super::stream::StreamConnection;
use super::{serial, tcp};
use async_trait::async_trait;
use devctl_core::{ConnectionError, DeviceConnection, DeviceConnector, ExecContext};
use tracing::debug;

/// What a `--port` value refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    /// First USB serial adapter found
    Auto,
    /// `tcp://host:port`
    Tcp(String),
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`
    Serial(String),
}

impl PortSpec {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
            PortSpec::Auto
        } else if let Some(addr) = tcp::address(raw) {
            PortSpec::Tcp(addr.to_string())
        } else {
            PortSpec::Serial(raw.to_string())
        }
    }
}

/// Opens serial or TCP devices from the invocation's flags
#[derive(Debug, Default)]
pub struct PortConnector;

impl PortConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeviceConnector for PortConnector {
    async fn connect(
        &self,
        ctx: &ExecContext,
    ) -> Result<Box<dyn DeviceConnection>, ConnectionError> {
        let raw = ctx.flags().get("port").unwrap_or("auto");
        let relay = ctx.relay().clone();

        match PortSpec::parse(raw) {
            PortSpec::Tcp(addr) => {
                let stream = tcp::open(&addr).await.map_err(|source| ConnectionError::Open {
                    port: format!("{}{}", tcp::TCP_SCHEME, addr),
                    source,
                })?;
                Ok(Box::new(StreamConnection::spawn(
                    format!("{}{}", tcp::TCP_SCHEME, addr),
                    stream,
                    relay,
                )))
            }
            spec => {
                let baud = ctx
                    .flags()
                    .get_parsed::<u32>("baud")
                    .map_err(|source| ConnectionError::Open {
                        port: raw.to_string(),
                        source,
                    })?
                    .unwrap_or(serial::DEFAULT_BAUD);

                let path = match spec {
                    PortSpec::Serial(path) => path,
                    _ => {
                        let ports = serial::list_ports().map_err(|source| ConnectionError::Open {
                            port: raw.to_string(),
                            source,
                        })?;
                        let port = serial::auto_port(&ports).ok_or(ConnectionError::NoDevice)?;
                        debug!("Auto-selected serial port {}", port.name);
                        port.name.clone()
                    }
                };

                let stream = serial::open(&path, baud).map_err(|source| ConnectionError::Open {
                    port: path.clone(),
                    source,
                })?;
                Ok(Box::new(StreamConnection::spawn(path, stream, relay)))
            }
        }
    }

    fn name(&self) -> &'static str {
        "port"
    }
}
