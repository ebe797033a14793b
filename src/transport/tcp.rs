//! TCP transport for devices reachable over the network (`tcp://host:port`)

use anyhow::{Context, Result};
use tokio::net::TcpStream;

pub const TCP_SCHEME: &str = "tcp://";

/// Strip the scheme from a `tcp://` port spec
pub fn address(spec: &str) -> Option<&str> {
    spec.strip_prefix(TCP_SCHEME).filter(|a| !a.is_empty())
}

/// Open a TCP stream to the device
pub async fn open(address: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("TCP connect to {}", address))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_address_parsing() {
        assert_eq!(address("tcp://192.168.4.1:23"), Some("192.168.4.1:23"));
        assert_eq!(address("tcp://"), None);
        assert_eq!(address("/dev/ttyUSB0"), None);
    }

    #[tokio::test]
    async fn test_open_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (client, server) = tokio::join!(open(&addr), listener.accept());
        assert!(client.is_ok());
        assert!(server.is_ok());
    }

    #[tokio::test]
    async fn test_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = open(&addr).await.unwrap_err();
        assert!(err.to_string().contains(&addr));
    }
}
