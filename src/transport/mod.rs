//! Device transports: serial ports and TCP, behind the broker's connector seam

pub mod connector;
pub mod serial;
pub mod stream;
pub mod tcp;

pub use connector::PortConnector;
