//! Instrumentation server on its default port.
//!
//! `frida-server` listens on 127.0.0.1:27042 unless told otherwise.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::probe::{Probe, Weight};
use crate::types::ProbeResult;

/// Probe label.
pub const LABEL: &str = "instrumentation_port";

/// Frida's default listening port.
const FRIDA_DEFAULT_PORT: u16 = 27042;

/// Loopback connects either succeed or get refused almost immediately.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(200);

/// Connects to a local instrumentation port.
#[derive(Debug, Clone)]
pub struct InstrumentationPortProbe {
    addr: SocketAddr,
}

impl InstrumentationPortProbe {
    /// Probe a specific address.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl Default for InstrumentationPortProbe {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, FRIDA_DEFAULT_PORT)))
    }
}

impl Probe for InstrumentationPortProbe {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn run(&self) -> ProbeResult {
        match TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT) {
            Ok(_) => ProbeResult::tampered(LABEL, format!("listener on {}", self.addr)),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => ProbeResult::clean(LABEL),
            Err(e) => ProbeResult::inconclusive(LABEL, e.to_string()),
        }
    }

    fn weight(&self) -> Weight {
        Weight::Moderate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeStatus;
    use std::net::TcpListener;

    #[test]
    fn test_listening_port_is_tampered() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let probe = InstrumentationPortProbe::new(listener.local_addr().unwrap());
        assert_eq!(probe.run().status, ProbeStatus::Tampered);
    }

    #[test]
    fn test_closed_port_is_not_tampered() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let probe = InstrumentationPortProbe::new(addr);
        assert_ne!(probe.run().status, ProbeStatus::Tampered);
    }
}
