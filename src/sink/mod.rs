//! Transports that rendered metric payloads are written to.
//!
//! A sink receives one payload per call: a single line, or several lines
//! packed by a [`Pipeline`](crate::Pipeline) and joined with `\n`.
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, StatsdError};

mod stream;
mod udp;

pub use stream::TcpMetricSink;
#[cfg(unix)]
pub use stream::UnixMetricSink;
pub use udp::UdpMetricSink;

/// Trait for the various backends that send metrics somewhere.
pub trait MetricSink {
    /// Send one payload, returning the number of bytes written.
    fn emit(&self, data: &str) -> io::Result<usize>;

    /// Largest payload the transport accepts in one write, if it is bounded.
    fn max_packet_size(&self) -> Option<usize> {
        None
    }
}

impl<T: MetricSink + ?Sized> MetricSink for Box<T> {
    fn emit(&self, data: &str) -> io::Result<usize> {
        (**self).emit(data)
    }

    fn max_packet_size(&self) -> Option<usize> {
        (**self).max_packet_size()
    }
}

/// A sink that discards every payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopMetricSink;

impl MetricSink for NopMetricSink {
    fn emit(&self, _data: &str) -> io::Result<usize> {
        Ok(0)
    }
}

/// A sink that keeps every payload in memory.
///
/// Clones share the same storage, so a test can hand one clone to a client
/// and read what was sent through the other.
#[derive(Clone, Debug, Default)]
pub struct BufferedSink {
    payloads: Arc<Mutex<Vec<String>>>,
    max_packet_size: Option<usize>,
}

impl BufferedSink {
    pub fn new() -> BufferedSink {
        BufferedSink::default()
    }

    /// Behave like a datagram transport limited to `size` bytes per packet.
    pub fn with_max_packet_size(mut self, size: usize) -> BufferedSink {
        self.max_packet_size = Some(size);
        self
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.payloads.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl MetricSink for BufferedSink {
    fn emit(&self, data: &str) -> io::Result<usize> {
        let mut payloads = self.payloads.lock().unwrap_or_else(PoisonError::into_inner);
        payloads.push(data.to_string());
        Ok(data.len())
    }

    fn max_packet_size(&self) -> Option<usize> {
        self.max_packet_size
    }
}

/// Resolve `host:port`, keeping only addresses of the requested family.
pub(crate) fn resolve(host: &str, port: u16, ipv6: bool) -> Result<SocketAddr> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| StatsdError::Resolve(format!("{host}:{port}"), e))?;
    addrs
        .find(|addr| addr.is_ipv6() == ipv6)
        .ok_or_else(|| StatsdError::NoAddress {
            host: host.to_string(),
            family: if ipv6 { "IPv6" } else { "IPv4" },
        })
}
