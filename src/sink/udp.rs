use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use log::debug;

use super::{resolve, MetricSink};
use crate::error::{Result, StatsdError};
use crate::DEFAULT_MAX_UDP_SIZE;

/// Datagram transport. Delivery is best effort.
#[derive(Debug)]
pub struct UdpMetricSink {
    addr: SocketAddr,
    socket: UdpSocket,
    max_udp_size: usize,
}

impl UdpMetricSink {
    /// Resolve `host` once and bind an ephemeral local socket of the same
    /// address family.
    pub fn new(host: &str, port: u16, ipv6: bool) -> Result<UdpMetricSink> {
        let addr = resolve(host, port, ipv6)?;
        UdpMetricSink::bind(addr)
    }

    /// Resolve `host`, e.g. `"127.0.0.1:8125"`, preferring an IPv4 address.
    ///
    /// An IPv6 address is only used when `host` resolves to nothing else,
    /// as with an IPv6 literal such as `"[::1]:8125"`.
    pub fn from_host<A: ToSocketAddrs>(host: A) -> Result<UdpMetricSink> {
        let addr = prefer_ipv4(host.to_socket_addrs()?)
            .ok_or_else(|| StatsdError::Io(io::Error::new(io::ErrorKind::NotFound, "no address")))?;
        UdpMetricSink::bind(addr)
    }

    /// Send through an existing socket.
    pub fn from_socket(addr: SocketAddr, socket: UdpSocket) -> UdpMetricSink {
        UdpMetricSink {
            addr,
            socket,
            max_udp_size: DEFAULT_MAX_UDP_SIZE,
        }
    }

    pub fn with_max_udp_size(mut self, size: usize) -> UdpMetricSink {
        self.max_udp_size = size;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn bind(addr: SocketAddr) -> Result<UdpMetricSink> {
        // Bind to a generic port as we'll only be writing on this socket.
        let local = if addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local)?;
        debug!("sending statsd datagrams to {addr}");
        Ok(UdpMetricSink::from_socket(addr, socket))
    }
}

fn prefer_ipv4<I: IntoIterator<Item = SocketAddr>>(addrs: I) -> Option<SocketAddr> {
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        fallback.get_or_insert(addr);
    }
    fallback
}

impl MetricSink for UdpMetricSink {
    fn emit(&self, data: &str) -> io::Result<usize> {
        self.socket.send_to(data.as_bytes(), self.addr)
    }

    fn max_packet_size(&self) -> Option<usize> {
        Some(self.max_udp_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_listener() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let sink = UdpMetricSink::new("127.0.0.1", port, false).unwrap();
        assert_eq!(Some(512), sink.max_packet_size());

        sink.emit("test.count:1|c").unwrap();
        let mut buf = [0u8; 64];
        let (len, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(b"test.count:1|c", &buf[..len]);
    }

    #[test]
    fn from_host_with_max_size() {
        let sink = UdpMetricSink::from_host("127.0.0.1:8125")
            .unwrap()
            .with_max_udp_size(1432);
        assert_eq!(Some(1432), sink.max_packet_size());
        assert_eq!(8125, sink.addr().port());
    }

    #[test]
    fn ipv4_preferred_over_ipv6() {
        let v6: SocketAddr = "[::1]:8125".parse().unwrap();
        let v4: SocketAddr = "127.0.0.1:8125".parse().unwrap();
        assert_eq!(Some(v4), prefer_ipv4(vec![v6, v4]));
        assert_eq!(Some(v6), prefer_ipv4(vec![v6]));
        assert_eq!(None, prefer_ipv4(Vec::new()));
    }

    #[test]
    fn from_host_name_uses_ipv4() {
        let sink = UdpMetricSink::from_host("localhost:8125").unwrap();
        assert!(sink.addr().is_ipv4());
    }
}
