use std::io::{self, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;

use super::{resolve, MetricSink};

/// A connection opened on first use.
///
/// A failed write drops the connection so the next payload reconnects.
#[derive(Debug)]
struct LazyStream<S> {
    stream: Mutex<Option<S>>,
}

impl<S: Write> LazyStream<S> {
    fn new() -> Self {
        LazyStream {
            stream: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<S>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send<F>(&self, data: &str, connect: F) -> io::Result<usize>
    where
        F: FnOnce() -> io::Result<S>,
    {
        let mut guard = self.lock();
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => connect()?,
        };

        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.extend_from_slice(data.as_bytes());
        payload.push(b'\n');

        stream.write_all(&payload)?;
        *guard = Some(stream);
        Ok(payload.len())
    }

    fn set(&self, stream: Option<S>) {
        *self.lock() = stream;
    }

    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }
}

/// Stream transport over TCP. Every payload is terminated by `\n`.
#[derive(Debug)]
pub struct TcpMetricSink {
    host: String,
    port: u16,
    ipv6: bool,
    timeout: Option<Duration>,
    conn: LazyStream<TcpStream>,
}

impl TcpMetricSink {
    /// The connection is only opened by the first emit or by [`connect`](Self::connect).
    pub fn new(host: &str, port: u16, ipv6: bool) -> TcpMetricSink {
        TcpMetricSink {
            host: host.to_string(),
            port,
            ipv6,
            timeout: None,
            conn: LazyStream::new(),
        }
    }

    /// Applies to connecting and to every write.
    pub fn with_timeout(mut self, timeout: Duration) -> TcpMetricSink {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect(&self) -> io::Result<()> {
        let stream = self.open()?;
        self.conn.set(Some(stream));
        Ok(())
    }

    pub fn close(&self) {
        self.conn.set(None);
    }

    pub fn reconnect(&self) -> io::Result<()> {
        self.close();
        self.connect()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    fn open(&self) -> io::Result<TcpStream> {
        let addr = resolve(&self.host, self.port, self.ipv6)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?;
        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_write_timeout(self.timeout)?;
        debug!("connected to statsd at tcp://{addr}");
        Ok(stream)
    }
}

impl MetricSink for TcpMetricSink {
    fn emit(&self, data: &str) -> io::Result<usize> {
        self.conn.send(data, || self.open())
    }
}

/// Stream transport over a Unix domain socket.
#[cfg(unix)]
#[derive(Debug)]
pub struct UnixMetricSink {
    path: PathBuf,
    timeout: Option<Duration>,
    conn: LazyStream<UnixStream>,
}

#[cfg(unix)]
impl UnixMetricSink {
    pub fn new<P: AsRef<Path>>(path: P) -> UnixMetricSink {
        UnixMetricSink {
            path: path.as_ref().to_path_buf(),
            timeout: None,
            conn: LazyStream::new(),
        }
    }

    /// Applies to every write.
    pub fn with_timeout(mut self, timeout: Duration) -> UnixMetricSink {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect(&self) -> io::Result<()> {
        let stream = self.open()?;
        self.conn.set(Some(stream));
        Ok(())
    }

    pub fn close(&self) {
        self.conn.set(None);
    }

    pub fn reconnect(&self) -> io::Result<()> {
        self.close();
        self.connect()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    fn open(&self) -> io::Result<UnixStream> {
        let stream = UnixStream::connect(&self.path)?;
        stream.set_write_timeout(self.timeout)?;
        debug!("connected to statsd at {}", self.path.display());
        Ok(stream)
    }
}

#[cfg(unix)]
impl MetricSink for UnixMetricSink {
    fn emit(&self, data: &str) -> io::Result<usize> {
        self.conn.send(data, || self.open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    #[test]
    fn tcp_connects_lazily() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let sink = TcpMetricSink::new("127.0.0.1", port, false);
        assert!(!sink.is_connected());
        assert_eq!(None, sink.max_packet_size());

        assert_eq!(6, sink.emit("a:1|c").unwrap());
        assert!(sink.is_connected());

        let (conn, _) = listener.accept().unwrap();
        let mut line = String::new();
        BufReader::new(conn).read_line(&mut line).unwrap();
        assert_eq!("a:1|c\n", line);
    }

    #[test]
    fn tcp_close_and_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let sink = TcpMetricSink::new("127.0.0.1", port, false).with_timeout(Duration::from_secs(1));
        sink.connect().unwrap();
        assert!(sink.is_connected());
        sink.close();
        assert!(!sink.is_connected());
        sink.reconnect().unwrap();
        assert!(sink.is_connected());
    }

    #[test]
    fn tcp_connect_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let sink = TcpMetricSink::new("127.0.0.1", port, false);
        assert!(sink.emit("a:1|c").is_err());
        assert!(!sink.is_connected());
    }

    #[test]
    fn tcp_failed_write_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let sink = TcpMetricSink::new("127.0.0.1", port, false).with_timeout(Duration::from_secs(5));
        sink.emit("a:1|c").unwrap();

        let (conn, _) = listener.accept().unwrap();
        drop(conn);

        // the first write after the peer closes may still be buffered
        let mut failed = false;
        for _ in 0..50 {
            if sink.emit("a:1|c").is_err() {
                failed = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(failed);
        assert!(!sink.is_connected());

        sink.emit("b:1|c").unwrap();
        assert!(sink.is_connected());
        let (conn, _) = listener.accept().unwrap();
        conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut line = String::new();
        BufReader::new(conn).read_line(&mut line).unwrap();
        assert_eq!("b:1|c\n", line);
    }

    #[cfg(unix)]
    #[test]
    fn unix_stream_writes_lines() {
        use std::os::unix::net::UnixListener;

        let path = std::env::temp_dir().join(format!("statsd-tags-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let sink = UnixMetricSink::new(&path);
        sink.emit("u:1|s").unwrap();
        sink.emit("u:2|s").unwrap();
        sink.close();

        let (conn, _) = listener.accept().unwrap();
        let lines: Vec<String> = BufReader::new(conn).lines().map(|l| l.unwrap()).collect();
        assert_eq!(vec!["u:1|s", "u:2|s"], lines);
        let _ = std::fs::remove_file(&path);
    }
}
