use std::collections::BTreeMap;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[cfg(unix)]
use crate::sink::UnixMetricSink;
use crate::sink::{TcpMetricSink, UdpMetricSink};
use crate::{Client, Result, DEFAULT_MAX_UDP_SIZE, DEFAULT_PORT};

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_udp_size() -> usize {
    DEFAULT_MAX_UDP_SIZE
}

/// Where a configured client sends its metrics.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatsdBackend {
    Udp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        ipv6: bool,
        #[serde(default = "default_max_udp_size")]
        max_udp_size: usize,
    },
    Tcp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        ipv6: bool,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    #[cfg(unix)]
    Unix {
        path: PathBuf,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl Default for StatsdBackend {
    fn default() -> Self {
        StatsdBackend::Udp {
            host: default_host(),
            port: DEFAULT_PORT,
            ipv6: false,
            max_udp_size: DEFAULT_MAX_UDP_SIZE,
        }
    }
}

/// Deserializable client settings.
///
/// ```ignore
/// let config: ClientConfig = serde_json::from_str(r#"{
///     "prefix": "myapp",
///     "tags": ["canary"],
///     "kv_tags": {"region": "eu"},
///     "backend": {"type": "tcp", "host": "stats.internal", "timeout_ms": 500}
/// }"#)?;
/// let client = config.build()?;
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub prefix: Option<String>,
    pub tags: Vec<String>,
    pub kv_tags: BTreeMap<String, String>,
    pub backend: StatsdBackend,
}

impl ClientConfig {
    pub fn build(&self) -> Result<Client> {
        let mut builder = match &self.backend {
            StatsdBackend::Udp {
                host,
                port,
                ipv6,
                max_udp_size,
            } => {
                let sink = UdpMetricSink::new(host, *port, *ipv6)?.with_max_udp_size(*max_udp_size);
                Client::builder(sink)
            }
            StatsdBackend::Tcp {
                host,
                port,
                ipv6,
                timeout_ms,
            } => {
                let mut sink = TcpMetricSink::new(host, *port, *ipv6);
                if let Some(ms) = timeout_ms {
                    sink = sink.with_timeout(Duration::from_millis(*ms));
                }
                Client::builder(sink)
            }
            #[cfg(unix)]
            StatsdBackend::Unix { path, timeout_ms } => {
                let mut sink = UnixMetricSink::new(path);
                if let Some(ms) = timeout_ms {
                    sink = sink.with_timeout(Duration::from_millis(*ms));
                }
                Client::builder(sink)
            }
        };

        if let Some(prefix) = &self.prefix {
            builder = builder.with_prefix(prefix.as_str());
        }
        for value in self.tags.iter() {
            builder = builder.with_tag_value(value.as_str());
        }
        for (k, v) in self.kv_tags.iter() {
            builder = builder.with_tag(k.as_str(), v.as_str());
        }
        Ok(builder.build())
    }
}
