/*!
A statsd client for Rust with support for tag-style metrics.

The statsd protocol consists of plain-text messages sent over UDP (or a
stream socket), containing not much more than a key and (possibly sampled)
value. Servers such as gostatsd and DogStatsD also accept a `|#` section of
tags on each line, which this client writes for you.

Due to the inherent design of the system, there is no guarantee that metrics
will be received by the server, and there is (by design) no indication of
this.

```ignore
use statsd_tags::prelude::*;
use statsd_tags::Client;

let client = Client::new("127.0.0.1:8125", "myapp")?;
client.incr("some.metric");
client
    .gauge_with_tags("queue.depth", 12)
    .with_tag("queue", "emails")
    .send();
```
*/
mod builder;
pub mod client;
mod config;
mod error;
pub mod metric;
mod pipeline;
pub mod sink;
mod tags;
mod timer;

pub use builder::MetricBuilder;
pub use client::{Client, ClientBuilder, Recorder, Sampler, Settings};
pub use config::{ClientConfig, StatsdBackend};
pub use error::{ParseError, Result, StatsdError, TimerError};
pub use metric::{Metric, MetricKind};
pub use pipeline::Pipeline;
#[cfg(unix)]
pub use sink::UnixMetricSink;
pub use sink::{BufferedSink, MetricSink, NopMetricSink, TcpMetricSink, UdpMetricSink};
pub use tags::Tags;
pub use timer::Timer;

/// Default port of statsd servers.
pub const DEFAULT_PORT: u16 = 8125;

/// Default upper bound of a packed UDP payload.
pub const DEFAULT_MAX_UDP_SIZE: usize = 512;

pub mod prelude {
    pub use crate::client::Recorder;
}
