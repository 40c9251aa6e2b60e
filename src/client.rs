use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::warn;

use crate::builder::MetricBuilder;
use crate::error::Result;
use crate::metric::{Metric, MetricKind};
use crate::pipeline::Pipeline;
use crate::sink::{MetricSink, UdpMetricSink};
use crate::tags::Tags;
use crate::timer::Timer;

/// Source of uniform values in `[0, 1)` used to decide whether a sampled
/// metric is kept.
pub type Sampler = fn() -> f64;

fn random_sampler() -> f64 {
    rand::random::<f64>()
}

/// Per-client values every metric line is rendered with.
#[derive(Clone)]
pub struct Settings {
    prefix: Option<String>,
    tags: Tags,
    sampler: Sampler,
    max_packet_size: Option<usize>,
}

impl Settings {
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Tags attached to every metric.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn max_packet_size(&self) -> Option<usize> {
        self.max_packet_size
    }

    /// Whether a metric sent at `rate` should go out this time.
    pub fn sampled(&self, rate: f64) -> bool {
        rate >= 1.0 || (self.sampler)() <= rate
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Settings")
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .field("max_packet_size", &self.max_packet_size)
            .finish()
    }
}

/// Anything metrics can be recorded into: a [`Client`] or a [`Pipeline`].
///
/// Implementors provide the settings and a way to hand off rendered lines.
/// Every metric operation is built on top of those two.
pub trait Recorder {
    fn settings(&self) -> &Settings;

    /// Hand off a fully rendered payload.
    fn submit(&self, data: String);

    /// Sample, render and submit a metric.
    ///
    /// statsd reads a leading sign on a gauge as a change, so a negative
    /// absolute gauge goes out as a reset to zero followed by the value,
    /// flushed together.
    fn record(&self, metric: Metric)
    where
        Self: Sized,
    {
        let settings = self.settings();
        if !settings.sampled(metric.rate()) {
            return;
        }
        let tags = metric.tags().merged(settings.tags());
        let prefix = settings.prefix();

        if metric.kind() == MetricKind::Gauge && metric.value().starts_with('-') {
            let reset = Metric::gauge(metric.name(), 0).with_tags(tags.clone());
            let value = metric.with_rate(1.0).with_tags(tags);
            let pipe = Pipeline::new(self);
            pipe.submit(reset.to_line(prefix));
            pipe.submit(value.to_line(prefix));
            pipe.send();
            return;
        }

        self.submit(metric.with_tags(tags).to_line(prefix));
    }

    /// Modify a counter by `value`.
    fn count_with_tags<'a>(&'a self, stat: &str, value: i64) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        MetricBuilder::new(self, Metric::counter(stat, value))
    }

    fn count(&self, stat: &str, value: i64)
    where
        Self: Sized,
    {
        self.count_with_tags(stat, value).send()
    }

    fn incr_with_tags<'a>(&'a self, stat: &str) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        self.count_with_tags(stat, 1)
    }

    /// Increment a metric by 1
    ///
    /// ```ignore
    /// client.incr("metric.completed");
    /// ```
    fn incr(&self, stat: &str)
    where
        Self: Sized,
    {
        self.count(stat, 1)
    }

    fn decr_with_tags<'a>(&'a self, stat: &str) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        self.count_with_tags(stat, -1)
    }

    /// Decrement a metric by 1
    fn decr(&self, stat: &str)
    where
        Self: Sized,
    {
        self.count(stat, -1)
    }

    /// Decrement a counter by `value`.
    fn decr_by_with_tags<'a>(&'a self, stat: &str, value: i64) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        self.count_with_tags(stat, value.saturating_neg())
    }

    fn decr_by(&self, stat: &str, value: i64)
    where
        Self: Sized,
    {
        self.decr_by_with_tags(stat, value).send()
    }

    /// Set a gauge to an absolute value.
    ///
    /// statsd reads a leading sign as a change, so a negative value is sent
    /// as a reset to zero followed by the value, flushed together.
    fn gauge_with_tags<'a>(&'a self, stat: &str, value: i64) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        MetricBuilder::new(self, Metric::gauge(stat, value))
    }

    fn gauge(&self, stat: &str, value: i64)
    where
        Self: Sized,
    {
        self.gauge_with_tags(stat, value).send()
    }

    /// Change a gauge by `value`.
    fn gauge_delta_with_tags<'a>(&'a self, stat: &str, value: i64) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        MetricBuilder::new(self, Metric::gauge_delta(stat, value))
    }

    fn gauge_delta(&self, stat: &str, value: i64)
    where
        Self: Sized,
    {
        self.gauge_delta_with_tags(stat, value).send()
    }

    /// Send a timer value. The value is expected to be in ms.
    fn timing_with_tags<'a>(&'a self, stat: &str, ms: f64) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        MetricBuilder::new(self, Metric::timer(stat, ms))
    }

    fn timing(&self, stat: &str, ms: f64)
    where
        Self: Sized,
    {
        self.timing_with_tags(stat, ms).send()
    }

    fn timing_duration_with_tags<'a>(&'a self, stat: &str, duration: Duration) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        self.timing_with_tags(stat, duration_ms(duration))
    }

    fn timing_duration(&self, stat: &str, duration: Duration)
    where
        Self: Sized,
    {
        self.timing(stat, duration_ms(duration))
    }

    /// Add a value to a set.
    fn set_with_tags<'a, T: fmt::Display>(&'a self, stat: &str, value: T) -> MetricBuilder<'a, Self>
    where
        Self: Sized,
    {
        MetricBuilder::new(self, Metric::set(stat, value))
    }

    fn set<T: fmt::Display>(&self, stat: &str, value: T)
    where
        Self: Sized,
    {
        self.set_with_tags(stat, value).send()
    }

    /// Time a block of code.
    ///
    /// The passed closure will be timed and executed. The block's
    /// duration will be sent as a metric.
    ///
    /// ```ignore
    /// let rows = client.time("db.query", || run_query());
    /// ```
    fn time<F, T>(&self, stat: &str, callable: F) -> T
    where
        Self: Sized,
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = callable();
        self.timing_duration(stat, start.elapsed());
        result
    }

    fn timer<'a>(&'a self, stat: &str) -> Timer<'a, Self>
    where
        Self: Sized,
    {
        Timer::new(self, stat)
    }

    /// Batch metrics so they are flushed together.
    fn pipeline(&self) -> Pipeline<'_, Self>
    where
        Self: Sized,
    {
        Pipeline::new(self)
    }
}

pub(crate) fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Client for statsd servers.
///
/// After creating a client you can use it
/// to send metrics to the configured statsd server.
///
/// # Example
///
/// ```ignore
/// use statsd_tags::prelude::*;
/// use statsd_tags::Client;
///
/// let client = Client::new("127.0.0.1:8125", "myapp")?;
/// client.incr("some.metric.completed");
/// client
///     .timing_with_tags("response.duration", 10.123)
///     .with_tag("route", "/home")
///     .send();
/// ```
pub struct Client {
    settings: Settings,
    sink: Box<dyn MetricSink + Send + Sync>,

    create_instant: Instant,
    last_error_report: AtomicU64,
}

impl Client {
    /// Construct a new UDP client given a `host:port` & prefix.
    pub fn new(host: &str, prefix: &str) -> Result<Client> {
        let sink = UdpMetricSink::from_host(host)?;
        Ok(Client::builder(sink).with_prefix(prefix).build())
    }

    pub fn builder<S>(sink: S) -> ClientBuilder
    where
        S: MetricSink + Send + Sync + 'static,
    {
        ClientBuilder::new(Box::new(sink))
    }

    fn handle_emit_error(&self, e: std::io::Error) {
        let time_slice = self.create_instant.elapsed().as_secs() / 64;
        if self.claim_error_report(time_slice) {
            warn!("sending metrics error: {e:?}");
        }
    }

    /// True for the first error of each 64s slice.
    fn claim_error_report(&self, time_slice: u64) -> bool {
        self.last_error_report.swap(time_slice, Ordering::Relaxed) != time_slice
    }
}

impl Recorder for Client {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Send data along the sink. Failures are logged, never returned.
    fn submit(&self, data: String) {
        if let Err(e) = self.sink.emit(&data) {
            self.handle_emit_error(e);
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client").field("settings", &self.settings).finish()
    }
}

/// Builder for a [`Client`] on top of any sink.
pub struct ClientBuilder {
    prefix: Option<String>,
    tags: Tags,
    sampler: Sampler,
    sink: Box<dyn MetricSink + Send + Sync>,
}

impl ClientBuilder {
    fn new(sink: Box<dyn MetricSink + Send + Sync>) -> ClientBuilder {
        ClientBuilder {
            prefix: None,
            tags: Tags::default(),
            sampler: random_sampler,
            sink,
        }
    }

    /// Prepended to every stat name as `prefix.`. An empty prefix is ignored.
    pub fn with_prefix<T: Into<String>>(mut self, prefix: T) -> ClientBuilder {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    pub fn with_tag_value<T: Into<String>>(mut self, value: T) -> ClientBuilder {
        self.tags.add_tag_value(value);
        self
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> ClientBuilder {
        self.tags.add_tag(key, value);
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> ClientBuilder {
        self.tags = tags;
        self
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> ClientBuilder {
        self.sampler = sampler;
        self
    }

    pub fn build(self) -> Client {
        let max_packet_size = self.sink.max_packet_size();
        Client {
            settings: Settings {
                prefix: self.prefix,
                tags: self.tags,
                sampler: self.sampler,
                max_packet_size,
            },
            sink: self.sink,
            create_instant: Instant::now(),
            last_error_report: AtomicU64::new(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BufferedSink, NopMetricSink};

    fn client(sink: &BufferedSink) -> Client {
        Client::builder(sink.clone()).with_prefix("test").build()
    }

    fn always_low() -> f64 {
        0.0
    }

    fn always_high() -> f64 {
        0.99
    }

    #[test]
    fn count_simple() {
        let sink = BufferedSink::new();
        let client = client(&sink);
        client.count("count", 20);
        client.incr("hits");
        client.decr("slots");
        assert_eq!(vec!["test.count:20|c", "test.hits:1|c", "test.slots:-1|c"], sink.payloads());
    }

    #[test]
    fn no_prefix() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_prefix("").build();
        client.incr("hits");
        assert_eq!(vec!["hits:1|c"], sink.payloads());
        assert_eq!(None, client.settings().prefix());
    }

    #[test]
    fn gauge_simple() {
        let sink = BufferedSink::new();
        let client = client(&sink);
        client.gauge("gauge", 20);
        client.gauge_delta("gauge", 5);
        client.gauge_delta("gauge", -5);
        assert_eq!(
            vec!["test.gauge:20|g", "test.gauge:+5|g", "test.gauge:-5|g"],
            sink.payloads()
        );
    }

    #[test]
    fn gauge_negative_resets_first() {
        let sink = BufferedSink::new().with_max_packet_size(512);
        let client = client(&sink);
        client.gauge("gauge", -3);
        assert_eq!(vec!["test.gauge:0|g\ntest.gauge:-3|g"], sink.payloads());
    }

    #[test]
    fn gauge_negative_stream_resets_first() {
        let sink = BufferedSink::new();
        let client = client(&sink);
        client.gauge_with_tags("gauge", -3).with_tag("k", "v").send();
        assert_eq!(vec!["test.gauge:0|g|#k:v\ntest.gauge:-3|g|#k:v"], sink.payloads());
    }

    #[test]
    fn gauge_negative_sampled_out() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_sampler(always_high).build();
        client.gauge_with_tags("gauge", -3).with_rate(0.5).send();
        assert!(sink.payloads().is_empty());
    }

    #[test]
    fn gauge_negative_sampled_in_drops_rate() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_sampler(always_low).build();
        client.gauge_with_tags("gauge", -3).with_rate(0.5).send();
        assert_eq!(vec!["gauge:0|g\ngauge:-3|g"], sink.payloads());
    }

    #[test]
    fn timing_and_set() {
        let sink = BufferedSink::new();
        let client = client(&sink);
        client.timing("rt", 12.5);
        client.timing_duration("rt", Duration::from_millis(250));
        client.set("users", "alice");
        client.set("ids", 42);
        assert_eq!(
            vec!["test.rt:12.5|ms", "test.rt:250.0|ms", "test.users:alice|s", "test.ids:42|s"],
            sink.payloads()
        );
    }

    #[test]
    fn time_closure_returns_result() {
        let sink = BufferedSink::new();
        let client = client(&sink);
        let value = client.time("work", || 7);
        assert_eq!(7, value);
        let payloads = sink.payloads();
        assert_eq!(1, payloads.len());
        assert!(payloads[0].starts_with("test.work:"));
        assert!(payloads[0].ends_with("|ms"));
    }

    #[test]
    fn count_with_tags() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone())
            .with_prefix("test")
            .with_tag("tag1", "1234")
            .build();
        client.count_with_tags("count", 20).with_tag("tag2", "a").send();
        assert_eq!(vec!["test.count:20|c|#tag2:a,tag1:1234"], sink.payloads());
    }

    #[test]
    fn default_tags_on_every_metric() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone())
            .with_tag_value("canary")
            .with_tag("env", "prod")
            .build();
        client.incr("a");
        client
            .incr_with_tags("b")
            .with_tag_value("canary")
            .with_tag_value("blue")
            .with_tag("env", "dev")
            .send();
        assert_eq!(
            vec!["a:1|c|#canary,env:prod", "b:1|c|#canary,blue,env:dev"],
            sink.payloads()
        );
    }

    #[test]
    fn sampled_in_carries_rate() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_sampler(always_low).build();
        client.incr_with_tags("a").with_rate(0.5).with_tag_value("x").send();
        assert_eq!(vec!["a:1|c|@0.5|#x"], sink.payloads());
    }

    #[test]
    fn sampled_out_sends_nothing() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_sampler(always_high).build();
        client.incr_with_tags("a").with_rate(0.5).send();
        client.timing_with_tags("b", 1.0).with_rate(0.1).send();
        assert!(sink.payloads().is_empty());
    }

    #[test]
    fn record_metric_directly() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_tag("k", "v").build();
        client.record(Metric::counter("raw", 3));
        assert_eq!(vec!["raw:3|c|#k:v"], sink.payloads());
    }

    #[test]
    fn send_errors_are_swallowed() {
        struct FailingSink;
        impl MetricSink for FailingSink {
            fn emit(&self, _data: &str) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "down"))
            }
        }
        let client = Client::builder(FailingSink).build();
        client.incr("a");
        client.incr("b");
        assert_eq!(0, client.last_error_report.load(Ordering::Relaxed));
        // both failures fell in the first slice, which is already claimed
        assert!(!client.claim_error_report(0));
    }

    #[test]
    fn error_report_once_per_slice() {
        let client = Client::builder(NopMetricSink).build();
        assert!(client.claim_error_report(0));
        assert!(!client.claim_error_report(0));
        assert!(!client.claim_error_report(0));
        assert!(client.claim_error_report(1));
        assert!(!client.claim_error_report(1));
        assert_eq!(1, client.last_error_report.load(Ordering::Relaxed));
    }

    #[test]
    fn record_negative_gauge_resets_first() {
        let sink = BufferedSink::new().with_max_packet_size(512);
        let client = Client::builder(sink.clone()).with_tag("k", "v").build();
        client.record(Metric::gauge("g", -3));

        let payloads = sink.payloads();
        assert_eq!(vec!["g:0|g|#k:v\ng:-3|g|#k:v"], payloads);
        let lines: Vec<Metric> = payloads[0]
            .split('\n')
            .map(|l| l.parse::<Metric>().unwrap())
            .collect();
        assert_eq!(MetricKind::Gauge, lines[0].kind());
        assert_eq!("0", lines[0].value());
    }

    #[test]
    fn record_negative_gauge_sampled_in_drops_rate() {
        let sink = BufferedSink::new();
        let client = Client::builder(sink.clone()).with_sampler(always_low).build();
        client.record(Metric::gauge("g", -3).with_rate(0.5));
        assert_eq!(vec!["g:0|g\ng:-3|g"], sink.payloads());
    }

    #[test]
    fn decr_by_value() {
        let sink = BufferedSink::new();
        let client = client(&sink);
        client.decr_by("slots", 4);
        client.decr_by_with_tags("slots", 2).with_tag("pool", "a").send();
        assert_eq!(vec!["test.slots:-4|c", "test.slots:-2|c|#pool:a"], sink.payloads());
    }
}
