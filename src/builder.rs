use crate::client::Recorder;
use crate::metric::Metric;
use crate::tags::Tags;

/// A metric waiting for its call-site tags and sample rate.
///
/// Nothing is sent until [`send`](MetricBuilder::send) is called.
#[must_use = "metrics are only sent by calling `send`"]
pub struct MetricBuilder<'a, R: Recorder> {
    recorder: &'a R,
    metric: Metric,
    tags: Tags,
    rate: f64,
}

impl<'a, R: Recorder> MetricBuilder<'a, R> {
    pub(crate) fn new(recorder: &'a R, metric: Metric) -> Self {
        MetricBuilder {
            recorder,
            metric,
            tags: Tags::default(),
            rate: 1.0,
        }
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.add_tag(key, value);
        self
    }

    pub fn with_tag_value<T: Into<String>>(mut self, value: T) -> Self {
        self.tags.add_tag_value(value);
        self
    }

    /// Add every tag of a shared group.
    pub fn with_tags(mut self, tags: &Tags) -> Self {
        for value in tags.values() {
            self.tags.add_tag_value(value);
        }
        for (k, v) in tags.pairs() {
            self.tags.add_tag(k, v);
        }
        self
    }

    /// Only send this metric with probability `rate`.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn send(self) {
        let metric = self.metric.with_rate(self.rate).with_tags(self.tags);
        self.recorder.record(metric);
    }
}
