//! Metric representation and the statsd line format.
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::tags::Tags;

/// Enum of metric types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    GaugeDelta,
    Timer,
    Set,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "c",
            MetricKind::Gauge | MetricKind::GaugeDelta => "g",
            MetricKind::Timer => "ms",
            MetricKind::Set => "s",
        }
    }
}

/// Metric value objects.
///
/// The value is kept in its rendered form so integer counters, float timings
/// and signed gauge deltas all print exactly as they are sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: String,
    value: String,
    kind: MetricKind,
    rate: f64,
    tags: Tags,
}

impl Metric {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V, kind: MetricKind) -> Metric {
        Metric {
            name: name.into(),
            value: value.into(),
            kind,
            rate: 1.0,
            tags: Tags::default(),
        }
    }

    pub fn counter(name: &str, value: i64) -> Metric {
        Metric::new(name, format_int(value), MetricKind::Counter)
    }

    pub fn gauge(name: &str, value: i64) -> Metric {
        Metric::new(name, format_int(value), MetricKind::Gauge)
    }

    pub fn gauge_delta(name: &str, value: i64) -> Metric {
        let mut rendered = String::with_capacity(21);
        if value >= 0 {
            rendered.push('+');
        }
        rendered.push_str(&format_int(value));
        Metric::new(name, rendered, MetricKind::GaugeDelta)
    }

    /// A timing in milliseconds.
    pub fn timer(name: &str, ms: f64) -> Metric {
        Metric::new(name, format_float(ms), MetricKind::Timer)
    }

    pub fn set<T: fmt::Display>(name: &str, value: T) -> Metric {
        Metric::new(name, value.to_string(), MetricKind::Set)
    }

    pub fn with_rate(mut self, rate: f64) -> Metric {
        self.rate = rate;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Metric {
        self.tags = tags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Render the wire line, with `prefix.` in front of the name when set.
    pub fn write_line(&self, prefix: Option<&str>, buf: &mut String) {
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            buf.push_str(prefix);
            buf.push('.');
        }
        buf.push_str(&self.name);
        buf.push(':');
        buf.push_str(&self.value);
        buf.push('|');
        buf.push_str(self.kind.as_str());
        if self.rate < 1.0 {
            buf.push_str("|@");
            buf.push_str(&format_float(self.rate));
        }
        self.tags.write_suffix(buf);
    }

    pub fn to_line(&self, prefix: Option<&str>) -> String {
        let mut buf = String::with_capacity(self.name.len() + self.value.len() + 16);
        self.write_line(prefix, &mut buf);
        buf
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_line(None))
    }
}

pub(crate) fn format_int(value: i64) -> String {
    let mut buffer = itoa::Buffer::new();
    buffer.format(value).to_string()
}

pub(crate) fn format_float(value: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).to_string()
}

impl FromStr for Metric {
    type Err = ParseError;

    /// Valid message formats are:
    ///
    /// - `<str:metric_name>:<value>|<str:type>`
    /// - `<str:metric_name>:<value>|<str:type>|@<f64:sample_rate>`
    /// - `<str:metric_name>:<value>|<str:type>|#<tag>,<key>:<value>`
    fn from_str(line: &str) -> Result<Metric, ParseError> {
        // Get the metric name
        let (name, rest) = match line.split_once(':') {
            Some((name, rest)) if !name.is_empty() => (name, rest),
            _ => return Err(ParseError::SyntaxError("Metrics require a name.", 0)),
        };
        let mut column = name.len() + 1;

        let mut sections = rest.split('|');
        let value = sections.next().unwrap_or_default();
        if value.is_empty() {
            return Err(ParseError::SyntaxError("Metrics require a value.", column));
        }
        column += value.len() + 1;

        // Get kind parts
        let kind = match sections.next() {
            Some("c") => MetricKind::Counter,
            Some("g") if value.starts_with('+') || value.starts_with('-') => MetricKind::GaugeDelta,
            Some("g") => MetricKind::Gauge,
            Some("ms") => MetricKind::Timer,
            Some("s") => MetricKind::Set,
            Some(_) => return Err(ParseError::SyntaxError("Unknown metric type.", column)),
            None => return Err(ParseError::SyntaxError("Metrics require a type.", column)),
        };
        if kind != MetricKind::Set && value.parse::<f64>().is_err() {
            return Err(ParseError::SyntaxError("Metric value is not a number.", name.len() + 1));
        }
        column += kind.as_str().len() + 1;

        let mut metric = Metric::new(name, value, kind);
        for section in sections {
            if let Some(rate) = section.strip_prefix('@') {
                metric.rate = rate
                    .parse::<f64>()
                    .map_err(|_| ParseError::SyntaxError("Invalid sample rate.", column))?;
            } else if let Some(tags) = section.strip_prefix('#') {
                for tag in tags.split(',').filter(|t| !t.is_empty()) {
                    match tag.split_once(':') {
                        Some((k, v)) => metric.tags.add_tag(k, v),
                        None => metric.tags.add_tag_value(tag),
                    }
                }
            } else {
                return Err(ParseError::SyntaxError("Unknown metric section.", column));
            }
            column += section.len() + 1;
        }

        Ok(metric)
    }
}
