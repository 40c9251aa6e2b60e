use std::time::Instant;

use crate::client::{duration_ms, Recorder};
use crate::error::TimerError;
use crate::tags::Tags;

/// Manual stopwatch for a timing metric.
///
/// For a block of code, [`Recorder::time`] is usually simpler.
///
/// ```ignore
/// let mut timer = client.timer("upload").with_tag("bucket", "logs");
/// timer.start();
/// upload(&file)?;
/// timer.stop(true)?;
/// ```
pub struct Timer<'a, R: Recorder> {
    recorder: &'a R,
    stat: String,
    rate: f64,
    tags: Tags,

    start_time: Option<Instant>,
    ms: Option<f64>,
    sent: bool,
}

impl<'a, R: Recorder> Timer<'a, R> {
    pub fn new(recorder: &'a R, stat: &str) -> Self {
        Timer {
            recorder,
            stat: stat.to_string(),
            rate: 1.0,
            tags: Tags::default(),
            start_time: None,
            ms: None,
            sent: false,
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.add_tag(key, value);
        self
    }

    pub fn with_tag_value<T: Into<String>>(mut self, value: T) -> Self {
        self.tags.add_tag_value(value);
        self
    }

    /// Begin a fresh measurement, discarding any previous one.
    pub fn start(&mut self) -> &mut Self {
        self.ms = None;
        self.sent = false;
        self.start_time = Some(Instant::now());
        self
    }

    pub fn stop(&mut self, send: bool) -> Result<&mut Self, TimerError> {
        let start_time = self.start_time.ok_or(TimerError::NotStarted)?;
        self.ms = Some(duration_ms(start_time.elapsed()));
        if send {
            self.send()?;
        }
        Ok(self)
    }

    /// Send the measured time. A measurement is only sent once.
    pub fn send(&mut self) -> Result<(), TimerError> {
        let ms = self.ms.ok_or(TimerError::NoData)?;
        if self.sent {
            return Err(TimerError::AlreadySent);
        }
        self.sent = true;
        self.recorder
            .timing_with_tags(&self.stat, ms)
            .with_rate(self.rate)
            .with_tags(&self.tags)
            .send();
        Ok(())
    }

    /// The last measurement in milliseconds.
    pub fn ms(&self) -> Option<f64> {
        self.ms
    }
}
