use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::{Recorder, Settings};

/// A batch of metric lines flushed to the parent together.
///
/// Lines are rendered when recorded, tags included. On [`send`](Pipeline::send)
/// they are packed into as few payloads as the transport allows. Anything
/// still queued is sent when the pipeline is dropped.
///
/// ```ignore
/// {
///     let pipe = client.pipeline();
///     pipe.incr("jobs.started");
///     pipe.timing("jobs.queue_time", 3.2);
/// } // both lines go out in one datagram here
/// ```
pub struct Pipeline<'a, R: Recorder> {
    parent: &'a R,
    stats: Mutex<VecDeque<String>>,
}

impl<'a, R: Recorder> Pipeline<'a, R> {
    pub fn new(parent: &'a R) -> Self {
        Pipeline {
            parent,
            stats: Mutex::new(VecDeque::new()),
        }
    }

    fn stats(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.stats().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats().is_empty()
    }

    /// Flush queued lines to the parent. Does nothing when empty.
    pub fn send(&self) {
        let stats: Vec<String> = self.stats().drain(..).collect();
        if stats.is_empty() {
            return;
        }

        match self.parent.settings().max_packet_size() {
            Some(max) => {
                for packet in pack_lines(stats, max) {
                    self.parent.submit(packet);
                }
            }
            None => self.parent.submit(stats.join("\n")),
        }
    }
}

impl<'a, R: Recorder> Recorder for Pipeline<'a, R> {
    fn settings(&self) -> &Settings {
        self.parent.settings()
    }

    fn submit(&self, data: String) {
        self.stats().push_back(data);
    }
}

impl<'a, R: Recorder> Drop for Pipeline<'a, R> {
    fn drop(&mut self) {
        self.send();
    }
}

/// Join lines with `\n`, starting a new packet whenever the next line would
/// bring the current one to `max` bytes or more. Order is preserved and a
/// line that is too large on its own still goes out alone.
pub(crate) fn pack_lines<I>(lines: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut packets = Vec::new();
    let mut lines = lines.into_iter();
    let mut data = match lines.next() {
        Some(first) => first,
        None => return packets,
    };

    for stat in lines {
        if stat.len() + data.len() + 1 >= max {
            packets.push(std::mem::replace(&mut data, stat));
        } else {
            data.push('\n');
            data.push_str(&stat);
        }
    }
    packets.push(data);
    packets
}
