//! In-Process Publish Seam
//!
//! Sensors hand finished values to a [`Publisher`]; what sits behind it is
//! the application's business - a local topic dispatcher, a display, a
//! bridge, or all of them fanned out. Delivery is synchronous and local,
//! so the trait is infallible: there is no network between a sensor and
//! its subscribers.
//!
//! [`MessageLog`] is the capture double used throughout the test suites.
//! It records `(topic, payload)` pairs into fixed-capacity storage and
//! offers the few queries the tests keep reaching for.

use heapless::Vec;

use crate::topic::{PayloadString, TopicString};

/// Outbound edge of the acquisition pipeline.
pub trait Publisher {
    /// Deliver one message. Local and immediate.
    fn publish(&mut self, topic: &str, payload: &str);
}

/// Publisher double that records everything it is handed.
///
/// Capacity is a const parameter; when full, further messages are counted
/// in [`MessageLog::dropped`] instead of being stored. Tests size `N` so
/// that dropping never happens.
#[derive(Debug, Default)]
pub struct MessageLog<const N: usize = 32> {
    messages: Vec<(TopicString, PayloadString), N>,
    dropped: usize,
}

impl<const N: usize> MessageLog<N> {
    /// Empty log.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            dropped: 0,
        }
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages that arrived after the log was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// All recorded `(topic, payload)` pairs in publish order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.messages.iter().map(|(t, p)| (t.as_str(), p.as_str()))
    }

    /// Payloads published on one exact topic, in publish order.
    pub fn payloads_on<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.iter().filter_map(move |(t, p)| (t == topic).then_some(p))
    }

    /// Most recent payload on one exact topic.
    pub fn last_on<'a>(&'a self, topic: &'a str) -> Option<&'a str> {
        self.payloads_on(topic).last()
    }

    /// Number of messages on one exact topic.
    pub fn count_on(&self, topic: &str) -> usize {
        self.payloads_on(topic).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.dropped = 0;
    }
}

fn copy_truncated<const M: usize>(src: &str) -> heapless::String<M> {
    let mut dst = heapless::String::new();
    for c in src.chars() {
        if dst.push(c).is_err() {
            break;
        }
    }
    dst
}

impl<const N: usize> Publisher for MessageLog<N> {
    fn publish(&mut self, topic: &str, payload: &str) {
        let entry = (copy_truncated(topic), copy_truncated(payload));
        if self.messages.push(entry).is_err() {
            self.dropped += 1;
        }
    }
}
