//! The raw protocol log: the last lines sent and received by all servers.
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a raw line travelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFlags {
    /// Received from the server.
    pub recv: bool,
    /// Sent to the server.
    pub send: bool,
    /// Changed by a modifier before being sent or parsed.
    pub modified: bool,
    /// Consumed by a redirect.
    pub redirected: bool,
}

impl RawFlags {
    /// A received line.
    pub fn recv() -> RawFlags {
        RawFlags {
            recv: true,
            ..RawFlags::default()
        }
    }

    /// A sent line.
    pub fn send() -> RawFlags {
        RawFlags {
            send: true,
            ..RawFlags::default()
        }
    }

    /// The arrow shown before the line, like `-->` or `<--`.
    pub fn prefix(self) -> &'static str {
        match (self.send, self.modified, self.redirected) {
            (true, true, _) => "==>",
            (true, false, _) => "-->",
            (false, _, true) => "<R-",
            (false, true, false) => "<==",
            (false, false, false) => "<--",
        }
    }
}

/// A line of the raw log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// When the line was sent or received.
    pub date: DateTime<Utc>,
    /// Name of the server.
    pub server: String,
    /// Direction and processing.
    pub flags: RawFlags,
    /// The line, without the line ending.
    pub message: String,
}

/// Bounded ring of raw lines, oldest first.
#[derive(Clone, Debug)]
pub struct RawLog {
    max: usize,
    messages: VecDeque<RawMessage>,
}

impl RawLog {
    /// Creates a log keeping at most `max` lines.
    pub fn new(max: usize) -> RawLog {
        RawLog {
            max,
            messages: VecDeque::new(),
        }
    }

    /// The capacity.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Changes the capacity, dropping the oldest lines when it shrinks.
    pub fn set_max(&mut self, max: usize) {
        self.max = max;
        self.trim();
    }

    /// Records a line.
    pub fn add(&mut self, date: DateTime<Utc>, server: &str, flags: RawFlags, message: &str) {
        self.push(RawMessage {
            date,
            server: server.to_owned(),
            flags,
            message: message.to_owned(),
        });
    }

    /// Records a line restored from a snapshot.
    pub fn push(&mut self, message: RawMessage) {
        self.messages.push_back(message);
        self.trim();
    }

    fn trim(&mut self) {
        while self.messages.len() > self.max {
            self.messages.pop_front();
        }
    }

    /// The recorded lines, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &RawMessage> {
        self.messages.iter()
    }

    /// Number of recorded lines.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::{RawFlags, RawLog};

    #[test]
    fn keeps_the_newest_lines() {
        let mut log = RawLog::new(3);
        for i in 0..5 {
            log.add(Utc::now(), "libera", RawFlags::recv(), &format!("PING :{}", i));
        }
        let lines: Vec<_> = log.messages().map(|m| m.message.as_str()).collect();
        assert_eq!(lines, vec!["PING :2", "PING :3", "PING :4"]);
        log.set_max(1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn prefixes() {
        assert_eq!(RawFlags::send().prefix(), "-->");
        assert_eq!(RawFlags::recv().prefix(), "<--");
        let redirected = RawFlags {
            redirected: true,
            ..RawFlags::recv()
        };
        assert_eq!(redirected.prefix(), "<R-");
    }
}
