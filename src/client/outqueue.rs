//! Outgoing message queues and flood control.
//!
//! Lines sent at `Immediate` priority go straight to the socket. `High` and `Low` lines go
//! through a queue each: a line is sent right away only if its queue and every higher priority
//! queue are empty and the last queued-priority line is older than the anti-flood delay of that
//! priority; otherwise it waits
//! for `pop_ready`, which releases at most one line per call, high before low.
use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Priority of an outgoing line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Bypasses the queues and the anti-flood delay (login, `QUIT`, `PONG`).
    Immediate,
    /// User actions.
    High,
    /// Automatic traffic and the tail of bulk operations.
    Low,
}

impl Priority {
    fn queue(self) -> Option<usize> {
        match self {
            Priority::Immediate => None,
            Priority::High => Some(0),
            Priority::Low => Some(1),
        }
    }
}

/// A line waiting to be sent.
#[derive(Clone, Debug, PartialEq)]
pub struct OutMessage {
    /// The IRC command, like `PRIVMSG`.
    pub command: String,
    /// The line, without line ending.
    pub line: String,
    /// Redirect to start when the line is sent.
    pub redirect: Option<u64>,
    /// When the line was queued.
    pub queued_at: DateTime<Utc>,
}

/// The two flood-controlled queues of a server.
#[derive(Clone, Debug)]
pub struct OutQueue {
    queues: [VecDeque<OutMessage>; 2],
    anti_flood: [i64; 2],
    last_user_message: Option<DateTime<Utc>>,
}

impl OutQueue {
    /// Creates empty queues with the anti-flood delays (seconds) of both priorities.
    pub fn new(anti_flood_high: i64, anti_flood_low: i64) -> OutQueue {
        OutQueue {
            queues: [VecDeque::new(), VecDeque::new()],
            anti_flood: [anti_flood_high, anti_flood_low],
            last_user_message: None,
        }
    }

    /// Changes the anti-flood delays.
    pub fn set_anti_flood(&mut self, high: i64, low: i64) {
        self.anti_flood = [high, low];
    }

    // A clock going backwards must not block the queues.
    fn check_clock(&mut self, now: DateTime<Utc>) {
        if self.last_user_message.map_or(false, |last| last > now) {
            self.last_user_message = Some(now);
        }
    }

    /// Offers a line: returns it if it may be sent now, otherwise queues it.
    pub fn push(&mut self, priority: Priority, message: OutMessage, now: DateTime<Utc>) -> Option<OutMessage> {
        let index = match priority.queue() {
            Some(index) => index,
            None => return Some(message),
        };
        self.check_clock(now);
        let anti_flood = self.anti_flood[index];
        let too_soon = anti_flood > 0
            && self
                .last_user_message
                .map_or(false, |last| now - last < Duration::seconds(anti_flood));
        let waiting = self.queues[..=index].iter().any(|q| !q.is_empty());
        if waiting || too_soon {
            self.queues[index].push_back(message);
            None
        } else {
            self.last_user_message = Some(now);
            Some(message)
        }
    }

    /// Releases the next queued line whose delay has elapsed, high priority first.
    pub fn pop_ready(&mut self, now: DateTime<Utc>) -> Option<OutMessage> {
        self.check_clock(now);
        for index in 0..self.queues.len() {
            if self.queues[index].is_empty() {
                continue;
            }
            let ready = self
                .last_user_message
                .map_or(true, |last| now >= last + Duration::seconds(self.anti_flood[index]));
            if ready {
                self.last_user_message = Some(now);
                return self.queues[index].pop_front();
            }
        }
        None
    }

    /// The lines waiting at a priority, oldest first.
    pub fn queued(&self, priority: Priority) -> impl Iterator<Item = &OutMessage> {
        let index = priority.queue().unwrap_or(0);
        let empty = priority == Priority::Immediate;
        self.queues[index].iter().filter(move |_| !empty)
    }

    /// Number of lines waiting at a priority.
    pub fn len(&self, priority: Priority) -> usize {
        priority.queue().map_or(0, |index| self.queues[index].len())
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    /// Drops every waiting line and forgets the last send date.
    pub fn clear(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
        self.last_user_message = None;
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone, Utc};

    use super::{OutMessage, OutQueue, Priority};

    fn message(line: &str) -> OutMessage {
        OutMessage {
            command: line.split(' ').next().unwrap_or_default().to_owned(),
            line: line.to_owned(),
            redirect: None,
            queued_at: Utc.timestamp(0, 0),
        }
    }

    #[test]
    fn immediate_bypasses_queues() {
        let mut queue = OutQueue::new(2, 2);
        let now = Utc.timestamp(1000, 0);
        assert!(queue.push(Priority::High, message("PRIVMSG #a :1"), now).is_some());
        assert!(queue.push(Priority::High, message("PRIVMSG #a :2"), now).is_none());
        assert!(queue.push(Priority::Immediate, message("QUIT"), now).is_some());
        assert_eq!(queue.len(Priority::High), 1);
    }

    #[test]
    fn anti_flood_spaces_lines() {
        let mut queue = OutQueue::new(2, 2);
        let t0 = Utc.timestamp(1000, 0);
        for i in 0..3 {
            queue.push(Priority::High, message(&format!("PRIVMSG #a :{}", i)), t0);
        }
        assert_eq!(queue.len(Priority::High), 2);
        assert!(queue.pop_ready(t0 + Duration::seconds(1)).is_none());
        let next = queue.pop_ready(t0 + Duration::seconds(2)).unwrap();
        assert_eq!(next.line, "PRIVMSG #a :1");
        assert!(queue.pop_ready(t0 + Duration::seconds(3)).is_none());
        assert!(queue.pop_ready(t0 + Duration::seconds(4)).is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn high_drains_before_low() {
        let mut queue = OutQueue::new(1, 1);
        let t0 = Utc.timestamp(1000, 0);
        queue.push(Priority::High, message("JOIN #a"), t0);
        queue.push(Priority::Low, message("WHO #a"), t0);
        queue.push(Priority::High, message("JOIN #b"), t0);
        assert_eq!(queue.pop_ready(t0 + Duration::seconds(1)).unwrap().line, "JOIN #b");
        assert_eq!(queue.pop_ready(t0 + Duration::seconds(2)).unwrap().line, "WHO #a");
    }

    #[test]
    fn low_waits_behind_queued_high() {
        let mut queue = OutQueue::new(2, 2);
        let t0 = Utc.timestamp(1000, 0);
        assert!(queue.push(Priority::High, message("PRIVMSG #a :a"), t0).is_some());
        assert!(queue.push(Priority::High, message("PRIVMSG #a :b"), t0).is_none());
        let later = t0 + Duration::seconds(3);
        assert!(queue.push(Priority::Low, message("WHO #a"), later).is_none());
        assert_eq!(queue.pop_ready(later).unwrap().line, "PRIVMSG #a :b");
        assert_eq!(queue.pop_ready(later + Duration::seconds(2)).unwrap().line, "WHO #a");
    }

    #[test]
    fn faster_low_delay_does_not_overtake_high() {
        let mut queue = OutQueue::new(2, 0);
        let t0 = Utc.timestamp(1000, 0);
        queue.push(Priority::High, message("PRIVMSG #a :a"), t0);
        queue.push(Priority::High, message("PRIVMSG #a :b"), t0);
        assert!(queue.push(Priority::Low, message("WHO #a"), t0).is_none());
        assert_eq!(queue.len(Priority::High), 1);
        assert_eq!(queue.len(Priority::Low), 1);
        assert_eq!(queue.pop_ready(t0 + Duration::seconds(2)).unwrap().line, "PRIVMSG #a :b");
    }

    #[test]
    fn zero_delay_sends_immediately() {
        let mut queue = OutQueue::new(0, 0);
        let now = Utc.timestamp(1000, 0);
        for i in 0..5 {
            assert!(queue.push(Priority::Low, message(&format!("NOTICE x :{}", i)), now).is_some());
        }
    }

    #[test]
    fn clock_going_back() {
        let mut queue = OutQueue::new(2, 2);
        queue.push(Priority::High, message("PING x"), Utc.timestamp(5000, 0));
        queue.push(Priority::High, message("PING y"), Utc.timestamp(5000, 0));
        assert!(queue.pop_ready(Utc.timestamp(100, 0)).is_none());
        assert!(queue.pop_ready(Utc.timestamp(102, 0)).is_some());
    }
}
