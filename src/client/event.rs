//! Typed notifications sent to observers outside the session.
use serde::{Deserialize, Serialize};

use crate::client::data::TypingState;

/// The connection state of a server session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No socket and nothing in flight.
    Disconnected,
    /// Waiting for the transport to open.
    Connecting,
    /// Connected, sending the login and negotiating capabilities.
    Registering,
    /// The server sent its welcome.
    Registered,
}

/// Whether a conversation is a channel or a private one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A channel.
    Channel,
    /// A private conversation (query).
    Private,
}

/// Something that happened in a session.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The session moved to a new state.
    StateChanged {
        /// Server name.
        server: String,
        /// The new state.
        state: SessionState,
    },
    /// A reconnection was scheduled.
    ReconnectScheduled {
        /// Server name.
        server: String,
        /// Seconds until the attempt.
        delay: i64,
    },
    /// A channel or private conversation was opened.
    ChannelOpened {
        /// Server name.
        server: String,
        /// Channel or nick.
        channel: String,
        /// Channel or private.
        kind: ChannelKind,
    },
    /// A channel or private conversation was freed.
    ChannelClosed {
        /// Server name.
        server: String,
        /// Channel or nick.
        channel: String,
    },
    /// A channel topic changed.
    TopicChanged {
        /// Server name.
        server: String,
        /// Channel name.
        channel: String,
        /// The new topic, `None` when unset.
        topic: Option<String>,
    },
    /// A nick changed, ours or someone else's.
    NickChanged {
        /// Server name.
        server: String,
        /// Previous nick.
        old: String,
        /// New nick.
        new: String,
    },
    /// A redirected command completed or timed out.
    Redirected {
        /// Server name.
        server: String,
        /// Pattern name, such as `who`.
        pattern: String,
        /// The name the caller attached to the redirect.
        signal: String,
        /// The command that was redirected.
        command: String,
        /// The collected lines, newline separated.
        output: String,
        /// Whether the redirect ended by timeout.
        timed_out: bool,
    },
    /// A notified nick came online or went offline.
    NotifyChanged {
        /// Server name.
        server: String,
        /// Nick.
        nick: String,
        /// Online after the change.
        online: bool,
    },
    /// Someone started, paused or stopped typing in a conversation.
    Typing {
        /// Server name.
        server: String,
        /// Channel name, or the nick of a private conversation.
        channel: String,
        /// Who is typing.
        nick: String,
        /// The new state, `Off` once done.
        state: TypingState,
    },
    /// A line was received from or sent to the server.
    Message {
        /// Server name.
        server: String,
        /// Received (true) or sent (false).
        incoming: bool,
        /// The raw line.
        line: String,
    },
}

/// Something interested in session events.
pub trait Observer: Send {
    /// Called for every event, in order.
    fn notify(&mut self, event: &Event);
}

impl<F> Observer for F
where
    F: FnMut(&Event) + Send,
{
    fn notify(&mut self, event: &Event) {
        self(event)
    }
}

/// Delivers events to every subscribed observer.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn Observer>>,
}

impl EventBus {
    /// Creates a bus with no observers.
    pub fn new() -> EventBus {
        EventBus::default()
    }

    /// Adds an observer.
    pub fn subscribe<O: Observer + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Sends `event` to every observer.
    pub fn emit(&mut self, event: Event) {
        trace!("event: {:?}", event);
        for observer in &mut self.observers {
            observer.notify(&event);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{Event, EventBus, SessionState};

    #[test]
    fn closures_observe_in_order() {
        let seen = Arc::new(Mutex::new(vec![]));
        let mut bus = EventBus::new();
        let log = seen.clone();
        bus.subscribe(move |e: &Event| log.lock().push(e.clone()));
        for state in &[SessionState::Connecting, SessionState::Registering] {
            bus.emit(Event::StateChanged {
                server: "libera".into(),
                state: *state,
            });
        }
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            Event::StateChanged {
                server: "libera".into(),
                state: SessionState::Registering
            }
        );
    }
}
