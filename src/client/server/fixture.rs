//! A session wired to an in-memory UI and a manual clock, driven by feeding wire lines.
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use super::{Action, Server};
use crate::client::clock::Clock;
use crate::client::context::Context;
use crate::client::data::{Config, ServerConfig};
use crate::client::event::Event;
use crate::client::ui::{MemoryUi, Ui};

pub fn test_config() -> ServerConfig {
    ServerConfig {
        name: "test".to_owned(),
        addresses: Some(vec!["irc.test.net/6667".to_owned()]),
        nicks: Some(vec!["test".to_owned()]),
        realname: Some("Testing.".to_owned()),
        ..ServerConfig::default()
    }
}

pub struct Harness {
    pub server: Server,
    pub ui: Arc<Mutex<MemoryUi>>,
    pub clock: Clock,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Harness {
    pub fn new(config: ServerConfig) -> Harness {
        Harness::with_global(Config::default(), config)
    }

    pub fn with_global(global: Config, config: ServerConfig) -> Harness {
        let ui = Arc::new(Mutex::new(MemoryUi::new()));
        let shared: Arc<Mutex<dyn Ui + Send>> = ui.clone();
        let clock = Clock::manual(Utc.ymd(2021, 6, 1).and_hms(12, 0, 0));
        let ctx = Context::with_ui(global, shared, clock.clone());
        let events = Arc::new(Mutex::new(vec![]));
        let log = events.clone();
        ctx.subscribe(move |e: &Event| log.lock().push(e.clone()));
        Harness {
            server: Server::new(ctx, config),
            ui,
            clock,
            events,
        }
    }

    /// Connects and logs in, leaving the login lines unread.
    pub fn connect(&mut self) {
        self.server.connect().unwrap();
        self.server.connected();
    }

    /// Connects and receives the welcome, discarding everything sent so far.
    pub fn register(&mut self) {
        self.connect();
        self.recv(":irc.test.net 001 test :Welcome to the test network");
        self.sent();
    }

    pub fn recv(&mut self, line: &str) {
        self.server.recv_line(line);
    }

    /// The lines written since the last call, each ended by CRLF.
    pub fn sent(&mut self) -> String {
        self.server
            .take_actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Send(line) => Some(format!("{}\r\n", line)),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn lines(&self, buffer: &str) -> Vec<String> {
        self.ui.lock().lines(buffer).into_iter().map(|l| l.message).collect()
    }
}
