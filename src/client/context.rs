//! What every server session shares: the UI, the observers, the clock, the raw log and the
//! global configuration.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::client::clock::Clock;
use crate::client::data::{Config, RawLog};
use crate::client::event::{Event, EventBus, Observer};
use crate::client::redirect::RedirectPattern;
use crate::client::ui::{BufferId, Ui};

/// Handles shared by the sessions of a registry.
#[derive(Clone)]
pub struct Context {
    /// The user interface.
    pub ui: Arc<Mutex<dyn Ui + Send>>,
    /// Observers of session events.
    pub events: Arc<Mutex<EventBus>>,
    /// The source of "now".
    pub clock: Clock,
    /// The raw protocol log, common to all servers.
    pub raw: Arc<Mutex<RawLog>>,
    /// The global options.
    pub config: Arc<Config>,
    /// Redirect patterns, shared by all servers.
    pub redirect_patterns: Arc<Mutex<Vec<RedirectPattern>>>,
    /// Names of the private buffers of all servers, in creation order.
    pub private_buffers: Arc<Mutex<Vec<String>>>,
}

impl Context {
    /// Creates a context running on the system clock.
    pub fn new<U>(config: Config, ui: U) -> Context
    where
        U: Ui + Send + 'static,
    {
        Context::with_ui(config, Arc::new(Mutex::new(ui)), Clock::System)
    }

    /// Creates a context around a shared UI and a clock.
    pub fn with_ui(config: Config, ui: Arc<Mutex<dyn Ui + Send>>, clock: Clock) -> Context {
        let raw = RawLog::new(config.raw_messages());
        Context {
            ui,
            events: Arc::new(Mutex::new(EventBus::new())),
            clock,
            raw: Arc::new(Mutex::new(raw)),
            config: Arc::new(config),
            redirect_patterns: Arc::new(Mutex::new(RedirectPattern::defaults())),
            private_buffers: Arc::new(Mutex::new(vec![])),
        }
    }

    /// The current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Adds an observer of session events.
    pub fn subscribe<O: Observer + 'static>(&self, observer: O) {
        self.events.lock().subscribe(observer);
    }

    /// Sends an event to every observer.
    pub fn emit(&self, event: Event) {
        self.events.lock().emit(event);
    }

    /// Prints a line now; `None` is the core buffer.
    pub fn print(&self, buffer: Option<BufferId>, tags: &[&str], message: &str) {
        self.print_date(buffer, self.now(), tags, message);
    }

    /// Prints a line carrying a date, such as the server-time of a message.
    pub fn print_date(&self, buffer: Option<BufferId>, date: DateTime<Utc>, tags: &[&str], message: &str) {
        let tags: Vec<String> = tags.iter().filter(|t| !t.is_empty()).map(|t| (*t).to_owned()).collect();
        self.ui.lock().print(buffer, date, &tags, message);
    }
}
