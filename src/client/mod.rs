//! The IRC session engine and its async driver.
//!
//! A [`Server`](server/struct.Server.html) holds everything known about one server: the
//! connection state machine, the channels with their nicks and modelists, the capability and
//! SASL negotiation, the outgoing queues and the pending redirects. It never touches a socket.
//! Lines are fed to it with `recv_line`, the time moves with `timer`, and it answers with
//! [`Action`](server/enum.Action.html)s: open a connection, send a line, close.
//!
//! The [`Client`](struct.Client.html) is the driver: it owns a
//! [`Registry`](registry/struct.Registry.html) of sessions, opens their connections with tokio,
//! feeds the received lines to them in arrival order, writes what they send and ticks their
//! timers once a second. All session state lives in the task running the client; other tasks
//! reach it through a [`Sender`](struct.Sender.html).
//!
//! # Example
//!
//! ```no_run
//! use irc_session::client::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> irc_session::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let mut client = Client::from_config(config, MemoryUi::new())?;
//! let sender = client.sender();
//! sender.command("libera", |server| {
//!     if let Err(e) = server.join("#rust", true, false) {
//!         eprintln!("{}", e);
//!     }
//! })?;
//! client.run().await?;
//! # Ok(())
//! # }
//! ```
use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::client::conn::Connection;
use crate::client::data::{Config, ServerConfig};
use crate::client::registry::Registry;
use crate::client::server::{Action, Server};
use crate::client::transport::LogView;
use crate::client::ui::Ui;
use crate::error::{Error, Result};

pub mod clock;
pub mod conn;
pub mod context;
pub mod data;
pub mod event;
pub mod mock;
pub mod outqueue;
pub mod prelude;
pub mod redirect;
pub mod registry;
pub mod server;
pub mod transport;
pub mod ui;

// What connection tasks report to the driver. `id` tells a current connection from one that
// was already replaced or closed.
#[derive(Debug)]
enum Input {
    Opened {
        server: String,
        id: u64,
        view: Option<LogView>,
    },
    Failed {
        server: String,
        id: u64,
        reason: String,
    },
    Line {
        server: String,
        id: u64,
        line: String,
    },
    Closed {
        server: String,
        id: u64,
        error: Option<String>,
    },
}

enum Request {
    Run(Box<dyn FnOnce(&mut Registry) + Send>),
    Shutdown(Option<String>),
}

enum Wakeup {
    Input(Input),
    Request(Request),
    Tick,
}

/// A handle to a running [`Client`](struct.Client.html), usable from any task.
#[derive(Clone)]
pub struct Sender {
    tx: UnboundedSender<Request>,
}

impl Sender {
    /// Runs `f` on the registry, in the task of the client.
    pub fn with<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Registry) + Send + 'static,
    {
        self.tx.send(Request::Run(Box::new(f))).map_err(|_| Error::StreamClosed)
    }

    /// Runs `f` on the named session, if it exists.
    pub fn command<F>(&self, server: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Server) + Send + 'static,
    {
        let name = server.to_owned();
        self.with(move |registry| match registry.search_mut(&name) {
            Some(server) => f(server),
            None => warn!("command for unknown server {}", name),
        })
    }

    /// Quits every session; the client stops once all connections are closed.
    pub fn shutdown(&self, reason: Option<String>) -> Result<()> {
        self.tx.send(Request::Shutdown(reason)).map_err(|_| Error::StreamClosed)
    }
}

struct Link {
    id: u64,
    outgoing: UnboundedSender<String>,
}

/// Drives the sessions of a registry over real (or mock) connections.
pub struct Client {
    registry: Registry,
    links: HashMap<String, Link>,
    views: HashMap<String, LogView>,
    next_id: u64,
    input_tx: UnboundedSender<Input>,
    input_rx: UnboundedReceiver<Input>,
    request_tx: UnboundedSender<Request>,
    request_rx: UnboundedReceiver<Request>,
    started: bool,
    shutting_down: bool,
}

impl Client {
    /// Creates a client driving `registry`.
    pub fn new(registry: Registry) -> Client {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        Client {
            registry,
            links: HashMap::new(),
            views: HashMap::new(),
            next_id: 0,
            input_tx,
            input_rx,
            request_tx,
            request_rx,
            started: false,
            shutting_down: false,
        }
    }

    /// Creates a client with one session per configured server.
    pub fn from_config<U>(config: Config, ui: U) -> Result<Client>
    where
        U: Ui + Send + 'static,
    {
        Ok(Client::new(Registry::from_config(config, ui)?))
    }

    /// The sessions.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The sessions, mutably. Call [`flush`](#method.flush) after changing them outside of
    /// [`run`](#method.run).
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// A handle for other tasks.
    pub fn sender(&self) -> Sender {
        Sender {
            tx: self.request_tx.clone(),
        }
    }

    /// The lines carried by the last mock connection of a session.
    pub fn log_view(&self, server: &str) -> Option<LogView> {
        self.views.get(server).cloned()
    }

    /// Connects the sessions configured to connect on startup, then runs until a shutdown
    /// completes.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(|_| false).await
    }

    /// Like [`run`](#method.run), but also returns as soon as `done` holds.
    pub async fn run_until<F>(&mut self, mut done: F) -> Result<()>
    where
        F: FnMut(&Registry) -> bool,
    {
        if !self.started {
            self.started = true;
            self.registry.connect_auto();
            self.flush();
        }
        let mut ticker = time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            if done(&self.registry) {
                return Ok(());
            }
            if self.shutting_down && self.links.is_empty() {
                info!("all connections closed");
                return Ok(());
            }
            let wakeup = self.wait(&mut ticker).await;
            match wakeup {
                Wakeup::Input(input) => self.handle_input(input),
                Wakeup::Request(Request::Run(f)) => f(&mut self.registry),
                Wakeup::Request(Request::Shutdown(reason)) => {
                    info!("shutting down");
                    self.shutting_down = true;
                    self.registry.shutdown(reason.as_deref());
                }
                Wakeup::Tick => self.registry.timer(),
            }
            self.flush();
        }
    }

    async fn wait(&mut self, ticker: &mut Interval) -> Wakeup {
        tokio::select! {
            Some(input) = self.input_rx.recv() => Wakeup::Input(input),
            Some(request) = self.request_rx.recv() => Wakeup::Request(request),
            _ = ticker.tick() => Wakeup::Tick,
        }
    }

    fn is_current(&self, server: &str, id: u64) -> bool {
        self.links.get(server).map_or(false, |link| link.id == id)
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Opened { server, id, view } => {
                if !self.is_current(&server, id) {
                    return;
                }
                if let Some(view) = view {
                    self.views.insert(server.clone(), view);
                }
                if let Some(session) = self.registry.search_mut(&server) {
                    session.connected();
                }
            }
            Input::Failed { server, id, reason } => {
                if !self.is_current(&server, id) {
                    return;
                }
                self.links.remove(&server);
                warn!("[{}] connection failed: {}", server, reason);
                if let Some(session) = self.registry.search_mut(&server) {
                    session.connect_failed(&reason);
                }
            }
            Input::Line { server, id, line } => {
                if !self.is_current(&server, id) {
                    return;
                }
                if let Some(session) = self.registry.search_mut(&server) {
                    session.recv_line(&line);
                }
            }
            Input::Closed { server, id, error } => {
                if !self.is_current(&server, id) {
                    return;
                }
                self.links.remove(&server);
                match error {
                    Some(error) => warn!("[{}] connection lost: {}", server, error),
                    None => info!("[{}] connection closed by peer", server),
                }
                if let Some(session) = self.registry.search_mut(&server) {
                    session.socket_closed();
                }
            }
        }
    }

    /// Carries out the actions the sessions asked for.
    pub fn flush(&mut self) {
        for (server, action) in self.registry.take_actions() {
            match action {
                Action::Connect {
                    address,
                    port,
                    tls,
                    ipv6,
                } => {
                    let config = match self.registry.search(&server) {
                        Some(session) => session.config().clone(),
                        None => continue,
                    };
                    self.open(config, address, port, tls, ipv6);
                }
                Action::Send(line) => match self.links.get(&server) {
                    Some(link) => {
                        if link.outgoing.send(line).is_err() {
                            debug!("[{}] connection task is gone", server);
                        }
                    }
                    None => warn!("[{}] no connection to send on: {}", server, line),
                },
                Action::Close => {
                    if self.links.remove(&server).is_some() {
                        debug!("[{}] closing connection", server);
                    }
                }
            }
        }
    }

    fn open(&mut self, config: ServerConfig, address: String, port: u16, tls: bool, ipv6: bool) {
        self.next_id += 1;
        let id = self.next_id;
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let server = config.name.clone();
        self.links.insert(server.clone(), Link { id, outgoing });
        let inputs = self.input_tx.clone();
        debug!("[{}] opening connection {} to {}:{}", server, id, address, port);
        tokio::spawn(async move {
            let conn = match Connection::new(&config, &address, port, tls, ipv6).await {
                Ok(conn) => conn,
                Err(e) => {
                    let reason = e.to_string();
                    let _ = inputs.send(Input::Failed { server, id, reason });
                    return;
                }
            };
            let view = conn.log_view();
            if inputs
                .send(Input::Opened {
                    server: server.clone(),
                    id,
                    view,
                })
                .is_err()
            {
                return;
            }
            pump(conn, server, id, outgoing_rx, inputs).await;
        });
    }
}

// Moves lines between a connection and the driver until either side closes. A mock
// connection stays open once its canned input is exhausted.
async fn pump(
    mut conn: Connection,
    server: String,
    id: u64,
    mut outgoing: UnboundedReceiver<String>,
    inputs: UnboundedSender<Input>,
) {
    let mock = conn.log_view().is_some();
    let mut reading = true;
    let error = loop {
        tokio::select! {
            line = conn.next(), if reading => match line {
                Some(Ok(line)) => {
                    let input = Input::Line { server: server.clone(), id, line };
                    if inputs.send(input).is_err() {
                        return;
                    }
                }
                Some(Err(e)) => break Some(e.to_string()),
                None if mock => reading = false,
                None => break None,
            },
            line = outgoing.recv() => match line {
                Some(line) => {
                    if let Err(e) = conn.send(line).await {
                        break Some(e.to_string());
                    }
                }
                None => {
                    if let Err(e) = conn.close().await {
                        debug!("[{}] close: {}", server, e);
                    }
                    return;
                }
            },
        }
    };
    let _ = inputs.send(Input::Closed { server, id, error });
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::Client;
    use crate::client::data::{Config, ServerConfig};
    use crate::client::transport::LogView;
    use crate::client::ui::MemoryUi;

    fn mock_config(initial: &str) -> Config {
        Config {
            servers: Some(vec![ServerConfig {
                name: "mock".to_owned(),
                addresses: Some(vec!["irc.test.net/6667".to_owned()]),
                nicks: Some(vec!["test".to_owned()]),
                realname: Some("Testing.".to_owned()),
                autoconnect: Some(true),
                autojoin: Some("#rust".to_owned()),
                anti_flood_prio_high: Some(0),
                use_mock_connection: Some(true),
                mock_initial_value: Some(initial.to_owned()),
                ..ServerConfig::default()
            }]),
            ..Config::default()
        }
    }

    async fn wait_sent(view: &LogView, line: &str) {
        let search = async {
            while !view.sent().iter().any(|l| l == line) {
                sleep(Duration::from_millis(5)).await;
            }
        };
        if timeout(Duration::from_secs(5), search).await.is_err() {
            panic!("{:?} never sent, got {:?}", line, *view.sent());
        }
    }

    async fn registered_client() -> Client {
        let welcome = ":irc.test.net 001 test :Welcome to the test network\r\n";
        let mut client = Client::from_config(mock_config(welcome), MemoryUi::new()).unwrap();
        let run = client.run_until(|r| r.search("mock").map_or(false, |s| s.is_connected()));
        timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
        client
    }

    #[tokio::test]
    async fn logs_in_and_autojoins() {
        let client = registered_client().await;
        let view = client.log_view("mock").unwrap();
        wait_sent(&view, "NICK test").await;
        wait_sent(&view, "JOIN #rust").await;
        assert_eq!(view.received().len(), 1);
        assert_eq!(client.registry().search("mock").unwrap().nick(), Some("test"));
    }

    #[tokio::test]
    async fn commands_run_in_the_driver() {
        let mut client = registered_client().await;
        let view = client.log_view("mock").unwrap();
        let sender = client.sender();
        sender
            .command("mock", |server| {
                server.privmsg("#rust", "hello").unwrap();
            })
            .unwrap();
        sender.shutdown(Some("bye".to_owned())).unwrap();
        timeout(Duration::from_secs(5), client.run()).await.unwrap().unwrap();
        wait_sent(&view, "PRIVMSG #rust :hello").await;
        wait_sent(&view, "QUIT :bye").await;
        assert!(client.registry().all_disconnected());
    }
}
