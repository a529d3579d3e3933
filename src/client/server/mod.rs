//! The session with one IRC server: connection lifecycle, registration, outgoing queues,
//! reconnection and the state of its channels.
//!
//! A `Server` does no I/O itself. The driver feeds it received lines (`recv_line`), transport
//! events (`connected`, `connect_failed`, `socket_closed`) and a timer tick once a second, and
//! executes the `Action`s it hands back: lines to write, connections to open or close.
use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::client::context::Context;
use crate::client::data::{Channel, PrefixTable, ServerConfig};
use crate::client::data::raw::RawFlags;
use crate::client::event::{Event, SessionState};
use crate::client::outqueue::{OutMessage, OutQueue, Priority};
use crate::client::redirect::Redirects;
use crate::client::ui::{BufferId, BufferKind};
use crate::error::{Error, Result};
use crate::proto::split::{split_lines, split_text, text_budget};
use crate::proto::{CaseMapping, ISupport};

pub use self::negotiate::CapFlags;
pub use self::notify::Notify;

mod batch;
mod channels;
mod command;
mod ctcp;
#[cfg(test)]
pub(crate) mod fixture;
mod negotiate;
mod notify;
mod protocol;
mod redirect;
pub(crate) mod snapshot;

/// Default nickname when none is configured.
pub const DEFAULT_NICK: &str = "irc-session";

/// Interval of the stale data purge, in seconds.
const DATA_PURGE_INTERVAL: i64 = 600;

/// What the driver must do for a session, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Open a connection.
    Connect {
        /// Host name or address.
        address: String,
        /// Port.
        port: u16,
        /// Whether to use TLS.
        tls: bool,
        /// Whether IPv6 may be used.
        ipv6: bool,
    },
    /// Write a line (without line ending).
    Send(String),
    /// Close the connection.
    Close,
}

/// One IRC server session.
pub struct Server {
    name: String,
    config: ServerConfig,
    ctx: Context,
    state: SessionState,
    buffer: Option<BufferId>,

    index_current_address: usize,
    current_address: Option<String>,
    current_port: u16,

    nick: Option<String>,
    nick_first_tried: Option<usize>,
    nick_alternate_number: Option<u32>,
    nick_modes: Option<String>,
    host: Option<String>,
    isupport: ISupport,
    prefix: PrefixTable,

    cap_ls: BTreeMap<String, Option<String>>,
    cap_list: BTreeMap<String, Option<String>>,
    checking_cap_ls: bool,
    checking_cap_list: bool,
    caps: CapFlags,
    sasl_temp_username: Option<String>,
    sasl_temp_password: Option<String>,
    sasl_deadline: Option<DateTime<Utc>>,
    authenticated: bool,

    connection_deadline: Option<DateTime<Utc>>,
    is_away: bool,
    away_message: Option<String>,
    away_time: Option<DateTime<Utc>>,
    lag: i64,
    lag_check_time: Option<DateTime<Utc>>,
    lag_next_check: Option<DateTime<Utc>>,
    reconnect_delay: i64,
    reconnect_start: Option<DateTime<Utc>>,
    command_time: Option<DateTime<Utc>>,
    reconnect_join: bool,
    disable_autojoin: bool,

    outqueue: OutQueue,
    actions: VecDeque<Action>,
    channels: Vec<Channel>,
    join_manual: HashMap<String, DateTime<Utc>>,
    join_channel_key: HashMap<String, String>,
    join_noswitch: HashMap<String, DateTime<Utc>>,
    redirects: Redirects,
    batches: Vec<batch::Batch>,
    notify: Vec<Notify>,
    monitor_time: Option<DateTime<Utc>>,
    notify_check_time: Option<DateTime<Utc>>,
    notify_whois_time: Option<DateTime<Utc>>,
    last_away_check: Option<DateTime<Utc>>,
    last_data_purge: Option<DateTime<Utc>>,
}

impl Server {
    /// Creates a disconnected session.
    pub fn new(ctx: Context, config: ServerConfig) -> Server {
        let outqueue = OutQueue::new(config.anti_flood_prio_high(), config.anti_flood_prio_low());
        let notify = notify::parse_notify(&config.notify());
        Server {
            name: config.name.clone(),
            config,
            ctx,
            state: SessionState::Disconnected,
            buffer: None,
            index_current_address: 0,
            current_address: None,
            current_port: 0,
            nick: None,
            nick_first_tried: None,
            nick_alternate_number: None,
            nick_modes: None,
            host: None,
            isupport: ISupport::new(),
            prefix: PrefixTable::default(),
            cap_ls: BTreeMap::new(),
            cap_list: BTreeMap::new(),
            checking_cap_ls: false,
            checking_cap_list: false,
            caps: CapFlags::default(),
            sasl_temp_username: None,
            sasl_temp_password: None,
            sasl_deadline: None,
            authenticated: false,
            connection_deadline: None,
            is_away: false,
            away_message: None,
            away_time: None,
            lag: 0,
            lag_check_time: None,
            lag_next_check: None,
            reconnect_delay: 0,
            reconnect_start: None,
            command_time: None,
            reconnect_join: false,
            disable_autojoin: false,
            outqueue,
            actions: VecDeque::new(),
            channels: Vec::new(),
            join_manual: HashMap::new(),
            join_channel_key: HashMap::new(),
            join_noswitch: HashMap::new(),
            redirects: Redirects::new(),
            batches: Vec::new(),
            notify,
            monitor_time: None,
            notify_check_time: None,
            notify_whois_time: None,
            last_away_check: None,
            last_data_purge: None,
        }
    }

    // Accessors

    /// The server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The server options.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the server welcomed us (`001` received).
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Registered
    }

    /// The server buffer.
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// Our current nickname.
    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// Our user modes, like `iw`.
    pub fn nick_modes(&self) -> Option<&str> {
        self.nick_modes.as_deref()
    }

    /// Our `user@host`, as seen by the server.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The `005` features.
    pub fn isupport(&self) -> &ISupport {
        &self.isupport
    }

    /// The casemapping of nicks and channels.
    pub fn casemapping(&self) -> CaseMapping {
        self.isupport.casemapping()
    }

    /// The prefix modes.
    pub fn prefix(&self) -> &PrefixTable {
        &self.prefix
    }

    /// The address in use, as `(host, port)`.
    pub fn current_address(&self) -> Option<(&str, u16)> {
        self.current_address.as_deref().map(|a| (a, self.current_port))
    }

    /// Index of the address in use in the configured list.
    pub fn index_current_address(&self) -> usize {
        self.index_current_address
    }

    /// Capabilities offered by the server.
    pub fn cap_ls(&self) -> &BTreeMap<String, Option<String>> {
        &self.cap_ls
    }

    /// Capabilities enabled.
    pub fn cap_list(&self) -> &BTreeMap<String, Option<String>> {
        &self.cap_list
    }

    /// The enabled capabilities as flags.
    pub fn caps(&self) -> CapFlags {
        self.caps
    }

    /// Whether SASL authentication succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether we are away.
    pub fn is_away(&self) -> bool {
        self.is_away
    }

    /// Our away message.
    pub fn away_message(&self) -> Option<&str> {
        self.away_message.as_deref()
    }

    /// The last measured lag, in milliseconds.
    pub fn lag(&self) -> i64 {
        self.lag
    }

    /// The delay of the pending (or last) reconnection, in seconds.
    pub fn reconnect_delay(&self) -> i64 {
        self.reconnect_delay
    }

    /// When the pending reconnection was scheduled.
    pub fn reconnect_start(&self) -> Option<DateTime<Utc>> {
        self.reconnect_start
    }

    /// The flood-controlled queues.
    pub fn outqueue(&self) -> &OutQueue {
        &self.outqueue
    }

    /// The redirects of this server.
    pub fn redirects(&self) -> &Redirects {
        &self.redirects
    }

    /// The notify list.
    pub fn notify_list(&self) -> &[Notify] {
        &self.notify
    }

    /// The channels and private conversations, in creation order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Hands the pending actions over to the driver.
    pub fn take_actions(&mut self) -> Vec<Action> {
        self.actions.drain(..).collect()
    }

    // Printing

    /// Prints a line in the server buffer.
    pub(crate) fn print(&self, tags: &[&str], message: &str) {
        self.ctx.print(self.buffer, tags, message);
    }

    /// Prints an error in the server buffer.
    pub(crate) fn print_error(&self, message: &str) {
        self.ctx.print(self.buffer, &[], &format!("=!= {}", message));
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("[{}] {:?} -> {:?}", self.name, self.state, state);
            self.state = state;
            self.ctx.emit(Event::StateChanged {
                server: self.name.clone(),
                state,
            });
        }
    }

    // Buffer

    /// Name of the server buffer.
    pub fn buffer_name(&self) -> String {
        format!("server.{}", self.name)
    }

    /// Creates the server buffer if needed.
    pub fn create_buffer(&mut self) -> Option<BufferId> {
        if self.buffer.is_none() {
            let name = self.buffer_name();
            self.buffer = self.ctx.ui.lock().buffer_new(&name, BufferKind::Server);
        }
        self.buffer
    }

    /// Renames the session and the buffers it owns.
    pub(crate) fn rename(&mut self, name: &str) {
        let old_prefix = format!("{}.", self.name);
        self.name = name.to_owned();
        self.config.name = name.to_owned();
        let server_buffer = self.buffer_name();
        {
            let mut ui = self.ctx.ui.lock();
            if let Some(buffer) = self.buffer {
                ui.buffer_set(buffer, "name", &server_buffer);
                ui.buffer_set(buffer, "short_name", name);
                ui.buffer_set(buffer, "localvar_set_server", name);
            }
            for channel in &self.channels {
                if let Some(buffer) = channel.buffer {
                    ui.buffer_set(buffer, "name", &format!("{}.{}", name, channel.name));
                    ui.buffer_set(buffer, "localvar_set_server", name);
                }
            }
        }
        for buffer in self.ctx.private_buffers.lock().iter_mut() {
            if buffer.starts_with(&old_prefix) {
                *buffer = format!("{}.{}", name, &buffer[old_prefix.len()..]);
            }
        }
    }

    // Connection

    fn set_index_current_address(&mut self, index: usize) {
        let addresses = self.config.addresses();
        self.index_current_address = if index < addresses.len() { index } else { 0 };
        match addresses.into_iter().nth(self.index_current_address) {
            Some((address, port)) => {
                self.current_address = Some(address);
                self.current_port = port;
            }
            None => {
                self.current_address = None;
                self.current_port = 0;
            }
        }
    }

    /// Starts connecting to the current address. Cancels a pending reconnection.
    pub fn connect(&mut self) -> Result<()> {
        if self.state != SessionState::Disconnected {
            self.print_error(&format!("already connected to server \"{}\"!", self.name));
            return Ok(());
        }
        self.reconnect_start = None;
        if self.config.addresses().is_empty() {
            self.print_error(&format!("addresses not defined for server \"{}\"", self.name));
            return Err(Error::NoAddress {
                name: self.name.clone(),
            });
        }
        self.set_index_current_address(self.index_current_address);
        self.create_buffer();
        let (address, port) = match self.current_address.clone() {
            Some(address) => (address, self.current_port),
            None => {
                return Err(Error::NoAddress {
                    name: self.name.clone(),
                })
            }
        };
        let tls = self.config.tls();
        self.print(
            &[],
            &format!(
                "connecting to server {}/{}{}...",
                address,
                port,
                if tls { " (TLS)" } else { "" }
            ),
        );
        self.outqueue
            .set_anti_flood(self.config.anti_flood_prio_high(), self.config.anti_flood_prio_low());
        self.connection_deadline = Some(self.ctx.now() + Duration::seconds(self.config.connection_timeout()));
        self.set_state(SessionState::Connecting);
        self.actions.push_back(Action::Connect {
            address,
            port,
            tls,
            ipv6: self.config.ipv6(),
        });
        Ok(())
    }

    /// The transport is open: logs in.
    pub fn connected(&mut self) {
        if self.state != SessionState::Connecting {
            warn!("[{}] connected while {:?}", self.name, self.state);
            return;
        }
        if let Some((address, port)) = self.current_address() {
            let message = format!("connected to {}/{}", address, port);
            self.print(&[], &message);
        }
        self.set_state(SessionState::Registering);
        self.login();
    }

    /// The transport could not be opened.
    pub fn connect_failed(&mut self, reason: &str) {
        self.print_error(&format!("connection failed: {}", reason));
        self.close_connection();
        self.set_state(SessionState::Disconnected);
        self.switch_address(true);
    }

    /// The connection was closed by the peer or broke.
    pub fn socket_closed(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.print_error("disconnected from server");
        let registered = self.is_connected();
        self.disconnect(!registered, true);
    }

    /// Sends `PASS`, `CAP LS`, `NICK` and `USER`, and arms the connection timeout.
    pub fn login(&mut self) {
        if let Some(password) = self.config.password().filter(|p| !p.is_empty()) {
            let colon = if password.starts_with(':') || password.contains(' ') {
                ":"
            } else {
                ""
            };
            let line = format!("PASS {}{}", colon, password);
            self.send(Priority::Immediate, &line);
        }
        let nicks: Vec<String> = self.config.nicks().iter().map(|n| (*n).to_owned()).collect();
        match self.nick.clone() {
            None => {
                let first = nicks.first().cloned().unwrap_or_else(|| DEFAULT_NICK.to_owned());
                self.set_nick(&first);
                self.nick_first_tried = Some(0);
            }
            Some(nick) => self.nick_first_tried = self.nick_index(&nick),
        }
        self.nick_alternate_number = None;

        if self.config.sasl_requested() || !self.config.capabilities().is_empty() {
            self.checking_cap_ls = true;
            self.send(Priority::Immediate, "CAP LS 302");
        }
        let username = self.config.username().replace(' ', "_");
        let realname = match self.config.realname() {
            "" => username.clone(),
            realname => realname.to_owned(),
        };
        let nick = self.nick.clone().unwrap_or_default();
        self.send(
            Priority::Immediate,
            &format!("NICK {}\nUSER {} 0 * :{}", nick, username, realname),
        );
        self.connection_deadline = Some(self.ctx.now() + Duration::seconds(self.config.connection_timeout()));
    }

    /// Closes the socket and forgets what was in flight. The session state is not changed.
    pub fn close_connection(&mut self) {
        if self.state != SessionState::Disconnected {
            self.actions.push_back(Action::Close);
        }
        self.connection_deadline = None;
        self.sasl_deadline = None;
        self.outqueue.clear();
        self.redirects.clear();
    }

    /// Disconnects. With `switch_address`, the next attempt uses the next address; with
    /// `reconnect`, a reconnection is scheduled if enabled.
    pub fn disconnect(&mut self, switch_address: bool, reconnect: bool) {
        let was_connected = self.state != SessionState::Disconnected;
        if was_connected {
            self.channels_disconnected();
        }
        self.close_connection();
        if was_connected {
            self.print(&[], "disconnected from server");
        }

        self.nick_modes = None;
        self.host = None;
        self.cap_ls.clear();
        self.cap_list.clear();
        self.batches.clear();
        self.checking_cap_ls = false;
        self.checking_cap_list = false;
        self.caps = CapFlags::default();
        self.sasl_temp_username = None;
        self.sasl_temp_password = None;
        self.authenticated = false;
        self.is_away = false;
        self.away_time = None;
        self.lag = 0;
        self.lag_check_time = None;
        self.lag_next_check = None;
        self.command_time = None;
        self.monitor_time = None;
        self.notify_check_time = None;
        self.notify_whois_time = None;
        self.isupport.clear();
        self.prefix = PrefixTable::default();
        for notify in &mut self.notify {
            notify.is_on_server = None;
            notify.away_message = None;
        }

        if switch_address {
            self.switch_address(false);
        } else {
            self.set_index_current_address(0);
        }
        self.set_state(SessionState::Disconnected);

        if reconnect && self.config.autoreconnect() {
            self.reconnect_schedule();
        } else {
            self.reconnect_delay = 0;
            self.reconnect_start = None;
        }
        if !reconnect {
            self.nick = None;
        }
    }

    /// Moves to the next address. With `connection`, connects to it, or schedules a
    /// reconnection after the last one.
    pub fn switch_address(&mut self, connection: bool) {
        let count = self.config.addresses().len();
        if count > 1 {
            self.set_index_current_address((self.index_current_address + 1) % count);
            if let Some((address, port)) = self.current_address() {
                let message = format!("switching address to {}/{}", address, port);
                self.print(&[], &message);
            }
            if connection {
                if self.index_current_address == 0 {
                    self.reconnect_schedule();
                } else if let Err(e) = self.connect() {
                    warn!("[{}] {}", self.name, e);
                }
            }
        } else if connection {
            self.reconnect_schedule();
        }
    }

    /// Schedules the next reconnection, growing the delay.
    pub fn reconnect_schedule(&mut self) {
        if !self.config.autoreconnect() {
            self.reconnect_delay = 0;
            self.reconnect_start = None;
            return;
        }
        let policy = self.ctx.config.reconnect_policy(&self.config);
        self.reconnect_delay = policy.next_delay(self.reconnect_delay);
        self.reconnect_start = Some(self.ctx.now());
        let (minutes, seconds) = (self.reconnect_delay / 60, self.reconnect_delay % 60);
        let message = match (minutes, seconds) {
            (0, s) => format!("reconnecting to server in {} seconds", s),
            (m, 0) => format!("reconnecting to server in {} minutes", m),
            (m, s) => format!("reconnecting to server in {} minutes, {} seconds", m, s),
        };
        self.print(&[], &message);
        info!("[{}] {}", self.name, message);
        self.ctx.emit(Event::ReconnectScheduled {
            server: self.name.clone(),
            delay: self.reconnect_delay,
        });
    }

    /// Reconnects now.
    pub fn reconnect(&mut self) {
        self.print(&[], "reconnecting to server...");
        self.reconnect_start = None;
        if self.connect().is_err() {
            self.reconnect_schedule();
        }
    }

    // Nicks

    fn nick_index(&self, nick: &str) -> Option<usize> {
        self.config.nicks().iter().position(|n| *n == nick)
    }

    /// Changes our nick and the nick of every private buffer title.
    pub(crate) fn set_nick(&mut self, nick: &str) {
        let old = self.nick.replace(nick.to_owned());
        if let Some(old) = old.filter(|old| old != nick) {
            self.ctx.emit(Event::NickChanged {
                server: self.name.clone(),
                old,
                new: nick.to_owned(),
            });
        }
        if let Some(buffer) = self.buffer {
            self.ctx.ui.lock().buffer_set(buffer, "localvar_set_nick", nick);
        }
        let buffers: Vec<BufferId> = self.channels.iter().filter_map(|c| c.buffer).collect();
        let mut ui = self.ctx.ui.lock();
        for buffer in buffers {
            ui.buffer_set(buffer, "localvar_set_nick", nick);
        }
    }

    /// The next nick to try during registration: the configured nicks in turn, then the first
    /// one padded with `_` up to 9 characters, then ending with a number up to 99.
    pub fn get_alternate_nick(&mut self) -> Option<String> {
        let nicks: Vec<String> = self.config.nicks().iter().map(|n| (*n).to_owned()).collect();
        let mut nick = match self.nick_alternate_number {
            None => {
                if !nicks.is_empty() {
                    let index = match self.nick.as_deref().and_then(|n| self.nick_index(n)) {
                        None => 0,
                        Some(index) => {
                            let next = (index + 1) % nicks.len();
                            if next == 0 && self.nick_first_tried.is_none() {
                                self.nick_first_tried = Some(0);
                            }
                            next
                        }
                    };
                    if Some(index) != self.nick_first_tried {
                        return Some(nicks[index].clone());
                    }
                }
                if !self.config.nicks_alternate() {
                    return None;
                }
                self.nick_alternate_number = Some(0);
                nicks.first().cloned().unwrap_or_else(|| DEFAULT_NICK.to_owned())
            }
            Some(_) => self.nick.clone().unwrap_or_default(),
        };

        if nick.chars().count() < 9 {
            nick.push('_');
            return Some(nick);
        }

        let number = self.nick_alternate_number.unwrap_or(0) + 1;
        self.nick_alternate_number = Some(number);
        if number > 99 {
            return None;
        }
        let mut chars: Vec<char> = nick.chars().take(9).collect();
        let digits: Vec<char> = number.to_string().chars().collect();
        if digits.len() > chars.len() {
            return None;
        }
        let start = chars.len() - digits.len();
        chars[start..].copy_from_slice(&digits);
        Some(chars.into_iter().collect())
    }

    // Sending

    fn source_len(&self) -> usize {
        let nick = self.nick.as_ref().map_or(0, |n| n.len());
        let host = self
            .host
            .as_ref()
            .map_or(1 + self.config.username().len() + 1 + 63, |h| h.len());
        nick + 1 + host
    }

    /// Splits a logical line on newlines, and long `PRIVMSG`/`NOTICE` texts so that every wire
    /// line fits.
    pub fn split_message(&self, text: &str) -> Vec<String> {
        let mut lines = vec![];
        for line in split_lines(text) {
            let mut words = line.splitn(3, ' ');
            let command = words.next().unwrap_or_default();
            let target = words.next();
            let rest = words.next();
            let is_text = command.eq_ignore_ascii_case("PRIVMSG") || command.eq_ignore_ascii_case("NOTICE");
            match (is_text, target, rest) {
                (true, Some(target), Some(rest)) => {
                    let body = rest.strip_prefix(':').unwrap_or(rest);
                    let budget = text_budget(command, target, self.source_len());
                    for chunk in split_text(body, budget) {
                        lines.push(format!("{} {} :{}", command, target, chunk));
                    }
                }
                _ => lines.push(line.to_owned()),
            }
        }
        lines
    }

    /// Sends one or more lines at a priority. The first line carries the next available
    /// redirect. Returns the lines as composed for the wire.
    pub fn send(&mut self, priority: Priority, text: &str) -> Vec<String> {
        let lines = self.split_message(text);
        let mut redirect = self.redirects.available();
        for line in &lines {
            self.queue(priority, line, redirect.take());
        }
        lines
    }

    fn queue(&mut self, priority: Priority, line: &str, redirect: Option<u64>) {
        if let Some(id) = redirect {
            self.redirects.assign(id);
        }
        let now = self.ctx.now();
        let message = OutMessage {
            command: line
                .split(' ')
                .find(|word| !word.starts_with('@'))
                .unwrap_or_default()
                .to_ascii_uppercase(),
            line: line.to_owned(),
            redirect,
            queued_at: now,
        };
        if let Some(message) = self.outqueue.push(priority, message, now) {
            self.write_now(message);
        }
    }

    fn write_now(&mut self, message: OutMessage) {
        let now = self.ctx.now();
        if let Some(id) = message.redirect {
            self.redirects.start(id, &message.line, now);
        }
        trace!("[{}] [SENT] {}", self.name, message.line);
        self.ctx.raw.lock().add(now, &self.name, RawFlags::send(), &message.line);
        self.ctx.emit(Event::Message {
            server: self.name.clone(),
            incoming: false,
            line: message.line.clone(),
        });
        self.actions.push_back(Action::Send(message.line));
    }

    // Timer

    /// Runs everything that depends on time. Called once a second by the driver.
    pub fn timer(&mut self) {
        let now = self.ctx.now();
        if self.state == SessionState::Disconnected {
            let due = self
                .reconnect_start
                .map_or(false, |start| now >= start + Duration::seconds(self.reconnect_delay));
            if due {
                self.reconnect();
            }
            return;
        }

        if self.connection_deadline.map_or(false, |deadline| now >= deadline) {
            self.connection_deadline = None;
            self.print_error(&Error::ConnectionTimeout.to_string());
            let registered = self.is_connected();
            self.disconnect(!registered, true);
            return;
        }
        if self.sasl_deadline.map_or(false, |deadline| now >= deadline) {
            self.sasl_deadline = None;
            self.sasl_timeout();
            if self.state == SessionState::Disconnected {
                return;
            }
        }

        while let Some(message) = self.outqueue.pop_ready(now) {
            self.write_now(message);
        }

        for done in self.redirects.check_timeouts(now) {
            self.redirect_finished(done);
        }

        if !self.is_connected() {
            return;
        }

        let lag_check = self.ctx.config.lag_check();
        let lag_due = self.lag_next_check.map_or(false, |next| now >= next);
        if lag_check > 0 && self.lag_check_time.is_none() && lag_due {
            let address = self.current_address.clone().unwrap_or_else(|| self.name.clone());
            self.send(Priority::Immediate, &format!("PING {}", address));
            self.lag_check_time = Some(now);
            self.lag = 0;
        } else {
            let away_check = self.config.away_check();
            let away_due = self
                .last_away_check
                .map_or(true, |last| now >= last + Duration::minutes(away_check));
            if !self.caps.away_notify && away_check > 0 && away_due {
                self.check_away();
            }
        }

        if let Some(time) = self.command_time {
            if now >= time + Duration::seconds(self.config.command_delay()) {
                self.command_time = None;
                self.autojoin_channels();
            }
        }

        if self.monitor_time.map_or(false, |time| now >= time) {
            self.monitor_time = None;
            if self.isupport.monitor().is_some() {
                self.notify_send_monitor();
            }
        }
        self.notify_timer(now);

        if let Some(check) = self.lag_check_time {
            self.lag = (now - check).num_milliseconds();
            let lag_reconnect = self.ctx.config.lag_reconnect();
            let lag_max = self.ctx.config.lag_max();
            if lag_reconnect > 0 && self.lag >= lag_reconnect * 1000 {
                self.print_error(&format!(
                    "lag is high, reconnecting to server {}",
                    self.name
                ));
                self.disconnect(false, true);
                return;
            } else if lag_max > 0 && self.lag >= lag_max * 1000 {
                self.lag_check_time = None;
                self.lag_next_check = Some(now + Duration::seconds(lag_check));
            }
        }

        self.autorejoin_due(now);

        let purge_due = self
            .last_data_purge
            .map_or(true, |last| now >= last + Duration::seconds(DATA_PURGE_INTERVAL));
        if purge_due {
            self.purge_data(now);
        }
    }

    // Forgets manual join and switch markers older than 10 minutes, and old filtered joins.
    fn purge_data(&mut self, now: DateTime<Utc>) {
        self.last_data_purge = Some(now);
        let limit = now - Duration::seconds(DATA_PURGE_INTERVAL);
        self.join_manual.retain(|_, time| *time >= limit);
        self.join_noswitch.retain(|_, time| *time >= limit);
        let unmask = self.ctx.config.smart_filter_join_unmask();
        let delay = self.ctx.config.smart_filter_delay();
        for channel in &mut self.channels {
            channel.join_smart_filtered_remove_old(now, unmask);
            channel.nick_speaking_time_remove_old(now, delay);
        }
    }

    /// Shuts the session down: quits if connected, and never reconnects.
    pub fn shutdown(&mut self, reason: Option<&str>) {
        if self.state != SessionState::Disconnected {
            self.quit(reason);
        }
        self.disconnect(false, false);
    }
}

#[cfg(test)]
mod test {
    use super::fixture::{test_config, Harness};
    use super::Action;
    use crate::client::data::ServerConfig;
    use crate::client::event::{Event, SessionState};
    use crate::error::Error;

    #[test]
    fn connect_and_login() {
        let mut config = test_config();
        config.capabilities = Some("multi-prefix".into());
        let mut h = Harness::new(config);
        h.server.connect().unwrap();
        assert_eq!(
            h.server.take_actions(),
            vec![Action::Connect {
                address: "irc.test.net".into(),
                port: 6667,
                tls: false,
                ipv6: true,
            }]
        );
        assert_eq!(h.server.state(), SessionState::Connecting);
        h.server.connected();
        assert_eq!(h.server.state(), SessionState::Registering);
        assert_eq!(h.sent(), "CAP LS 302\r\nNICK test\r\nUSER test 0 * :Testing.\r\n");
    }

    #[test]
    fn login_with_password() {
        let mut config = test_config();
        config.password = Some("sec ret".into());
        let mut h = Harness::new(config);
        h.connect();
        assert_eq!(
            h.sent(),
            "PASS :sec ret\r\nCAP LS 302\r\nNICK test\r\nUSER test 0 * :Testing.\r\n"
        );
    }

    #[test]
    fn no_address() {
        let mut h = Harness::new(ServerConfig {
            addresses: None,
            ..test_config()
        });
        match h.server.connect() {
            Err(Error::NoAddress { name }) => assert_eq!(name, "test"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn welcome_registers() {
        let mut h = Harness::new(test_config());
        h.connect();
        h.sent();
        h.recv(":irc.test.net 001 test :Welcome");
        assert!(h.server.is_connected());
        assert_eq!(h.server.nick(), Some("test"));
        assert!(h.events().contains(&Event::StateChanged {
            server: "test".into(),
            state: SessionState::Registered,
        }));
    }

    #[test]
    fn alternate_nicks() {
        let mut config = test_config();
        config.nicks = Some(vec!["alice".into(), "bob".into()]);
        let mut h = Harness::new(config);
        h.connect();
        h.sent();
        h.recv(":irc.test.net 433 * alice :Nickname is already in use");
        assert_eq!(h.sent(), "NICK bob\r\n");
        h.recv(":irc.test.net 433 * bob :Nickname is already in use");
        assert_eq!(h.sent(), "NICK alice_\r\n");
        h.recv(":irc.test.net 433 * alice_ :Nickname is already in use");
        assert_eq!(h.sent(), "NICK alice__\r\n");
        assert_eq!(h.server.nick(), Some("alice__"));
    }

    #[test]
    fn alternate_nick_numbers() {
        let mut config = test_config();
        config.nicks = Some(vec!["verylongnick".into()]);
        let mut h = Harness::new(config);
        h.connect();
        h.sent();
        h.recv(":irc.test.net 433 * verylongnick :in use");
        assert_eq!(h.sent(), "NICK verylong1\r\n");
        h.recv(":irc.test.net 433 * verylong1 :in use");
        assert_eq!(h.sent(), "NICK verylong2\r\n");
    }

    #[test]
    fn nicks_exhausted_without_alternates() {
        let mut config = test_config();
        config.nicks_alternate = Some(false);
        let mut h = Harness::new(config);
        h.connect();
        h.sent();
        h.recv(":irc.test.net 433 * test :in use");
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert!(h.server.reconnect_start().is_some());
    }

    #[test]
    fn connection_timeout() {
        let mut config = test_config();
        config.connection_timeout = Some(30);
        let mut h = Harness::new(config);
        h.connect();
        h.sent();
        h.clock.advance(29);
        h.server.timer();
        assert_eq!(h.server.state(), SessionState::Registering);
        h.clock.advance(1);
        h.server.timer();
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert_eq!(h.server.reconnect_delay(), 10);
    }

    #[test]
    fn connect_failure_switches_address() {
        let mut config = test_config();
        config.addresses = Some(vec!["a.test.net/6667".into(), "b.test.net/7000".into()]);
        let mut h = Harness::new(config);
        h.server.connect().unwrap();
        h.server.take_actions();
        h.server.connect_failed("refused");
        assert_eq!(h.server.current_address(), Some(("b.test.net", 7000)));
        assert_eq!(h.server.state(), SessionState::Connecting);
        h.server.take_actions();
        h.server.connect_failed("refused");
        assert_eq!(h.server.current_address(), Some(("a.test.net", 6667)));
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert_eq!(h.server.reconnect_delay(), 10);
    }

    #[test]
    fn reconnect_is_timer_driven() {
        let mut h = Harness::new(test_config());
        h.register();
        h.server.socket_closed();
        assert_eq!(h.server.reconnect_delay(), 10);
        h.server.take_actions();
        h.clock.advance(9);
        h.server.timer();
        assert!(h.server.take_actions().is_empty());
        h.clock.advance(1);
        h.server.timer();
        assert_eq!(h.server.state(), SessionState::Connecting);
    }

    #[test]
    fn no_reconnect_when_disabled() {
        let mut config = test_config();
        config.autoreconnect = Some(false);
        let mut h = Harness::new(config);
        h.register();
        h.server.socket_closed();
        assert_eq!(h.server.reconnect_start(), None);
        assert_eq!(h.server.reconnect_delay(), 0);
    }

    #[test]
    fn long_messages_are_split() {
        let mut h = Harness::new(test_config());
        h.register();
        let text = "word ".repeat(200);
        let lines = h.server.split_message(&format!("PRIVMSG #test :{}", text.trim_end()));
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.starts_with("PRIVMSG #test :"));
            assert!(line.len() + 2 <= 512);
        }
        let lines = h.server.split_message("JOIN #a\nJOIN #b");
        assert_eq!(lines, vec!["JOIN #a", "JOIN #b"]);
    }

    #[test]
    fn lag_check_and_pong() {
        let mut h = Harness::new(test_config());
        h.register();
        h.sent();
        h.clock.advance(60);
        h.server.timer();
        assert_eq!(h.sent(), "PING irc.test.net\r\n");
        h.clock.advance(2);
        h.recv(":irc.test.net PONG irc.test.net :irc.test.net");
        assert_eq!(h.server.lag(), 2000);
    }

    #[test]
    fn high_lag_reconnects() {
        let mut h = Harness::new(test_config());
        h.register();
        h.clock.advance(60);
        h.server.timer();
        h.clock.advance(300);
        h.server.timer();
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert!(h.server.reconnect_start().is_some());
    }

    #[test]
    fn raw_log_records_both_directions() {
        let mut h = Harness::new(test_config());
        h.register();
        let raw = h.server.context().raw.lock();
        let sent: Vec<_> = raw.messages().filter(|m| m.flags.send).map(|m| m.message.as_str()).collect();
        assert_eq!(&sent[..3], &["CAP LS 302", "NICK test", "USER test 0 * :Testing."]);
        assert!(raw.messages().any(|m| m.flags.recv && m.message.contains(" 001 ")));
    }
}
