//! Upgrade snapshots: the state of every session written as JSON lines, one typed record per
//! line, and read back into new sessions.
//!
//! A line is `{"type":N,"data":{...}}`. Channels, notify entries and redirects belong to the last
//! server read before them, nicks and modelists to the last channel, and modelist items to the
//! last modelist. Records of an unknown type are skipped, so that older readers accept newer
//! snapshots.
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Server;
use crate::client::context::Context;
use crate::client::data::modelist::{ModelistItem, ModelistState};
use crate::client::data::raw::RawMessage;
use crate::client::data::{Channel, Nick, PrefixTable, ServerConfig};
use crate::client::event::{ChannelKind, SessionState};
use crate::client::redirect::{Redirect, RedirectPattern};
use crate::client::server::Notify;
use crate::error::{Error, Result};
use crate::proto::ISupport;

/// Record type tags. They are part of the snapshot format and never change.
pub mod tag {
    /// A server session.
    pub const SERVER: u32 = 0;
    /// A channel or private conversation.
    pub const CHANNEL: u32 = 1;
    /// A nick of a channel.
    pub const NICK: u32 = 2;
    /// A line of the raw log.
    pub const RAW_MESSAGE: u32 = 3;
    /// A redirect pattern.
    pub const REDIRECT_PATTERN: u32 = 4;
    /// A pending redirect.
    pub const REDIRECT: u32 = 5;
    /// A notify list entry.
    pub const NOTIFY: u32 = 6;
    /// A modelist of a channel.
    pub const MODELIST: u32 = 7;
    /// An item of a modelist.
    pub const MODELIST_ITEM: u32 = 8;
}

#[derive(Serialize, Deserialize)]
struct Record<T> {
    #[serde(rename = "type")]
    kind: u32,
    data: T,
}

#[derive(Serialize, Deserialize)]
struct ServerRecord {
    config: ServerConfig,
    connected: bool,
    has_buffer: bool,
    index_current_address: usize,
    nick: Option<String>,
    nick_modes: Option<String>,
    host: Option<String>,
    isupport: String,
    cap_ls: BTreeMap<String, Option<String>>,
    cap_list: BTreeMap<String, Option<String>>,
    authenticated: bool,
    is_away: bool,
    away_message: Option<String>,
    away_time: Option<DateTime<Utc>>,
    lag: i64,
    reconnect_delay: i64,
    reconnect_start: Option<DateTime<Utc>>,
    #[serde(default)]
    join_channel_key: HashMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct ChannelRecord {
    kind: ChannelKind,
    name: String,
    has_buffer: bool,
    topic: Option<String>,
    modes: Option<String>,
    limit: u32,
    key: Option<String>,
    join_msg_received: Vec<String>,
    away_message: Option<String>,
    has_quit_server: bool,
    cycle: bool,
    part: bool,
    pv_remote_nick_color: Option<String>,
    autorejoin_at: Option<DateTime<Utc>>,
    nicks_speaking: Vec<String>,
    nicks_speaking_highlight: Vec<String>,
    nicks_speaking_time: Vec<(String, DateTime<Utc>)>,
    join_smart_filtered: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
struct NickRecord {
    name: String,
    host: Option<String>,
    prefixes: String,
    away: bool,
    account: Option<String>,
    realname: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ModelistRecord {
    mode: char,
    state: ModelistState,
}

struct Writer<W> {
    inner: W,
    line: usize,
}

impl<W: Write> Writer<W> {
    fn record<T: Serialize>(&mut self, kind: u32, data: T) -> Result<()> {
        self.line += 1;
        let line = serde_json::to_string(&Record { kind, data }).map_err(|cause| Error::Snapshot {
            line: self.line,
            cause,
        })?;
        writeln!(self.inner, "{}", line)?;
        Ok(())
    }
}

impl Server {
    fn write_snapshot<W: Write>(&self, out: &mut Writer<W>) -> Result<()> {
        out.record(
            tag::SERVER,
            ServerRecord {
                config: self.config.clone(),
                connected: self.state != SessionState::Disconnected,
                has_buffer: self.buffer.is_some(),
                index_current_address: self.index_current_address,
                nick: self.nick.clone(),
                nick_modes: self.nick_modes.clone(),
                host: self.host.clone(),
                isupport: self.isupport.to_line(),
                cap_ls: self.cap_ls.clone(),
                cap_list: self.cap_list.clone(),
                authenticated: self.authenticated,
                is_away: self.is_away,
                away_message: self.away_message.clone(),
                away_time: self.away_time,
                lag: self.lag,
                reconnect_delay: self.reconnect_delay,
                reconnect_start: self.reconnect_start,
                join_channel_key: self.join_channel_key.clone(),
            },
        )?;
        for channel in &self.channels {
            out.record(tag::CHANNEL, self.channel_record(channel))?;
            for nick in channel.nicks() {
                out.record(
                    tag::NICK,
                    NickRecord {
                        name: nick.name.clone(),
                        host: nick.host.clone(),
                        prefixes: nick.prefixes.clone(),
                        away: nick.away,
                        account: nick.account.clone(),
                        realname: nick.realname.clone(),
                    },
                )?;
            }
            for list in channel.modelists() {
                let state = list.state();
                out.record(tag::MODELIST, ModelistRecord { mode: list.mode(), state })?;
                for item in list.items() {
                    out.record(tag::MODELIST_ITEM, item)?;
                }
            }
        }
        for notify in &self.notify {
            out.record(tag::NOTIFY, notify)?;
        }
        for redirect in self.redirects.iter() {
            out.record(tag::REDIRECT, redirect)?;
        }
        Ok(())
    }

    fn channel_record(&self, channel: &Channel) -> ChannelRecord {
        ChannelRecord {
            kind: channel.kind,
            name: channel.name.clone(),
            has_buffer: channel.buffer.is_some(),
            topic: channel.topic.clone(),
            modes: channel.modes.clone(),
            limit: channel.limit,
            key: channel.key.clone(),
            join_msg_received: channel.join_msg_received.iter().cloned().collect(),
            away_message: channel.away_message.clone(),
            has_quit_server: channel.has_quit_server,
            cycle: channel.cycle,
            part: channel.part,
            pv_remote_nick_color: channel.pv_remote_nick_color.clone(),
            autorejoin_at: channel.autorejoin_at,
            nicks_speaking: channel.nicks_speaking(false).iter().cloned().collect(),
            nicks_speaking_highlight: channel.nicks_speaking(true).iter().cloned().collect(),
            nicks_speaking_time: channel
                .nicks_speaking_time()
                .iter()
                .map(|s| (s.nick.clone(), s.time))
                .collect(),
            join_smart_filtered: channel
                .join_smart_filtered()
                .iter()
                .map(|(nick, time)| (nick.clone(), *time))
                .collect(),
        }
    }

    // A session as it was saved. A session that was connected comes back disconnected, with its
    // channels to rejoin and a reconnection due at once.
    fn from_record(ctx: &Context, record: ServerRecord) -> Server {
        let mut server = Server::new(ctx.clone(), record.config);
        if record.has_buffer {
            server.create_buffer();
        }
        server.set_index_current_address(record.index_current_address);
        server.nick = record.nick;
        server.nick_modes = record.nick_modes;
        server.host = record.host;
        server.isupport = ISupport::from_line(&record.isupport);
        server.prefix = PrefixTable::from_isupport(&server.isupport);
        server.cap_ls = record.cap_ls;
        server.cap_list = record.cap_list;
        server.authenticated = record.authenticated;
        server.is_away = record.is_away;
        server.away_message = record.away_message;
        server.away_time = record.away_time;
        server.lag = record.lag;
        server.reconnect_delay = record.reconnect_delay;
        server.reconnect_start = record.reconnect_start;
        server.join_channel_key = record.join_channel_key;
        if record.connected {
            server.reconnect_join = true;
            server.reconnect_delay = 0;
            server.reconnect_start = Some(ctx.now());
        }
        server
    }

    fn restore_channel(&mut self, record: ChannelRecord) -> usize {
        let casemap = self.casemapping();
        let list_modes = match record.kind {
            ChannelKind::Channel => self.isupport.list_modes(),
            ChannelKind::Private => vec![],
        };
        let mut channel = Channel::new(record.kind, &record.name, &list_modes);
        if record.has_buffer {
            channel.buffer = self.channel_create_buffer(record.kind, &record.name, false, false);
        }
        if record.kind == ChannelKind::Private && channel.buffer.is_some() {
            self.ctx.private_buffers.lock().push(self.channel_buffer_name(&record.name));
        }
        channel.topic = record.topic;
        channel.modes = record.modes;
        channel.limit = record.limit;
        channel.key = record.key;
        channel.join_msg_received = record.join_msg_received.into_iter().collect();
        channel.away_message = record.away_message;
        channel.has_quit_server = record.has_quit_server;
        channel.cycle = record.cycle;
        channel.part = record.part;
        channel.pv_remote_nick_color = record.pv_remote_nick_color;
        channel.autorejoin_at = record.autorejoin_at;
        for nick in &record.nicks_speaking {
            channel.nick_speaking_add(casemap, nick, false);
        }
        for nick in &record.nicks_speaking_highlight {
            channel.nick_speaking_add(casemap, nick, true);
        }
        for (nick, time) in record.nicks_speaking_time.iter().rev() {
            channel.nick_speaking_time_add(casemap, nick, *time);
        }
        for (nick, time) in record.join_smart_filtered {
            channel.join_smart_filtered_add(&nick, time);
        }
        self.channels.push(channel);
        self.channels.len() - 1
    }
}

/// Writes the state of every session, then the raw log and the redirect patterns.
pub fn save<'a, W, I>(ctx: &Context, servers: I, writer: W) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Server>,
{
    let mut out = Writer { inner: writer, line: 0 };
    for server in servers {
        server.write_snapshot(&mut out)?;
    }
    let raw: Vec<RawMessage> = ctx.raw.lock().messages().cloned().collect();
    for message in &raw {
        out.record(tag::RAW_MESSAGE, message)?;
    }
    let patterns = ctx.redirect_patterns.lock().clone();
    for pattern in &patterns {
        out.record(tag::REDIRECT_PATTERN, pattern)?;
    }
    out.inner.flush()?;
    Ok(())
}

fn decode<T: DeserializeOwned>(line: usize, data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|cause| Error::Snapshot { line, cause })
}

/// Reads a snapshot back into sessions sharing `ctx`. The raw log and redirect patterns of the
/// snapshot go to `ctx`.
pub fn load<R: BufRead>(ctx: &Context, reader: R) -> Result<Vec<Server>> {
    let mut servers: Vec<Server> = vec![];
    let mut channel: Option<usize> = None;
    let mut modelist: Option<char> = None;

    for (index, text) in reader.lines().enumerate() {
        let line = index + 1;
        let text = text?;
        if text.trim().is_empty() {
            continue;
        }
        let record: Record<serde_json::Value> =
            serde_json::from_str(&text).map_err(|cause| Error::Snapshot { line, cause })?;
        match record.kind {
            tag::SERVER => {
                let data: ServerRecord = decode(line, record.data)?;
                debug!("snapshot: restoring server {}", data.config.name);
                servers.push(Server::from_record(ctx, data));
                channel = None;
                modelist = None;
            }
            tag::CHANNEL => {
                let data: ChannelRecord = decode(line, record.data)?;
                match servers.last_mut() {
                    Some(server) => channel = Some(server.restore_channel(data)),
                    None => warn!("snapshot: line {}: channel without server", line),
                }
                modelist = None;
            }
            tag::NICK => {
                let data: NickRecord = decode(line, record.data)?;
                if let (Some(server), Some(index)) = (servers.last_mut(), channel) {
                    let casemap = server.casemapping();
                    let nick = Nick {
                        name: data.name,
                        host: data.host,
                        prefixes: data.prefixes,
                        away: data.away,
                        account: data.account,
                        realname: data.realname,
                    };
                    let name = nick.name.clone();
                    server.channels[index].nick_add(casemap, nick);
                    server.nicklist_update(index, &name);
                }
            }
            tag::MODELIST => {
                let data: ModelistRecord = decode(line, record.data)?;
                if let (Some(server), Some(index)) = (servers.last_mut(), channel) {
                    server.channels[index].modelist_or_insert(data.mode).set_state(data.state);
                    modelist = Some(data.mode);
                }
            }
            tag::MODELIST_ITEM => {
                let item: ModelistItem = decode(line, record.data)?;
                if let (Some(server), Some(index), Some(mode)) = (servers.last_mut(), channel, modelist) {
                    server.channels[index].modelist_or_insert(mode).restore(item);
                }
            }
            tag::NOTIFY => {
                let notify: Notify = decode(line, record.data)?;
                if let Some(server) = servers.last_mut() {
                    server.notify.retain(|n| n.nick != notify.nick);
                    server.notify.push(notify);
                }
            }
            tag::REDIRECT => {
                let redirect: Redirect = decode(line, record.data)?;
                if let Some(server) = servers.last_mut() {
                    server.redirects.restore(redirect);
                }
            }
            tag::RAW_MESSAGE => {
                let message: RawMessage = decode(line, record.data)?;
                ctx.raw.lock().push(message);
            }
            tag::REDIRECT_PATTERN => {
                let pattern: RedirectPattern = decode(line, record.data)?;
                let mut patterns = ctx.redirect_patterns.lock();
                match patterns.iter_mut().find(|p| p.name == pattern.name) {
                    Some(existing) => *existing = pattern,
                    None => patterns.push(pattern),
                }
            }
            other => debug!("snapshot: line {}: skipping record type {}", line, other),
        }
    }
    Ok(servers)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::{load, save};
    use crate::client::data::modelist::ModelistState;
    use crate::client::event::{ChannelKind, SessionState};
    use crate::client::server::fixture::{test_config, Harness};
    use crate::error::Error;

    fn snapshot(h: &Harness) -> String {
        let mut out = vec![];
        save(h.server.context(), std::iter::once(&h.server), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn busy_session() -> Harness {
        let mut config = test_config();
        config.notify = Some("alice away".into());
        let mut h = Harness::new(config);
        h.register();
        h.recv(":test!t@me.host JOIN #chan");
        h.recv(":irc.test.net 353 test = #chan :@test +alice bob");
        h.recv(":irc.test.net 366 test #chan :End of /NAMES list.");
        h.recv(":irc.test.net 332 test #chan :the topic");
        h.recv(":irc.test.net 367 test #chan *!*@one op 1622548800");
        h.recv(":irc.test.net 367 test #chan *!*@two op 1622548800");
        h.recv(":irc.test.net 368 test #chan :End of Channel Ban List");
        h.recv(":bob!b@bob.host PRIVMSG #chan :hello test");
        h.recv(":carol!c@carol.host PRIVMSG test :hi");
        h
    }

    #[test]
    fn records_are_typed_json_lines() {
        let h = busy_session();
        let text = snapshot(&h);
        let types: Vec<u64> = text
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["type"].as_u64().unwrap())
            .collect();
        assert_eq!(types[0], 0);
        assert_eq!(&types[1..5], &[1, 2, 2, 2]);
        assert!(types.contains(&6));
        assert!(types.contains(&7));
        assert_eq!(types.iter().filter(|t| **t == 8).count(), 2);
        assert!(types.contains(&3));
        assert_eq!(*types.last().unwrap(), 4);
    }

    #[test]
    fn restores_channels_nicks_and_modelists() {
        let h = busy_session();
        let text = snapshot(&h);

        let fresh = Harness::new(test_config());
        let servers = load(fresh.server.context(), Cursor::new(text)).unwrap();
        assert_eq!(servers.len(), 1);
        let server = &servers[0];
        assert_eq!(server.name(), "test");
        assert_eq!(server.nick(), Some("test"));
        assert_eq!(server.state(), SessionState::Disconnected);
        assert!(server.reconnect_start().is_some());

        let chan = server.channel_search("#chan").unwrap();
        assert_eq!(chan.topic.as_deref(), Some("the topic"));
        assert_eq!(chan.nicks().len(), 3);
        assert_eq!(chan.nick(server.casemapping(), "alice").unwrap().prefix(), '+');
        let bans = chan.modelist('b').unwrap();
        assert_eq!(bans.state(), ModelistState::Received);
        assert_eq!(bans.items()[1].number, 1);
        assert_eq!(bans.next_number(), 2);
        assert_eq!(chan.nicks_speaking(false).iter().collect::<Vec<_>>(), vec!["bob"]);
        assert_eq!(chan.nicks_speaking(true).iter().collect::<Vec<_>>(), vec!["bob"]);

        let pv = server.channel_search("carol").unwrap();
        assert_eq!(pv.kind, ChannelKind::Private);
        assert!(fresh.ui.lock().buffer_by_name("test.carol").is_some());
        assert!(server.notify_list()[0].check_away);
        assert!(fresh.server.context().raw.lock().len() > 0);
    }

    #[test]
    fn restored_session_rejoins_on_reconnect() {
        let h = busy_session();
        let text = snapshot(&h);
        let fresh = Harness::new(test_config());
        let mut servers = load(fresh.server.context(), Cursor::new(text)).unwrap();
        let server = &mut servers[0];
        server.timer();
        assert_eq!(server.state(), SessionState::Connecting);
        server.connected();
        server.recv_line(":irc.test.net 001 test :Welcome back");
        let sent: Vec<_> = server.take_actions();
        assert!(sent
            .iter()
            .any(|a| *a == crate::client::server::Action::Send("JOIN #chan".into())));
    }

    #[test]
    fn unknown_records_are_skipped() {
        let text = "{\"type\":0,\"data\":{\"config\":{\"name\":\"x\"},\"connected\":false,\"has_buffer\":false,\
                    \"index_current_address\":0,\"nick\":null,\"nick_modes\":null,\"host\":null,\"isupport\":\"\",\
                    \"cap_ls\":{},\"cap_list\":{},\"authenticated\":false,\"is_away\":false,\"away_message\":null,\
                    \"away_time\":null,\"lag\":0,\"reconnect_delay\":0,\"reconnect_start\":null}}\n\
                    {\"type\":42,\"data\":{\"whatever\":true}}\n";
        let h = Harness::new(test_config());
        let servers = load(h.server.context(), Cursor::new(text)).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name(), "x");
    }

    #[test]
    fn bad_record_reports_its_line() {
        let h = Harness::new(test_config());
        let text = "{\"type\":3,\"data\":{\"date\":\"nope\"}}\n";
        match load(h.server.context(), Cursor::new(text)) {
            Err(Error::Snapshot { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected {:?}", other.map(|s| s.len())),
        }
    }
}
