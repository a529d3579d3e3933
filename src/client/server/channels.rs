//! Channels and private conversations of a session, and the UI buffers they are shown in.
use chrono::{DateTime, Duration, Utc};

use super::Server;
use crate::client::data::nick::OTHER_GROUP;
use crate::client::data::{Channel, PvBuffer, TypingState};
use crate::client::event::{ChannelKind, Event, SessionState};
use crate::client::outqueue::Priority;
use crate::client::ui::{BufferId, BufferKind};

impl Server {
    /// Name of the buffer of a channel or private conversation.
    pub fn channel_buffer_name(&self, name: &str) -> String {
        format!("{}.{}", self.name, name)
    }

    /// Position of a channel in the list.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let casemap = self.casemapping();
        self.channels.iter().position(|c| casemap.eq(&c.name, name))
    }

    /// Looks a channel or private conversation up.
    pub fn channel_search(&self, name: &str) -> Option<&Channel> {
        self.channel_index(name).map(|i| &self.channels[i])
    }

    /// Looks a channel or private conversation up, for modification.
    pub fn channel_search_mut(&mut self, name: &str) -> Option<&mut Channel> {
        let index = self.channel_index(name)?;
        Some(&mut self.channels[index])
    }

    /// The channel shown in a buffer.
    pub fn channel_by_buffer(&self, buffer: BufferId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.buffer == Some(buffer))
    }

    /// Whether a string is a channel name on this server.
    pub fn is_channel_name(&self, name: &str) -> bool {
        name.chars()
            .next()
            .map_or(false, |c| self.isupport.chantypes().contains(c))
    }

    /// Opens a channel or private conversation, reusing an existing buffer of the same name (which
    /// takes the new kind). Returns its position in the list.
    pub fn channel_new(&mut self, kind: ChannelKind, name: &str, switch: bool, auto_switch: bool) -> usize {
        if let Some(index) = self.channel_index(name) {
            let channel = &mut self.channels[index];
            if channel.kind != kind {
                channel.kind = kind;
            }
            return index;
        }
        let buffer = self.channel_create_buffer(kind, name, switch, auto_switch);
        let list_modes = match kind {
            ChannelKind::Channel => self.isupport.list_modes(),
            ChannelKind::Private => vec![],
        };
        let mut channel = Channel::new(kind, name, &list_modes);
        channel.buffer = buffer;
        if kind == ChannelKind::Private && buffer.is_some() {
            self.ctx.private_buffers.lock().push(self.channel_buffer_name(name));
        }
        if kind == ChannelKind::Channel {
            let lower = self.casemapping().to_lower(name);
            if let Some(key) = self.join_channel_key.remove(&lower) {
                channel.key = Some(key);
            }
        }
        self.channels.push(channel);
        debug!("[{}] channel opened: {}", self.name, name);
        self.ctx.emit(Event::ChannelOpened {
            server: self.name.clone(),
            channel: name.to_owned(),
            kind,
        });
        self.channels.len() - 1
    }

    pub(super) fn channel_create_buffer(
        &mut self,
        kind: ChannelKind,
        name: &str,
        switch: bool,
        auto_switch: bool,
    ) -> Option<BufferId> {
        let buffer_name = self.channel_buffer_name(name);
        let merge_with = match (kind, self.ctx.config.pv_buffer()) {
            (ChannelKind::Private, PvBuffer::MergeByServer) => self.private_buffer_for_merge(false),
            (ChannelKind::Private, PvBuffer::MergeAll) => self.private_buffer_for_merge(true),
            _ => None,
        };
        let prefix_groups: Vec<String> = self
            .prefix
            .modes()
            .chars()
            .enumerate()
            .map(|(i, m)| format!("{:03}|{}", i, m))
            .collect();
        let lower = self.casemapping().to_lower(name);
        let display = if !switch || self.join_noswitch.contains_key(&lower) {
            None
        } else if auto_switch && !self.join_manual.contains_key(&lower) {
            Some("auto")
        } else {
            Some("1")
        };
        let nick = self.nick.clone().unwrap_or_default();
        let away = self.away_message.clone().filter(|_| self.is_away);

        let mut ui = self.ctx.ui.lock();
        let existing = ui.buffer_search(&buffer_name);
        let buffer_kind = match kind {
            ChannelKind::Channel => BufferKind::Channel,
            ChannelKind::Private => BufferKind::Private,
        };
        let buffer = ui.buffer_new(&buffer_name, buffer_kind)?;
        match existing {
            Some(_) => ui.nicklist_remove_all(buffer),
            None => {
                ui.buffer_set(buffer, "short_name", name);
                if let Some(target) = merge_with {
                    ui.buffer_set(buffer, "merge", &target);
                }
                if kind == ChannelKind::Channel {
                    ui.buffer_set(buffer, "nicklist", "1");
                    for group in &prefix_groups {
                        ui.nicklist_add_group(buffer, group);
                    }
                    ui.nicklist_add_group(buffer, OTHER_GROUP);
                }
                if let Some(display) = display {
                    ui.buffer_set(buffer, "display", display);
                }
            }
        }
        let kind_name = match kind {
            ChannelKind::Channel => "channel",
            ChannelKind::Private => "private",
        };
        ui.buffer_set(buffer, "localvar_set_type", kind_name);
        ui.buffer_set(buffer, "localvar_set_nick", &nick);
        ui.buffer_set(buffer, "localvar_set_server", &self.name);
        ui.buffer_set(buffer, "localvar_set_channel", name);
        match away {
            Some(message) => ui.buffer_set(buffer, "localvar_set_away", &message),
            None => ui.buffer_set(buffer, "localvar_del_away", ""),
        }
        Some(buffer)
    }

    // The private buffer with the lowest number, of this server or of any.
    fn private_buffer_for_merge(&self, all_servers: bool) -> Option<String> {
        let own_prefix = format!("{}.", self.name);
        let names = self.ctx.private_buffers.lock().clone();
        let ui = self.ctx.ui.lock();
        names
            .into_iter()
            .filter(|name| all_servers || name.starts_with(&own_prefix))
            .filter_map(|name| {
                let buffer = ui.buffer_search(&name)?;
                Some((ui.buffer_get_integer(buffer, "number").unwrap_or(i64::MAX), name))
            })
            .min()
            .map(|(_, name)| name)
    }

    /// Forgets a channel. The buffer is left to the UI.
    pub fn channel_free(&mut self, index: usize) -> Option<Channel> {
        if index >= self.channels.len() {
            return None;
        }
        let channel = self.channels.remove(index);
        if channel.kind == ChannelKind::Private {
            let buffer_name = self.channel_buffer_name(&channel.name);
            self.ctx.private_buffers.lock().retain(|n| *n != buffer_name);
        }
        debug!("[{}] channel freed: {}", self.name, channel.name);
        self.ctx.emit(Event::ChannelClosed {
            server: self.name.clone(),
            channel: channel.name.clone(),
        });
        Some(channel)
    }

    /// Adds or refreshes a nick in a channel nicklist.
    pub(crate) fn nicklist_update(&self, index: usize, nick: &str) {
        let channel = &self.channels[index];
        if let (Some(buffer), Some(nick)) = (channel.buffer, channel.nick(self.casemapping(), nick)) {
            let group = nick.group(&self.prefix);
            let prefix = nick.prefix().to_string();
            self.ctx.ui.lock().nicklist_add_nick(buffer, &group, &nick.name, prefix.trim());
        }
    }

    /// Removes a nick from a channel nicklist.
    pub(crate) fn nicklist_remove(&self, index: usize, nick: &str) {
        if let Some(buffer) = self.channels[index].buffer {
            self.ctx.ui.lock().nicklist_remove_nick(buffer, nick);
        }
    }

    // Every channel forgets its nicks and says so.
    pub(crate) fn channels_disconnected(&mut self) {
        let mut ui = self.ctx.ui.lock();
        for channel in &mut self.channels {
            channel.nicks_clear();
            channel.typing_nicks_clear();
            channel.typing_state = TypingState::Off;
            channel.typing_status_sent = None;
            channel.checking_whox = 0;
            channel.autorejoin_at = None;
            if let Some(buffer) = channel.buffer {
                ui.nicklist_remove_all(buffer);
            }
        }
        drop(ui);
        let now = self.ctx.now();
        for channel in &self.channels {
            self.ctx.print_date(channel.buffer, now, &[], "=!= disconnected from server");
        }
        if !self.channels.is_empty() {
            self.reconnect_join = true;
        }
    }

    /// Joins the channels once registered: after a reconnection the channels still open,
    /// otherwise the `autojoin` option.
    pub fn autojoin_channels(&mut self) {
        if !self.disable_autojoin && self.reconnect_join && !self.channels.is_empty() {
            let lines: Vec<String> = self
                .channels
                .iter()
                .filter(|c| c.is_channel() && !c.part)
                .map(|c| match &c.key {
                    Some(key) => format!("JOIN {} {}", c.name, key),
                    None => format!("JOIN {}", c.name),
                })
                .collect();
            for line in lines {
                self.send(Priority::High, &line);
            }
            self.reconnect_join = false;
        } else {
            let autojoin = self.config.autojoin().to_owned();
            if !self.disable_autojoin && !autojoin.is_empty() {
                if let Err(e) = self.join(&autojoin, false, false) {
                    warn!("[{}] autojoin: {}", self.name, e);
                }
            }
        }
        self.disable_autojoin = false;
    }

    /// Rejoins a channel, with its key.
    pub fn channel_rejoin(&mut self, index: usize) {
        let channel = &self.channels[index];
        let join = match &channel.key {
            Some(key) => format!("{} {}", channel.name, key),
            None => channel.name.clone(),
        };
        if let Err(e) = self.join(&join, false, true) {
            warn!("[{}] rejoin: {}", self.name, e);
        }
    }

    pub(crate) fn autorejoin_due(&mut self, now: DateTime<Utc>) {
        let due: Vec<usize> = self
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.autorejoin_at.map_or(false, |at| now >= at))
            .map(|(i, _)| i)
            .collect();
        for index in due {
            self.channels[index].autorejoin_at = None;
            self.channel_rejoin(index);
        }
    }

    /// Schedules (or runs) the automatic rejoin of a channel we were kicked from.
    pub(crate) fn autorejoin_schedule(&mut self, index: usize) {
        let delay = self.config.autorejoin_delay();
        if delay > 0 {
            self.channels[index].autorejoin_at = Some(self.ctx.now() + Duration::seconds(delay));
        } else {
            self.channel_rejoin(index);
        }
    }

    /// Asks `WHO` for a channel when away or account tracking needs it, or forgets both.
    pub(crate) fn channel_check_whox(&mut self, index: usize) {
        let channel = &self.channels[index];
        if !channel.is_channel() || !channel.is_joined() {
            return;
        }
        let away_check = self.config.away_check();
        let max_nicks = self.config.away_check_max_nicks();
        let wanted = self.caps.away_notify
            || self.caps.account_notify
            || (away_check > 0 && (max_nicks == 0 || channel.nicks().len() <= max_nicks));
        if wanted {
            let line = if self.isupport.get("WHOX").is_some() {
                format!("WHO {} %cuhsnfdar", channel.name)
            } else {
                format!("WHO {}", channel.name)
            };
            self.channels[index].checking_whox += 1;
            self.send(Priority::Low, &line);
        } else {
            let channel = &mut self.channels[index];
            channel.remove_account();
            let back = channel.remove_away();
            for nick in back {
                self.nicklist_update(index, &nick);
            }
        }
    }

    /// Checks away status on every channel.
    pub fn check_away(&mut self) {
        if !self.is_connected() {
            return;
        }
        for index in 0..self.channels.len() {
            if self.channels[index].is_channel() {
                self.channel_check_whox(index);
            }
        }
        self.last_away_check = Some(self.ctx.now());
    }

    /// Marks a nick away or back in every channel, and our away state in buffers when it is us.
    pub(crate) fn set_nick_away(&mut self, nick: &str, away: bool) {
        if !self.is_connected() {
            return;
        }
        let casemap = self.casemapping();
        let own = self.nick.as_deref().map_or(false, |n| casemap.eq(n, nick));
        let message = self.away_message.clone().unwrap_or_default();
        for index in 0..self.channels.len() {
            if self.channels[index].set_away(casemap, nick, away) {
                self.nicklist_update(index, nick);
            }
            if own {
                if let Some(buffer) = self.channels[index].buffer {
                    let mut ui = self.ctx.ui.lock();
                    if away {
                        ui.buffer_set(buffer, "localvar_set_away", &message);
                    } else {
                        ui.buffer_set(buffer, "localvar_del_away", "");
                    }
                }
            }
        }
        if own {
            if let Some(buffer) = self.buffer {
                let mut ui = self.ctx.ui.lock();
                if away {
                    ui.buffer_set(buffer, "localvar_set_away", &message);
                } else {
                    ui.buffer_set(buffer, "localvar_del_away", "");
                }
            }
        }
    }

    /// The UI closed a buffer. Closing the server buffer quits, stops reconnecting and closes
    /// every buffer of the server; closing a channel buffer parts it.
    pub fn buffer_closed(&mut self, buffer: BufferId) {
        if self.buffer == Some(buffer) {
            if self.state != SessionState::Disconnected {
                self.quit(None);
            }
            self.disconnect(false, false);
            let buffers: Vec<BufferId> = self.channels.iter().filter_map(|c| c.buffer).collect();
            {
                let mut ui = self.ctx.ui.lock();
                for buffer in buffers {
                    ui.buffer_close(buffer);
                }
            }
            while !self.channels.is_empty() {
                self.channel_free(self.channels.len() - 1);
            }
            self.buffer = None;
            return;
        }
        let index = match self.channels.iter().position(|c| c.buffer == Some(buffer)) {
            Some(index) => index,
            None => return,
        };
        let channel = &self.channels[index];
        if self.is_connected() && channel.is_channel() && channel.is_joined() {
            let name = channel.name.clone();
            let reason = self.config.default_msg_part().map(|m| m.to_owned());
            let line = match reason {
                Some(reason) => format!("PART {} :{}", name, reason),
                None => format!("PART {}", name),
            };
            self.send(Priority::High, &line);
        }
        self.channels[index].buffer = None;
        self.channel_free(index);
    }
}

#[cfg(test)]
mod test {
    use crate::client::data::{Config, PvBuffer};
    use crate::client::event::{ChannelKind, Event};
    use crate::client::server::fixture::{test_config, Harness};

    #[test]
    fn channel_new_reuses_and_frees() {
        let mut h = Harness::new(test_config());
        h.register();
        let a = h.server.channel_new(ChannelKind::Channel, "#a", false, false);
        let b = h.server.channel_new(ChannelKind::Channel, "#b", false, false);
        let c = h.server.channel_new(ChannelKind::Channel, "#c", false, false);
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(h.server.channel_new(ChannelKind::Channel, "#B", false, false), 1);
        h.server.channel_free(1);
        assert!(h.server.channel_search("#b").is_none());
        let names: Vec<&str> = h.server.channels().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["#a", "#c"]);
        assert!(h.ui.lock().buffer_by_name("test.#b").is_some());
        assert!(h.events().contains(&Event::ChannelClosed {
            server: "test".into(),
            channel: "#b".into(),
        }));
    }

    #[test]
    fn private_buffers_merge_by_server() {
        let global = Config {
            pv_buffer: Some(PvBuffer::MergeByServer),
            ..Config::default()
        };
        let mut h = Harness::with_global(global, test_config());
        h.register();
        h.server.channel_new(ChannelKind::Private, "alice", false, false);
        h.server.channel_new(ChannelKind::Private, "bob", false, false);
        let ui = h.ui.lock();
        assert!(ui.buffer_by_name("test.alice").unwrap().properties.get("merge").is_none());
        assert_eq!(
            ui.buffer_by_name("test.bob").unwrap().properties.get("merge").map(|s| s.as_str()),
            Some("test.alice")
        );
    }

    #[test]
    fn rejoin_after_reconnect() {
        let mut h = Harness::new(test_config());
        h.register();
        h.recv(":test!u@h JOIN #a");
        h.recv(":test!u@h JOIN #b");
        h.server.channel_search_mut("#b").unwrap().key = Some("sekrit".into());
        h.recv(":test!u@h JOIN #c");
        h.recv(":test!u@h PART #c");
        h.server.socket_closed();
        assert!(h.server.channel_search("#a").unwrap().nicks().is_empty());
        h.clock.advance(10);
        h.server.timer();
        h.server.connected();
        h.sent();
        h.recv(":irc.test.net 001 test :Welcome back");
        assert_eq!(h.sent(), "JOIN #a\r\n");
        h.clock.advance(2);
        h.server.timer();
        assert_eq!(h.sent(), "JOIN #b sekrit\r\n");
    }

    #[test]
    fn closing_server_buffer_quits() {
        let mut h = Harness::new(test_config());
        h.register();
        h.recv(":test!u@h JOIN #a");
        let buffer = h.server.buffer().unwrap();
        h.server.buffer_closed(buffer);
        assert_eq!(h.sent(), "QUIT\r\n");
        assert!(h.server.channels().is_empty());
        assert!(h.ui.lock().buffer_by_name("test.#a").is_none());
        assert_eq!(h.server.reconnect_start(), None);
    }

    #[test]
    fn closing_channel_buffer_parts() {
        let mut h = Harness::new(test_config());
        h.register();
        h.recv(":test!u@h JOIN #a");
        let buffer = h.server.channel_search("#a").unwrap().buffer.unwrap();
        h.server.buffer_closed(buffer);
        assert_eq!(h.sent(), "PART #a\r\n");
        assert!(h.server.channel_search("#a").is_none());
    }
}
