//! Reading the protocol: every received line goes through the redirects, then to the handler of
//! its command, which updates the session and prints what happened.
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::Server;
use crate::client::data::channel::SMART_FILTER_TAG;
use crate::client::data::raw::RawFlags;
use crate::client::data::{join, ModeContext, ModelistState, Nick, TypingState};
use crate::client::event::{ChannelKind, Event, SessionState};
use crate::client::outqueue::Priority;
use crate::client::ui::BufferId;
use crate::error::Error;
use crate::proto::{Command, Message, Response};

/// Channel numerics shown even when they arrive while joining.
const JOIN_MESSAGES_DISPLAYED: &[&str] = &["329", "332", "333", "366"];

// What the handlers need to know about the line being handled.
struct Incoming<'a> {
    command: String,
    nick: Option<&'a str>,
    address: Option<String>,
    date: DateTime<Utc>,
    nick_is_me: bool,
}

impl<'a> Incoming<'a> {
    fn tags(&self, extra: &[&str]) -> Vec<String> {
        let mut tags = vec![format!("irc_{}", self.command)];
        tags.extend(extra.iter().map(|t| (*t).to_owned()));
        if let Some(nick) = self.nick {
            tags.push(format!("nick_{}", nick));
        }
        if let Some(address) = &self.address {
            tags.push(format!("host_{}", address));
        }
        tags
    }

    fn nick(&self) -> &str {
        self.nick.unwrap_or("?")
    }

    // `nick (user@host)`, or the nick alone.
    fn who(&self) -> String {
        match &self.address {
            Some(address) => format!("{} ({})", self.nick(), address),
            None => self.nick().to_owned(),
        }
    }
}

/// Whether `text` mentions `nick` as a whole word, ignoring case.
pub(crate) fn has_highlight(text: &str, nick: &str) -> bool {
    if nick.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    let nick = nick.to_lowercase();
    let is_word = |c: Option<char>| c.map_or(false, |c| c.is_alphanumeric() || c == '_');
    let mut start = 0;
    while let Some(pos) = text[start..].find(&nick) {
        let begin = start + pos;
        let end = begin + nick.len();
        if !is_word(text[..begin].chars().next_back()) && !is_word(text[end..].chars().next()) {
            return true;
        }
        start = begin + nick.chars().next().map_or(1, |c| c.len_utf8());
    }
    false
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    s.parse::<i64>().ok().map(|secs| Utc.timestamp(secs, 0))
}

fn join_params(params: &[String], from: usize) -> String {
    params.get(from..).map(|p| p.join(" ")).unwrap_or_default()
}

impl Server {
    /// Handles one line received from the server.
    pub fn recv_line(&mut self, line: &str) {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.is_empty() {
            return;
        }
        trace!("[{}] [RECV] {}", self.name, line);
        let now = self.ctx.now();
        let message = match line.parse::<Message>() {
            Ok(message) => message,
            Err(e) => {
                warn!("[{}] dropping unparseable line {:?}: {}", self.name, line, e);
                self.ctx.raw.lock().add(now, &self.name, RawFlags::recv(), line);
                return;
            }
        };
        let command = message.command.name();
        let params = message.command.params();

        let (taken, done) = self.redirects.message(line, &command, &params);
        let flags = RawFlags {
            redirected: taken,
            ..RawFlags::recv()
        };
        self.ctx.raw.lock().add(now, &self.name, flags, line);
        self.ctx.emit(Event::Message {
            server: self.name.clone(),
            incoming: true,
            line: line.to_owned(),
        });
        for output in done {
            self.redirect_finished(output);
        }
        if taken || self.batch_hold(&message) {
            return;
        }
        self.dispatch(&message, &command, &params);
    }

    /// Handles a parsed line that already went through the redirects.
    pub(super) fn dispatch_message(&mut self, message: &Message) {
        let command = message.command.name();
        let params = message.command.params();
        self.dispatch(message, &command, &params);
    }

    fn dispatch(&mut self, message: &Message, command: &str, params: &[String]) {
        let casemap = self.casemapping();
        let nick = message.source_nickname();
        let date = message
            .tag("time")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|| self.ctx.now());
        let inc = Incoming {
            command: command.to_ascii_lowercase(),
            nick,
            address: message.source_host(),
            date,
            nick_is_me: match (nick, self.nick.as_deref()) {
                (Some(nick), Some(own)) => casemap.eq(nick, own),
                _ => false,
            },
        };

        match &message.command {
            Command::PING(server, extra) => {
                let line = match extra {
                    Some(extra) => format!("PONG {} :{}", server, extra),
                    None => format!("PONG :{}", server),
                };
                self.send(Priority::Immediate, &line);
            }
            Command::PONG(..) => self.recv_pong(),
            Command::ERROR(text) => self.recv_error(text),
            Command::JOIN(channel, account, realname) => {
                self.recv_join(&inc, channel, account.as_deref(), realname.as_deref())
            }
            Command::PART(channel, reason) => self.recv_part(&inc, channel, reason.as_deref()),
            Command::KICK(channel, target, reason) => self.recv_kick(&inc, channel, target, reason.as_deref()),
            Command::QUIT(reason) => self.recv_quit(&inc, reason.as_deref()),
            Command::NICK(new) => self.recv_nick(&inc, new),
            Command::TOPIC(channel, topic) => self.recv_topic(&inc, channel, topic.as_deref()),
            Command::MODE(target, args) => self.recv_mode(&inc, target, args),
            Command::PRIVMSG(target, text) => self.recv_privmsg(&inc, target, text),
            Command::NOTICE(target, text) => self.recv_notice(&inc, target, text),
            Command::INVITE(target, channel) => {
                let text = if inc.nick_is_me || self.nick.as_deref().map_or(false, |n| casemap.eq(n, target)) {
                    format!("You have been invited to {} by {}", channel, inc.nick())
                } else {
                    format!("{} has invited {} to {}", inc.nick(), target, channel)
                };
                self.show(self.buffer, &inc, &["notify_highlight"], &text);
            }
            Command::KILL(_, reason) => {
                let text = format!("You were killed by {} ({})", inc.nick(), reason);
                self.show(self.buffer, &inc, &[], &text);
            }
            Command::AWAY(text) => {
                if let Some(nick) = inc.nick {
                    self.set_nick_away(nick, text.is_some());
                    self.notify_set_away_message(nick, text.as_deref());
                }
            }
            Command::ACCOUNT(account) => self.recv_account(&inc, account),
            Command::CHGHOST(user, host) => self.recv_chghost(&inc, user, host),
            Command::SETNAME(realname) => self.recv_setname(&inc, realname),
            Command::CAP(_, sub, arg, param) => self.handle_cap(*sub, arg.as_deref(), param.as_deref()),
            Command::AUTHENTICATE(challenge) => self.handle_authenticate(challenge),
            Command::Response(response, args) => self.recv_numeric(&inc, *response, args),
            Command::Raw(code, args) if code == "470" => self.recv_470(&inc, args),
            Command::Raw(code, args) if code.eq_ignore_ascii_case("TAGMSG") => self.recv_tagmsg(&inc, message, args),
            Command::Raw(code, args) if code.eq_ignore_ascii_case("BATCH") => self.recv_batch(message, args),
            _ => {
                let text = match inc.nick {
                    Some(_) => format!("{} {}", inc.who(), join_params(params, 0)),
                    None => join_params(params, 1),
                };
                self.show(self.buffer, &inc, &[], &text);
            }
        }
    }

    // Printing

    fn show(&self, buffer: Option<BufferId>, inc: &Incoming, extra: &[&str], message: &str) {
        let tags = inc.tags(extra);
        let tags: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        self.ctx.print_date(buffer, inc.date, &tags, message);
    }

    fn channel_buffer(&self, name: &str) -> Option<BufferId> {
        self.channel_search(name).and_then(|c| c.buffer).or(self.buffer)
    }

    // Whether a nick spoke recently enough to keep its join, part or nick lines visible.
    fn spoke_recently(&self, index: usize, nick: &str) -> bool {
        let within = (self.ctx.now(), self.ctx.config.smart_filter_delay());
        self.channels[index]
            .nick_speaking_time_search(self.casemapping(), nick, Some(within))
            .is_some()
    }

    // Whether a channel numeric is shown, remembering that it was received.
    fn join_msg_display(&mut self, channel: &str, code: &str) -> bool {
        let index = match self.channel_index(channel) {
            Some(index) => index,
            None => return true,
        };
        let received = &mut self.channels[index].join_msg_received;
        let display = received.contains(code) || JOIN_MESSAGES_DISPLAYED.contains(&code);
        received.insert(code.to_owned());
        display
    }

    // Records that a nick is typing, paused or done in a conversation.
    fn typing_nick(&mut self, index: usize, nick: &str, state: TypingState) {
        if !self.ctx.config.typing_status_nicks() {
            return;
        }
        let casemap = self.casemapping();
        if self.channels[index].typing_nick_set(casemap, nick, state) {
            self.ctx.emit(Event::Typing {
                server: self.name.clone(),
                channel: self.channels[index].name.clone(),
                nick: nick.to_owned(),
                state: self.channels[index].typing_nick(casemap, nick),
            });
        }
    }

    // Connection

    fn recv_pong(&mut self) {
        let now = self.ctx.now();
        if let Some(check) = self.lag_check_time.take() {
            self.lag = (now - check).num_milliseconds();
            self.lag_next_check = Some(now + Duration::seconds(self.ctx.config.lag_check()));
            debug!("[{}] lag: {} ms", self.name, self.lag);
        }
    }

    fn recv_error(&mut self, text: &str) {
        self.print_error(text);
        if text.starts_with("Closing Link") {
            let registered = self.is_connected();
            self.disconnect(!registered, true);
        }
    }

    fn recv_welcome(&mut self, inc: &Incoming, args: &[String]) {
        let now = self.ctx.now();
        self.connection_deadline = None;
        if let Some(nick) = args.first() {
            self.set_nick(nick);
        }
        self.reconnect_delay = 0;
        self.reconnect_start = None;
        self.set_state(SessionState::Registered);
        self.lag_next_check = Some(now + Duration::seconds(self.ctx.config.lag_check()));
        self.monitor_time = Some(now + Duration::seconds(5));
        self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, 1));

        if let Some(message) = self.away_message.clone() {
            self.set_away(Some(&message));
        }
        let commands: Vec<String> = self
            .config
            .command()
            .iter()
            .map(|c| c.trim_start_matches('/').to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        for command in &commands {
            self.send(Priority::High, command);
        }
        if !commands.is_empty() && self.config.command_delay() > 0 {
            self.command_time = Some(now);
        } else {
            self.autojoin_channels();
        }
    }

    fn recv_nick_error(&mut self, inc: &Incoming, args: &[String]) {
        let text = join_params(args, 1);
        if self.is_connected() {
            self.show(self.buffer, inc, &["irc_numeric"], &text);
            return;
        }
        self.print_error(&text);
        match self.get_alternate_nick() {
            Some(nick) => {
                let taken = args.get(1).map_or("", |n| n.as_str());
                let message = format!("nickname \"{}\" is unavailable, trying \"{}\"", taken, nick);
                self.print(&[], &message);
                self.set_nick(&nick);
                self.send(Priority::Immediate, &format!("NICK {}", nick));
            }
            None => {
                self.print_error(&Error::NoUsableNick.to_string());
                self.disconnect(false, true);
            }
        }
    }

    // Channel events

    fn recv_join(&mut self, inc: &Incoming, channel: &str, account: Option<&str>, realname: Option<&str>) {
        let nick = match inc.nick {
            Some(nick) => nick,
            None => return,
        };
        let casemap = self.casemapping();
        let index = match self.channel_index(channel) {
            Some(index) => {
                self.channels[index].part = false;
                index
            }
            None if inc.nick_is_me => self.channel_new(ChannelKind::Channel, channel, true, true),
            None => return,
        };
        if inc.nick_is_me {
            self.channels[index].nicks_clear();
            if let Some(buffer) = self.channels[index].buffer {
                self.ctx.ui.lock().nicklist_remove_all(buffer);
            }
        }
        if self.channels[index].nicks().is_empty() {
            let chan = &mut self.channels[index];
            chan.topic = None;
            chan.modes = None;
            chan.limit = 0;
            chan.join_msg_received.clear();
            chan.checking_whox = 0;
        }

        let mut entry = Nick::new(nick, inc.address.as_deref(), "", &self.prefix);
        if self.caps.extended_join {
            entry.account = account.filter(|a| *a != "*").map(|a| a.to_owned());
            entry.realname = realname.map(|r| r.to_owned());
        }
        self.channels[index].nick_add(casemap, entry);
        self.nicklist_update(index, nick);
        self.channels[index].nick_speaking_rename_if_present(casemap, nick);

        let config = self.ctx.config.clone();
        let smart_filter = !inc.nick_is_me
            && config.smart_filter()
            && config.smart_filter_join()
            && !self.spoke_recently(index, nick);
        let mut extra = vec![];
        if smart_filter {
            extra.push(SMART_FILTER_TAG);
        }
        let text = format!("{} has joined {}", inc.who(), self.channels[index].name);
        self.show(self.channels[index].buffer, inc, &extra, &text);
        if smart_filter && config.smart_filter_join_unmask() > 0 {
            self.channels[index].join_smart_filtered_add(nick, inc.date);
        }

        if !inc.nick_is_me {
            if let Some(pv) = self.channel_index(nick) {
                if self.channels[pv].kind == ChannelKind::Private && self.channels[pv].has_quit_server {
                    self.channels[pv].has_quit_server = false;
                    let text = format!("{} is back on server", inc.who());
                    self.show(self.channels[pv].buffer, inc, &["irc_nick_back"], &text);
                }
            }
            return;
        }

        if let Some(address) = &inc.address {
            self.host = Some(address.clone());
        }
        let lower = casemap.to_lower(channel);
        if self.config.autojoin_dynamic() && self.join_manual.contains_key(&lower) {
            let key = self.channels[index].key.clone();
            let autojoin = join::add(casemap, self.config.autojoin(), channel, key.as_deref());
            self.set_autojoin(autojoin);
        }
        self.join_manual.remove(&lower);
        self.join_noswitch.remove(&lower);
    }

    fn recv_part(&mut self, inc: &Incoming, channel: &str, reason: Option<&str>) {
        let nick = match inc.nick {
            Some(nick) => nick,
            None => return,
        };
        let index = match self.channel_index(channel) {
            Some(index) => index,
            None => return,
        };
        let config = self.ctx.config.clone();
        let smart_filter = !inc.nick_is_me
            && config.smart_filter()
            && config.smart_filter_quit()
            && !self.spoke_recently(index, nick);
        let mut extra = vec![];
        if smart_filter {
            extra.push(SMART_FILTER_TAG);
        }
        let chan_name = self.channels[index].name.clone();
        let text = match reason.filter(|r| !r.is_empty()) {
            Some(reason) => format!("{} has left {} ({})", inc.who(), chan_name, reason),
            None => format!("{} has left {}", inc.who(), chan_name),
        };
        self.show(self.channels[index].buffer, inc, &extra, &text);

        if inc.nick_is_me {
            let chan = &mut self.channels[index];
            chan.nicks_clear();
            chan.typing_nicks_clear();
            chan.modelists_set_state(ModelistState::Modified);
            if let Some(buffer) = chan.buffer {
                self.ctx.ui.lock().nicklist_remove_all(buffer);
            }
            if self.channels[index].cycle {
                self.channels[index].cycle = false;
                self.channel_rejoin(index);
            } else {
                self.channels[index].part = true;
            }
        } else {
            let casemap = self.casemapping();
            self.typing_nick(index, nick, TypingState::Off);
            self.channels[index].join_smart_filtered_remove(nick);
            self.channels[index].nick_remove(casemap, nick);
            self.nicklist_remove(index, nick);
        }
    }

    fn recv_kick(&mut self, inc: &Incoming, channel: &str, target: &str, reason: Option<&str>) {
        let index = match self.channel_index(channel) {
            Some(index) => index,
            None => return,
        };
        let chan_name = self.channels[index].name.clone();
        let text = match reason.filter(|r| !r.is_empty()) {
            Some(reason) => format!("{} has kicked {} from {} ({})", inc.nick(), target, chan_name, reason),
            None => format!("{} has kicked {} from {}", inc.nick(), target, chan_name),
        };
        let target_tag = format!("nick_{}", target);
        self.show(self.channels[index].buffer, inc, &[target_tag.as_str()], &text);

        let casemap = self.casemapping();
        if self.nick.as_deref().map_or(false, |own| casemap.eq(own, target)) {
            let chan = &mut self.channels[index];
            chan.nicks_clear();
            chan.modelists_set_state(ModelistState::Modified);
            if let Some(buffer) = chan.buffer {
                self.ctx.ui.lock().nicklist_remove_all(buffer);
            }
            if self.config.autorejoin() {
                self.autorejoin_schedule(index);
            }
        } else {
            self.channels[index].nick_remove(casemap, target);
            self.nicklist_remove(index, target);
        }
    }

    fn recv_quit(&mut self, inc: &Incoming, reason: Option<&str>) {
        let nick = match inc.nick {
            Some(nick) => nick.to_owned(),
            None => return,
        };
        let casemap = self.casemapping();
        let config = self.ctx.config.clone();
        let text = match reason.filter(|r| !r.is_empty()) {
            Some(reason) => format!("{} has quit ({})", inc.who(), reason),
            None => format!("{} has quit", inc.who()),
        };
        for index in 0..self.channels.len() {
            let private = self.channels[index].kind == ChannelKind::Private;
            let present = if private {
                casemap.eq(&self.channels[index].name, &nick)
            } else {
                self.channels[index].nick(casemap, &nick).is_some()
            };
            if !present {
                continue;
            }
            let smart_filter = !private
                && !inc.nick_is_me
                && config.smart_filter()
                && config.smart_filter_quit()
                && !self.spoke_recently(index, &nick);
            let mut extra = vec![];
            if smart_filter {
                extra.push(SMART_FILTER_TAG);
            }
            if private {
                self.channels[index].has_quit_server = true;
            }
            self.show(self.channels[index].buffer, inc, &extra, &text);
            self.typing_nick(index, &nick, TypingState::Off);
            self.channels[index].join_smart_filtered_remove(&nick);
            if !private {
                self.channels[index].nick_remove(casemap, &nick);
                self.nicklist_remove(index, &nick);
            }
        }
    }

    fn recv_nick(&mut self, inc: &Incoming, new: &str) {
        let old = match inc.nick {
            Some(nick) => nick.to_owned(),
            None => return,
        };
        let casemap = self.casemapping();
        let config = self.ctx.config.clone();
        if inc.nick_is_me {
            self.set_nick(new);
            self.show(self.buffer, inc, &[], &format!("You are now known as {}", new));
        }
        let old_tag = format!("irc_nick1_{}", old);
        let new_tag = format!("irc_nick2_{}", new);

        for index in 0..self.channels.len() {
            match self.channels[index].kind {
                ChannelKind::Private => {
                    if !casemap.eq(&self.channels[index].name, &old) {
                        continue;
                    }
                    if self.channel_index(new).map_or(true, |other| other == index) {
                        self.private_rename(index, new);
                    }
                    let text = format!("{} is now known as {}", old, new);
                    self.show(self.channels[index].buffer, inc, &[old_tag.as_str(), new_tag.as_str()], &text);
                }
                ChannelKind::Channel => {
                    if self.channels[index].nick(casemap, &old).is_none() {
                        continue;
                    }
                    let smart_filter = !inc.nick_is_me
                        && config.smart_filter()
                        && config.smart_filter_nick()
                        && !self.spoke_recently(index, &old);
                    self.nicklist_remove(index, &old);
                    self.channels[index].nick_rename(casemap, &old, new);
                    if let Some(address) = &inc.address {
                        if let Some(entry) = self.channels[index].nick_mut(casemap, new) {
                            entry.host = Some(address.clone());
                        }
                    }
                    self.nicklist_update(index, new);
                    let mut extra = vec![old_tag.as_str(), new_tag.as_str()];
                    if smart_filter {
                        extra.push(SMART_FILTER_TAG);
                    }
                    let text = if inc.nick_is_me {
                        format!("You are now known as {}", new)
                    } else {
                        format!("{} is now known as {}", old, new)
                    };
                    self.show(self.channels[index].buffer, inc, &extra, &text);
                }
            }
        }
        if !inc.nick_is_me {
            self.ctx.emit(Event::NickChanged {
                server: self.name.clone(),
                old,
                new: new.to_owned(),
            });
        }
    }

    // Renames a private conversation and its buffer.
    fn private_rename(&mut self, index: usize, new: &str) {
        let old_buffer_name = self.channel_buffer_name(&self.channels[index].name);
        let new_buffer_name = self.channel_buffer_name(new);
        self.channels[index].name = new.to_owned();
        if let Some(buffer) = self.channels[index].buffer {
            let mut ui = self.ctx.ui.lock();
            ui.buffer_set(buffer, "name", &new_buffer_name);
            ui.buffer_set(buffer, "short_name", new);
            ui.buffer_set(buffer, "localvar_set_channel", new);
        }
        let mut private = self.ctx.private_buffers.lock();
        if let Some(entry) = private.iter_mut().find(|b| **b == old_buffer_name) {
            *entry = new_buffer_name;
        }
    }

    fn recv_topic(&mut self, inc: &Incoming, channel: &str, topic: Option<&str>) {
        let topic = topic.filter(|t| !t.is_empty());
        let text = match topic {
            Some(topic) => format!("{} has changed topic for {} to \"{}\"", inc.nick(), channel, topic),
            None => format!("{} has unset topic for {}", inc.nick(), channel),
        };
        if let Some(chan) = self.channel_search_mut(channel) {
            chan.set_topic(topic);
            self.ctx.emit(Event::TopicChanged {
                server: self.name.clone(),
                channel: channel.to_owned(),
                topic: topic.map(|t| t.to_owned()),
            });
        }
        self.show(self.channel_buffer(channel), inc, &[], &text);
    }

    fn recv_mode(&mut self, inc: &Incoming, target: &str, args: &[String]) {
        let modes = args.first().map_or("", |m| m.as_str());
        let mode_args = join_params(args, 1);
        let text_args = if mode_args.is_empty() {
            modes.to_owned()
        } else {
            format!("{} {}", modes, mode_args)
        };
        if !self.is_channel_name(target) {
            if self.nick.as_deref().map_or(false, |own| self.casemapping().eq(own, target)) {
                self.apply_user_modes(modes);
            }
            let text = format!("User mode [{}] by {}", text_args, inc.nick.unwrap_or(target));
            self.show(self.buffer, inc, &[], &text);
            return;
        }
        let index = match self.channel_index(target) {
            Some(index) => index,
            None => {
                let text = format!("Mode {} [{}] by {}", target, text_args, inc.nick());
                self.show(self.buffer, inc, &[], &text);
                return;
            }
        };
        let config = self.ctx.config.clone();
        let own = self.nick.clone().unwrap_or_default();
        let setter = match (&inc.nick, &inc.address) {
            (Some(nick), Some(address)) => Some(format!("{}!{}", nick, address)),
            (Some(nick), None) => Some((*nick).to_owned()),
            _ => None,
        };
        let ctx = ModeContext {
            isupport: &self.isupport,
            prefix: &self.prefix,
            own_nick: &own,
            smart_filter_mode: Some(config.smart_filter_mode()).filter(|_| config.smart_filter()),
            smart_filter_delay: config.smart_filter_delay(),
            setter: setter.as_deref(),
            now: inc.date,
        };
        let args = Some(mode_args.as_str()).filter(|a| !a.is_empty());
        let outcome = self.channels[index].mode_set(&ctx, modes, args);
        for nick in &outcome.nicks {
            self.nicklist_update(index, nick);
        }
        let mut extra = vec![];
        if outcome.smart_filter && !inc.nick_is_me {
            extra.push(SMART_FILTER_TAG);
        }
        let text = format!("Mode {} [{}] by {}", self.channels[index].name, text_args, inc.nick());
        self.show(self.channels[index].buffer, inc, &extra, &text);
    }

    // Applies `+iw-x` style changes to our user modes.
    fn apply_user_modes(&mut self, modes: &str) {
        let mut current: Vec<char> = self.nick_modes.as_deref().unwrap_or("").chars().collect();
        let mut set = true;
        for c in modes.chars() {
            match c {
                '+' => set = true,
                '-' => set = false,
                ':' | ' ' => (),
                c if set => {
                    if !current.contains(&c) {
                        current.push(c);
                    }
                }
                c => current.retain(|m| *m != c),
            }
        }
        self.nick_modes = Some(current.into_iter().collect()).filter(|m: &String| !m.is_empty());
    }

    // Messages

    fn recv_privmsg(&mut self, inc: &Incoming, target: &str, text: &str) {
        let nick = inc.nick().to_owned();
        let casemap = self.casemapping();
        let own = self.nick.clone().unwrap_or_default();
        let prefix_chars = self.prefix.chars();
        let mut chars = target.chars();
        let first = chars.next();
        let rest = chars.as_str();
        let (is_channel, status_msg, channel_name) = if self.is_channel_name(target) {
            (true, false, target)
        } else if first.map_or(false, |c| prefix_chars.contains(c)) && self.is_channel_name(rest) {
            (true, true, rest)
        } else {
            (false, false, target)
        };

        let (ctcp, body) = match text.strip_prefix('\x01') {
            Some(rest) => {
                let rest = rest.trim_end_matches('\x01');
                let mut parts = rest.splitn(2, ' ');
                let kind = parts.next().unwrap_or_default().to_ascii_uppercase();
                (Some(kind), parts.next().unwrap_or_default().to_owned())
            }
            None => (None, text.to_owned()),
        };
        let self_tags: &[&str] = if inc.nick_is_me {
            &["self_msg", "notify_none", "no_highlight"]
        } else {
            &["notify_message"]
        };

        if is_channel {
            let index = match self.channel_index(channel_name) {
                Some(index) => index,
                None => return,
            };
            let now = self.ctx.now();
            let unmask = self.ctx.config.smart_filter_join_unmask();
            {
                let mut ui = self.ctx.ui.lock();
                self.channels[index].join_smart_filtered_unmask(&mut *ui, &nick, now, unmask);
            }
            if let Some(address) = &inc.address {
                if let Some(entry) = self.channels[index].nick_mut(casemap, &nick) {
                    entry.host = Some(address.clone());
                }
            }
            let line = match (&ctcp, status_msg) {
                (Some(kind), _) if kind == "ACTION" => format!("* {} {}", nick, body),
                (Some(kind), _) => format!("{} sent CTCP {} to {}", nick, kind, target),
                (None, true) => format!("Msg({}) -> {}: {}", nick, target, body),
                (None, false) => {
                    let prefix = self.channels[index].nick(casemap, &nick).map_or(' ', |n| n.prefix());
                    format!("<{}{}> {}", prefix.to_string().trim(), nick, body)
                }
            };
            self.show(self.channels[index].buffer, inc, self_tags, &line);
            if let Some(kind) = ctcp.as_deref().filter(|kind| *kind != "ACTION") {
                self.recv_ctcp(inc, kind, &body);
            }
            if ctcp.as_deref().map_or(true, |kind| kind == "ACTION") {
                if !inc.nick_is_me {
                    self.typing_nick(index, &nick, TypingState::Off);
                }
                let delay = self.ctx.config.smart_filter_delay();
                let chan = &mut self.channels[index];
                chan.nick_speaking_add(casemap, &nick, has_highlight(&body, &own));
                chan.nick_speaking_time_remove_old(now, delay);
                chan.nick_speaking_time_add(casemap, &nick, now);
            }
            return;
        }

        let remote = if inc.nick_is_me { target.to_owned() } else { nick.clone() };
        if let Some(kind) = ctcp.as_ref().filter(|kind| *kind != "ACTION") {
            let line = format!("CTCP {} from {}", kind, inc.who());
            self.show(self.buffer, inc, &["irc_ctcp"], &line);
            self.recv_ctcp(inc, kind, &body);
            return;
        }
        let index = match self.channel_index(&remote) {
            Some(index) => {
                if self.channels[index].name != remote {
                    self.private_rename(index, &remote);
                }
                Some(index)
            }
            None if !inc.nick_is_me || !self.caps.echo_message => {
                Some(self.channel_new(ChannelKind::Private, &remote, false, false))
            }
            None => None,
        };
        let buffer = index.and_then(|i| self.channels[i].buffer).or(self.buffer);
        if let Some(index) = index {
            if !inc.nick_is_me {
                self.typing_nick(index, &nick, TypingState::Off);
            }
            if !inc.nick_is_me || !self.caps.echo_message || casemap.eq(&own, &remote) {
                self.channels[index].set_topic(inc.address.as_deref());
            }
        }
        let line = match ctcp {
            Some(_) => format!("* {} {}", nick, body),
            None => format!("<{}> {}", nick, body),
        };
        let mut tags: Vec<&str> = self_tags.to_vec();
        if !inc.nick_is_me {
            tags.push("notify_private");
        }
        self.show(buffer, inc, &tags, &line);
        if let Some(index) = index {
            self.channels[index].has_quit_server = false;
        }
    }

    fn recv_tagmsg(&mut self, inc: &Incoming, message: &Message, args: &[String]) {
        let (nick, target) = match (inc.nick, args.first()) {
            (Some(nick), Some(target)) if !inc.nick_is_me => (nick, target),
            _ => return,
        };
        let casemap = self.casemapping();
        let name = if self.is_channel_name(target) {
            target.as_str()
        } else if self.nick.as_deref().map_or(false, |own| casemap.eq(own, target)) {
            nick
        } else {
            return;
        };
        let index = match self.channel_index(name) {
            Some(index) => index,
            None => return,
        };
        if let Some(value) = message.tag("+typing") {
            self.typing_nick(index, nick, TypingState::from_tag(value));
        }
    }

    // Answers a CTCP request from someone else.
    fn recv_ctcp(&mut self, inc: &Incoming, kind: &str, args: &str) {
        if inc.nick_is_me {
            return;
        }
        let nick = inc.nick().to_owned();
        if !self.ctcp_request(&nick, kind, args) && self.ctx.config.display_ctcp_unknown() {
            let request = if args.is_empty() {
                kind.to_owned()
            } else {
                format!("{} {}", kind, args)
            };
            let text = format!("Unknown CTCP requested by {}: {}", inc.who(), request);
            self.show(self.buffer, inc, &["irc_ctcp"], &text);
        }
    }

    fn recv_notice(&mut self, inc: &Incoming, target: &str, text: &str) {
        let nick = match inc.nick {
            Some(nick) if self.is_connected() => nick,
            _ => {
                self.show(self.buffer, inc, &["notify_private"], text);
                return;
            }
        };
        let target_channel = target.trim_start_matches(|c: char| self.prefix.chars().contains(c));
        if self.is_channel_name(target_channel) {
            let line = format!("Notice({}) -> {}: {}", nick, target, text);
            self.show(self.channel_buffer(target_channel), inc, &["notify_message"], &line);
            return;
        }
        let remote = if inc.nick_is_me { target } else { nick };
        let buffer = self
            .channel_search(remote)
            .filter(|c| c.kind == ChannelKind::Private)
            .and_then(|c| c.buffer)
            .or(self.buffer);
        let line = if inc.nick_is_me {
            format!("Notice -> {}: {}", target, text)
        } else {
            format!("{} ({}): {}", nick, inc.address.as_deref().unwrap_or(""), text)
        };
        self.show(buffer, inc, &["notify_private"], &line);
    }

    // IRCv3 updates

    fn recv_account(&mut self, inc: &Incoming, account: &str) {
        let nick = match inc.nick {
            Some(nick) => nick,
            None => return,
        };
        let casemap = self.casemapping();
        let account = Some(account).filter(|a| *a != "*").map(|a| a.to_owned());
        for channel in &mut self.channels {
            if let Some(entry) = channel.nick_mut(casemap, nick) {
                entry.account = account.clone();
            }
        }
    }

    fn recv_chghost(&mut self, inc: &Incoming, user: &str, host: &str) {
        let nick = match inc.nick {
            Some(nick) => nick,
            None => return,
        };
        let casemap = self.casemapping();
        let address = format!("{}@{}", user, host);
        if inc.nick_is_me {
            self.host = Some(address.clone());
        }
        let text = format!("{} has changed host to {}", inc.who(), address);
        for index in 0..self.channels.len() {
            let present = match self.channels[index].kind {
                ChannelKind::Private => casemap.eq(&self.channels[index].name, nick),
                ChannelKind::Channel => match self.channels[index].nick_mut(casemap, nick) {
                    Some(entry) => {
                        entry.host = Some(address.clone());
                        true
                    }
                    None => false,
                },
            };
            if present {
                self.show(self.channels[index].buffer, inc, &[], &text);
            }
        }
    }

    fn recv_setname(&mut self, inc: &Incoming, realname: &str) {
        let nick = match inc.nick {
            Some(nick) => nick,
            None => return,
        };
        let casemap = self.casemapping();
        for channel in &mut self.channels {
            if let Some(entry) = channel.nick_mut(casemap, nick) {
                entry.realname = Some(realname.to_owned());
            }
        }
        if inc.nick_is_me {
            let text = format!("Your real name has been set to \"{}\"", realname);
            self.show(self.buffer, inc, &[], &text);
        }
    }

    // Numerics

    fn recv_numeric(&mut self, inc: &Incoming, response: Response, args: &[String]) {
        let arg = |i: usize| args.get(i).map_or("", |s| s.as_str());
        match response {
            Response::RPL_WELCOME => self.recv_welcome(inc, args),
            Response::RPL_ISUPPORT => {
                let tokens = isupport_tokens(args);
                if !tokens.is_empty() {
                    self.isupport.apply(tokens);
                    self.prefix = crate::client::data::PrefixTable::from_isupport(&self.isupport);
                }
                self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, 1));
            }
            Response::RPL_UMODEIS => {
                let modes = arg(1).trim_start_matches('+');
                self.nick_modes = Some(modes.to_owned()).filter(|m| !m.is_empty());
                let text = format!("User mode for {} is [+{}]", arg(0), modes);
                self.show(self.buffer, inc, &["irc_numeric"], &text);
            }
            Response::RPL_AWAY => self.recv_301(inc, arg(1), arg(2)),
            Response::RPL_ISON => {
                let text = format!("Users online: {}", arg(1));
                self.show(self.buffer, inc, &["irc_numeric"], &text);
            }
            Response::RPL_UNAWAY | Response::RPL_NOWAWAY => {
                let away = response == Response::RPL_NOWAWAY;
                self.is_away = away;
                self.away_time = if away { Some(self.ctx.now()) } else { None };
                let own = self.nick.clone().unwrap_or_default();
                self.set_nick_away(&own, away);
                self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, 1));
            }
            Response::RPL_ENDOFWHO => {
                let checking = self.channel_search_mut(arg(1)).filter(|c| c.checking_whox > 0);
                match checking {
                    Some(channel) => channel.checking_whox -= 1,
                    None => self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, 1)),
                }
            }
            Response::RPL_CHANNELMODEIS => self.recv_324(inc, args),
            Response::RPL_CREATIONTIME => {
                if self.join_msg_display(arg(1), "329") {
                    let date = parse_time(arg(2)).map_or_else(|| arg(2).to_owned(), |d| d.to_rfc2822());
                    let text = format!("Channel created on {}", date);
                    self.show(self.channel_buffer(arg(1)), inc, &["irc_numeric"], &text);
                }
            }
            Response::RPL_NOTOPIC => {
                if let Some(channel) = self.channel_search_mut(arg(1)) {
                    channel.set_topic(None);
                }
                let text = format!("No topic set for channel {}", arg(1));
                self.show(self.channel_buffer(arg(1)), inc, &["irc_numeric"], &text);
            }
            Response::RPL_TOPIC => {
                let (channel, topic) = (arg(1).to_owned(), arg(2).to_owned());
                if let Some(chan) = self.channel_search_mut(&channel) {
                    chan.set_topic(Some(&topic).filter(|t| !t.is_empty()).map(|t| t.as_str()));
                    self.ctx.emit(Event::TopicChanged {
                        server: self.name.clone(),
                        channel: channel.clone(),
                        topic: Some(topic.clone()).filter(|t| !t.is_empty()),
                    });
                }
                if self.join_msg_display(&channel, "332") {
                    let text = format!("Topic for {} is \"{}\"", channel, topic);
                    self.show(self.channel_buffer(&channel), inc, &["irc_numeric"], &text);
                }
            }
            Response::RPL_TOPICWHOTIME => {
                if self.join_msg_display(arg(1), "333") {
                    let date = parse_time(arg(3)).map_or_else(|| arg(3).to_owned(), |d| d.to_rfc2822());
                    let text = format!("Topic set by {} on {}", arg(2), date);
                    self.show(self.channel_buffer(arg(1)), inc, &["irc_numeric"], &text);
                }
            }
            Response::RPL_INVITING => {
                let text = format!("{} has invited {} to {}", arg(0), arg(1), arg(2));
                self.show(self.channel_buffer(arg(2)), inc, &["irc_numeric"], &text);
            }
            Response::RPL_INVITELIST => self.recv_modelist_item(inc, 'I', args, 2),
            Response::RPL_EXCEPTLIST => self.recv_modelist_item(inc, 'e', args, 2),
            Response::RPL_BANLIST => self.recv_modelist_item(inc, 'b', args, 2),
            Response::RPL_QUIETLIST => self.recv_modelist_item(inc, 'q', args, 3),
            Response::RPL_ENDOFINVITELIST => self.recv_modelist_end(inc, 'I', args),
            Response::RPL_ENDOFEXCEPTLIST => self.recv_modelist_end(inc, 'e', args),
            Response::RPL_ENDOFBANLIST => self.recv_modelist_end(inc, 'b', args),
            Response::RPL_ENDOFQUIETLIST => self.recv_modelist_end(inc, 'q', args),
            Response::RPL_WHOREPLY => {
                let hop_realname = arg(7);
                let realname = hop_realname.splitn(2, ' ').nth(1).unwrap_or("");
                self.recv_who_entry(inc, args, arg(1), arg(5), arg(2), arg(3), arg(6), None, realname);
            }
            Response::RPL_WHOSPCRPL => {
                if args.len() >= 10 {
                    let account = Some(arg(8)).filter(|a| *a != "0");
                    self.recv_who_entry(inc, args, arg(1), arg(5), arg(2), arg(3), arg(6), Some(account), arg(9));
                } else {
                    self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, 1));
                }
            }
            Response::RPL_NAMREPLY => self.recv_353(inc, arg(2), arg(3)),
            Response::RPL_ENDOFNAMES => self.recv_366(inc, arg(1)),
            Response::ERR_ERRONEOUSNICKNAME | Response::ERR_NICKNAMEINUSE | Response::ERR_UNAVAILRESOURCE => {
                self.recv_nick_error(inc, args)
            }
            Response::RPL_MONONLINE | Response::RPL_MONOFFLINE => {
                let online = response == Response::RPL_MONONLINE;
                for target in arg(1).split(',').filter(|t| !t.is_empty()) {
                    let mut parts = target.splitn(2, '!');
                    let nick = parts.next().unwrap_or_default();
                    self.notify_set_is_on_server(nick, parts.next(), online);
                }
            }
            Response::RPL_LOGGEDIN | Response::RPL_LOGGEDOUT => {
                self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, args.len().saturating_sub(1)));
            }
            Response::RPL_SASLSUCCESS | Response::ERR_SASLALREADY => {
                self.sasl_end_ok(&join_params(args, args.len().saturating_sub(1)))
            }
            Response::ERR_NICKLOCKED | Response::ERR_SASLFAIL | Response::ERR_SASLTOOLONG | Response::ERR_SASLABORT => {
                self.sasl_end_fail(&join_params(args, args.len().saturating_sub(1)))
            }
            _ => self.show(self.buffer, inc, &["irc_numeric"], &join_params(args, 1)),
        }
    }

    fn recv_301(&mut self, inc: &Incoming, nick: &str, message: &str) {
        let index = self
            .channel_index(nick)
            .filter(|i| self.channels[*i].kind == ChannelKind::Private);
        match index {
            Some(index) => {
                if self.channels[index].away_message.as_deref() != Some(message) {
                    self.channels[index].away_message = Some(message.to_owned());
                    let text = format!("{} is away: {}", nick, message);
                    self.show(self.channels[index].buffer, inc, &["irc_numeric"], &text);
                }
            }
            None => {
                let text = format!("{} is away: {}", nick, message);
                self.show(self.buffer, inc, &["irc_numeric"], &text);
            }
        }
    }

    fn recv_324(&mut self, inc: &Incoming, args: &[String]) {
        let channel = args.get(1).cloned().unwrap_or_default();
        let modes = args.get(2).cloned().unwrap_or_default();
        let mode_args = join_params(args, 3);
        if let Some(index) = self.channel_index(&channel) {
            self.channels[index].set_modes(None);
            if !modes.is_empty() {
                let own = self.nick.clone().unwrap_or_default();
                let ctx = ModeContext {
                    isupport: &self.isupport,
                    prefix: &self.prefix,
                    own_nick: &own,
                    smart_filter_mode: None,
                    smart_filter_delay: 0,
                    setter: None,
                    now: inc.date,
                };
                let args = Some(mode_args.as_str()).filter(|a| !a.is_empty());
                self.channels[index].mode_set(&ctx, &modes, args);
            }
        }
        if self.join_msg_display(&channel, "324") {
            let text = format!("Mode {} [{}]", channel, join_params(args, 2));
            self.show(self.channel_buffer(&channel), inc, &["irc_numeric"], &text);
        }
    }

    // One entry of a ban, exception, invite or quiet list; `mask_at` is the position of the mask.
    fn recv_modelist_item(&mut self, inc: &Incoming, mode: char, args: &[String], mask_at: usize) {
        let channel = args.get(1).cloned().unwrap_or_default();
        let mask = match args.get(mask_at) {
            Some(mask) => mask.clone(),
            None => return,
        };
        let setter = args.get(mask_at + 1).map(|s| s.as_str());
        let datetime = args.get(mask_at + 2).and_then(|t| parse_time(t));
        let number = self.channel_search_mut(&channel).map(|chan| {
            let list = chan.modelist_or_insert(mode);
            if list.state() != ModelistState::Receiving {
                list.start_receiving();
            }
            list.add(&mask, setter, datetime)
        });
        let verb = match mode {
            'b' => "banned",
            'e' => "exempted",
            'I' => "invited",
            _ => "quieted",
        };
        let mut text = match number {
            Some(number) => format!("{}: [{}] {} {}", channel, number + 1, mask, verb),
            None => format!("{}: {} {}", channel, mask, verb),
        };
        if let Some(setter) = setter {
            text.push_str(&format!(" by {}", setter));
        }
        if let Some(date) = datetime {
            text.push_str(&format!(" on {}", date.to_rfc2822()));
        }
        self.show(self.channel_buffer(&channel), inc, &["irc_numeric"], &text);
    }

    fn recv_modelist_end(&mut self, inc: &Incoming, mode: char, args: &[String]) {
        let channel = args.get(1).cloned().unwrap_or_default();
        if let Some(chan) = self.channel_search_mut(&channel) {
            chan.modelist_or_insert(mode).end_receiving();
        }
        let text = format!("{}: {}", channel, args.last().map_or("", |s| s.as_str()));
        self.show(self.channel_buffer(&channel), inc, &["irc_numeric"], &text);
    }

    #[allow(clippy::too_many_arguments)]
    fn recv_who_entry(
        &mut self,
        inc: &Incoming,
        args: &[String],
        channel: &str,
        nick: &str,
        user: &str,
        host: &str,
        flags: &str,
        account: Option<Option<&str>>,
        realname: &str,
    ) {
        let casemap = self.casemapping();
        let mut display = true;
        if let Some(index) = self.channel_index(channel) {
            let chan = &mut self.channels[index];
            display = chan.checking_whox == 0;
            if let Some(entry) = chan.nick_mut(casemap, nick) {
                entry.host = Some(format!("{}@{}", user, host));
                entry.away = flags.starts_with('G');
                if !realname.is_empty() {
                    entry.realname = Some(realname.to_owned());
                }
                if let Some(account) = account {
                    entry.account = account.map(|a| a.to_owned());
                }
                self.nicklist_update(index, nick);
            }
        }
        if display {
            self.show(self.channel_buffer(channel), inc, &["irc_numeric"], &join_params(args, 1));
        }
    }

    fn recv_353(&mut self, inc: &Incoming, channel: &str, names: &str) {
        let index = match self.channel_index(channel) {
            Some(index) if !self.channels[index].join_msg_received.contains("366") => index,
            _ => {
                let text = format!("Nicks {}: [{}]", channel, names);
                self.show(self.channel_buffer(channel), inc, &["irc_numeric"], &text);
                return;
            }
        };
        let casemap = self.casemapping();
        for entry in names.split(' ').filter(|n| !n.is_empty()) {
            if let Some(nick) = Nick::from_names_entry(entry, &self.prefix) {
                let name = nick.name.clone();
                self.channels[index].nick_add(casemap, nick);
                self.nicklist_update(index, &name);
            }
        }
    }

    fn recv_366(&mut self, inc: &Incoming, channel: &str) {
        let index = self.channel_index(channel);
        if let Some(index) = index {
            if !self.channels[index].join_msg_received.contains("366") {
                let name = self.channels[index].name.clone();
                self.send(Priority::Low, &format!("MODE {}", name));
                self.channel_check_whox(index);
            }
        }
        if self.join_msg_display(channel, "366") {
            let text = match index {
                Some(index) => format!("Channel {}: {} nicks", channel, self.channels[index].nicks().len()),
                None => format!("End of names for {}", channel),
            };
            self.show(self.channel_buffer(channel), inc, &["irc_numeric"], &text);
        }
    }

    // The server forwarded us from one channel to another.
    fn recv_470(&mut self, inc: &Incoming, args: &[String]) {
        let text = join_params(args, 1);
        self.show(self.buffer, inc, &["irc_numeric"], &text);
        let (old, new) = match (args.get(1), args.get(2)) {
            (Some(old), Some(new)) => (old.clone(), new.clone()),
            _ => return,
        };
        let casemap = self.casemapping();
        if self.channel_search(&new).is_none() {
            let old_name = self.channel_buffer_name(&old);
            let new_name = self.channel_buffer_name(&new);
            let mut ui = self.ctx.ui.lock();
            if let Some(buffer) = ui.buffer_search(&old_name) {
                ui.buffer_set(buffer, "short_name", &new);
                ui.buffer_set(buffer, "name", &new_name);
                ui.buffer_set(buffer, "localvar_set_channel", &new);
            }
        }
        if self.config.autojoin_dynamic() {
            let autojoin = join::rename(casemap, self.config.autojoin(), &old, &new);
            self.set_autojoin(autojoin);
        }
        let (old_lower, new_lower) = (casemap.to_lower(&old), casemap.to_lower(&new));
        if let Some(time) = self.join_manual.remove(&old_lower) {
            self.join_manual.insert(new_lower.clone(), time);
        }
        if let Some(time) = self.join_noswitch.remove(&old_lower) {
            self.join_noswitch.insert(new_lower, time);
        }
    }
}

// The tokens of a 005 reply: everything after the nick, minus the trailing text when the
// server sent one. Tokens never hold a space and start with an uppercase letter, a digit or `-`.
fn isupport_tokens(args: &[String]) -> &[String] {
    let tokens = args.get(1..).unwrap_or(&[]);
    match tokens.split_last() {
        Some((last, rest)) if !is_isupport_token(last) => rest,
        _ => tokens,
    }
}

fn is_isupport_token(arg: &str) -> bool {
    !arg.contains(' ')
        && arg
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
}
