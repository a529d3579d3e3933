//! What the command layer can ask of a server: joining and parting, messages, away, mode
//! changes on many nicks or masks at once, and edits of the `autojoin` option.
use chrono::Duration;

use super::Server;
use crate::client::data::join::{self, JoinEntry, JoinList, JoinSort};
use crate::client::data::mask::{default_ban_mask, nick_match};
use crate::client::data::TypingState;
use crate::client::event::{ChannelKind, SessionState};
use crate::client::outqueue::Priority;
use crate::error::CommandError;

/// Confirms a `*` target in mass mode changes.
const YES: &str = "-yes";

/// Seconds after which an unchanged `active` typing state is sent again.
const TYPING_ACTIVE_RESEND: i64 = 3;

impl Server {
    fn check_connected(&self) -> Result<(), CommandError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CommandError::NotConnected {
                server: self.name.clone(),
            })
        }
    }

    fn check_channel(&self, channel: &str) -> Result<usize, CommandError> {
        match self.channel_index(channel) {
            Some(index) if self.channels[index].is_channel() => Ok(index),
            _ => Err(CommandError::ChannelNotFound {
                name: channel.to_owned(),
            }),
        }
    }

    /// Joins channels given as a join string like `#a,#b key`.
    ///
    /// A `manual` join is one the user typed: the channel buffer gets the focus when the server
    /// confirms it, unless `noswitch`, and with `autojoin_dynamic` the channel is added to the
    /// `autojoin` option. Keys are remembered for the channels they belong to.
    pub fn join(&mut self, arguments: &str, manual: bool, noswitch: bool) -> Result<(), CommandError> {
        self.check_connected()?;
        let arguments = arguments.trim();
        if arguments.is_empty() {
            return Err(CommandError::MissingArgument { what: "channel" });
        }
        let casemap = self.casemapping();
        let entries = join::split(casemap, arguments, JoinSort::Disabled);
        if entries.is_empty() {
            return Err(CommandError::MissingArgument { what: "channel" });
        }

        if manual && !noswitch {
            if let Some(buffer) = self.channel_search(&entries[0].name).and_then(|c| c.buffer) {
                self.ctx.ui.lock().buffer_set(buffer, "display", "1");
            }
        }
        let now = self.ctx.now();
        for entry in &entries {
            let lower = casemap.to_lower(&entry.name);
            if manual {
                self.join_manual.insert(lower.clone(), now);
            }
            if noswitch {
                self.join_noswitch.insert(lower.clone(), now);
            }
            if let Some(key) = &entry.key {
                match self.channel_search_mut(&entry.name) {
                    Some(channel) => channel.key = Some(key.clone()),
                    None => {
                        self.join_channel_key.insert(lower, key.clone());
                    }
                }
            }
        }
        self.send(Priority::High, &format!("JOIN {}", join::build(&entries)));
        Ok(())
    }

    /// Leaves a channel, or closes a private conversation.
    pub fn part(&mut self, channel: &str, reason: Option<&str>) -> Result<(), CommandError> {
        self.check_connected()?;
        let index = self.channel_index(channel).ok_or_else(|| CommandError::ChannelNotFound {
            name: channel.to_owned(),
        })?;
        if self.channels[index].kind == ChannelKind::Private {
            if let Some(buffer) = self.channels[index].buffer.take() {
                self.ctx.ui.lock().buffer_close(buffer);
            }
            self.channel_free(index);
            return Ok(());
        }
        let name = self.channels[index].name.clone();
        let reason = reason
            .filter(|r| !r.is_empty())
            .or_else(|| self.config.default_msg_part().filter(|r| !r.is_empty()))
            .map(|r| r.to_owned());
        let line = match reason {
            Some(reason) => format!("PART {} :{}", name, reason),
            None => format!("PART {}", name),
        };
        self.send(Priority::High, &line);
        if self.config.autojoin_dynamic() && !self.channels[index].cycle {
            let autojoin = join::remove(self.casemapping(), self.config.autojoin(), &name);
            self.set_autojoin(autojoin);
        }
        Ok(())
    }

    /// Leaves a channel and joins it again.
    pub fn cycle(&mut self, channel: &str, reason: Option<&str>) -> Result<(), CommandError> {
        self.check_connected()?;
        let index = self.check_channel(channel)?;
        self.channels[index].cycle = true;
        self.part(channel, reason)
    }

    /// Sends `QUIT` right away, bypassing the queues.
    pub fn quit(&mut self, reason: Option<&str>) {
        let reason = reason
            .filter(|r| !r.is_empty())
            .or_else(|| self.config.default_msg_quit().filter(|r| !r.is_empty()))
            .map(|r| r.to_owned());
        match reason {
            Some(reason) => self.send(Priority::Immediate, &format!("QUIT :{}", reason)),
            None => self.send(Priority::Immediate, "QUIT"),
        };
    }

    /// Disconnects on user request: quits if connected, then closes without reconnecting. A
    /// pending reconnection is cancelled.
    pub fn user_disconnect(&mut self, reason: Option<&str>) {
        if self.state == SessionState::Disconnected {
            if self.reconnect_start.take().is_some() {
                self.reconnect_delay = 0;
                self.print(&[], "auto-reconnection is cancelled");
            }
            return;
        }
        if self.is_connected() {
            self.quit(reason);
        }
        self.disconnect(false, false);
    }

    // Shows what we sent, unless the server will echo it back.
    fn local_echo(&mut self, target: &str, line: &str) {
        if self.caps.echo_message {
            return;
        }
        let buffer = match self.channel_index(target) {
            Some(index) => self.channels[index].buffer,
            None if self.is_channel_name(target) => self.buffer,
            None => {
                let index = self.channel_new(ChannelKind::Private, target, true, false);
                self.channels[index].buffer
            }
        };
        let nick_tag = format!("nick_{}", self.nick.as_deref().unwrap_or_default());
        let tags = ["irc_privmsg", "self_msg", "notify_none", "no_highlight", nick_tag.as_str()];
        self.ctx.print(buffer, &tags, line);
    }

    fn own_display_nick(&self, target: &str) -> String {
        let nick = self.nick.clone().unwrap_or_default();
        let prefix = self
            .channel_search(target)
            .and_then(|c| c.nick(self.casemapping(), &nick))
            .map_or(' ', |n| n.prefix());
        format!("{}{}", prefix.to_string().trim(), nick)
    }

    /// Sends a message to a channel or a nick, split over as many lines as needed. Without
    /// `echo-message`, each line is shown locally as it is queued.
    pub fn privmsg(&mut self, target: &str, text: &str) -> Result<Vec<String>, CommandError> {
        self.check_connected()?;
        if target.is_empty() {
            return Err(CommandError::MissingArgument { what: "target" });
        }
        let lines = self.send(Priority::High, &format!("PRIVMSG {} :{}", target, text));
        if let Some(index) = self.channel_index(target) {
            self.channels[index].typing_state = TypingState::Off;
        }
        let shown = self.own_display_nick(target);
        for line in &lines {
            let body = line.splitn(2, " :").nth(1).unwrap_or_default();
            self.local_echo(target, &format!("<{}> {}", shown, body));
        }
        Ok(lines)
    }

    /// Sends a CTCP `ACTION` (`/me`).
    pub fn action(&mut self, target: &str, text: &str) -> Result<(), CommandError> {
        self.check_connected()?;
        self.send(Priority::High, &format!("PRIVMSG {} :\x01ACTION {}\x01", target, text));
        let nick = self.nick.clone().unwrap_or_default();
        self.local_echo(target, &format!("* {} {}", nick, text));
        Ok(())
    }

    /// Sends a notice.
    pub fn notice(&mut self, target: &str, text: &str) -> Result<(), CommandError> {
        self.check_connected()?;
        let lines = self.send(Priority::High, &format!("NOTICE {} :{}", target, text));
        if !self.caps.echo_message {
            let buffer = self.channel_search(target).and_then(|c| c.buffer).or(self.buffer);
            for line in &lines {
                let body = line.splitn(2, " :").nth(1).unwrap_or_default();
                let shown = format!("Notice -> {}: {}", target, body);
                self.ctx.print(buffer, &["irc_notice", "self_msg", "notify_none"], &shown);
            }
        }
        Ok(())
    }

    /// Tells a channel or a nick that we are typing, paused or done, with a `+typing` tag.
    ///
    /// Nothing is sent without `message-tags`, nor when the state did not change, except that
    /// `active` is repeated every few seconds while typing goes on. Returns whether a line was
    /// queued.
    pub fn send_typing(&mut self, target: &str, state: TypingState) -> Result<bool, CommandError> {
        self.check_connected()?;
        let index = self.channel_index(target).ok_or_else(|| CommandError::ChannelNotFound {
            name: target.to_owned(),
        })?;
        if !self.caps.message_tags || !self.ctx.config.typing_status_self() {
            return Ok(false);
        }
        let now = self.ctx.now();
        let chan = &self.channels[index];
        let state = if state == TypingState::Done { TypingState::Off } else { state };
        let due = match (chan.typing_state, state) {
            (TypingState::Off, TypingState::Off) => false,
            (TypingState::Active, TypingState::Active) => chan
                .typing_status_sent
                .map_or(true, |sent| now - sent >= Duration::seconds(TYPING_ACTIVE_RESEND)),
            (old, new) => old != new,
        };
        if !due {
            return Ok(false);
        }
        let name = chan.name.clone();
        self.send(Priority::Low, &format!("@+typing={} TAGMSG {}", state.as_str(), name));
        let chan = &mut self.channels[index];
        chan.typing_state = state;
        chan.typing_status_sent = Some(now);
        Ok(true)
    }

    /// Marks us away with a message, or back with `None`. When not connected, the message is
    /// kept and sent after the next registration.
    pub fn set_away(&mut self, message: Option<&str>) {
        let message = message.filter(|m| !m.is_empty());
        self.away_message = message.map(|m| m.to_owned());
        if !self.is_connected() {
            return;
        }
        let own = self.nick.clone().unwrap_or_default();
        match message {
            Some(message) => {
                self.is_away = true;
                self.away_time = Some(self.ctx.now());
                self.send(Priority::High, &format!("AWAY :{}", message));
                self.set_nick_away(&own, true);
            }
            None => {
                self.send(Priority::High, "AWAY");
                self.set_nick_away(&own, false);
                self.is_away = false;
                self.away_time = None;
            }
        }
    }

    /// Asks for the topic of a channel, or changes it. An empty topic unsets it.
    pub fn topic(&mut self, channel: &str, topic: Option<&str>) -> Result<(), CommandError> {
        self.check_connected()?;
        let line = match topic {
            Some(topic) => format!("TOPIC {} :{}", channel, topic),
            None => format!("TOPIC {}", channel),
        };
        self.send(Priority::High, &line);
        Ok(())
    }

    /// Kicks a nick from a channel.
    pub fn kick(&mut self, channel: &str, nick: &str, reason: Option<&str>) -> Result<(), CommandError> {
        self.check_connected()?;
        if nick.is_empty() {
            return Err(CommandError::MissingArgument { what: "nick" });
        }
        let reason = reason
            .filter(|r| !r.is_empty())
            .or_else(|| self.config.default_msg_kick().filter(|r| !r.is_empty()))
            .map(|r| r.to_owned());
        let line = match reason {
            Some(reason) => format!("KICK {} {} :{}", channel, nick, reason),
            None => format!("KICK {} {}", channel, nick),
        };
        self.send(Priority::High, &line);
        Ok(())
    }

    // Sends `MODE` lines of at most MODES changes each; only the first one is high priority.
    fn send_mode_batches(&mut self, channel: &str, set: bool, mode: char, targets: &[String]) -> Vec<String> {
        let sign = if set { '+' } else { '-' };
        let mut lines = vec![];
        for batch in targets.chunks(self.isupport.modes()) {
            let modes: String = std::iter::repeat(mode).take(batch.len()).collect();
            let line = format!("MODE {} {}{} {}", channel, sign, modes, batch.join(" "));
            let priority = if lines.is_empty() { Priority::High } else { Priority::Low };
            lines.extend(self.send(priority, &line));
        }
        lines
    }

    /// Sets or removes a prefix mode (such as `o` or `v`) on the nicks of a channel matching
    /// `targets`, which may hold wildcards. A lone `*` needs a trailing `-yes`. Nicks that already
    /// are in the asked state are skipped, and so is our own nick when removing `o` or `h` with a
    /// wildcard. Returns the `MODE` lines sent.
    pub fn send_mode_nicks(
        &mut self,
        channel: &str,
        set: bool,
        mode: char,
        targets: &[&str],
    ) -> Result<Vec<String>, CommandError> {
        self.check_connected()?;
        let index = self.check_channel(channel)?;
        let mut targets = targets;
        let yes = targets.len() > 1 && targets.last() == Some(&YES);
        if yes {
            targets = &targets[..targets.len() - 1];
        }
        if targets.is_empty() {
            return Err(CommandError::MissingArgument { what: "nick" });
        }
        if !yes && targets.contains(&"*") {
            return Err(CommandError::WildcardNeedsYes);
        }

        let casemap = self.casemapping();
        let own = self.nick.clone().unwrap_or_default();
        let has_prefix = self.prefix.char_for_mode(mode).is_some();
        let mut selected: Vec<String> = vec![];
        for nick in self.channels[index].nicks() {
            if selected.iter().any(|s| casemap.eq(s, &nick.name)) {
                continue;
            }
            let wanted = targets.iter().any(|target| {
                if !nick_match(casemap, &nick.name, target) {
                    return false;
                }
                let skip_self = !set && (mode == 'o' || mode == 'h') && target.contains('*') && nick.name == own;
                !skip_self
            });
            if !wanted {
                continue;
            }
            if has_prefix && nick.has_mode(mode, &self.prefix) == set {
                continue;
            }
            selected.push(nick.name.clone());
        }
        let name = self.channels[index].name.clone();
        Ok(self.send_mode_batches(&name, set, mode, &selected))
    }

    /// Sets or removes a list mode (such as `b` or `q`) for masks. A nick present on the channel
    /// stands for its default ban mask; when removing, a number stands for the item shown with
    /// that number in the mode list. Returns the `MODE` lines sent.
    pub fn send_mode_masks(
        &mut self,
        channel: &str,
        set: bool,
        mode: char,
        masks: &[&str],
    ) -> Result<Vec<String>, CommandError> {
        self.check_connected()?;
        let index = self.check_channel(channel)?;
        if masks.is_empty() {
            return Err(CommandError::MissingArgument { what: "mask" });
        }
        let casemap = self.casemapping();
        let chan = &self.channels[index];
        let mut resolved: Vec<String> = Vec::with_capacity(masks.len());
        for mask in masks {
            let number = mask.parse::<u32>().ok().filter(|_| !set);
            let value = match number {
                Some(number) => chan
                    .modelist(mode)
                    .and_then(|list| number.checked_sub(1).and_then(|n| list.get(n)))
                    .map(|item| item.mask.clone())
                    .ok_or_else(|| CommandError::InvalidNumber {
                        value: (*mask).to_owned(),
                    })?,
                None if !mask.contains('!') && !mask.contains('@') => chan
                    .nick(casemap, mask)
                    .and_then(|n| n.host.as_deref())
                    .map(default_ban_mask)
                    .unwrap_or_else(|| (*mask).to_owned()),
                None => (*mask).to_owned(),
            };
            if !resolved.contains(&value) {
                resolved.push(value);
            }
        }
        let name = chan.name.clone();
        Ok(self.send_mode_batches(&name, set, mode, &resolved))
    }

    // Autojoin option

    pub(super) fn set_autojoin(&mut self, autojoin: String) {
        let old = self.config.autojoin().to_owned();
        if old == autojoin {
            return;
        }
        let message = format!("autojoin option changed: \"{}\" => \"{}\"", old, autojoin);
        self.print(&["irc_autojoin"], &message);
        debug!("[{}] {}", self.name, message);
        self.config.autojoin = if autojoin.is_empty() { None } else { Some(autojoin) };
    }

    // A channel name with the key it is joined with, if any.
    fn join_entry(&self, name: &str) -> JoinEntry {
        match self.channel_search(name) {
            Some(channel) => JoinEntry::new(&channel.name, channel.key.as_deref()),
            None => JoinEntry::new(name, None),
        }
    }

    /// Adds channels to the `autojoin` option, with their current keys.
    pub fn autojoin_add(&mut self, channels: &[&str]) -> Result<(), CommandError> {
        if channels.is_empty() {
            return Err(CommandError::MissingArgument { what: "channel" });
        }
        let casemap = self.casemapping();
        let mut autojoin = self.config.autojoin().to_owned();
        for name in channels {
            let entry = self.join_entry(name);
            autojoin = join::add(casemap, &autojoin, &entry.name, entry.key.as_deref());
        }
        self.set_autojoin(autojoin);
        Ok(())
    }

    /// Removes channels from the `autojoin` option.
    pub fn autojoin_del(&mut self, channels: &[&str]) -> Result<(), CommandError> {
        if channels.is_empty() {
            return Err(CommandError::MissingArgument { what: "channel" });
        }
        let casemap = self.casemapping();
        let autojoin = channels
            .iter()
            .fold(self.config.autojoin().to_owned(), |join, name| join::remove(casemap, &join, name));
        self.set_autojoin(autojoin);
        Ok(())
    }

    /// Replaces the `autojoin` option with the channels currently joined, with their keys.
    pub fn autojoin_apply(&mut self) {
        let mut list = JoinList::new(self.casemapping(), JoinSort::Disabled);
        for channel in self.channels.iter().filter(|c| c.is_channel() && c.is_joined()) {
            list.add(JoinEntry::new(&channel.name, channel.key.as_deref()));
        }
        let autojoin = list.build();
        self.set_autojoin(autojoin);
    }

    /// Sorts the `autojoin` option alphabetically, or by the number of the channel buffers.
    pub fn autojoin_sort(&mut self, by_buffer: bool) {
        let casemap = self.casemapping();
        let autojoin = if by_buffer {
            let ui = self.ctx.ui.clone();
            let server = self.name.clone();
            let number = move |name: &str| -> Option<i64> {
                let ui = ui.lock();
                let buffer = ui.buffer_search(&format!("{}.{}", server, name))?;
                ui.buffer_get_integer(buffer, "number")
            };
            join::sort(casemap, self.config.autojoin(), JoinSort::Buffer(&number))
        } else {
            join::sort(casemap, self.config.autojoin(), JoinSort::Alpha)
        };
        self.set_autojoin(autojoin);
    }
}

#[cfg(test)]
mod test {
    use crate::client::data::{ServerConfig, TypingState};
    use crate::client::event::SessionState;
    use crate::client::outqueue::Priority;
    use crate::client::server::fixture::{test_config, Harness};
    use crate::error::CommandError;

    fn in_channel(h: &mut Harness) {
        h.register();
        h.recv(":test!t@me.host JOIN #chan");
        h.recv(":irc.test.net 353 test = #chan :@test alice bob +carol dave erin frank gina");
        h.recv(":irc.test.net 366 test #chan :End of /NAMES list.");
        h.sent();
        h.clock.advance(2);
    }

    #[test]
    fn join_sends_keys_first() {
        let mut h = Harness::new(test_config());
        h.register();
        h.server.join("#a,#b k1", true, false).unwrap();
        assert_eq!(h.sent(), "JOIN #a,#b k1\r\n");
        h.recv(":test!t@me.host JOIN #a");
        assert_eq!(h.server.channel_search("#a").unwrap().key.as_deref(), Some("k1"));
        h.server.join("#c,#d k", false, false).unwrap();
        h.clock.advance(2);
        h.server.timer();
        assert_eq!(h.sent(), "JOIN #c,#d k\r\n");
    }

    #[test]
    fn join_requires_connection_and_channel() {
        let mut h = Harness::new(test_config());
        assert_eq!(
            h.server.join("#a", true, false),
            Err(CommandError::NotConnected { server: "test".into() })
        );
        h.register();
        assert_eq!(
            h.server.join("  ", true, false),
            Err(CommandError::MissingArgument { what: "channel" })
        );
    }

    #[test]
    fn manual_join_updates_dynamic_autojoin() {
        let mut config = test_config();
        config.autojoin_dynamic = Some(true);
        config.autojoin = Some("#old".into());
        config.anti_flood_prio_high = Some(0);
        let mut h = Harness::new(config);
        h.register();
        h.sent();
        h.server.join("#new", true, false).unwrap();
        h.recv(":test!t@me.host JOIN #new");
        assert_eq!(h.server.config().autojoin(), "#old,#new");
        assert!(h
            .lines("server.test")
            .contains(&"autojoin option changed: \"#old\" => \"#old,#new\"".to_owned()));
        h.server.part("#new", None).unwrap();
        assert_eq!(h.server.config().autojoin(), "#old");
        assert_eq!(h.sent(), "JOIN #new\r\nPART #new\r\n");
    }

    #[test]
    fn part_uses_default_message() {
        let mut config = test_config();
        config.default_msg_part = Some("bye all".into());
        let mut h = Harness::new(config);
        in_channel(&mut h);
        h.server.part("#chan", None).unwrap();
        assert_eq!(h.sent(), "PART #chan :bye all\r\n");
        h.server.part("#chan", Some("later")).unwrap();
        assert_eq!(h.sent(), "");
        h.clock.advance(2);
        h.server.timer();
        assert_eq!(h.sent(), "PART #chan :later\r\n");
        assert_eq!(
            h.server.part("#nowhere", None),
            Err(CommandError::ChannelNotFound { name: "#nowhere".into() })
        );
    }

    #[test]
    fn part_private_closes_it() {
        let mut h = Harness::new(test_config());
        h.register();
        h.recv(":alice!a@host PRIVMSG test :hi");
        assert!(h.server.channel_search("alice").is_some());
        h.server.part("alice", None).unwrap();
        assert!(h.server.channel_search("alice").is_none());
        assert_eq!(h.sent(), "");
    }

    #[test]
    fn cycle_rejoins() {
        let mut h = Harness::new(test_config());
        in_channel(&mut h);
        h.server.cycle("#chan", None).unwrap();
        assert_eq!(h.sent(), "PART #chan\r\n");
        h.recv(":test!t@me.host PART #chan");
        h.clock.advance(2);
        h.server.timer();
        assert_eq!(h.sent(), "JOIN #chan\r\n");
    }

    #[test]
    fn quit_bypasses_queues() {
        let mut h = Harness::new(test_config());
        h.register();
        h.server.send(Priority::High, "PRIVMSG #a :one");
        h.server.send(Priority::High, "PRIVMSG #a :two");
        h.sent();
        h.server.quit(None);
        assert_eq!(h.sent(), "QUIT\r\n");
        h.server.quit(Some("gone"));
        assert_eq!(h.sent(), "QUIT :gone\r\n");
    }

    #[test]
    fn user_disconnect_does_not_reconnect() {
        let mut config = test_config();
        config.default_msg_quit = Some("see you".into());
        let mut h = Harness::new(config);
        h.register();
        h.server.user_disconnect(None);
        assert_eq!(h.sent(), "QUIT :see you\r\n");
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert_eq!(h.server.reconnect_start(), None);
    }

    #[test]
    fn user_disconnect_cancels_reconnection() {
        let mut h = Harness::new(test_config());
        h.register();
        h.server.socket_closed();
        assert!(h.server.reconnect_start().is_some());
        h.server.user_disconnect(None);
        assert_eq!(h.server.reconnect_start(), None);
        assert!(h.lines("server.test").iter().any(|l| l == "auto-reconnection is cancelled"));
    }

    #[test]
    fn op_batches_by_max_modes() {
        let mut h = Harness::new(test_config());
        h.connect();
        h.recv(":irc.test.net 005 test MODES=3 :are supported by this server");
        h.recv(":irc.test.net 001 test :Welcome");
        h.recv(":test!t@me.host JOIN #chan");
        h.recv(":irc.test.net 353 test = #chan :@test alice bob carol dave erin frank gina");
        h.recv(":irc.test.net 366 test #chan :End of /NAMES list.");
        h.sent();
        h.clock.advance(10);

        let lines = h.server.send_mode_nicks("#chan", true, 'o', &["*", "-yes"]).unwrap();
        assert_eq!(
            lines,
            vec![
                "MODE #chan +ooo alice bob carol",
                "MODE #chan +ooo dave erin frank",
                "MODE #chan +o gina",
            ]
        );
        assert_eq!(h.sent(), "MODE #chan +ooo alice bob carol\r\n");
        let low: Vec<&str> = h.server.outqueue().queued(Priority::Low).map(|m| m.line.as_str()).collect();
        assert_eq!(low, vec!["MODE #chan +ooo dave erin frank", "MODE #chan +o gina"]);
    }

    #[test]
    fn op_wildcard_needs_yes() {
        let mut h = Harness::new(test_config());
        in_channel(&mut h);
        assert_eq!(
            h.server.send_mode_nicks("#chan", true, 'o', &["*"]),
            Err(CommandError::WildcardNeedsYes)
        );
        assert_eq!(h.sent(), "");
    }

    #[test]
    fn deop_skips_self_and_unchanged() {
        let mut h = Harness::new(test_config());
        in_channel(&mut h);
        h.recv(":test!t@me.host MODE #chan +o alice");
        let lines = h.server.send_mode_nicks("#chan", false, 'o', &["*", "-yes"]).unwrap();
        assert_eq!(lines, vec!["MODE #chan -o alice"]);
        let lines = h.server.send_mode_nicks("#chan", true, 'v', &["carol", "b*"]).unwrap();
        assert_eq!(lines, vec!["MODE #chan +v bob"]);
    }

    #[test]
    fn ban_masks_resolve_nicks_and_numbers() {
        let mut h = Harness::new(test_config());
        in_channel(&mut h);
        h.recv(":alice!a@alice.host PRIVMSG #chan :hello");
        let lines = h.server.send_mode_masks("#chan", true, 'b', &["alice", "*!*@spam"]).unwrap();
        assert_eq!(lines, vec!["MODE #chan +bb *!*@alice.host *!*@spam"]);

        h.recv(":irc.test.net 367 test #chan *!*@one op 1622548800");
        h.recv(":irc.test.net 367 test #chan *!*@two op 1622548800");
        h.recv(":irc.test.net 368 test #chan :End of Channel Ban List");
        h.clock.advance(5);
        h.server.timer();
        h.sent();
        let lines = h.server.send_mode_masks("#chan", false, 'b', &["2"]).unwrap();
        assert_eq!(lines, vec!["MODE #chan -b *!*@two"]);
        assert_eq!(
            h.server.send_mode_masks("#chan", false, 'b', &["9"]),
            Err(CommandError::InvalidNumber { value: "9".into() })
        );
    }

    #[test]
    fn privmsg_echoes_locally() {
        let mut h = Harness::new(test_config());
        in_channel(&mut h);
        h.server.privmsg("#chan", "hello there").unwrap();
        assert_eq!(h.sent(), "PRIVMSG #chan :hello there\r\n");
        assert_eq!(h.lines("test.#chan").last().map(|s| s.as_str()), Some("<@test> hello there"));

        h.server.privmsg("alice", "psst").unwrap();
        assert_eq!(h.lines("test.alice"), vec!["<test> psst"]);
    }

    #[test]
    fn away_is_restored_after_reconnect() {
        let mut h = Harness::new(test_config());
        h.register();
        h.server.set_away(Some("lunch"));
        assert_eq!(h.sent(), "AWAY :lunch\r\n");
        assert!(h.server.is_away());
        h.server.socket_closed();
        h.clock.advance(10);
        h.server.timer();
        h.server.connected();
        h.sent();
        h.recv(":irc.test.net 001 test :Welcome back");
        assert!(h.sent().starts_with("AWAY :lunch\r\n"));
        h.server.set_away(None);
        assert!(!h.server.is_away());
    }

    #[test]
    fn kick_with_default_reason() {
        let mut config = test_config();
        config.default_msg_kick = Some("behave".into());
        let mut h = Harness::new(config);
        in_channel(&mut h);
        h.server.kick("#chan", "bob", None).unwrap();
        assert_eq!(h.sent(), "KICK #chan bob :behave\r\n");
    }

    #[test]
    fn autojoin_edits() {
        let mut config = test_config();
        config.autojoin = Some("#b,#a".into());
        let mut h = Harness::new(config);
        h.register();
        h.sent();
        h.recv(":test!t@me.host JOIN #b");
        h.recv(":test!t@me.host JOIN #a");
        h.server.join("#k secret", false, false).unwrap();
        h.recv(":test!t@me.host JOIN #k");

        h.server.autojoin_add(&["#k", "#z"]).unwrap();
        assert_eq!(h.server.config().autojoin(), "#k,#b,#a,#z secret");
        h.server.autojoin_sort(false);
        assert_eq!(h.server.config().autojoin(), "#k,#a,#b,#z secret");
        h.server.autojoin_del(&["#z", "#a"]).unwrap();
        assert_eq!(h.server.config().autojoin(), "#k,#b secret");
        h.server.autojoin_apply();
        assert_eq!(h.server.config().autojoin(), "#k,#b,#a secret");
        assert!(h
            .lines("server.test")
            .iter()
            .any(|l| l.starts_with("autojoin option changed: ")));
    }

    fn tagged_channel() -> Harness {
        let mut h = Harness::new(ServerConfig {
            anti_flood_prio_high: Some(0),
            anti_flood_prio_low: Some(0),
            ..test_config()
        });
        h.connect();
        h.recv(":irc.test.net CAP * LS :message-tags");
        h.recv(":irc.test.net CAP test ACK :message-tags");
        h.recv(":irc.test.net 001 test :Welcome to the test network");
        h.recv(":test!t@me.host JOIN #chan");
        h.sent();
        h
    }

    #[test]
    fn typing_sent_on_change() {
        let mut h = tagged_channel();
        assert_eq!(h.server.send_typing("#chan", TypingState::Active), Ok(true));
        assert_eq!(h.sent(), "@+typing=active TAGMSG #chan\r\n");
        assert_eq!(h.server.send_typing("#chan", TypingState::Active), Ok(false));
        h.clock.advance(3);
        assert_eq!(h.server.send_typing("#chan", TypingState::Active), Ok(true));
        assert_eq!(h.server.send_typing("#chan", TypingState::Paused), Ok(true));
        assert_eq!(h.server.send_typing("#chan", TypingState::Done), Ok(true));
        assert_eq!(h.server.send_typing("#chan", TypingState::Done), Ok(false));
        assert_eq!(
            h.sent(),
            "@+typing=active TAGMSG #chan\r\n@+typing=paused TAGMSG #chan\r\n@+typing=done TAGMSG #chan\r\n"
        );
    }

    #[test]
    fn message_ends_typing() {
        let mut h = tagged_channel();
        h.server.send_typing("#chan", TypingState::Active).unwrap();
        h.server.privmsg("#chan", "hi").unwrap();
        assert_eq!(h.server.channel_search("#chan").unwrap().typing_state, TypingState::Off);
        assert_eq!(h.server.send_typing("#chan", TypingState::Done), Ok(false));
        assert_eq!(h.sent(), "@+typing=active TAGMSG #chan\r\nPRIVMSG #chan :hi\r\n");
    }

    #[test]
    fn typing_needs_message_tags() {
        let mut h = Harness::new(test_config());
        in_channel(&mut h);
        assert_eq!(h.server.send_typing("#chan", TypingState::Active), Ok(false));
        assert_eq!(h.sent(), "");
        assert_eq!(
            h.server.send_typing("#nowhere", TypingState::Active),
            Err(CommandError::ChannelNotFound {
                name: "#nowhere".to_owned()
            })
        );
    }
}
