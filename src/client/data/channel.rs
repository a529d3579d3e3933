//! Channels and private conversations: topic, modes, nicks, modelists and speaking activity.
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::ControlFlow;

use chrono::{DateTime, Duration, Utc};

use crate::client::data::modelist::{Modelist, ModelistState};
use crate::client::data::nick::{Nick, PrefixTable};
use crate::client::event::ChannelKind;
use crate::client::ui::{BufferId, Ui};
use crate::proto::{CaseMapping, ChanModeType, ISupport};

/// How many nicks each speaking list remembers.
pub const NICKS_SPEAKING_LIMIT: usize = 128;

/// Tag of lines hidden by the smart filter.
pub const SMART_FILTER_TAG: &str = "irc_smart_filter";

/// Typing notification state of a user in a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingState {
    /// Not typing.
    Off,
    /// Typing.
    Active,
    /// Stopped typing, text still in the input.
    Paused,
    /// Input cleared or sent.
    Done,
}

impl TypingState {
    /// The value of the `+typing` client tag.
    pub fn as_str(self) -> &'static str {
        match self {
            TypingState::Off | TypingState::Done => "done",
            TypingState::Active => "active",
            TypingState::Paused => "paused",
        }
    }

    /// Reads a received `+typing` value; anything unknown ends typing.
    pub fn from_tag(value: &str) -> TypingState {
        match value {
            "active" => TypingState::Active,
            "paused" => TypingState::Paused,
            _ => TypingState::Off,
        }
    }
}

/// When a nick last spoke.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeakingTime {
    /// The nick.
    pub nick: String,
    /// Date of its last message.
    pub time: DateTime<Utc>,
}

/// What a mode change needs to know about the server.
pub struct ModeContext<'a> {
    /// Server features, for mode classification.
    pub isupport: &'a ISupport,
    /// Prefix modes of the server.
    pub prefix: &'a PrefixTable,
    /// Current nick of the session.
    pub own_nick: &'a str,
    /// The smart filter mode option when smart filtering is on, `None` when off.
    pub smart_filter_mode: Option<&'a str>,
    /// Minutes a nick is considered active after speaking.
    pub smart_filter_delay: i64,
    /// Who changed the modes.
    pub setter: Option<&'a str>,
    /// Current date.
    pub now: DateTime<Utc>,
}

/// Result of applying a mode change to a channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModeOutcome {
    /// Whether the line announcing the change may be hidden by the smart filter.
    pub smart_filter: bool,
    /// Nicks whose prefix changed.
    pub nicks: Vec<String>,
    /// Whether the mode string changed.
    pub modes_updated: bool,
}

/// Whether the smart filter option applies to a mode letter.
///
/// An empty option filters nothing, `*` everything, `+` the prefix modes, `-xyz` everything but
/// the listed modes and anything else exactly the listed modes.
pub fn smart_filtered(option: &str, mode: char, prefix: &PrefixTable) -> bool {
    match option {
        "" => false,
        "*" => true,
        "+" => prefix.mode_index(mode).is_some(),
        _ => match option.strip_prefix('-') {
            Some(excluded) => !excluded.contains(mode),
            None => option.contains(mode),
        },
    }
}

/// A channel or private conversation of a server.
#[derive(Clone, Debug)]
pub struct Channel {
    /// Channel or private.
    pub kind: ChannelKind,
    /// The name as first seen.
    pub name: String,
    /// The topic.
    pub topic: Option<String>,
    /// The mode string, like `+tnkl key 10`.
    pub modes: Option<String>,
    /// The user limit, 0 for none.
    pub limit: u32,
    /// The key.
    pub key: Option<String>,
    /// Join numerics received since the last join, to print them once.
    pub join_msg_received: HashSet<String>,
    /// Pending `WHO` requests sent for this channel.
    pub checking_whox: u32,
    /// Away message shown once in a private buffer.
    pub away_message: Option<String>,
    /// The remote nick of a private buffer quit the server.
    pub has_quit_server: bool,
    /// A part is followed by a join.
    pub cycle: bool,
    /// The user parted explicitly.
    pub part: bool,
    /// Nick used before the last local nick change, for private buffer renames.
    pub pv_remote_nick_color: Option<String>,
    /// Date of a pending autorejoin.
    pub autorejoin_at: Option<DateTime<Utc>>,
    /// Local typing state.
    pub typing_state: TypingState,
    /// When the typing state was last sent.
    pub typing_status_sent: Option<DateTime<Utc>>,
    typing_nicks: Vec<(String, TypingState)>,
    /// The UI buffer.
    pub buffer: Option<BufferId>,
    nicks: Vec<Nick>,
    nicks_speaking: [VecDeque<String>; 2],
    nicks_speaking_time: VecDeque<SpeakingTime>,
    join_smart_filtered: HashMap<String, DateTime<Utc>>,
    modelists: Vec<Modelist>,
}

impl Channel {
    /// Creates a channel with one empty modelist per list mode.
    pub fn new(kind: ChannelKind, name: &str, list_modes: &[char]) -> Channel {
        Channel {
            kind,
            name: name.to_owned(),
            topic: None,
            modes: None,
            limit: 0,
            key: None,
            join_msg_received: HashSet::new(),
            checking_whox: 0,
            away_message: None,
            has_quit_server: false,
            cycle: false,
            part: false,
            pv_remote_nick_color: None,
            autorejoin_at: None,
            typing_state: TypingState::Off,
            typing_status_sent: None,
            typing_nicks: Vec::new(),
            buffer: None,
            nicks: Vec::new(),
            nicks_speaking: [VecDeque::new(), VecDeque::new()],
            nicks_speaking_time: VecDeque::new(),
            join_smart_filtered: HashMap::new(),
            modelists: list_modes.iter().map(|&m| Modelist::new(m)).collect(),
        }
    }

    /// Whether this is a channel (as opposed to a private conversation).
    pub fn is_channel(&self) -> bool {
        self.kind == ChannelKind::Channel
    }

    /// Whether the session is in the channel: it is as long as it knows any nick.
    pub fn is_joined(&self) -> bool {
        !self.nicks.is_empty()
    }

    /// Sets the topic, `None` or empty to clear it.
    pub fn set_topic(&mut self, topic: Option<&str>) {
        self.topic = topic.filter(|t| !t.is_empty()).map(|t| t.to_owned());
    }

    /// Replaces the mode string.
    pub fn set_modes(&mut self, modes: Option<&str>) {
        self.modes = modes.map(|m| m.to_owned());
    }

    // Nicks

    /// The nicks, in arrival order.
    pub fn nicks(&self) -> &[Nick] {
        &self.nicks
    }

    /// Looks a nick up.
    pub fn nick(&self, casemap: CaseMapping, name: &str) -> Option<&Nick> {
        self.nicks.iter().find(|n| casemap.eq(&n.name, name))
    }

    /// Looks a nick up for modification.
    pub fn nick_mut(&mut self, casemap: CaseMapping, name: &str) -> Option<&mut Nick> {
        self.nicks.iter_mut().find(|n| casemap.eq(&n.name, name))
    }

    /// Adds a nick, or updates the one already there, keeping what the new one does not know.
    pub fn nick_add(&mut self, casemap: CaseMapping, nick: Nick) -> &mut Nick {
        match self.nicks.iter().position(|n| casemap.eq(&n.name, &nick.name)) {
            Some(pos) => {
                let existing = &mut self.nicks[pos];
                existing.name = nick.name;
                existing.prefixes = nick.prefixes;
                existing.away = nick.away;
                if nick.host.is_some() {
                    existing.host = nick.host;
                }
                if nick.account.is_some() {
                    existing.account = nick.account;
                }
                if nick.realname.is_some() {
                    existing.realname = nick.realname;
                }
                existing
            }
            None => {
                self.nicks.push(nick);
                let last = self.nicks.len() - 1;
                &mut self.nicks[last]
            }
        }
    }

    /// Removes a nick.
    pub fn nick_remove(&mut self, casemap: CaseMapping, name: &str) -> Option<Nick> {
        let pos = self.nicks.iter().position(|n| casemap.eq(&n.name, name))?;
        Some(self.nicks.remove(pos))
    }

    /// Renames a nick in the registry and in the activity trackers.
    pub fn nick_rename(&mut self, casemap: CaseMapping, old: &str, new: &str) {
        if let Some(nick) = self.nick_mut(casemap, old) {
            nick.name = new.to_owned();
        }
        self.nick_speaking_rename(old, new);
        self.nick_speaking_time_rename(casemap, old, new);
        self.join_smart_filtered_rename(old, new);
    }

    /// Forgets every nick, which marks the channel as not joined.
    pub fn nicks_clear(&mut self) {
        self.nicks.clear();
    }

    /// Clears the account of every nick.
    pub fn remove_account(&mut self) {
        if self.is_channel() {
            for nick in &mut self.nicks {
                nick.account = None;
            }
        }
    }

    /// Marks every nick as back. Returns the nicks that were away.
    pub fn remove_away(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        if self.is_channel() {
            for nick in self.nicks.iter_mut().filter(|n| n.away) {
                nick.away = false;
                changed.push(nick.name.clone());
            }
        }
        changed
    }

    /// Sets the away flag of a nick. Returns true if it changed.
    pub fn set_away(&mut self, casemap: CaseMapping, name: &str, away: bool) -> bool {
        if !self.is_channel() {
            return false;
        }
        match self.nick_mut(casemap, name) {
            Some(nick) if nick.away != away => {
                nick.away = away;
                true
            }
            _ => false,
        }
    }

    // Speaking activity

    /// Nicks that spoke (`highlight = false`) or highlighted the user, oldest first.
    pub fn nicks_speaking(&self, highlight: bool) -> &VecDeque<String> {
        &self.nicks_speaking[highlight as usize]
    }

    /// Records that a nick spoke, and highlighted the user when `highlight` is set.
    pub fn nick_speaking_add(&mut self, casemap: CaseMapping, nick: &str, highlight: bool) {
        if highlight {
            Self::speaking_add_to_list(&mut self.nicks_speaking[1], casemap, nick);
        }
        Self::speaking_add_to_list(&mut self.nicks_speaking[0], casemap, nick);
    }

    fn speaking_add_to_list(list: &mut VecDeque<String>, casemap: CaseMapping, nick: &str) {
        if let Some(pos) = list.iter().position(|n| casemap.eq(n, nick)) {
            list.remove(pos);
        }
        list.push_back(nick.to_owned());
        while list.len() > NICKS_SPEAKING_LIMIT {
            list.pop_front();
        }
    }

    /// Renames a nick in the speaking lists.
    pub fn nick_speaking_rename(&mut self, old: &str, new: &str) {
        for list in &mut self.nicks_speaking {
            if let Some(entry) = list.iter_mut().find(|n| *n == old) {
                *entry = new.to_owned();
            }
        }
    }

    /// Rewrites entries matching `nick` under the casemapping with its current spelling.
    pub fn nick_speaking_rename_if_present(&mut self, casemap: CaseMapping, nick: &str) {
        for list in &mut self.nicks_speaking {
            for entry in list.iter_mut().filter(|n| casemap.eq(n, nick)) {
                *entry = nick.to_owned();
            }
        }
    }

    /// Last message times, newest first.
    pub fn nicks_speaking_time(&self) -> &VecDeque<SpeakingTime> {
        &self.nicks_speaking_time
    }

    /// Finds when a nick last spoke; with `within` set, only if that is more recent than
    /// `now - within`.
    pub fn nick_speaking_time_search(
        &self,
        casemap: CaseMapping,
        nick: &str,
        within: Option<(DateTime<Utc>, i64)>,
    ) -> Option<&SpeakingTime> {
        let found = self.nicks_speaking_time.iter().find(|s| casemap.eq(&s.nick, nick))?;
        match within {
            Some((now, minutes)) if found.time < now - Duration::minutes(minutes) => None,
            _ => Some(found),
        }
    }

    /// Records the date of a nick's message.
    pub fn nick_speaking_time_add(&mut self, casemap: CaseMapping, nick: &str, time: DateTime<Utc>) {
        self.nick_speaking_time_remove(casemap, nick);
        self.nicks_speaking_time.push_front(SpeakingTime {
            nick: nick.to_owned(),
            time,
        });
    }

    /// Forgets when a nick spoke.
    pub fn nick_speaking_time_remove(&mut self, casemap: CaseMapping, nick: &str) {
        self.nicks_speaking_time.retain(|s| !casemap.eq(&s.nick, nick));
    }

    /// Drops entries older than `minutes`.
    pub fn nick_speaking_time_remove_old(&mut self, now: DateTime<Utc>, minutes: i64) {
        let limit = now - Duration::minutes(minutes);
        while self.nicks_speaking_time.back().map_or(false, |s| s.time < limit) {
            self.nicks_speaking_time.pop_back();
        }
    }

    /// Renames a nick in the last message times.
    pub fn nick_speaking_time_rename(&mut self, casemap: CaseMapping, old: &str, new: &str) {
        if let Some(entry) = self.nicks_speaking_time.iter_mut().find(|s| casemap.eq(&s.nick, old)) {
            entry.nick = new.to_owned();
        }
    }

    // Typing

    /// Records the typing state of another nick; `Off` and `Done` forget it. Returns whether the
    /// state changed.
    pub fn typing_nick_set(&mut self, casemap: CaseMapping, nick: &str, state: TypingState) -> bool {
        let pos = self.typing_nicks.iter().position(|(n, _)| casemap.eq(n, nick));
        match (pos, state) {
            (None, TypingState::Off) | (None, TypingState::Done) => false,
            (Some(pos), TypingState::Off) | (Some(pos), TypingState::Done) => {
                self.typing_nicks.remove(pos);
                true
            }
            (Some(pos), state) => {
                let changed = self.typing_nicks[pos].1 != state;
                self.typing_nicks[pos].1 = state;
                changed
            }
            (None, state) => {
                self.typing_nicks.push((nick.to_owned(), state));
                true
            }
        }
    }

    /// Forgets every typing nick.
    pub fn typing_nicks_clear(&mut self) {
        self.typing_nicks.clear();
    }

    /// The typing state of another nick.
    pub fn typing_nick(&self, casemap: CaseMapping, nick: &str) -> TypingState {
        self.typing_nicks
            .iter()
            .find(|(n, _)| casemap.eq(n, nick))
            .map_or(TypingState::Off, |(_, state)| *state)
    }

    // Smart filtered joins

    /// Join dates of nicks whose join line was hidden.
    pub fn join_smart_filtered(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.join_smart_filtered
    }

    /// Remembers that the join of `nick` was hidden.
    pub fn join_smart_filtered_add(&mut self, nick: &str, time: DateTime<Utc>) {
        self.join_smart_filtered.insert(nick.to_owned(), time);
    }

    /// Follows a nick change.
    pub fn join_smart_filtered_rename(&mut self, old: &str, new: &str) {
        if let Some(time) = self.join_smart_filtered.remove(old) {
            self.join_smart_filtered.insert(new.to_owned(), time);
        }
    }

    /// Forgets a nick.
    pub fn join_smart_filtered_remove(&mut self, nick: &str) {
        self.join_smart_filtered.remove(nick);
    }

    /// Forgets joins older than `minutes`.
    pub fn join_smart_filtered_remove_old(&mut self, now: DateTime<Utc>, minutes: i64) {
        let limit = now - Duration::minutes(minutes);
        self.join_smart_filtered.retain(|_, time| *time >= limit);
    }

    /// Makes the hidden join line of `nick` visible again, following its nick changes back to the
    /// join, provided it joined less than `minutes` ago. The nick is forgotten either way.
    pub fn join_smart_filtered_unmask(
        &mut self,
        ui: &mut dyn Ui,
        nick: &str,
        now: DateTime<Utc>,
        minutes: i64,
    ) {
        let join_time = match self.join_smart_filtered.get(nick) {
            Some(time) => *time,
            None => return,
        };
        let date_min = now - Duration::minutes(minutes);
        if let (Some(buffer), true) = (self.buffer, minutes > 0 && join_time >= date_min) {
            let mut nick_to_search = nick.to_owned();
            ui.lines_rev(buffer, &mut |line| {
                if line.date < date_min {
                    return ControlFlow::Break(());
                }
                let mut nick_found = false;
                let mut join = false;
                let mut nick_changed = false;
                let mut smart_filtered = false;
                let mut nick1 = None;
                let mut nick2 = None;
                for tag in &line.tags {
                    if let Some(name) = tag.strip_prefix("nick_") {
                        nick_found |= name == nick_to_search;
                    } else if tag == "irc_join" {
                        join = true;
                    } else if tag == "irc_nick" {
                        nick_changed = true;
                    } else if let Some(name) = tag.strip_prefix("irc_nick1_") {
                        nick1 = Some(name.to_owned());
                    } else if let Some(name) = tag.strip_prefix("irc_nick2_") {
                        nick2 = Some(name.to_owned());
                    } else if tag == SMART_FILTER_TAG {
                        smart_filtered = true;
                    }
                }
                let unmasked = match (nick_changed, nick1, nick2) {
                    (true, Some(old), Some(new)) if new == nick_to_search => {
                        nick_to_search = old;
                        smart_filtered
                    }
                    _ => nick_found && join && smart_filtered,
                };
                if unmasked {
                    line.tags.retain(|t| t != SMART_FILTER_TAG);
                }
                if unmasked && join {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
        }
        self.join_smart_filtered.remove(nick);
    }

    // Modelists

    /// All modelists.
    pub fn modelists(&self) -> &[Modelist] {
        &self.modelists
    }

    /// The modelist of a mode letter.
    pub fn modelist(&self, mode: char) -> Option<&Modelist> {
        self.modelists.iter().find(|m| m.mode() == mode)
    }

    /// The modelist of a mode letter, for modification.
    pub fn modelist_mut(&mut self, mode: char) -> Option<&mut Modelist> {
        self.modelists.iter_mut().find(|m| m.mode() == mode)
    }

    /// The modelist of a mode letter, created when missing.
    pub fn modelist_or_insert(&mut self, mode: char) -> &mut Modelist {
        match self.modelists.iter().position(|m| m.mode() == mode) {
            Some(pos) => &mut self.modelists[pos],
            None => {
                self.modelists.push(Modelist::new(mode));
                let last = self.modelists.len() - 1;
                &mut self.modelists[last]
            }
        }
    }

    /// Sets the state of every modelist.
    pub fn modelists_set_state(&mut self, state: ModelistState) {
        for list in &mut self.modelists {
            list.set_state(state);
        }
    }

    // Modes

    /// Applies one mode letter to the mode string: `+` adds or replaces it (with its argument),
    /// `-` removes it and its argument. Modes with an argument go last, flags right after `+`.
    pub fn update_mode_string<F>(&mut self, set: bool, chanmode: char, argument: Option<&str>, classify: F)
    where
        F: Fn(char) -> ChanModeType,
    {
        let current = self.modes.clone().unwrap_or_else(|| "+".to_owned());
        let (str_modes, args): (&str, Vec<&str>) = match current.find(' ') {
            Some(pos) => (&current[..pos], current[pos + 1..].split(' ').filter(|a| !a.is_empty()).collect()),
            None => (&current[..], Vec::new()),
        };
        let mut args = args.into_iter();
        let mut new_modes = String::new();
        let mut new_args: Vec<String> = Vec::new();
        let mut found = false;
        for c in str_modes.chars() {
            if c == '+' || c == '-' {
                new_modes.push(c);
                continue;
            }
            let arg = match classify(c) {
                ChanModeType::D => None,
                _ => args.next(),
            };
            if c == chanmode {
                if !found {
                    found = true;
                    if set {
                        new_modes.push(c);
                        new_args.extend(argument.map(|a| a.to_owned()));
                    }
                }
            } else {
                new_modes.push(c);
                new_args.extend(arg.map(|a| a.to_owned()));
            }
        }
        if !found && set {
            match argument {
                Some(argument) => {
                    new_modes.push(chanmode);
                    new_args.push(argument.to_owned());
                }
                None => {
                    let pos = new_modes.len() - new_modes.trim_start_matches('+').len();
                    new_modes.insert(pos, chanmode);
                }
            }
        }
        let modes = if new_args.is_empty() {
            new_modes
        } else {
            format!("{} {}", new_modes, new_args.join(" "))
        };
        self.modes = if modes == "+" { None } else { Some(modes) };
    }

    /// Applies a `MODE` change (`modes` like `+ov-k`, `args` the space separated arguments) to
    /// the key, limit, nick prefixes, modelists and mode string.
    pub fn mode_set(&mut self, ctx: &ModeContext, modes: &str, args: Option<&str>) -> ModeOutcome {
        let casemap = ctx.isupport.casemapping();
        let args: Vec<&str> = args
            .map(|a| a.split(' ').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let mut current_arg = 0;
        let mut outcome = ModeOutcome {
            smart_filter: ctx.smart_filter_mode.map_or(false, |m| !m.is_empty()),
            ..ModeOutcome::default()
        };
        let mut set = true;
        for c in modes.chars() {
            match c {
                ':' => continue,
                ' ' => break,
                '+' => {
                    set = true;
                    continue;
                }
                '-' => {
                    set = false;
                    continue;
                }
                _ => (),
            }
            let chanmode_type = ctx.isupport.chanmode_type(c);
            let mut update_modes = chanmode_type != ChanModeType::A;
            let arg = if chanmode_type.takes_arg(set) && current_arg < args.len() {
                current_arg += 1;
                let arg = args[current_arg - 1];
                Some(arg.strip_prefix(':').unwrap_or(arg))
            } else {
                None
            };
            if outcome.smart_filter
                && !smart_filtered(ctx.smart_filter_mode.unwrap_or_default(), c, ctx.prefix)
            {
                outcome.smart_filter = false;
            }

            if c == 'k' {
                if !set {
                    self.key = None;
                } else if let Some(key) = arg.filter(|k| *k != "*") {
                    self.key = Some(key.to_owned());
                }
            } else if c == 'l' {
                if !set {
                    self.limit = 0;
                } else if let Some(limit) = arg {
                    self.limit = parse_leading_int(limit);
                }
            } else if chanmode_type != ChanModeType::A && ctx.prefix.mode_index(c).is_some() {
                update_modes = false;
                if let Some(name) = arg {
                    if let Some(nick) = self.nick_mut(casemap, name) {
                        nick.set_mode(set, c, ctx.prefix);
                        let nick_name = nick.name.clone();
                        if outcome.smart_filter
                            && (casemap.eq(&nick_name, ctx.own_nick)
                                || self
                                    .nick_speaking_time_search(
                                        casemap,
                                        &nick_name,
                                        Some((ctx.now, ctx.smart_filter_delay)),
                                    )
                                    .is_some())
                        {
                            outcome.smart_filter = false;
                        }
                        outcome.nicks.push(nick_name);
                    }
                }
            } else if chanmode_type == ChanModeType::A {
                if let (Some(mask), Some(list)) = (arg, self.modelist_mut(c)) {
                    if set {
                        list.add(mask, ctx.setter, Some(ctx.now));
                    } else {
                        list.remove_mask(mask);
                    }
                }
            }

            if update_modes {
                let isupport = ctx.isupport;
                self.update_mode_string(set, c, arg, |m| isupport.chanmode_type(m));
                outcome.modes_updated = true;
            }
        }
        outcome
    }
}

/// Parses the leading digits of `s` like C `atoi`, 0 when there are none.
fn parse_leading_int(s: &str) -> u32 {
    let digits: String = s.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}
