//! Redirection of server replies: the replies to a command are collected instead of being
//! displayed, then handed to observers in one piece.
//!
//! A `RedirectPattern` names the numerics that start, stop and follow the reply to a command.
//! A `Redirect` is created from a pattern, attached to the next line sent to the server and
//! collects every matching line until a stop (and its optional extra) is received, or until it
//! times out.
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Timeout of a pattern created without one, in seconds.
pub const DEFAULT_TIMEOUT: i64 = 60;

/// Which replies belong to the answer of a command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedirectPattern {
    /// The pattern name, like `who`.
    pub name: String,
    /// A temporary pattern is removed once used by a redirect.
    pub temp: bool,
    /// Seconds before the redirect gives up.
    pub timeout: i64,
    /// Commands that may start the reply, as `352:1,354` (`:n` is the index of the parameter
    /// that must equal the redirect string).
    pub cmd_start: Option<String>,
    /// Commands that end the reply.
    pub cmd_stop: String,
    /// Commands that may follow a stop command and still belong to the reply.
    pub cmd_extra: Option<String>,
}

impl RedirectPattern {
    /// Creates a pattern. A timeout of 0 means the default.
    pub fn new(
        name: &str,
        temp: bool,
        timeout: i64,
        cmd_start: Option<&str>,
        cmd_stop: &str,
        cmd_extra: Option<&str>,
    ) -> RedirectPattern {
        RedirectPattern {
            name: name.to_owned(),
            temp,
            timeout: if timeout > 0 { timeout } else { DEFAULT_TIMEOUT },
            cmd_start: cmd_start.map(|s| s.to_owned()),
            cmd_stop: cmd_stop.to_owned(),
            cmd_extra: cmd_extra.map(|s| s.to_owned()),
        }
    }

    /// The patterns every session knows.
    pub fn defaults() -> Vec<RedirectPattern> {
        let p = |name, start, stop, extra| RedirectPattern::new(name, false, 0, start, stop, extra);
        vec![
            p("ison", None, "303", None),
            p("list", Some("321,322"), "323", None),
            p("mode_channel", None, "324:1,403:1,442:1,479:1", Some("329:1")),
            p("mode_channel_ban", Some("367:1"), "368:1,403:1,442:1,479:1", None),
            p(
                "mode_channel_ban_exception",
                Some("348:1"),
                "349:1,403:1,442:1,472,479:1,482:1",
                None,
            ),
            p(
                "mode_channel_invite",
                Some("346:1"),
                "347:1,403:1,442:1,472,479:1,482:1",
                None,
            ),
            p("mode_user", None, "mode:0,221:0,403:1,501,502", None),
            p("monitor", Some("732:2"), "733:1", None),
            p("names", Some("353:2"), "366:1", None),
            p("ping", None, "pong,402", None),
            p("time", None, "391", None),
            p("topic", None, "331:1,332:1,403:1", Some("333:1")),
            p("userhost", Some("401:1"), "302,461", None),
            p("who", Some("352:1,354,401:1"), "315:1,403:1", None),
            p(
                "whois",
                Some("311:1"),
                "318:1,401:1,402:1,431:1,461",
                Some("318:1"),
            ),
            p("whowas", Some("314:1,406:1"), "369:1", None),
        ]
    }
}

/// Upper-cased command names mapped to the index of the parameter that must equal the
/// redirect string, if any.
pub type CommandSet = BTreeMap<String, Option<usize>>;

/// Parses `352:1,354` into a command set.
pub fn parse_commands(list: &str) -> CommandSet {
    list.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once(':') {
            Some((cmd, index)) => (cmd.to_ascii_uppercase(), index.parse().ok()),
            None => (item.to_ascii_uppercase(), None),
        })
        .collect()
}

/// The outcome of a finished redirect.
#[derive(Clone, Debug, PartialEq)]
pub struct RedirectOutput {
    /// The pattern name.
    pub pattern: String,
    /// The name the caller gave the redirect.
    pub signal: String,
    /// The command that was redirected.
    pub command: String,
    /// Collected lines, newline separated.
    pub output: String,
    /// Whether the redirect timed out.
    pub timed_out: bool,
}

/// A pending or running redirection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Redirect {
    /// Identifier, unique in a server.
    pub id: u64,
    /// The pattern name.
    pub pattern: String,
    /// The name handed back to observers.
    pub signal: String,
    /// How many replies are collected before the redirect ends.
    pub count: u32,
    /// The reply being collected, starting at 1.
    pub current_count: u32,
    /// The value some parameters must have, like a nick or a channel.
    pub string: Option<String>,
    /// Seconds before giving up.
    pub timeout: i64,
    /// The line this redirect was attached to.
    pub command: Option<String>,
    /// Whether a line has been attached.
    pub assigned_to_command: bool,
    /// When the attached line was sent.
    pub start_time: Option<DateTime<Utc>>,
    /// Commands starting the reply.
    pub cmd_start: Option<CommandSet>,
    /// Commands stopping the reply.
    pub cmd_stop: CommandSet,
    /// Commands following a stop.
    pub cmd_extra: Option<CommandSet>,
    /// Whether a start command was received.
    pub cmd_start_received: bool,
    /// Whether a stop command was received.
    pub cmd_stop_received: bool,
    /// Only these commands are kept in the output, if set.
    pub cmd_filter: Option<Vec<String>>,
    /// Collected lines.
    pub output: Option<String>,
}

impl Redirect {
    fn matches(&self, set: &CommandSet, command: &str, params: &[String]) -> bool {
        let index = match set.get(command) {
            Some(index) => *index,
            None => return false,
        };
        match (self.string.as_deref().filter(|s| !s.is_empty()), index) {
            (Some(string), Some(index)) => params
                .get(index)
                .map_or(false, |param| param.eq_ignore_ascii_case(string)),
            _ => true,
        }
    }

    fn add_output(&mut self, line: &str, command: &str) {
        if let Some(filter) = &self.cmd_filter {
            if !filter.iter().any(|c| c.eq_ignore_ascii_case(command)) {
                return;
            }
        }
        match &mut self.output {
            Some(output) => {
                output.push('\n');
                output.push_str(line);
            }
            None => self.output = Some(line.to_owned()),
        }
    }

    fn finish(&self, timed_out: bool) -> RedirectOutput {
        RedirectOutput {
            pattern: self.pattern.clone(),
            signal: self.signal.clone(),
            command: self.command.clone().unwrap_or_default(),
            output: self.output.clone().unwrap_or_default(),
            timed_out,
        }
    }
}

/// The redirects of one server, oldest first.
#[derive(Clone, Debug, Default)]
pub struct Redirects {
    list: Vec<Redirect>,
    next_id: u64,
}

impl Redirects {
    /// No redirects.
    pub fn new() -> Redirects {
        Redirects::default()
    }

    /// Creates a redirect from a pattern. A timeout of 0 uses the pattern's.
    pub fn add(
        &mut self,
        pattern: &RedirectPattern,
        signal: &str,
        count: u32,
        string: Option<&str>,
        timeout: i64,
        cmd_filter: Option<&str>,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.list.push(Redirect {
            id,
            pattern: pattern.name.clone(),
            signal: signal.to_owned(),
            count: count.max(1),
            current_count: 1,
            string: string.map(|s| s.to_owned()),
            timeout: if timeout > 0 { timeout } else { pattern.timeout },
            command: None,
            assigned_to_command: false,
            start_time: None,
            cmd_start: pattern.cmd_start.as_deref().map(parse_commands),
            cmd_stop: parse_commands(&pattern.cmd_stop),
            cmd_extra: pattern.cmd_extra.as_deref().map(parse_commands),
            cmd_start_received: false,
            cmd_stop_received: false,
            cmd_filter: cmd_filter.map(|f| {
                f.split(',')
                    .map(|c| c.trim().to_owned())
                    .filter(|c| !c.is_empty())
                    .collect()
            }),
            output: None,
        });
        id
    }

    /// Puts back a redirect read from a snapshot.
    pub fn restore(&mut self, redirect: Redirect) {
        self.next_id = self.next_id.max(redirect.id);
        self.list.push(redirect);
    }

    /// The first redirect not yet attached to a line.
    pub fn available(&self) -> Option<u64> {
        self.list.iter().find(|r| !r.assigned_to_command).map(|r| r.id)
    }

    /// Attaches a redirect to a line; it runs once the line is sent.
    pub fn assign(&mut self, id: u64) {
        if let Some(redirect) = self.list.iter_mut().find(|r| r.id == id) {
            redirect.assigned_to_command = true;
        }
    }

    /// Starts a redirect: its line has just been sent.
    pub fn start(&mut self, id: u64, command: &str, now: DateTime<Utc>) {
        if let Some(redirect) = self.list.iter_mut().find(|r| r.id == id) {
            let command = command.split(|c| c == '\r' || c == '\n').next().unwrap_or("");
            redirect.command = Some(command.to_owned());
            redirect.assigned_to_command = true;
            redirect.start_time = Some(now);
        }
    }

    /// All redirects.
    pub fn iter(&self) -> impl Iterator<Item = &Redirect> {
        self.list.iter()
    }

    /// Number of redirects.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether there are no redirects.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drops every redirect.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    // Ends one reply; the redirect is removed once `count` replies are collected.
    fn stop(&mut self, index: usize, timed_out: bool, done: &mut Vec<RedirectOutput>) {
        let redirect = &mut self.list[index];
        redirect.current_count += 1;
        if timed_out || redirect.current_count > redirect.count {
            done.push(redirect.finish(timed_out));
            self.list.remove(index);
        } else {
            redirect.cmd_start_received = false;
            redirect.cmd_stop_received = false;
        }
    }

    /// Offers a received line to the running redirects. Returns whether the line was taken, and
    /// the redirects that ended.
    pub fn message(&mut self, line: &str, command: &str, params: &[String]) -> (bool, Vec<RedirectOutput>) {
        let command = command.to_ascii_uppercase();
        let mut done = vec![];
        let mut index = 0;
        while index < self.list.len() {
            if self.list[index].start_time.is_none() {
                index += 1;
                continue;
            }
            let before = self.list.len();
            let redirect = &mut self.list[index];
            if redirect.cmd_stop_received {
                let extra = redirect
                    .cmd_extra
                    .as_ref()
                    .map_or(false, |set| redirect.matches(set, &command, params));
                if extra {
                    redirect.add_output(line, &command);
                    self.stop(index, false, &mut done);
                    return (true, done);
                }
                self.stop(index, false, &mut done);
            } else {
                let start = !redirect.cmd_start_received
                    && redirect
                        .cmd_start
                        .as_ref()
                        .map_or(false, |set| redirect.matches(set, &command, params));
                if start {
                    redirect.add_output(line, &command);
                    redirect.cmd_start_received = true;
                    return (true, done);
                }
                let stop = redirect.matches(&redirect.cmd_stop, &command, params);
                if stop || redirect.cmd_start_received {
                    redirect.add_output(line, &command);
                    if stop {
                        redirect.cmd_stop_received = true;
                        let end = match &redirect.cmd_extra {
                            Some(set) => redirect.matches(set, &command, params),
                            None => true,
                        };
                        if end {
                            self.stop(index, false, &mut done);
                        }
                    }
                    return (true, done);
                }
            }
            if self.list.len() == before {
                index += 1;
            }
        }
        (false, done)
    }

    /// Ends the redirects that ran longer than their timeout.
    pub fn check_timeouts(&mut self, now: DateTime<Utc>) -> Vec<RedirectOutput> {
        let mut done = vec![];
        let mut index = 0;
        while index < self.list.len() {
            let redirect = &self.list[index];
            let expired = redirect
                .start_time
                .map_or(false, |start| now >= start + Duration::seconds(redirect.timeout));
            if expired {
                self.stop(index, true, &mut done);
            } else {
                index += 1;
            }
        }
        done
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::{parse_commands, RedirectPattern, Redirects};

    fn pattern(name: &str) -> RedirectPattern {
        RedirectPattern::defaults()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
    }

    fn params(line: &str) -> Vec<String> {
        line.split(' ').map(|s| s.to_owned()).collect()
    }

    #[test]
    fn command_sets() {
        let set = parse_commands("352:1, 354 ,mode:0,,");
        assert_eq!(set.len(), 3);
        assert_eq!(set["352"], Some(1));
        assert_eq!(set["354"], None);
        assert_eq!(set["MODE"], Some(0));
    }

    #[test]
    fn who_reply_is_collected() {
        let now = Utc.timestamp(1_000, 0);
        let mut redirects = Redirects::new();
        let id = redirects.add(&pattern("who"), "test", 1, Some("#rust"), 0, None);
        assert_eq!(redirects.available(), Some(id));
        redirects.assign(id);
        assert_eq!(redirects.available(), None);

        // Not started yet: nothing is taken.
        assert!(!redirects.message("a", "352", &params("me #rust u h s n H :0 r")).0);

        redirects.start(id, "WHO #rust\r\n", now);
        assert!(!redirects.message("b", "352", &params("me #other u h s n H :0 r")).0);
        assert!(redirects.message("c", "352", &params("me #rust u h s n H :0 r")).0);
        assert!(redirects.message("d", "352", &params("me #rust v h s m H :0 r")).0);
        let (taken, done) = redirects.message("e", "315", &params("me #rust :End"));
        assert!(taken);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].command, "WHO #rust");
        assert_eq!(done[0].output, "c\nd\ne");
        assert!(!done[0].timed_out);
        assert!(redirects.is_empty());
    }

    #[test]
    fn extra_after_stop() {
        let now = Utc.timestamp(1_000, 0);
        let mut redirects = Redirects::new();
        let id = redirects.add(&pattern("topic"), "s", 1, Some("#rust"), 0, None);
        redirects.start(id, "TOPIC #rust", now);
        let (taken, done) = redirects.message("t", "332", &params("me #rust :hello"));
        assert!(taken && done.is_empty());
        let (taken, done) = redirects.message("w", "333", &params("me #rust nick 1234"));
        assert!(taken);
        assert_eq!(done[0].output, "t\nw");
    }

    #[test]
    fn stop_without_extra_ends_on_next_line() {
        let now = Utc.timestamp(1_000, 0);
        let mut redirects = Redirects::new();
        let id = redirects.add(&pattern("topic"), "s", 1, Some("#rust"), 0, None);
        redirects.start(id, "TOPIC #rust", now);
        redirects.message("t", "331", &params("me #rust :No topic"));
        let (taken, done) = redirects.message("p", "PRIVMSG", &params("#rust :hi"));
        assert!(!taken);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].output, "t");
    }

    #[test]
    fn timeout_and_filter() {
        let now = Utc.timestamp(1_000, 0);
        let mut redirects = Redirects::new();
        let id = redirects.add(&pattern("who"), "s", 1, None, 10, Some("315"));
        redirects.start(id, "WHO", now);
        assert!(redirects.message("x", "352", &params("me #a u h s n H :0 r")).0);
        assert!(redirects.check_timeouts(Utc.timestamp(1_009, 0)).is_empty());
        let done = redirects.check_timeouts(Utc.timestamp(1_010, 0));
        assert_eq!(done.len(), 1);
        assert!(done[0].timed_out);
        assert_eq!(done[0].output, "");
    }

    #[test]
    fn count_collects_several_replies() {
        let now = Utc.timestamp(1_000, 0);
        let mut redirects = Redirects::new();
        let id = redirects.add(&pattern("ison"), "notify", 2, None, 0, None);
        redirects.start(id, "ISON a", now);
        let (_, done) = redirects.message("one", "303", &params("me :a"));
        assert!(done.is_empty());
        let (_, done) = redirects.message("two", "303", &params("me :b"));
        assert_eq!(done[0].output, "one\ntwo");
    }
}
