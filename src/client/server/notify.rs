//! The notify list: nicks whose presence on the server is watched, with `MONITOR` when the server
//! supports it, otherwise by polling with `ISON` (and `WHOIS` for the away check).
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Server;
use crate::client::event::Event;
use crate::client::outqueue::Priority;
use crate::proto::Message;

/// Seconds between two `ISON` polls.
const CHECK_ISON: i64 = 60;

/// Seconds between two `WHOIS` away checks.
const CHECK_WHOIS: i64 = 300;

/// Room for the nicks of one `MONITOR` or `ISON` line.
const LINE_BUDGET: usize = 400;

/// A watched nick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notify {
    /// The nick.
    pub nick: String,
    /// Whether its away status is watched too.
    pub check_away: bool,
    /// Online, offline, or not known yet.
    pub is_on_server: Option<bool>,
    /// The away message, when away.
    pub away_message: Option<String>,
}

impl Notify {
    /// A nick in an unknown state.
    pub fn new(nick: &str, check_away: bool) -> Notify {
        Notify {
            nick: nick.to_owned(),
            check_away,
            is_on_server: None,
            away_message: None,
        }
    }
}

/// Parses `notify` option items such as `alice` or `bob away`.
pub(crate) fn parse_notify(items: &[&str]) -> Vec<Notify> {
    items
        .iter()
        .filter_map(|item| {
            let mut words = item.split_whitespace();
            let nick = words.next()?;
            let check_away = words.any(|w| w.eq_ignore_ascii_case("away"));
            Some(Notify::new(nick, check_away))
        })
        .collect()
}

// Joins nicks with `sep` into groups that fit one line.
fn batches(nicks: &[String], sep: char) -> Vec<String> {
    let mut batches = vec![];
    let mut current = String::new();
    for nick in nicks {
        if !current.is_empty() && current.len() + 1 + nick.len() > LINE_BUDGET {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(sep);
        }
        current.push_str(nick);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

impl Server {
    fn notify_index(&self, nick: &str) -> Option<usize> {
        let casemap = self.casemapping();
        self.notify.iter().position(|n| casemap.eq(&n.nick, nick))
    }

    /// Watches a nick. Returns false if it was already watched.
    pub fn notify_add(&mut self, nick: &str, check_away: bool) -> bool {
        if self.notify_index(nick).is_some() {
            return false;
        }
        self.notify.push(Notify::new(nick, check_away));
        if self.is_connected() && self.isupport.monitor().is_some() {
            self.send(Priority::Low, &format!("MONITOR + {}", nick));
        }
        true
    }

    /// Stops watching a nick. Returns false if it was not watched.
    pub fn notify_remove(&mut self, nick: &str) -> bool {
        let index = match self.notify_index(nick) {
            Some(index) => index,
            None => return false,
        };
        let notify = self.notify.remove(index);
        if self.is_connected() && self.isupport.monitor().is_some() {
            self.send(Priority::Low, &format!("MONITOR - {}", notify.nick));
        }
        true
    }

    /// Sends the whole list with `MONITOR +`.
    pub(crate) fn notify_send_monitor(&mut self) {
        let nicks: Vec<String> = self.notify.iter().map(|n| n.nick.clone()).collect();
        for batch in batches(&nicks, ',') {
            self.send(Priority::Low, &format!("MONITOR + {}", batch));
        }
    }

    // Polls with ISON (and WHOIS for the away check) when MONITOR is not available.
    pub(crate) fn notify_timer(&mut self, now: DateTime<Utc>) {
        if !self.is_connected() || self.notify.is_empty() || self.isupport.monitor().is_some() {
            return;
        }
        let due = self
            .notify_check_time
            .map_or(true, |last| now >= last + Duration::seconds(CHECK_ISON));
        if !due {
            return;
        }
        let whois_due = self
            .notify_whois_time
            .map_or(true, |last| now >= last + Duration::seconds(CHECK_WHOIS));
        self.notify_check_time = Some(now);

        let nicks: Vec<String> = self.notify.iter().map(|n| n.nick.clone()).collect();
        let pattern = self.ctx.redirect_patterns.lock().iter().find(|p| p.name == "ison").cloned();
        for batch in batches(&nicks, ' ') {
            if let Some(pattern) = &pattern {
                self.redirects.add(pattern, "notify", 1, None, 0, None);
            }
            self.send(Priority::Low, &format!("ISON :{}", batch));
        }

        if whois_due {
            self.notify_whois_time = Some(now);
            let away: Vec<String> = self
                .notify
                .iter()
                .filter(|n| n.check_away && n.is_on_server == Some(true))
                .map(|n| n.nick.clone())
                .collect();
            let pattern = self.ctx.redirect_patterns.lock().iter().find(|p| p.name == "whois").cloned();
            for nick in away {
                if let Some(pattern) = &pattern {
                    self.redirects.add(pattern, "notify", 1, Some(&nick), 0, Some("301,401"));
                }
                self.send(Priority::Low, &format!("WHOIS :{}", nick));
            }
        }
    }

    /// Records that a watched nick is online or offline, and says so when it changed.
    pub(crate) fn notify_set_is_on_server(&mut self, nick: &str, host: Option<&str>, online: bool) {
        let index = match self.notify_index(nick) {
            Some(index) => index,
            None => return,
        };
        let previous = self.notify[index].is_on_server;
        if previous == Some(online) {
            return;
        }
        let who = match host {
            Some(host) if !host.is_empty() => format!("{} ({})", self.notify[index].nick, host),
            _ => self.notify[index].nick.clone(),
        };
        let message = match (previous, online) {
            (None, true) => format!("notify: {} is connected", who),
            (None, false) => format!("notify: {} is offline", who),
            (Some(_), true) => format!("notify: {} has joined", who),
            (Some(_), false) => format!("notify: {} has quit", who),
        };
        let tag = if online { "irc_notify_join" } else { "irc_notify_quit" };
        let nick_tag = format!("notify_{}", self.notify[index].nick);
        self.print(&["irc_notify", tag, &nick_tag], &message);
        self.notify[index].is_on_server = Some(online);
        if !online {
            self.notify[index].away_message = None;
        }
        debug!("[{}] {}", self.name, message);
        self.ctx.emit(Event::NotifyChanged {
            server: self.name.clone(),
            nick: self.notify[index].nick.clone(),
            online,
        });
    }

    /// Records the away message of a watched nick, `None` when back.
    pub(crate) fn notify_set_away_message(&mut self, nick: &str, away_message: Option<&str>) {
        let index = match self.notify_index(nick) {
            Some(index) => index,
            None => return,
        };
        if !self.notify[index].check_away || self.notify[index].away_message.as_deref() == away_message {
            return;
        }
        let name = self.notify[index].nick.clone();
        let message = match (away_message, self.notify[index].away_message.is_some()) {
            (Some(text), false) => format!("notify: {} is now away: \"{}\"", name, text),
            (Some(text), true) => format!("notify: {} is still away: \"{}\"", name, text),
            (None, _) => format!("notify: {} is back", name),
        };
        let tag = if away_message.is_some() {
            "irc_notify_away"
        } else {
            "irc_notify_back"
        };
        self.print(&["irc_notify", tag], &message);
        self.notify[index].away_message = away_message.map(|s| s.to_owned());
    }

    /// Handles the collected reply of an `ISON` or `WHOIS` sent by the notify poll.
    pub(crate) fn notify_redirected(&mut self, pattern: &str, command: &str, output: &str) {
        let replies: Vec<Message> = output.lines().filter_map(|l| l.parse::<Message>().ok()).collect();
        match pattern {
            "ison" => {
                let asked: Vec<String> = command
                    .splitn(2, ' ')
                    .nth(1)
                    .map(|rest| rest.trim_start_matches(':').split(' ').map(|s| s.to_owned()).collect())
                    .unwrap_or_default();
                let mut online: Vec<String> = vec![];
                for reply in &replies {
                    if let Some(list) = reply.command.params().last() {
                        online.extend(list.split(' ').filter(|n| !n.is_empty()).map(|n| n.to_owned()));
                    }
                }
                let casemap = self.casemapping();
                for nick in asked.iter().filter(|n| !n.is_empty()) {
                    let is_on = online.iter().any(|o| casemap.eq(o, nick));
                    self.notify_set_is_on_server(nick, None, is_on);
                }
            }
            "whois" => {
                let nick = command.splitn(2, ' ').nth(1).unwrap_or("").trim_start_matches(':').to_owned();
                let mut away = None;
                for reply in &replies {
                    let params = reply.command.params();
                    match reply.command.name().as_str() {
                        "401" => return self.notify_set_is_on_server(&nick, None, false),
                        "301" => away = params.last().cloned(),
                        _ => (),
                    }
                }
                self.notify_set_away_message(&nick, away.as_deref());
            }
            _ => (),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{batches, parse_notify};
    use crate::client::event::Event;
    use crate::client::server::fixture::{test_config, Harness};

    #[test]
    fn parse_items() {
        let list = parse_notify(&["alice", "bob away", " "]);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].nick, "alice");
        assert!(!list[0].check_away);
        assert!(list[1].check_away);
    }

    #[test]
    fn batches_fit_lines() {
        let nicks: Vec<String> = (0..100).map(|i| format!("nickname{:02}", i)).collect();
        let lines = batches(&nicks, ',');
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 400));
        assert_eq!(lines.join(",").split(',').count(), 100);
    }

    #[test]
    fn monitor_online_offline() {
        let mut config = test_config();
        config.notify = Some("alice,bob".into());
        let mut h = Harness::new(config);
        h.connect();
        h.recv(":irc.test.net 005 test MONITOR=100 :are supported by this server");
        h.recv(":irc.test.net 001 test :Welcome");
        h.sent();
        h.clock.advance(5);
        h.server.timer();
        assert!(h.sent().contains("MONITOR + alice,bob\r\n"));
        h.recv(":irc.test.net 730 test :alice!a@host");
        h.recv(":irc.test.net 731 test :bob");
        assert_eq!(h.server.notify_list()[0].is_on_server, Some(true));
        assert_eq!(h.server.notify_list()[1].is_on_server, Some(false));
        assert!(h.events().contains(&Event::NotifyChanged {
            server: "test".into(),
            nick: "alice".into(),
            online: true,
        }));
        h.recv(":irc.test.net 731 test :alice");
        assert!(h.lines("server.test").iter().any(|l| l == "notify: alice has quit"));
    }

    #[test]
    fn ison_polling() {
        let mut config = test_config();
        config.notify = Some("alice,bob".into());
        let mut h = Harness::new(config);
        h.register();
        h.server.timer();
        assert!(h.sent().contains("ISON :alice bob\r\n"));
        h.recv(":irc.test.net 303 test :Alice");
        assert_eq!(h.server.notify_list()[0].is_on_server, Some(true));
        assert_eq!(h.server.notify_list()[1].is_on_server, Some(false));
        // The reply went to the notify list, not to the buffer.
        assert!(!h.lines("server.test").iter().any(|l| l.contains("Alice")));
    }
}
