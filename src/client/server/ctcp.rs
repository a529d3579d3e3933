//! Answering CTCP requests received in private or on a channel.
//!
//! Replies come from the `ctcp` option, falling back to built-in ones, and may use these
//! variables: `$clientinfo`, `$version`, `$osinfo`, `$download`, `$time`, `$username` and
//! `$realname`. `PING` always echoes its arguments, `ACTION` is never answered.
use std::fmt::Write;

use super::Server;
use crate::client::outqueue::Priority;

/// CTCPs answered by default, as listed in the `CLIENTINFO` reply.
const CLIENTINFO: &str = "ACTION CLIENTINFO FINGER PING SOURCE TIME USERINFO VERSION";

const VERSION: &str = concat!("irc-session ", env!("CARGO_PKG_VERSION"));

const DOWNLOAD: &str = "https://crates.io/crates/irc-session";

impl Server {
    /// Handles a CTCP request from `nick`, returning whether it was known and answered.
    pub(super) fn ctcp_request(&mut self, nick: &str, kind: &str, args: &str) -> bool {
        if kind == "PING" {
            let blocked = self.ctx.config.ctcp_reply(&self.name, kind) == Some("");
            if !blocked {
                self.ctcp_reply(nick, kind, args);
            }
            return true;
        }
        let format = match self.ctx.config.ctcp_reply(&self.name, kind) {
            Some(format) => format.to_owned(),
            None => return false,
        };
        if !format.is_empty() {
            let reply = self.ctcp_expand(&format);
            self.ctcp_reply(nick, kind, &reply);
        }
        true
    }

    fn ctcp_reply(&mut self, nick: &str, kind: &str, args: &str) {
        let payload = if args.is_empty() {
            kind.to_owned()
        } else {
            format!("{} {}", kind, args)
        };
        debug!("[{}] CTCP reply to {}: {}", self.name, nick, payload);
        self.send(Priority::Low, &format!("NOTICE {} :\x01{}\x01", nick, payload));
        if self.ctx.config.display_ctcp_reply() {
            let tags = ["irc_ctcp", "irc_ctcp_reply", "notify_none", "no_highlight"];
            self.print(&tags, &format!("CTCP reply to {}: {}", nick, payload));
        }
    }

    /// Replaces the variables of a CTCP reply format.
    fn ctcp_expand(&self, format: &str) -> String {
        let mut time = String::new();
        if format.contains("$time") {
            let fmt = self.ctx.config.ctcp_time_format();
            if write!(time, "{}", self.ctx.now().format(fmt)).is_err() {
                time = self.ctx.now().to_rfc2822();
            }
        }
        let osinfo = format!("{} {}", std::env::consts::OS, std::env::consts::ARCH);
        format
            .replace("$clientinfo", CLIENTINFO)
            .replace("$version", VERSION)
            .replace("$osinfo", &osinfo)
            .replace("$download", DOWNLOAD)
            .replace("$time", &time)
            .replace("$username", self.config.username())
            .replace("$realname", self.config.realname())
    }
}
