//! Capability negotiation (`CAP`) and SASL authentication.
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Duration;

use super::Server;
use crate::client::data::mask::match_list;
use crate::client::data::{SaslFail, SaslMechanism};
use crate::client::outqueue::Priority;
use crate::proto::{CapSubCommand, Capability};

/// Longest `AUTHENTICATE` payload sent in one line.
const SASL_CHUNK: usize = 400;

/// The enabled capabilities that change how the session reads the protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapFlags {
    /// `account-notify`
    pub account_notify: bool,
    /// `account-tag`
    pub account_tag: bool,
    /// `away-notify`
    pub away_notify: bool,
    /// `batch`
    pub batch: bool,
    /// `cap-notify`
    pub cap_notify: bool,
    /// `chghost`
    pub chghost: bool,
    /// `echo-message`
    pub echo_message: bool,
    /// `extended-join`
    pub extended_join: bool,
    /// `invite-notify`
    pub invite_notify: bool,
    /// `message-tags`
    pub message_tags: bool,
    /// `multi-prefix`
    pub multi_prefix: bool,
    /// `sasl`
    pub sasl: bool,
    /// `server-time`
    pub server_time: bool,
    /// `setname`
    pub setname: bool,
    /// `userhost-in-names`
    pub userhost_in_names: bool,
}

impl CapFlags {
    /// Computes the flags from the names of the enabled capabilities.
    pub fn from_names<'a, I>(names: I) -> CapFlags
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut flags = CapFlags::default();
        for cap in names.into_iter().filter_map(Capability::from_name) {
            let flag = match cap {
                Capability::AccountNotify => &mut flags.account_notify,
                Capability::AccountTag => &mut flags.account_tag,
                Capability::AwayNotify => &mut flags.away_notify,
                Capability::Batch => &mut flags.batch,
                Capability::CapNotify => &mut flags.cap_notify,
                Capability::ChgHost => &mut flags.chghost,
                Capability::EchoMessage => &mut flags.echo_message,
                Capability::ExtendedJoin => &mut flags.extended_join,
                Capability::InviteNotify => &mut flags.invite_notify,
                Capability::MessageTags => &mut flags.message_tags,
                Capability::MultiPrefix => &mut flags.multi_prefix,
                Capability::Sasl => &mut flags.sasl,
                Capability::ServerTime => &mut flags.server_time,
                Capability::Setname => &mut flags.setname,
                Capability::UserhostInNames => &mut flags.userhost_in_names,
            };
            *flag = true;
        }
        flags
    }
}

/// Expands the `capabilities` option into masks: `*` becomes every supported capability, and
/// `sasl` is added when authentication is wanted.
pub(crate) fn caps_to_enable(option: &str, sasl_requested: bool) -> Vec<String> {
    let mut caps = vec![];
    for cap in option.split(',').map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if cap == "*" {
            caps.extend(Capability::ALL.iter().map(|c| c.as_ref().to_owned()));
        } else {
            caps.push(cap.to_owned());
        }
    }
    if sasl_requested {
        caps.push("sasl".to_owned());
    }
    caps
}

/// The `AUTHENTICATE PLAIN` answer.
pub(crate) fn sasl_plain(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{}\0{}\0{}", username, username, password))
}

// Parses `name=value` capability tokens.
fn parse_caps(list: &str) -> Vec<(String, Option<String>)> {
    list.split(' ')
        .filter(|c| !c.is_empty())
        .map(|c| match c.find('=') {
            Some(pos) => (c[..pos].to_owned(), Some(c[pos + 1..].to_owned())),
            None => (c.to_owned(), None),
        })
        .collect()
}

fn print_caps(caps: &std::collections::BTreeMap<String, Option<String>>) -> String {
    caps.iter()
        .map(|(name, value)| match value {
            Some(value) => format!("{}={}", name, value),
            None => name.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Server {
    /// Whether SASL should be attempted: configured, or credentials given for this attempt.
    pub fn sasl_enabled(&self) -> bool {
        self.sasl_temp_username.is_some() && self.sasl_temp_password.is_some()
            || self.config.sasl_requested()
    }

    fn sasl_credentials(&self) -> (String, String) {
        match (&self.sasl_temp_username, &self.sasl_temp_password) {
            (Some(user), Some(pass)) => (user.clone(), pass.clone()),
            _ => (
                self.config.sasl_username().unwrap_or_default().to_owned(),
                self.config.sasl_password().unwrap_or_default().to_owned(),
            ),
        }
    }

    fn update_caps(&mut self) {
        self.caps = CapFlags::from_names(self.cap_list.keys().map(|k| k.as_str()));
    }

    /// Handles a `CAP` message.
    pub(crate) fn handle_cap(&mut self, sub: CapSubCommand, arg: Option<&str>, param: Option<&str>) {
        let param = match param {
            Some(param) => param,
            None => return,
        };
        let last_reply = arg != Some("*");
        match sub {
            CapSubCommand::LS => {
                if !self.checking_cap_ls {
                    self.cap_ls.clear();
                    self.checking_cap_ls = true;
                }
                self.cap_ls.extend(parse_caps(param));
                if last_reply {
                    self.checking_cap_ls = false;
                    let message = format!("client capability, server supports: {}", print_caps(&self.cap_ls));
                    self.print(&["irc_cap"], &message);
                    if !self.is_connected() {
                        self.cap_sync(true);
                    }
                }
            }
            CapSubCommand::LIST => {
                if !self.checking_cap_list {
                    self.cap_list.clear();
                    self.checking_cap_list = true;
                }
                self.cap_list.extend(parse_caps(param));
                if last_reply {
                    self.checking_cap_list = false;
                    let message = format!("client capability, currently enabled: {}", print_caps(&self.cap_list));
                    self.print(&["irc_cap"], &message);
                }
                self.update_caps();
            }
            CapSubCommand::ACK => {
                let mut enabled = vec![];
                let mut disabled = vec![];
                let mut sasl_to_do = false;
                for cap in param.split(' ').filter(|c| !c.is_empty()) {
                    match cap.strip_prefix('-') {
                        Some(name) => {
                            self.cap_list.remove(name);
                            disabled.push(name);
                        }
                        None => {
                            self.cap_list.insert(cap.to_owned(), None);
                            sasl_to_do |= cap == "sasl";
                            enabled.push(cap);
                        }
                    }
                }
                let message = match (enabled.is_empty(), disabled.is_empty()) {
                    (false, false) => format!(
                        "client capability, enabled: {}, disabled: {}",
                        enabled.join(" "),
                        disabled.join(" ")
                    ),
                    (false, true) => format!("client capability, enabled: {}", enabled.join(" ")),
                    (true, false) => format!("client capability, disabled: {}", disabled.join(" ")),
                    (true, true) => String::new(),
                };
                if !message.is_empty() {
                    self.print(&["irc_cap"], &message);
                }
                self.update_caps();
                if sasl_to_do && self.sasl_enabled() {
                    self.sasl_start();
                }
            }
            CapSubCommand::NAK => {
                self.print_error(&format!("client capability, refused: {}", param));
                if !self.is_connected() {
                    self.send(Priority::Immediate, "CAP END");
                }
            }
            CapSubCommand::NEW => {
                self.print(&["irc_cap"], &format!("client capability, now available: {}", param));
                self.cap_ls.extend(parse_caps(param));
                self.cap_sync(false);
            }
            CapSubCommand::DEL => {
                self.print(&["irc_cap"], &format!("client capability, removed: {}", param));
                for cap in param.split(' ').filter(|c| !c.is_empty()) {
                    self.cap_ls.remove(cap);
                    self.cap_list.remove(cap);
                }
                self.update_caps();
            }
            CapSubCommand::REQ | CapSubCommand::END => (),
        }
    }

    /// Requests the wanted capabilities the server offers and that are not enabled yet. With
    /// `sasl`, also decides whether registration waits for authentication.
    pub(crate) fn cap_sync(&mut self, sasl: bool) {
        let sasl_requested = sasl && self.sasl_enabled();
        let wanted = caps_to_enable(self.config.capabilities(), sasl_requested);
        let masks: Vec<&str> = wanted.iter().map(|c| c.as_str()).collect();
        let mut sasl_to_do = false;
        let mut request = vec![];
        for cap in self.cap_ls.keys() {
            if !self.cap_list.contains_key(cap) && match_list(cap, &masks) {
                sasl_to_do |= sasl && cap == "sasl";
                request.push(cap.clone());
            }
        }
        if !request.is_empty() {
            let request = request.join(" ");
            self.print(&["irc_cap"], &format!("client capability, requesting: {}", request));
            self.send(Priority::Immediate, &format!("CAP REQ :{}", request));
        }
        if !sasl {
            return;
        }
        if !sasl_to_do {
            self.send(Priority::Immediate, "CAP END");
        }
        if sasl_requested && !sasl_to_do {
            self.print_error("client capability: SASL not supported");
            if self.ctx.config.sasl_fail_unavailable() {
                self.sasl_failed();
            }
        }
    }

    fn sasl_start(&mut self) {
        let mechanism = self.config.sasl_mechanism();
        self.send(Priority::Immediate, &format!("AUTHENTICATE {}", mechanism.as_str()));
        self.sasl_deadline = Some(self.ctx.now() + Duration::seconds(self.config.sasl_timeout()));
    }

    /// Answers an `AUTHENTICATE` challenge.
    pub(crate) fn handle_authenticate(&mut self, _challenge: &str) {
        if !self.sasl_enabled() {
            return;
        }
        let answer = match self.config.sasl_mechanism() {
            SaslMechanism::Plain => {
                let (username, password) = self.sasl_credentials();
                sasl_plain(&username, &password)
            }
            SaslMechanism::External => "+".to_owned(),
        };
        let bytes = answer.as_bytes();
        let mut chunks: Vec<&str> = bytes
            .chunks(SASL_CHUNK)
            .filter_map(|c| std::str::from_utf8(c).ok())
            .collect();
        if bytes.len() % SASL_CHUNK == 0 && !bytes.is_empty() {
            chunks.push("+");
        }
        for chunk in chunks {
            self.send(Priority::Immediate, &format!("AUTHENTICATE {}", chunk));
        }
    }

    /// SASL succeeded (`903`, `907`).
    pub(crate) fn sasl_end_ok(&mut self, message: &str) {
        self.sasl_deadline = None;
        self.print(&["irc_numeric"], message);
        self.authenticated = true;
        if !self.is_connected() {
            self.send(Priority::Immediate, "CAP END");
        }
        self.sasl_temp_username = None;
        self.sasl_temp_password = None;
    }

    /// SASL failed (`902`, `904`, `905`, `906`).
    pub(crate) fn sasl_end_fail(&mut self, message: &str) {
        self.sasl_deadline = None;
        self.authenticated = false;
        self.print_error(message);
        self.sasl_failed();
    }

    /// No answer to the authentication in time.
    pub(crate) fn sasl_timeout(&mut self) {
        self.print_error("SASL authentication timeout");
        self.sasl_failed();
    }

    // Applies the `sasl_fail` option.
    fn sasl_failed(&mut self) {
        let registered = self.is_connected();
        match self.config.sasl_fail() {
            SaslFail::Reconnect if !registered => self.disconnect(false, true),
            SaslFail::Disconnect if !registered => self.disconnect(false, false),
            _ => {
                if !registered {
                    self.send(Priority::Immediate, "CAP END");
                }
                self.sasl_temp_username = None;
                self.sasl_temp_password = None;
            }
        }
    }

    /// Authenticates with SASL PLAIN using credentials for this attempt only.
    pub fn authenticate(&mut self, username: &str, password: &str) {
        self.sasl_temp_username = Some(username.to_owned());
        self.sasl_temp_password = Some(password.to_owned());
        if self.caps.sasl {
            self.sasl_start();
        } else {
            self.send(Priority::Immediate, "CAP REQ :sasl");
        }
    }
}

#[cfg(test)]
mod test {
    use super::{caps_to_enable, sasl_plain, CapFlags};
    use crate::client::data::SaslFail;
    use crate::client::event::SessionState;
    use crate::client::server::fixture::{test_config, Harness};

    fn sasl_config() -> crate::client::data::ServerConfig {
        let mut config = test_config();
        config.capabilities = Some("multi-prefix".into());
        config.sasl_username = Some("test".into());
        config.sasl_password = Some("secret".into());
        config
    }

    #[test]
    fn flags_from_names() {
        let flags = CapFlags::from_names(vec!["away-notify", "server-time", "unknown"]);
        assert!(flags.away_notify);
        assert!(flags.server_time);
        assert!(!flags.sasl);
    }

    #[test]
    fn wildcard_capabilities() {
        let caps = caps_to_enable("*,!echo-message", true);
        assert!(caps.contains(&"multi-prefix".to_owned()));
        assert!(caps.contains(&"!echo-message".to_owned()));
        assert_eq!(caps.last().map(|s| s.as_str()), Some("sasl"));
    }

    #[test]
    fn plain_payload() {
        assert_eq!(sasl_plain("jilles", "sesame"), "amlsbGVzAGppbGxlcwBzZXNhbWU=");
    }

    #[test]
    fn sasl_flow() {
        let mut h = Harness::new(sasl_config());
        h.connect();
        assert_eq!(h.sent(), "CAP LS 302\r\nNICK test\r\nUSER test 0 * :Testing.\r\n");
        h.recv(":irc.test.net CAP * LS * :multi-prefix sasl=PLAIN,EXTERNAL");
        assert_eq!(h.sent(), "");
        h.recv(":irc.test.net CAP * LS :away-notify");
        assert_eq!(h.sent(), "CAP REQ :multi-prefix sasl\r\n");
        assert_eq!(h.server.cap_ls().get("sasl"), Some(&Some("PLAIN,EXTERNAL".to_owned())));
        h.recv(":irc.test.net CAP test ACK :multi-prefix sasl");
        assert_eq!(h.sent(), "AUTHENTICATE PLAIN\r\n");
        assert!(h.server.caps().multi_prefix);
        h.recv("AUTHENTICATE +");
        assert_eq!(h.sent(), "AUTHENTICATE dGVzdAB0ZXN0AHNlY3JldA==\r\n");
        h.recv(":irc.test.net 903 test :SASL authentication successful");
        assert_eq!(h.sent(), "CAP END\r\n");
        assert!(h.server.is_authenticated());
    }

    #[test]
    fn sasl_unavailable_disconnects() {
        let mut h = Harness::new(sasl_config());
        h.connect();
        h.sent();
        h.recv(":irc.test.net CAP * LS :multi-prefix");
        assert_eq!(h.sent(), "CAP REQ :multi-prefix\r\nCAP END\r\n");
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert_eq!(h.server.reconnect_delay(), 10);
    }

    #[test]
    fn sasl_failure_can_continue() {
        let mut config = sasl_config();
        config.sasl_fail = Some(SaslFail::Continue);
        let mut h = Harness::new(config);
        h.connect();
        h.recv(":irc.test.net CAP * LS :sasl");
        h.recv(":irc.test.net CAP test ACK :sasl");
        h.sent();
        h.recv(":irc.test.net 904 test :SASL authentication failed");
        assert_eq!(h.sent(), "CAP END\r\n");
        assert_eq!(h.server.state(), SessionState::Registering);
        assert!(!h.server.is_authenticated());
    }

    #[test]
    fn sasl_timeout() {
        let mut config = sasl_config();
        config.sasl_timeout = Some(10);
        config.sasl_fail = Some(SaslFail::Disconnect);
        let mut h = Harness::new(config);
        h.connect();
        h.recv(":irc.test.net CAP * LS :sasl");
        h.recv(":irc.test.net CAP test ACK :sasl");
        h.clock.advance(10);
        h.server.timer();
        assert_eq!(h.server.state(), SessionState::Disconnected);
        assert_eq!(h.server.reconnect_start(), None);
    }

    #[test]
    fn nak_ends_negotiation() {
        let mut config = test_config();
        config.capabilities = Some("*".into());
        let mut h = Harness::new(config);
        h.connect();
        h.recv(":irc.test.net CAP * LS :batch chghost");
        assert_eq!(
            h.sent(),
            "CAP LS 302\r\nNICK test\r\nUSER test 0 * :Testing.\r\nCAP REQ :batch chghost\r\nCAP END\r\n"
        );
        h.recv(":irc.test.net CAP test NAK :batch chghost");
        assert_eq!(h.sent(), "CAP END\r\n");
        assert!(!h.server.caps().batch);
    }

    #[test]
    fn new_and_del() {
        let mut config = test_config();
        config.capabilities = Some("away-notify".into());
        let mut h = Harness::new(config);
        h.register();
        h.recv(":irc.test.net CAP test NEW :away-notify");
        assert_eq!(h.sent(), "CAP REQ :away-notify\r\n");
        h.recv(":irc.test.net CAP test ACK :away-notify");
        assert!(h.server.caps().away_notify);
        h.recv(":irc.test.net CAP test DEL :away-notify");
        assert!(!h.server.caps().away_notify);
        assert!(h.server.cap_ls().is_empty());
    }
}
