//! Enumeration of the IRC commands a client session sends or interprets.
use std::str::FromStr;

use crate::error::MessageParseError;
use crate::response::Response;

/// List of the commands a session understands, with their arguments in wire order. Anything
/// else is kept as `Raw`; known numerics become `Response`.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// PASS password
    PASS(String),
    /// NICK nickname
    NICK(String),
    /// USER user mode * :realname
    USER(String, String, String),
    /// QUIT :comment
    QUIT(Option<String>),
    /// JOIN chanlist [chankeys] or, with extended-join, JOIN channel account :realname
    JOIN(String, Option<String>, Option<String>),
    /// PART chanlist :comment
    PART(String, Option<String>),
    /// KICK channel user :comment
    KICK(String, String, Option<String>),
    /// TOPIC channel :topic
    TOPIC(String, Option<String>),
    /// MODE target modestring args...
    MODE(String, Vec<String>),
    /// INVITE nickname channel
    INVITE(String, String),
    /// KILL nickname :comment
    KILL(String, String),
    /// PRIVMSG msgtarget :message
    PRIVMSG(String, String),
    /// NOTICE msgtarget :message
    NOTICE(String, String),
    /// PING server1 [server2]
    PING(String, Option<String>),
    /// PONG server [:server2]
    PONG(String, Option<String>),
    /// ERROR :message
    ERROR(String),
    /// AWAY :message
    AWAY(Option<String>),
    /// WHO [mask [o]]
    WHO(Option<String>, Option<String>),
    /// ISON nicklist
    ISON(Vec<String>),
    /// MONITOR command [targets]
    MONITOR(String, Option<String>),
    /// CAP [target] subcommand [arg] :[param]
    CAP(Option<String>, CapSubCommand, Option<String>, Option<String>),
    /// AUTHENTICATE data
    AUTHENTICATE(String),
    /// ACCOUNT account (account-notify)
    ACCOUNT(String),
    /// CHGHOST user host
    CHGHOST(String, String),
    /// SETNAME :realname
    SETNAME(String),
    /// A numeric reply with its parameters.
    Response(Response, Vec<String>),
    /// Any other command with its parameters.
    Raw(String, Vec<String>),
}

fn opt(args: &[&str], i: usize) -> Option<String> {
    args.get(i).map(|s| (*s).to_owned())
}

impl Command {
    /// Constructs a new command from its name and parameters, the last of which may have been
    /// a trailing parameter. Known commands with an unexpected number of parameters are kept as
    /// `Raw`.
    pub fn new(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        if cmd.is_empty() {
            return Err(MessageParseError::InvalidCommand);
        }
        let a = &args[..];
        let n = a.len();
        let owned = |i: usize| a[i].to_owned();
        let upper = cmd.to_ascii_uppercase();
        Ok(match &upper[..] {
            "PASS" if n == 1 => Command::PASS(owned(0)),
            "NICK" if n == 1 => Command::NICK(owned(0)),
            "USER" if n == 4 => Command::USER(owned(0), owned(1), owned(3)),
            "QUIT" if n <= 1 => Command::QUIT(opt(a, 0)),
            "JOIN" if (1..=3).contains(&n) => Command::JOIN(owned(0), opt(a, 1), opt(a, 2)),
            "PART" if (1..=2).contains(&n) => Command::PART(owned(0), opt(a, 1)),
            "KICK" if (2..=3).contains(&n) => Command::KICK(owned(0), owned(1), opt(a, 2)),
            "TOPIC" if (1..=2).contains(&n) => Command::TOPIC(owned(0), opt(a, 1)),
            "MODE" if n >= 1 => Command::MODE(owned(0), a[1..].iter().map(|s| (*s).to_owned()).collect()),
            "INVITE" if n == 2 => Command::INVITE(owned(0), owned(1)),
            "KILL" if n == 2 => Command::KILL(owned(0), owned(1)),
            "PRIVMSG" if n == 2 => Command::PRIVMSG(owned(0), owned(1)),
            "NOTICE" if n == 2 => Command::NOTICE(owned(0), owned(1)),
            "PING" if (1..=2).contains(&n) => Command::PING(owned(0), opt(a, 1)),
            "PONG" if (1..=2).contains(&n) => Command::PONG(owned(0), opt(a, 1)),
            "ERROR" if n == 1 => Command::ERROR(owned(0)),
            "AWAY" if n <= 1 => Command::AWAY(opt(a, 0)),
            "WHO" if n <= 2 => Command::WHO(opt(a, 0), opt(a, 1)),
            "ISON" => Command::ISON(a.iter().map(|s| (*s).to_owned()).collect()),
            "MONITOR" if (1..=2).contains(&n) => Command::MONITOR(owned(0), opt(a, 1)),
            "CAP" if n >= 1 => Command::new_cap(a)?,
            "AUTHENTICATE" if n == 1 => Command::AUTHENTICATE(owned(0)),
            "ACCOUNT" if n == 1 => Command::ACCOUNT(owned(0)),
            "CHGHOST" if n == 2 => Command::CHGHOST(owned(0), owned(1)),
            "SETNAME" if n == 1 => Command::SETNAME(owned(0)),
            _ => {
                let args = a.iter().map(|s| (*s).to_owned()).collect();
                match cmd.parse::<Response>() {
                    Ok(resp) => Command::Response(resp, args),
                    Err(_) => Command::Raw(cmd.to_owned(), args),
                }
            }
        })
    }

    // Servers always send a target before the subcommand; clients never do.
    fn new_cap(a: &[&str]) -> Result<Command, MessageParseError> {
        let server_form = a.len() >= 2 && a[1].parse::<CapSubCommand>().is_ok();
        let (target, rest) = if server_form {
            (Some(a[0].to_owned()), &a[1..])
        } else {
            (None, a)
        };
        let sub = rest[0].parse::<CapSubCommand>()?;
        let (arg, param) = match rest.len() {
            1 => (None, None),
            2 => (None, Some(rest[1].to_owned())),
            _ => (Some(rest[1].to_owned()), Some(rest[2].to_owned())),
        };
        Ok(Command::CAP(target, sub, arg, param))
    }

    /// The command name as it appears on the wire (numerics as three digits).
    pub fn name(&self) -> String {
        self.parts().0
    }

    /// All parameters of the command in wire order, trailing parameter included.
    pub fn params(&self) -> Vec<String> {
        let (_, mut args, suffix) = self.parts();
        args.extend(suffix);
        args.into_iter().map(|s| s.to_owned()).collect()
    }

    /// Splits the command into its name, middle parameters and a trailing parameter that is
    /// always written with a colon.
    fn parts(&self) -> (String, Vec<&str>, Option<&str>) {
        fn name(s: &str) -> String {
            s.to_owned()
        }
        fn list(items: &[String]) -> Vec<&str> {
            items.iter().map(|s| s.as_str()).collect()
        }
        match self {
            Command::PASS(p) => (name("PASS"), vec![p.as_str()], None),
            Command::NICK(n) => (name("NICK"), vec![n.as_str()], None),
            Command::USER(u, m, r) => (name("USER"), vec![u.as_str(), m.as_str(), "*"], Some(r.as_str())),
            Command::QUIT(m) => (name("QUIT"), vec![], m.as_deref()),
            Command::JOIN(c, None, _) => (name("JOIN"), vec![c.as_str()], None),
            Command::JOIN(c, Some(k), None) => (name("JOIN"), vec![c.as_str(), k.as_str()], None),
            Command::JOIN(c, Some(a), Some(r)) => {
                (name("JOIN"), vec![c.as_str(), a.as_str()], Some(r.as_str()))
            }
            Command::PART(c, m) => (name("PART"), vec![c.as_str()], m.as_deref()),
            Command::KICK(c, n, m) => (name("KICK"), vec![c.as_str(), n.as_str()], m.as_deref()),
            Command::TOPIC(c, t) => (name("TOPIC"), vec![c.as_str()], t.as_deref()),
            Command::MODE(t, a) => {
                let mut args = vec![t.as_str()];
                args.extend(list(a));
                (name("MODE"), args, None)
            }
            Command::INVITE(n, c) => (name("INVITE"), vec![n.as_str(), c.as_str()], None),
            Command::KILL(n, m) => (name("KILL"), vec![n.as_str()], Some(m.as_str())),
            Command::PRIVMSG(t, m) => (name("PRIVMSG"), vec![t.as_str()], Some(m.as_str())),
            Command::NOTICE(t, m) => (name("NOTICE"), vec![t.as_str()], Some(m.as_str())),
            Command::PING(s, t) => {
                (name("PING"), std::iter::once(s.as_str()).chain(t.as_deref()).collect(), None)
            }
            Command::PONG(s, None) => (name("PONG"), vec![], Some(s.as_str())),
            Command::PONG(s, Some(t)) => (name("PONG"), vec![s.as_str()], Some(t.as_str())),
            Command::ERROR(m) => (name("ERROR"), vec![], Some(m.as_str())),
            Command::AWAY(m) => (name("AWAY"), vec![], m.as_deref()),
            Command::WHO(m, o) => (name("WHO"), m.iter().chain(o.iter()).map(|s| s.as_str()).collect(), None),
            Command::ISON(n) => (name("ISON"), list(n), None),
            Command::MONITOR(c, t) => {
                (name("MONITOR"), std::iter::once(c.as_str()).chain(t.as_deref()).collect(), None)
            }
            Command::CAP(t, s, a, p) => {
                let mut args: Vec<&str> = t.iter().map(|s| s.as_str()).collect();
                args.push(s.to_str());
                args.extend(a.as_deref());
                (name("CAP"), args, p.as_deref())
            }
            Command::AUTHENTICATE(d) => (name("AUTHENTICATE"), vec![d.as_str()], None),
            Command::ACCOUNT(a) => (name("ACCOUNT"), vec![a.as_str()], None),
            Command::CHGHOST(u, h) => (name("CHGHOST"), vec![u.as_str(), h.as_str()], None),
            Command::SETNAME(r) => (name("SETNAME"), vec![], Some(r.as_str())),
            Command::Response(r, a) => (r.code(), list(a), None),
            Command::Raw(c, a) => (c.clone(), list(a), None),
        }
    }
}

fn needs_colon(arg: &str) -> bool {
    arg.is_empty() || arg.contains(' ') || arg.starts_with(':')
}

fn stringify(cmd: &str, args: &[&str], suffix: Option<&str>) -> String {
    let mut ret = cmd.to_owned();
    let last = args.len().saturating_sub(1);
    for (i, arg) in args.iter().enumerate() {
        ret.push(' ');
        if suffix.is_none() && i == last && needs_colon(arg) {
            ret.push(':');
        }
        ret.push_str(arg);
    }
    if let Some(suffix) = suffix {
        ret.push_str(" :");
        ret.push_str(suffix);
    }
    ret
}

impl<'a> From<&'a Command> for String {
    fn from(cmd: &'a Command) -> String {
        let (name, args, suffix) = cmd.parts();
        stringify(&name, &args, suffix)
    }
}

/// A list of all of the subcommands for the capabilities extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapSubCommand {
    /// Requests a list of the server's capabilities.
    LS,
    /// Requests a list of the server's capabilities.
    LIST,
    /// Requests specific capabilities by name.
    REQ,
    /// Acknowledges capabilities.
    ACK,
    /// Does not acknowledge certain capabilities.
    NAK,
    /// Ends the capability negotiation before registration.
    END,
    /// Signals that new capabilities are now being offered.
    NEW,
    /// Signals that the specified capabilities are cancelled and no longer available.
    DEL,
}

impl CapSubCommand {
    /// Gets the string that corresponds to this subcommand.
    pub fn to_str(&self) -> &'static str {
        match *self {
            CapSubCommand::LS => "LS",
            CapSubCommand::LIST => "LIST",
            CapSubCommand::REQ => "REQ",
            CapSubCommand::ACK => "ACK",
            CapSubCommand::NAK => "NAK",
            CapSubCommand::END => "END",
            CapSubCommand::NEW => "NEW",
            CapSubCommand::DEL => "DEL",
        }
    }
}

impl FromStr for CapSubCommand {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<CapSubCommand, Self::Err> {
        Ok(match &s.to_ascii_uppercase()[..] {
            "LS" => CapSubCommand::LS,
            "LIST" => CapSubCommand::LIST,
            "REQ" => CapSubCommand::REQ,
            "ACK" => CapSubCommand::ACK,
            "NAK" => CapSubCommand::NAK,
            "END" => CapSubCommand::END,
            "NEW" => CapSubCommand::NEW,
            "DEL" => CapSubCommand::DEL,
            _ => {
                return Err(MessageParseError::InvalidSubcommand {
                    cmd: "CAP",
                    sub: s.to_owned(),
                })
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::{CapSubCommand, Command};
    use crate::response::Response;

    fn wire(cmd: Command) -> String {
        String::from(&cmd)
    }

    #[test]
    fn registration_lines() {
        assert_eq!(wire(Command::NICK("alice".into())), "NICK alice");
        assert_eq!(wire(Command::PASS("secret".into())), "PASS secret");
        assert_eq!(wire(Command::PASS("with space".into())), "PASS :with space");
        assert_eq!(wire(Command::PASS(":colon".into())), "PASS ::colon");
        assert_eq!(
            wire(Command::USER("ali".into(), "0".into(), "Alice Liddell".into())),
            "USER ali 0 * :Alice Liddell"
        );
        assert_eq!(
            wire(Command::CAP(None, CapSubCommand::LS, Some("302".into()), None)),
            "CAP LS 302"
        );
        assert_eq!(
            wire(Command::CAP(None, CapSubCommand::REQ, None, Some("sasl multi-prefix".into()))),
            "CAP REQ :sasl multi-prefix"
        );
        assert_eq!(wire(Command::CAP(None, CapSubCommand::END, None, None)), "CAP END");
    }

    #[test]
    fn channel_lines() {
        assert_eq!(wire(Command::JOIN("#a,#b".into(), None, None)), "JOIN #a,#b");
        assert_eq!(
            wire(Command::JOIN("#a,#b".into(), Some("key".into()), None)),
            "JOIN #a,#b key"
        );
        assert_eq!(
            wire(Command::PART("#a".into(), Some("bye now".into()))),
            "PART #a :bye now"
        );
        assert_eq!(
            wire(Command::MODE("#a".into(), vec!["+oo".into(), "x".into(), "y".into()])),
            "MODE #a +oo x y"
        );
        assert_eq!(wire(Command::PONG("irc.example.org".into(), None)), "PONG :irc.example.org");
        assert_eq!(wire(Command::QUIT(None)), "QUIT");
    }

    #[test]
    fn parse_known_commands() {
        assert_eq!(
            Command::new("join", vec!["#a", "acct", "Real Name"]).unwrap(),
            Command::JOIN("#a".into(), Some("acct".into()), Some("Real Name".into()))
        );
        assert_eq!(
            Command::new("KICK", vec!["#a", "bob"]).unwrap(),
            Command::KICK("#a".into(), "bob".into(), None)
        );
        assert_eq!(
            Command::new("PRIVMSG", vec!["#a"]).unwrap(),
            Command::Raw("PRIVMSG".into(), vec!["#a".into()])
        );
    }

    #[test]
    fn parse_numerics() {
        assert_eq!(
            Command::new("001", vec!["alice", "Welcome"]).unwrap(),
            Command::Response(Response::RPL_WELCOME, vec!["alice".into(), "Welcome".into()])
        );
        assert_eq!(
            Command::new("999", vec!["x"]).unwrap(),
            Command::Raw("999".into(), vec!["x".into()])
        );
    }

    #[test]
    fn parse_cap() {
        assert_eq!(
            Command::new("CAP", vec!["*", "LS", "*", "sasl multi-prefix"]).unwrap(),
            Command::CAP(
                Some("*".into()),
                CapSubCommand::LS,
                Some("*".into()),
                Some("sasl multi-prefix".into())
            )
        );
        assert_eq!(
            Command::new("CAP", vec!["alice", "ACK", "sasl"]).unwrap(),
            Command::CAP(Some("alice".into()), CapSubCommand::ACK, None, Some("sasl".into()))
        );
        assert!(Command::new("CAP", vec!["alice", "FOO"]).is_err());
    }

    #[test]
    fn params_and_name() {
        let cmd = Command::new("324", vec!["alice", "#a", "+nt"]).unwrap();
        assert_eq!(cmd.name(), "324");
        assert_eq!(cmd.params(), vec!["alice", "#a", "+nt"]);
        let cmd = Command::PRIVMSG("#a".into(), "hi there".into());
        assert_eq!(cmd.params(), vec!["#a", "hi there"]);
    }
}
