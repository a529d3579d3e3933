//! A module providing a data structure for messages to and from IRC servers.
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::chan::ChannelExt;
use crate::command::Command;
use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

/// A data structure representing an IRC message according to the protocol specification. It
/// consists of a collection of IRCv3 tags, a prefix (describing the source of the message), and
/// the protocol command. If the command is unknown, it is treated as a special raw command that
/// consists of a collection of arguments.
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    /// Message tags as defined by [IRCv3.2](http://ircv3.net/specs/core/message-tags-3.2.html).
    pub tags: Option<Vec<Tag>>,
    /// The message prefix (or source) as defined by [RFC 2812](http://tools.ietf.org/html/rfc2812).
    pub prefix: Option<Prefix>,
    /// The IRC command, parsed according to the known specifications.
    pub command: Command,
}

impl Message {
    /// Creates a new message from the given components.
    ///
    /// # Example
    /// ```
    /// # use irc_proto::Message;
    /// let message = Message::new(
    ///     Some("nickname!username@hostname"), "JOIN", vec!["#channel"]
    /// ).unwrap();
    /// assert_eq!(message.to_string(), ":nickname!username@hostname JOIN #channel");
    /// ```
    pub fn new(
        prefix: Option<&str>,
        command: &str,
        args: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        Message::with_tags(None, prefix, command, args)
    }

    /// Creates a new IRCv3.2 message from the given components, including tags.
    pub fn with_tags(
        tags: Option<Vec<Tag>>,
        prefix: Option<&str>,
        command: &str,
        args: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        Ok(Message {
            tags,
            prefix: prefix.map(|s| s.into()),
            command: Command::new(command, args)?,
        })
    }

    /// Gets the nickname of the message source, if it exists.
    ///
    /// # Example
    /// ```
    /// # use irc_proto::Message;
    /// let message = Message::new(
    ///     Some("nickname!username@hostname"), "JOIN", vec!["#channel"]
    /// ).unwrap();
    /// assert_eq!(message.source_nickname(), Some("nickname"));
    /// ```
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(|p| p.nickname())
    }

    /// Gets the `user@host` of the message source, if it has one.
    pub fn source_host(&self) -> Option<String> {
        self.prefix.as_ref().and_then(|p| p.user_host())
    }

    /// Gets the likely intended place to respond to this message.
    /// If the type of the message is a `PRIVMSG` or `NOTICE` and the message is sent to a channel,
    /// the result will be that channel. In all other cases, this will call `source_nickname`.
    ///
    /// # Example
    /// ```
    /// # use irc_proto::Message;
    /// let msg1 = Message::new(Some("ada"), "PRIVMSG", vec!["#channel", "Hi, everyone!"]).unwrap();
    /// assert_eq!(msg1.response_target(), Some("#channel"));
    /// let msg2 = Message::new(Some("ada"), "PRIVMSG", vec!["betsy", "betsy: hi"]).unwrap();
    /// assert_eq!(msg2.response_target(), Some("ada"));
    /// ```
    pub fn response_target(&self) -> Option<&str> {
        match self.command {
            Command::PRIVMSG(ref target, _) if target.is_channel_name() => Some(target),
            Command::NOTICE(ref target, _) if target.is_channel_name() => Some(target),
            _ => self.source_nickname(),
        }
    }

    /// Looks up the value of a message tag. Tags without a value yield `Some("")`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()
            .and_then(|tags| tags.iter().find(|t| t.0 == key))
            .map(|t| t.1.as_deref().unwrap_or(""))
    }
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Message {
        Message {
            tags: None,
            prefix: None,
            command: cmd,
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let invalid = |cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        };

        if s.trim_end_matches(|c| c == '\r' || c == '\n').is_empty() {
            return Err(invalid(MessageParseError::EmptyMessage));
        }

        let mut state = s;

        let tags = if state.starts_with('@') {
            let tags = state.find(' ').map(|i| &state[1..i]);
            state = state.find(' ').map_or("", |i| &state[i + 1..]);
            tags.map(|ts| {
                ts.split(';')
                    .filter(|s| !s.is_empty())
                    .map(|s: &str| {
                        let mut iter = s.splitn(2, '=');
                        let (fst, snd) = (iter.next(), iter.next());
                        Tag(fst.unwrap_or("").to_owned(), snd.map(unescape_tag_value))
                    })
                    .collect::<Vec<_>>()
            })
        } else {
            None
        };

        let prefix = if state.starts_with(':') {
            let prefix = state.find(' ').map(|i| &state[1..i]);
            state = state.find(' ').map_or("", |i| &state[i + 1..]);
            prefix
        } else {
            None
        };

        let line_ending_len = if state.ends_with("\r\n") {
            "\r\n"
        } else if state.ends_with('\r') {
            "\r"
        } else if state.ends_with('\n') {
            "\n"
        } else {
            ""
        }
        .len();

        let suffix = if state.contains(" :") {
            let suffix = state
                .find(" :")
                .map(|i| &state[i + 2..state.len() - line_ending_len]);
            state = state.find(" :").map_or("", |i| &state[..i + 1]);
            suffix
        } else {
            state = &state[..state.len() - line_ending_len];
            None
        };

        let command = match state.find(' ').map(|i| &state[..i]) {
            Some(cmd) => {
                state = state.find(' ').map_or("", |i| &state[i + 1..]);
                cmd
            }
            // If there's no arguments but the "command" starts with colon, it's not a command.
            None if state.starts_with(':') => return Err(invalid(MessageParseError::InvalidCommand)),
            // If there's no arguments following the command, the rest of the state is the command.
            None => {
                let cmd = state;
                state = "";
                cmd
            }
        };

        let mut args: Vec<_> = state.split(' ').filter(|s| !s.is_empty()).collect();
        args.extend(suffix);

        Message::with_tags(tags, prefix, command, args).map_err(invalid)
    }
}

/// Serialises the message without its line terminator.
impl Display for Message {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if let Some(ref tags) = self.tags {
            f.write_str("@")?;
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(&tag.0)?;
                if let Some(ref value) = tag.1 {
                    write!(f, "={}", escape_tag_value(value))?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&String::from(&self.command))
    }
}

/// A message tag as defined by [IRCv3.2](http://ircv3.net/specs/core/message-tags-3.2.html).
/// It consists of a tag key, and an optional value for the tag. Each message can contain a number
/// of tags (in the string format, they are separated by semicolons).
#[derive(Clone, PartialEq, Debug)]
pub struct Tag(pub String, pub Option<String>);

fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match iter.next() {
            Some(':') => unescaped.push(';'),
            Some('s') => unescaped.push(' '),
            Some('r') => unescaped.push('\r'),
            Some('n') => unescaped.push('\n'),
            Some(other) => unescaped.push(other),
            None => {}
        }
    }
    unescaped
}

fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => escaped.push_str("\\:"),
            ' ' => escaped.push_str("\\s"),
            '\\' => escaped.push_str("\\\\"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod test {
    use super::{Message, Tag};
    use crate::command::Command::{PRIVMSG, QUIT, Raw};
    use crate::prefix::Prefix;

    #[test]
    fn new() {
        let message = Message {
            tags: None,
            prefix: None,
            command: PRIVMSG(format!("test"), format!("Testing!")),
        };
        assert_eq!(
            Message::new(None, "PRIVMSG", vec!["test", "Testing!"]).unwrap(),
            message
        )
    }

    #[test]
    fn source_nickname() {
        let source = |prefix| {
            Message::new(prefix, "PING", vec!["data"])
                .unwrap()
                .source_nickname()
                .map(|s| s.to_owned())
        };
        assert_eq!(source(None), None);
        assert_eq!(source(Some("irc.test.net")), None);
        assert_eq!(source(Some("test!test@test")), Some("test".into()));
        assert_eq!(source(Some("test@test")), Some("test".into()));
        assert_eq!(source(Some("test!test@irc.test.com")), Some("test".into()));
        assert_eq!(source(Some("test@test.com")), Some("test".into()));
        assert_eq!(source(Some("test")), Some("test".into()));
    }

    #[test]
    fn to_string() {
        let message = Message {
            tags: None,
            prefix: Some(Prefix::new_from_str("test!test@test")),
            command: PRIVMSG(format!("test"), format!("Still testing!")),
        };
        assert_eq!(
            message.to_string(),
            ":test!test@test PRIVMSG test :Still testing!"
        );
    }

    #[test]
    fn from_string() {
        let message = Message {
            tags: Some(vec![
                Tag(format!("aaa"), Some(format!("bbb"))),
                Tag(format!("ccc"), None),
                Tag(format!("example.com/ddd"), Some(format!("eee"))),
            ]),
            prefix: Some(Prefix::new_from_str("test!test@test")),
            command: PRIVMSG(format!("test"), format!("Testing with tags!")),
        };
        assert_eq!(
            "@aaa=bbb;ccc;example.com/ddd=eee :test!test@test PRIVMSG test :Testing with \
             tags!\r\n"
                .parse::<Message>()
                .unwrap(),
            message
        )
    }

    #[test]
    fn from_string_atypical_endings() {
        let message = Message {
            tags: None,
            prefix: None,
            command: PRIVMSG(format!("test"), format!("Testing!")),
        };
        assert_eq!("PRIVMSG test :Testing!\r".parse::<Message>().unwrap(), message);
        assert_eq!("PRIVMSG test :Testing!\n".parse::<Message>().unwrap(), message);
        assert_eq!("PRIVMSG test :Testing!".parse::<Message>().unwrap(), message);
    }

    #[test]
    fn from_and_to_string() {
        let message = "@aaa=bbb;ccc;example.com/ddd=eee :test!test@test PRIVMSG test :Testing with \
                       tags!";
        assert_eq!(message.parse::<Message>().unwrap().to_string(), message);
    }

    #[test]
    fn escaped_tag_values() {
        let msg = "@label=a\\sb\\:c :nick!u@h PRIVMSG #c :x"
            .parse::<Message>()
            .unwrap();
        assert_eq!(msg.tag("label"), Some("a b;c"));
        assert_eq!(msg.tag("missing"), None);
        assert_eq!(msg.to_string(), "@label=a\\sb\\:c :nick!u@h PRIVMSG #c :x");
    }

    #[test]
    fn to_message_with_colon_in_arg() {
        // Some servers send colons within individual middle parameters.
        let message = Message {
            tags: None,
            prefix: Some(Prefix::new_from_str("test!test@test")),
            command: Raw(
                format!("COMMAND"),
                vec![format!("ARG:test"), format!("Testing!")],
            ),
        };
        let msg: Message = ":test!test@test COMMAND ARG:test :Testing!\r\n".parse().unwrap();
        assert_eq!(msg, message);
    }

    #[test]
    fn to_message_no_prefix_no_args() {
        let message = Message {
            tags: None,
            prefix: None,
            command: QUIT(None),
        };
        let msg: Message = "QUIT\r\n".parse().unwrap();
        assert_eq!(msg, message);
    }

    #[test]
    fn invalid_messages() {
        assert!(":invalid :message".parse::<Message>().is_err());
        assert!("".parse::<Message>().is_err());
        assert!("\r\n".parse::<Message>().is_err());
    }

    #[test]
    fn response_target() {
        let msg: Message = ":ada!a@b NOTICE #chan :hello".parse().unwrap();
        assert_eq!(msg.response_target(), Some("#chan"));
        let msg: Message = ":ada!a@b NOTICE bob :hello".parse().unwrap();
        assert_eq!(msg.response_target(), Some("ada"));
        assert_eq!(msg.source_host().as_deref(), Some("a@b"));
    }
}
