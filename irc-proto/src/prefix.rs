//! A module providing an enum for a message prefix.
use std::fmt;
use std::str::FromStr;

/// The Prefix indicates "the true origin of the message", according to the server.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Prefix {
    /// servername, e.g. irc.libera.chat
    ServerName(String),
    /// nickname [ ["!" username] "@" hostname ], i.e. Nickname(nickname, username, hostname).
    /// Any of the strings may be empty.
    Nickname(String, String, String),
}

impl Prefix {
    /// Creates a prefix by parsing a string.
    ///
    /// # Example
    /// ```
    /// # use irc_proto::Prefix;
    /// assert_eq!(
    ///     Prefix::new_from_str("alice!ali@example.org"),
    ///     Prefix::Nickname("alice".into(), "ali".into(), "example.org".into())
    /// );
    /// assert_eq!(Prefix::new_from_str("irc.example.org"), Prefix::ServerName("irc.example.org".into()));
    /// ```
    pub fn new_from_str(s: &str) -> Prefix {
        let at = s.find('@');
        let bang = s.find('!').filter(|&i| at.map_or(true, |at| i < at));
        match (bang, at) {
            (None, None) if s.contains('.') => Prefix::ServerName(s.to_owned()),
            (None, None) => Prefix::Nickname(s.to_owned(), String::new(), String::new()),
            (Some(b), None) => Prefix::Nickname(s[..b].to_owned(), s[b + 1..].to_owned(), String::new()),
            (None, Some(a)) => Prefix::Nickname(s[..a].to_owned(), String::new(), s[a + 1..].to_owned()),
            (Some(b), Some(a)) => Prefix::Nickname(
                s[..b].to_owned(),
                s[b + 1..a].to_owned(),
                s[a + 1..].to_owned(),
            ),
        }
    }

    /// The nickname, or `None` for a server prefix.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }

    /// The `user@host` part of a nickname prefix, if it has one.
    pub fn user_host(&self) -> Option<String> {
        match self {
            Prefix::Nickname(_, user, host) if !user.is_empty() && !host.is_empty() => {
                Some(format!("{}@{}", user, host))
            }
            Prefix::Nickname(_, user, _) if !user.is_empty() => Some(user.clone()),
            Prefix::Nickname(_, _, host) if !host.is_empty() => Some(host.clone()),
            _ => None,
        }
    }
}

/// This implementation never returns an error and is isomorphic with `Display`.
impl FromStr for Prefix {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Prefix::new_from_str(s))
    }
}

/// This is isomorphic with `FromStr`.
impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(name, user, host) => {
                f.write_str(name)?;
                if !user.is_empty() {
                    write!(f, "!{}", user)?;
                }
                if !host.is_empty() {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}

impl<'a> From<&'a str> for Prefix {
    fn from(s: &str) -> Self {
        Prefix::new_from_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::Prefix::{self, Nickname, ServerName};

    // Checks that str -> parsed -> Display doesn't lose data
    fn test_parse(s: &str) -> Prefix {
        let prefix = Prefix::new_from_str(s);
        assert_eq!(s, prefix.to_string());
        prefix
    }

    #[test]
    fn parse_servername() {
        assert_eq!(test_parse("irc.example.org"), ServerName("irc.example.org".into()));
    }

    #[test]
    fn parse_nickname() {
        assert_eq!(test_parse("alice"), Nickname("alice".into(), "".into(), "".into()));
        assert_eq!(test_parse("alice!ali"), Nickname("alice".into(), "ali".into(), "".into()));
        assert_eq!(
            test_parse("alice@example.org"),
            Nickname("alice".into(), "".into(), "example.org".into())
        );
        assert_eq!(
            test_parse("alice!ali@example.org"),
            Nickname("alice".into(), "ali".into(), "example.org".into())
        );
    }

    #[test]
    fn parse_bang_in_host() {
        assert_eq!(
            test_parse("alice@weird!host"),
            Nickname("alice".into(), "".into(), "weird!host".into())
        );
    }

    #[test]
    fn accessors() {
        let prefix = Prefix::new_from_str("alice!ali@example.org");
        assert_eq!(prefix.nickname(), Some("alice"));
        assert_eq!(prefix.user_host().as_deref(), Some("ali@example.org"));
        let server = Prefix::new_from_str("irc.example.org");
        assert_eq!(server.nickname(), None);
        assert_eq!(server.user_host(), None);
    }
}
