//! Enumeration of the IRCv3 capability extensions a session knows how to use.

/// List of IRCv3 capability extensions from the [IRCv3 specifications](http://ircv3.net/irc/)
/// that change how a session interprets the protocol once enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// [multi-prefix](http://ircv3.net/specs/extensions/multi-prefix-3.1.html)
    MultiPrefix,
    /// [sasl](http://ircv3.net/specs/extensions/sasl-3.1.html)
    Sasl,
    /// [account-notify](http://ircv3.net/specs/extensions/account-notify-3.1.html)
    AccountNotify,
    /// [away-notify](http://ircv3.net/specs/extensions/away-notify-3.1.html)
    AwayNotify,
    /// [extended-join](http://ircv3.net/specs/extensions/extended-join-3.1.html)
    ExtendedJoin,
    /// [account-tag](http://ircv3.net/specs/extensions/account-tag-3.2.html)
    AccountTag,
    /// [batch](http://ircv3.net/specs/extensions/batch-3.2.html)
    Batch,
    /// [cap-notify](http://ircv3.net/specs/extensions/cap-notify-3.2.html)
    CapNotify,
    /// [chghost](http://ircv3.net/specs/extensions/chghost-3.2.html)
    ChgHost,
    /// [echo-message](http://ircv3.net/specs/extensions/echo-message-3.2.html)
    EchoMessage,
    /// [invite-notify](http://ircv3.net/specs/extensions/invite-notify-3.2.html)
    InviteNotify,
    /// [message-tags](https://ircv3.net/specs/extensions/message-tags)
    MessageTags,
    /// [server-time](http://ircv3.net/specs/extensions/server-time-3.2.html)
    ServerTime,
    /// [setname](https://ircv3.net/specs/extensions/setname)
    Setname,
    /// [userhost-in-names](http://ircv3.net/specs/extensions/userhost-in-names-3.2.html)
    UserhostInNames,
}

/// List of IRCv3 capability negotiation versions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NegotiationVersion {
    /// [IRCv3.1](http://ircv3.net/specs/core/capability-negotiation-3.1.html)
    V301,
    /// [IRCv3.2](http://ircv3.net/specs/core/capability-negotiation-3.2.html)
    V302,
}

impl NegotiationVersion {
    /// The argument to `CAP LS` announcing this version, if any.
    pub fn ls_argument(self) -> Option<&'static str> {
        match self {
            NegotiationVersion::V301 => None,
            NegotiationVersion::V302 => Some("302"),
        }
    }
}

impl Capability {
    /// Every capability in this list, in the order a client asks for them.
    pub const ALL: [Capability; 15] = [
        Capability::AccountNotify,
        Capability::AccountTag,
        Capability::AwayNotify,
        Capability::Batch,
        Capability::CapNotify,
        Capability::ChgHost,
        Capability::EchoMessage,
        Capability::ExtendedJoin,
        Capability::InviteNotify,
        Capability::MessageTags,
        Capability::MultiPrefix,
        Capability::Sasl,
        Capability::ServerTime,
        Capability::Setname,
        Capability::UserhostInNames,
    ];

    /// Looks a capability up by the name servers advertise it with.
    pub fn from_name(name: &str) -> Option<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .find(|cap| cap.as_ref().eq_ignore_ascii_case(name))
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match *self {
            Capability::MultiPrefix => "multi-prefix",
            Capability::Sasl => "sasl",
            Capability::AccountNotify => "account-notify",
            Capability::AwayNotify => "away-notify",
            Capability::ExtendedJoin => "extended-join",
            Capability::AccountTag => "account-tag",
            Capability::Batch => "batch",
            Capability::CapNotify => "cap-notify",
            Capability::ChgHost => "chghost",
            Capability::EchoMessage => "echo-message",
            Capability::InviteNotify => "invite-notify",
            Capability::MessageTags => "message-tags",
            Capability::ServerTime => "server-time",
            Capability::Setname => "setname",
            Capability::UserhostInNames => "userhost-in-names",
        }
    }
}

#[cfg(test)]
mod test {
    use super::Capability::{self, *};
    use super::NegotiationVersion;

    #[test]
    fn to_str() {
        assert_eq!(MultiPrefix.as_ref(), "multi-prefix");
        assert_eq!(Sasl.as_ref(), "sasl");
        assert_eq!(AccountNotify.as_ref(), "account-notify");
        assert_eq!(ChgHost.as_ref(), "chghost");
        assert_eq!(EchoMessage.as_ref(), "echo-message");
        assert_eq!(UserhostInNames.as_ref(), "userhost-in-names");
    }

    #[test]
    fn from_name() {
        assert_eq!(Capability::from_name("sasl"), Some(Sasl));
        assert_eq!(Capability::from_name("SERVER-TIME"), Some(ServerTime));
        assert_eq!(Capability::from_name("draft/whatever"), None);
        for cap in Capability::ALL.iter() {
            assert_eq!(Capability::from_name(cap.as_ref()), Some(*cap));
        }
    }

    #[test]
    fn ls_argument() {
        assert_eq!(NegotiationVersion::V301.ls_argument(), None);
        assert_eq!(NegotiationVersion::V302.ls_argument(), Some("302"));
    }
}
