//! Enumeration of the server numerics a client session reacts to.
#![allow(non_camel_case_types)]
use std::str::FromStr;

macro_rules! make_response {
    ($($(#[$attr:meta])+ $variant:ident = $value:expr),+ $(,)?) => {
        /// Server numerics, as documented in [RFC 2812](http://tools.ietf.org/html/rfc2812),
        /// the [Modern docs](https://modern.ircdocs.horse/#numerics) and the IRCv3 extensions.
        /// Numerics not listed here are kept as raw commands.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Response {
            $($(#[$attr])+ $variant = $value),+
        }

        impl Response {
            /// Generates a Response from a u16.
            fn from_u16(val: u16) -> Option<Response> {
                match val {
                    $($value => Some(Response::$variant),)+
                    _ => None
                }
            }
        }
    }
}

make_response! {
    // Registration
    /// `001 <nick> :Welcome to the Internet Relay Network <nick>!<user>@<host>`
    RPL_WELCOME         =   1,
    /// `002 <nick> :Your host is <servername>, running version <ver>`
    RPL_YOURHOST        =   2,
    /// `003 <nick> :This server was created <date>`
    RPL_CREATED         =   3,
    /// `004 <nick> <servername> <version> <user modes> <channel modes>`
    RPL_MYINFO          =   4,
    /// `005 <nick> *(<feature>(=<value>)) :are supported by this server`
    RPL_ISUPPORT        =   5,
    /// `221 <nick> <user modes>`
    RPL_UMODEIS         = 221,

    // Away and user queries
    /// `301 <nick> <target> :<away message>`
    RPL_AWAY            = 301,
    /// `303 <nick> :*1<nick> *( " " <nick> )`
    RPL_ISON            = 303,
    /// `305 <nick> :You are no longer marked as being away`
    RPL_UNAWAY          = 305,
    /// `306 <nick> :You have been marked as being away`
    RPL_NOWAWAY         = 306,
    /// `311 <nick> <target> <user> <host> * :<real name>`
    RPL_WHOISUSER       = 311,
    /// `315 <nick> <mask> :End of WHO list`
    RPL_ENDOFWHO        = 315,
    /// `318 <nick> <target> :End of WHOIS list`
    RPL_ENDOFWHOIS      = 318,

    // Channels
    /// `324 <nick> <channel> <mode> <mode params>`
    RPL_CHANNELMODEIS   = 324,
    /// `329 <nick> <channel> <creation time>`
    RPL_CREATIONTIME    = 329,
    /// `331 <nick> <channel> :No topic is set`
    RPL_NOTOPIC         = 331,
    /// `332 <nick> <channel> :<topic>`
    RPL_TOPIC           = 332,
    /// `333 <nick> <channel> <setter> <time>`
    RPL_TOPICWHOTIME    = 333,
    /// `341 <nick> <target> <channel>`
    RPL_INVITING        = 341,
    /// `346 <nick> <channel> <invitemask> [<setter> <time>]`
    RPL_INVITELIST      = 346,
    /// `347 <nick> <channel> :End of channel invite list`
    RPL_ENDOFINVITELIST = 347,
    /// `348 <nick> <channel> <exceptionmask> [<setter> <time>]`
    RPL_EXCEPTLIST      = 348,
    /// `349 <nick> <channel> :End of channel exception list`
    RPL_ENDOFEXCEPTLIST = 349,
    /// `352 <nick> <channel> <user> <host> <server> <nick> <flags> :<hopcount> <real name>`
    RPL_WHOREPLY        = 352,
    /// `353 <nick> ( "=" / "*" / "@" ) <channel> :[prefix]<nick> *( " " [prefix]<nick> )`
    RPL_NAMREPLY        = 353,
    /// `354 <nick> <fields...>` (WHOX)
    RPL_WHOSPCRPL       = 354,
    /// `366 <nick> <channel> :End of NAMES list`
    RPL_ENDOFNAMES      = 366,
    /// `367 <nick> <channel> <banmask> [<setter> <time>]`
    RPL_BANLIST         = 367,
    /// `368 <nick> <channel> :End of channel ban list`
    RPL_ENDOFBANLIST    = 368,
    /// `372 <nick> :- <text>`
    RPL_MOTD            = 372,
    /// `375 <nick> :- <server> Message of the day - `
    RPL_MOTDSTART       = 375,
    /// `376 <nick> :End of MOTD command`
    RPL_ENDOFMOTD       = 376,

    // Errors
    /// `401 <nick> <target> :No such nick/channel`
    ERR_NOSUCHNICK      = 401,
    /// `403 <nick> <channel> :No such channel`
    ERR_NOSUCHCHANNEL   = 403,
    /// `422 <nick> :MOTD File is missing`
    ERR_NOMOTD          = 422,
    /// `431 <nick> :No nickname given`
    ERR_NONICKNAMEGIVEN = 431,
    /// `432 <nick> <badnick> :Erroneous nickname`
    ERR_ERRONEOUSNICKNAME = 432,
    /// `433 <nick> <badnick> :Nickname is already in use`
    ERR_NICKNAMEINUSE   = 433,
    /// `437 <nick> <nick/channel> :Nick/channel is temporarily unavailable`
    ERR_UNAVAILRESOURCE = 437,
    /// `442 <nick> <channel> :You're not on that channel`
    ERR_NOTONCHANNEL    = 442,
    /// `471 <nick> <channel> :Cannot join channel (+l)`
    ERR_CHANNELISFULL   = 471,
    /// `473 <nick> <channel> :Cannot join channel (+i)`
    ERR_INVITEONLYCHAN  = 473,
    /// `474 <nick> <channel> :Cannot join channel (+b)`
    ERR_BANNEDFROMCHAN  = 474,
    /// `475 <nick> <channel> :Cannot join channel (+k)`
    ERR_BADCHANNELKEY   = 475,
    /// `479 <nick> <channel> :Illegal channel name`
    ERR_BADCHANNAME     = 479,
    /// `482 <nick> <channel> :You're not channel operator`
    ERR_CHANOPRIVSNEEDED = 482,
    /// `501 <nick> :Unknown MODE flag`
    ERR_UMODEUNKNOWNFLAG = 501,
    /// `502 <nick> :Cannot change mode for other users`
    ERR_USERSDONTMATCH  = 502,

    // Quiet lists
    /// `728 <nick> <channel> q <mask> [<setter> <time>]`
    RPL_QUIETLIST       = 728,
    /// `729 <nick> <channel> q :End of channel quiet list`
    RPL_ENDOFQUIETLIST  = 729,

    // MONITOR
    /// `730 <nick> :target[!user@host][,target[!user@host]]*`
    RPL_MONONLINE       = 730,
    /// `731 <nick> :target[,target2]*`
    RPL_MONOFFLINE      = 731,
    /// `732 <nick> :target[,target2]*`
    RPL_MONLIST         = 732,
    /// `733 <nick> :End of MONITOR list`
    RPL_ENDOFMONLIST    = 733,
    /// `734 <nick> <limit> <targets> :Monitor list is full.`
    ERR_MONLISTFULL     = 734,

    // SASL
    /// `900 <nick> <nick>!<ident>@<host> <account> :You are now logged in as <user>`
    RPL_LOGGEDIN        = 900,
    /// `901 <nick> <nick>!<ident>@<host> :You are now logged out`
    RPL_LOGGEDOUT       = 901,
    /// `902 <nick> :You must use a nick assigned to you`
    ERR_NICKLOCKED      = 902,
    /// `903 <nick> :SASL authentication successful`
    RPL_SASLSUCCESS     = 903,
    /// `904 <nick> :SASL authentication failed`
    ERR_SASLFAIL        = 904,
    /// `905 <nick> :SASL message too long`
    ERR_SASLTOOLONG     = 905,
    /// `906 <nick> :SASL authentication aborted`
    ERR_SASLABORT       = 906,
    /// `907 <nick> :You have already authenticated using SASL`
    ERR_SASLALREADY     = 907,
    /// `908 <nick> <mechanisms> :are available SASL mechanisms`
    RPL_SASLMECHS       = 908,
}

impl Response {
    /// Determines whether or not this response is an error response.
    ///
    /// This error consideration is according to RFC2812, but is rather simplistic. It considers
    /// all response codes above 400 to be errors, which misclassifies some extensions (for
    /// example, `RPL_SASLSUCCESS` is 903).
    pub fn is_error(&self) -> bool {
        *self as u16 >= 400
    }

    /// The three digit wire form of this numeric.
    pub fn code(&self) -> String {
        format!("{:03}", *self as u16)
    }
}

impl FromStr for Response {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Response, &'static str> {
        if let Ok(rc) = s.parse() {
            match Response::from_u16(rc) {
                Some(r) => Ok(r),
                None => Err("Failed to parse due to unknown response code."),
            }
        } else {
            Err("Failed to parse response code.")
        }
    }
}

#[cfg(test)]
mod test {
    use super::Response;

    #[test]
    fn is_error() {
        assert!(!Response::RPL_NAMREPLY.is_error());
        assert!(Response::ERR_NICKNAMEINUSE.is_error());
    }

    #[test]
    fn from_str() {
        assert_eq!("001".parse::<Response>(), Ok(Response::RPL_WELCOME));
        assert_eq!("903".parse::<Response>(), Ok(Response::RPL_SASLSUCCESS));
        assert!("999".parse::<Response>().is_err());
        assert!("PRIVMSG".parse::<Response>().is_err());
    }

    #[test]
    fn code() {
        assert_eq!(Response::RPL_WELCOME.code(), "001");
        assert_eq!(Response::RPL_BANLIST.code(), "367");
    }
}
