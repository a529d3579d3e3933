//! A module defining an API for IRC channel and user mode changes.
use std::fmt;

/// The four channel mode classes of `CHANMODES`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanModeType {
    /// Modes that add or remove an address to or from a list (ban, exception, ...).
    A,
    /// Modes that change a setting and always have a parameter (key, prefix modes).
    B,
    /// Modes that change a setting and only have a parameter when set (limit).
    C,
    /// Modes that change a setting and never have a parameter.
    D,
}

impl ChanModeType {
    /// Classifies `mode` given a `CHANMODES` value. Unknown letters are type D.
    pub fn classify(chanmodes: &str, mode: char) -> ChanModeType {
        let types = [ChanModeType::A, ChanModeType::B, ChanModeType::C];
        chanmodes
            .split(',')
            .zip(types.iter())
            .find(|(group, _)| group.contains(mode))
            .map_or(ChanModeType::D, |(_, ty)| *ty)
    }

    /// Returns true if a mode of this class consumes an argument when set (`set`) or unset.
    pub fn takes_arg(self, set: bool) -> bool {
        match self {
            ChanModeType::A | ChanModeType::B => true,
            ChanModeType::C => set,
            ChanModeType::D => false,
        }
    }
}

/// A single mode change, with its argument when the mode takes one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Setting a mode: `+X [arg]`.
    Plus(char, Option<String>),
    /// Unsetting a mode: `-X [arg]`.
    Minus(char, Option<String>),
}

impl Mode {
    /// Parses a channel mode string and its arguments, consuming an argument for each mode the
    /// classifier says takes one. A space inside `modes` ends the mode letters; modes missing
    /// their argument get `None`.
    ///
    /// # Example
    /// ```
    /// # use irc_proto::{ChanModeType, Mode};
    /// let chanmodes = "beI,k,l,imnpst";
    /// let modes = Mode::parse_channel("+lk-b", &["10", "secret", "*!*@spam"], |c| {
    ///     if "ov".contains(c) { ChanModeType::B } else { ChanModeType::classify(chanmodes, c) }
    /// });
    /// assert_eq!(modes, vec![
    ///     Mode::Plus('l', Some("10".to_owned())),
    ///     Mode::Plus('k', Some("secret".to_owned())),
    ///     Mode::Minus('b', Some("*!*@spam".to_owned())),
    /// ]);
    /// ```
    pub fn parse_channel<S, F>(modes: &str, args: &[S], classify: F) -> Vec<Mode>
    where
        S: AsRef<str>,
        F: Fn(char) -> ChanModeType,
    {
        let mut set = true;
        let mut args = args.iter().map(|a| a.as_ref().to_owned());
        let mut result = Vec::new();
        for c in modes.chars() {
            match c {
                ' ' => break,
                '+' => set = true,
                '-' => set = false,
                _ => {
                    let arg = if classify(c).takes_arg(set) {
                        args.next()
                    } else {
                        None
                    };
                    result.push(if set { Mode::Plus(c, arg) } else { Mode::Minus(c, arg) });
                }
            }
        }
        result
    }

    /// Parses a user mode string, in which no mode takes an argument.
    pub fn parse_user(modes: &str) -> Vec<Mode> {
        Mode::parse_channel::<&str, _>(modes, &[], |_| ChanModeType::D)
    }

    /// The mode letter.
    pub fn letter(&self) -> char {
        match *self {
            Mode::Plus(c, _) | Mode::Minus(c, _) => c,
        }
    }

    /// True for `+X`.
    pub fn is_set(&self) -> bool {
        matches!(self, Mode::Plus(..))
    }

    /// The argument of this change, if any.
    pub fn arg(&self) -> Option<&str> {
        match self {
            Mode::Plus(_, arg) | Mode::Minus(_, arg) => arg.as_deref(),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign = if self.is_set() { '+' } else { '-' };
        match self.arg() {
            Some(arg) => write!(f, "{}{} {}", sign, self.letter(), arg),
            None => write!(f, "{}{}", sign, self.letter()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ChanModeType, Mode};

    const CHANMODES: &str = "beIq,k,l,imnpst";

    fn classify(c: char) -> ChanModeType {
        if "ohv".contains(c) {
            ChanModeType::B
        } else {
            ChanModeType::classify(CHANMODES, c)
        }
    }

    #[test]
    fn classify_groups() {
        assert_eq!(ChanModeType::classify(CHANMODES, 'I'), ChanModeType::A);
        assert_eq!(ChanModeType::classify(CHANMODES, 'k'), ChanModeType::B);
        assert_eq!(ChanModeType::classify(CHANMODES, 'l'), ChanModeType::C);
        assert_eq!(ChanModeType::classify(CHANMODES, 't'), ChanModeType::D);
        assert_eq!(ChanModeType::classify(CHANMODES, 'Z'), ChanModeType::D);
        assert_eq!(ChanModeType::classify("b", 'k'), ChanModeType::D);
    }

    #[test]
    fn parse_with_arguments() {
        let modes = Mode::parse_channel("+ov-l+b", &["alice", "bob", "*!*@host"], classify);
        assert_eq!(
            modes,
            vec![
                Mode::Plus('o', Some("alice".into())),
                Mode::Plus('v', Some("bob".into())),
                Mode::Minus('l', None),
                Mode::Plus('b', Some("*!*@host".into())),
            ]
        );
    }

    #[test]
    fn parse_stops_at_space() {
        let modes = Mode::parse_channel("+nt k", &["key"], classify);
        assert_eq!(modes, vec![Mode::Plus('n', None), Mode::Plus('t', None)]);
    }

    #[test]
    fn parse_missing_argument() {
        let modes = Mode::parse_channel("+kl", &["secret"], classify);
        assert_eq!(
            modes,
            vec![Mode::Plus('k', Some("secret".into())), Mode::Plus('l', None)]
        );
    }

    #[test]
    fn parse_without_sign() {
        assert_eq!(Mode::parse_user("i"), vec![Mode::Plus('i', None)]);
        assert_eq!(
            Mode::parse_user("+i-w"),
            vec![Mode::Plus('i', None), Mode::Minus('w', None)]
        );
    }

    #[test]
    fn display() {
        assert_eq!(Mode::Plus('o', Some("alice".into())).to_string(), "+o alice");
        assert_eq!(Mode::Minus('m', None).to_string(), "-m");
    }
}
