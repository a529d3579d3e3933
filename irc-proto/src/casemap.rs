//! Server-declared casemapping rules used to compare nicknames and channel names.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The `CASEMAPPING` rule a server advertises in `RPL_ISUPPORT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaseMapping {
    /// `rfc1459`: `A-Z[\]^` are the upper case forms of `a-z{|}~`.
    Rfc1459,
    /// `strict-rfc1459`: `A-Z[\]` are the upper case forms of `a-z{|}`.
    StrictRfc1459,
    /// `ascii`: only `A-Z` fold to `a-z`.
    Ascii,
}

impl Default for CaseMapping {
    fn default() -> CaseMapping {
        CaseMapping::Rfc1459
    }
}

impl CaseMapping {
    /// How many characters, starting at `A`, fold to lower case under this rule.
    fn range(self) -> u8 {
        match self {
            CaseMapping::Rfc1459 => 30,
            CaseMapping::StrictRfc1459 => 29,
            CaseMapping::Ascii => 26,
        }
    }

    fn fold(self, c: char) -> char {
        let range = self.range();
        if c.is_ascii() && (c as u8) >= b'A' && (c as u8) < b'A' + range {
            ((c as u8) + 32) as char
        } else {
            c
        }
    }

    /// Lower-cases the string according to this rule.
    ///
    /// # Example
    /// ```
    /// # use irc_proto::CaseMapping;
    /// assert_eq!(CaseMapping::Rfc1459.to_lower("#CHAN[A]^"), "#chan{a}~");
    /// assert_eq!(CaseMapping::Ascii.to_lower("#CHAN[A]^"), "#chan[a]^");
    /// ```
    pub fn to_lower(self, s: &str) -> String {
        s.chars().map(|c| self.fold(c)).collect()
    }

    /// Compares two names, ignoring case under this rule.
    pub fn cmp(self, a: &str, b: &str) -> Ordering {
        a.chars().map(|c| self.fold(c)).cmp(b.chars().map(|c| self.fold(c)))
    }

    /// Returns true if both names are equal under this rule.
    pub fn eq(self, a: &str, b: &str) -> bool {
        self.cmp(a, b) == Ordering::Equal
    }

    /// The name used for this rule on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            CaseMapping::Rfc1459 => "rfc1459",
            CaseMapping::StrictRfc1459 => "strict-rfc1459",
            CaseMapping::Ascii => "ascii",
        }
    }
}

/// Unknown names fall back to `rfc1459`, the protocol default.
impl FromStr for CaseMapping {
    type Err = ();

    fn from_str(s: &str) -> Result<CaseMapping, ()> {
        Ok(match &s.to_ascii_lowercase()[..] {
            "ascii" => CaseMapping::Ascii,
            "strict-rfc1459" => CaseMapping::StrictRfc1459,
            _ => CaseMapping::Rfc1459,
        })
    }
}

impl fmt::Display for CaseMapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::CaseMapping::{self, *};
    use std::cmp::Ordering;

    #[test]
    fn to_lower() {
        assert_eq!(Rfc1459.to_lower("ABC[]\\^"), "abc{}|~");
        assert_eq!(StrictRfc1459.to_lower("ABC[]\\^"), "abc{}|^");
        assert_eq!(Ascii.to_lower("ABC[]\\^"), "abc[]\\^");
        assert_eq!(Rfc1459.to_lower("ÜNÏ"), "ÜnÏ");
    }

    #[test]
    fn equality() {
        assert!(Rfc1459.eq("#chan[a]^", "#CHAN{A}~"));
        assert!(!StrictRfc1459.eq("#chan^", "#chan~"));
        assert!(StrictRfc1459.eq("#chan[", "#CHAN{"));
        assert!(!Ascii.eq("#chan[", "#chan{"));
        assert!(Ascii.eq("Nick", "nICK"));
    }

    #[test]
    fn ordering() {
        assert_eq!(Rfc1459.cmp("#abc", "#ABD"), Ordering::Less);
        assert_eq!(Rfc1459.cmp("#xyz", "#DEF"), Ordering::Greater);
        assert_eq!(Rfc1459.cmp("#ab", "#abc"), Ordering::Less);
    }

    #[test]
    fn from_str() {
        assert_eq!("ascii".parse::<CaseMapping>(), Ok(Ascii));
        assert_eq!("STRICT-RFC1459".parse::<CaseMapping>(), Ok(StrictRfc1459));
        assert_eq!("rfc7613".parse::<CaseMapping>(), Ok(Rfc1459));
        assert_eq!(CaseMapping::default().to_string(), "rfc1459");
    }
}
