//! Nicks of a channel and their prefix modes.
use crate::proto::{ISupport, Prefix};

/// The prefix modes of a server, from `PREFIX=(ov)@+`, highest first.
#[derive(Clone, Debug, PartialEq)]
pub struct PrefixTable {
    modes: Vec<char>,
    chars: Vec<char>,
}

impl Default for PrefixTable {
    fn default() -> PrefixTable {
        PrefixTable::new("ov", "@+")
    }
}

impl PrefixTable {
    /// Builds a table from mode letters and their prefix characters.
    pub fn new(modes: &str, chars: &str) -> PrefixTable {
        PrefixTable {
            modes: modes.chars().collect(),
            chars: chars.chars().collect(),
        }
    }

    /// Builds the table a server advertises.
    pub fn from_isupport(isupport: &ISupport) -> PrefixTable {
        let (modes, chars) = isupport.prefix();
        PrefixTable::new(&modes, &chars)
    }

    /// The mode letters, highest first.
    pub fn modes(&self) -> String {
        self.modes.iter().collect()
    }

    /// The prefix characters, highest first.
    pub fn chars(&self) -> String {
        self.chars.iter().collect()
    }

    /// Rank of a mode letter.
    pub fn mode_index(&self, mode: char) -> Option<usize> {
        self.modes.iter().position(|&m| m == mode)
    }

    /// Rank of a prefix character.
    pub fn char_index(&self, c: char) -> Option<usize> {
        self.chars.iter().position(|&p| p == c)
    }

    /// The prefix character of a mode letter.
    pub fn char_for_mode(&self, mode: char) -> Option<char> {
        self.mode_index(mode).and_then(|i| self.chars.get(i).copied())
    }

    /// The mode letter of a prefix character.
    pub fn mode_for_char(&self, c: char) -> Option<char> {
        self.char_index(c).and_then(|i| self.modes.get(i).copied())
    }

    /// The number of prefix modes.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Whether there are no prefix modes.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Splits a `NAMES` entry like `@+alice!al@host` into its prefixes and the rest.
    pub fn strip<'a>(&self, entry: &'a str) -> (&'a str, &'a str) {
        let end = entry
            .char_indices()
            .find(|(_, c)| self.char_index(*c).is_none())
            .map_or(entry.len(), |(i, _)| i);
        entry.split_at(end)
    }
}

/// A nick in a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Nick {
    /// The nickname.
    pub name: String,
    /// `user@host`, when known.
    pub host: Option<String>,
    /// One slot per prefix mode, holding the prefix character or a space.
    pub prefixes: String,
    /// Whether the nick is away.
    pub away: bool,
    /// The account name (`*` for none), when known.
    pub account: Option<String>,
    /// The real name, when known.
    pub realname: Option<String>,
}

impl Nick {
    /// Creates a nick with the prefix characters in `prefixes` set.
    pub fn new(name: &str, host: Option<&str>, prefixes: &str, table: &PrefixTable) -> Nick {
        let mut nick = Nick {
            name: name.to_owned(),
            host: host.map(|h| h.to_owned()),
            prefixes: " ".repeat(table.len()),
            away: false,
            account: None,
            realname: None,
        };
        nick.set_prefixes(prefixes, table);
        nick
    }

    /// Builds a nick from a `NAMES` entry, with `userhost-in-names` hosts.
    pub fn from_names_entry(entry: &str, table: &PrefixTable) -> Option<Nick> {
        let (prefixes, rest) = table.strip(entry);
        let (name, host) = match Prefix::new_from_str(rest) {
            Prefix::Nickname(name, _, _) if name.is_empty() => return None,
            prefix @ Prefix::Nickname(..) => {
                let host = prefix.user_host();
                (prefix.nickname().unwrap_or_default().to_owned(), host)
            }
            Prefix::ServerName(name) => (name, None),
        };
        Some(Nick::new(&name, host.as_deref(), prefixes, table))
    }

    /// Replaces the prefixes with the characters in `prefixes`.
    pub fn set_prefixes(&mut self, prefixes: &str, table: &PrefixTable) {
        let mut slots: Vec<char> = vec![' '; table.len()];
        for c in prefixes.chars() {
            if let Some(i) = table.char_index(c) {
                slots[i] = c;
            }
        }
        self.prefixes = slots.into_iter().collect();
    }

    /// Sets or clears the prefix of a mode letter.
    pub fn set_mode(&mut self, set: bool, mode: char, table: &PrefixTable) {
        let (index, c) = match (table.mode_index(mode), table.char_for_mode(mode)) {
            (Some(i), Some(c)) => (i, c),
            _ => return,
        };
        let mut slots: Vec<char> = self.prefixes.chars().collect();
        slots.resize(table.len(), ' ');
        slots[index] = if set { c } else { ' ' };
        self.prefixes = slots.into_iter().collect();
    }

    /// Whether the nick has the prefix of a mode letter.
    pub fn has_mode(&self, mode: char, table: &PrefixTable) -> bool {
        table
            .char_for_mode(mode)
            .map_or(false, |c| self.prefixes.contains(c))
    }

    /// The highest prefix, or a space.
    pub fn prefix(&self) -> char {
        self.prefixes.chars().find(|&c| c != ' ').unwrap_or(' ')
    }

    /// The nicklist group of this nick: `000|o` for the highest prefix mode, `999|...` for none.
    pub fn group(&self, table: &PrefixTable) -> String {
        match self.prefixes.chars().position(|c| c != ' ') {
            Some(i) => format!("{:03}|{}", i, table.modes.get(i).copied().unwrap_or(' ')),
            None => OTHER_GROUP.to_owned(),
        }
    }
}

/// Nicklist group for nicks without any prefix.
pub const OTHER_GROUP: &str = "999|...";

/// Whether `s` can be a nickname.
pub fn is_nick(s: &str, nicklen: Option<usize>) -> bool {
    let first = match s.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if first.is_ascii_digit() || first == '-' || "#&+!".contains(first) {
        return false;
    }
    if let Some(max) = nicklen {
        if s.chars().count() > max {
            return false;
        }
    }
    !s.chars().any(|c| " ,*?!@:".contains(c) || c.is_control())
}

#[cfg(test)]
mod test {
    use super::{is_nick, Nick, PrefixTable, OTHER_GROUP};

    fn table() -> PrefixTable {
        PrefixTable::new("qaohv", "~&@%+")
    }

    #[test]
    fn prefixes_follow_rank() {
        let table = table();
        let mut nick = Nick::new("alice", None, "+@", &table);
        assert_eq!(nick.prefixes, "  @ +");
        assert_eq!(nick.prefix(), '@');
        assert_eq!(nick.group(&table), "002|o");
        nick.set_mode(false, 'o', &table);
        assert_eq!(nick.prefix(), '+');
        nick.set_mode(true, 'q', &table);
        assert_eq!(nick.prefix(), '~');
        assert!(nick.has_mode('v', &table));
        nick.set_mode(false, 'q', &table);
        nick.set_mode(false, 'v', &table);
        assert_eq!(nick.prefix(), ' ');
        assert_eq!(nick.group(&table), OTHER_GROUP);
    }

    #[test]
    fn names_entries() {
        let table = table();
        let nick = Nick::from_names_entry("@+bob!b@example.org", &table).unwrap();
        assert_eq!(nick.name, "bob");
        assert_eq!(nick.host.as_deref(), Some("b@example.org"));
        assert_eq!(nick.prefix(), '@');
        let plain = Nick::from_names_entry("carol", &table).unwrap();
        assert_eq!(plain.prefixes, "     ");
        assert!(Nick::from_names_entry("@", &table).is_none());
    }

    #[test]
    fn unknown_modes_are_ignored() {
        let table = PrefixTable::default();
        let mut nick = Nick::new("dave", None, "", &table);
        nick.set_mode(true, 'h', &table);
        assert_eq!(nick.prefixes, "  ");
    }

    #[test]
    fn nick_validity() {
        assert!(is_nick("alice", None));
        assert!(is_nick("[bot]^", None));
        assert!(!is_nick("", None));
        assert!(!is_nick("1abc", None));
        assert!(!is_nick("#chan", None));
        assert!(!is_nick("a b", None));
        assert!(!is_nick("toolongnick", Some(9)));
    }
}
