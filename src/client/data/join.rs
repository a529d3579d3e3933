//! Ordered `(channel, key)` lists as found in `JOIN` arguments and autojoin strings, such as
//! `#chan1,#chan2,#chan3 key1,key2`.
//!
//! Entries with a key always come before entries without one, so that keys keep matching their
//! channels by position. Channel names are compared with the server's casemapping, and a channel
//! appears at most once.
use std::cmp::Ordering;

use crate::proto::CaseMapping;

/// A channel and its optional key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinEntry {
    /// The channel name as written.
    pub name: String,
    /// The channel key.
    pub key: Option<String>,
}

impl JoinEntry {
    /// Creates an entry; an empty key counts as no key.
    pub fn new(name: &str, key: Option<&str>) -> JoinEntry {
        JoinEntry {
            name: name.to_owned(),
            key: key.filter(|k| !k.is_empty()).map(|k| k.to_owned()),
        }
    }
}

/// The order of a join list, keyed entries aside.
#[derive(Clone, Copy)]
pub enum JoinSort<'a> {
    /// Insertion order.
    Disabled,
    /// Alphabetical order under the casemapping.
    Alpha,
    /// By the number of the channel's buffer (channels without one last), then alphabetical.
    Buffer(&'a dyn Fn(&str) -> Option<i64>),
}

/// A join list being built.
pub struct JoinList<'a> {
    casemap: CaseMapping,
    sort: JoinSort<'a>,
    entries: Vec<JoinEntry>,
}

impl<'a> JoinList<'a> {
    /// Creates an empty list.
    pub fn new(casemap: CaseMapping, sort: JoinSort<'a>) -> JoinList<'a> {
        JoinList {
            casemap,
            sort,
            entries: Vec::new(),
        }
    }

    /// Parses a join string; keys are given to channels by position.
    pub fn split(casemap: CaseMapping, sort: JoinSort<'a>, join: &str) -> JoinList<'a> {
        let mut list = JoinList::new(casemap, sort);
        let mut items = join.split_whitespace();
        let channels = items.next().unwrap_or("");
        let keys: Vec<&str> = items
            .next()
            .map_or(vec![], |k| k.split(',').filter(|k| !k.is_empty()).collect());
        for (i, name) in channels.split(',').filter(|c| !c.is_empty()).enumerate() {
            list.add(JoinEntry::new(name, keys.get(i).copied()));
        }
        list
    }

    /// The entries in order.
    pub fn entries(&self) -> &[JoinEntry] {
        &self.entries
    }

    /// Turns the list into its entries.
    pub fn into_entries(self) -> Vec<JoinEntry> {
        self.entries
    }

    /// Whether a channel is in the list.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| self.casemap.eq(&e.name, name))
    }

    /// Adds an entry. An entry for the same channel with another key is dropped; one with the
    /// same key is updated in place (its name takes the new spelling).
    pub fn add(&mut self, entry: JoinEntry) {
        let casemap = self.casemap;
        let is_exact = |e: &JoinEntry| casemap.eq(&e.name, &entry.name) && e.key == entry.key;
        self.entries
            .retain(|e| !casemap.eq(&e.name, &entry.name) || is_exact(e));
        if let Some(existing) = self.entries.iter_mut().find(|e| is_exact(e)) {
            existing.name = entry.name;
            return;
        }
        let pos = self
            .entries
            .iter()
            .position(|e| self.compare(&entry, e) == Ordering::Less)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
    }

    /// Removes a channel.
    pub fn remove(&mut self, name: &str) {
        let casemap = self.casemap;
        self.entries.retain(|e| !casemap.eq(&e.name, name));
    }

    /// Formats the list as a join string.
    pub fn build(&self) -> String {
        build(&self.entries)
    }

    fn compare(&self, new: &JoinEntry, existing: &JoinEntry) -> Ordering {
        match self.sort {
            JoinSort::Disabled => {
                if self.casemap.eq(&new.name, &existing.name) {
                    Ordering::Equal
                } else if new.key.is_some() && existing.key.is_none() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            JoinSort::Alpha => keyed_first(new, existing)
                .then_with(|| self.casemap.cmp(&new.name, &existing.name)),
            JoinSort::Buffer(number) => {
                let rank = |e: &JoinEntry| number(&e.name).unwrap_or(i64::MAX);
                keyed_first(new, existing)
                    .then_with(|| rank(new).cmp(&rank(existing)))
                    .then_with(|| self.casemap.cmp(&new.name, &existing.name))
            }
        }
    }
}

fn keyed_first(a: &JoinEntry, b: &JoinEntry) -> Ordering {
    b.key.is_some().cmp(&a.key.is_some())
}

/// Formats entries as a join string.
///
/// # Example
/// ```
/// # use irc_session::client::data::join::{build, JoinEntry};
/// let entries = vec![JoinEntry::new("#a", Some("k")), JoinEntry::new("#b", None)];
/// assert_eq!(build(&entries), "#a,#b k");
/// ```
pub fn build(entries: &[JoinEntry]) -> String {
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    let keys: Vec<&str> = entries.iter().filter_map(|e| e.key.as_deref()).collect();
    if keys.is_empty() {
        names.join(",")
    } else {
        format!("{} {}", names.join(","), keys.join(","))
    }
}

/// Parses a join string into sorted entries.
pub fn split(casemap: CaseMapping, join: &str, sort: JoinSort) -> Vec<JoinEntry> {
    JoinList::split(casemap, sort, join).into_entries()
}

/// Whether `join` contains the channel.
pub fn has(casemap: CaseMapping, join: &str, name: &str) -> bool {
    JoinList::split(casemap, JoinSort::Disabled, join).contains(name)
}

/// Adds a channel (with an optional key) to `join`.
pub fn add(casemap: CaseMapping, join: &str, name: &str, key: Option<&str>) -> String {
    let mut list = JoinList::split(casemap, JoinSort::Disabled, join);
    list.add(JoinEntry::new(name, key));
    list.build()
}

/// Adds every channel of `other` to `join`.
pub fn add_channels(casemap: CaseMapping, join: &str, other: &str) -> String {
    let mut list = JoinList::split(casemap, JoinSort::Disabled, join);
    for entry in split(casemap, other, JoinSort::Disabled) {
        list.add(entry);
    }
    list.build()
}

/// Removes a channel from `join`.
pub fn remove(casemap: CaseMapping, join: &str, name: &str) -> String {
    let mut list = JoinList::split(casemap, JoinSort::Disabled, join);
    list.remove(name);
    list.build()
}

/// Renames a channel in `join`, keeping its key. If the new name is already present, the old
/// entry is removed instead.
pub fn rename(casemap: CaseMapping, join: &str, old: &str, new: &str) -> String {
    if casemap.eq(old, new) {
        return join.to_owned();
    }
    let mut entries = split(casemap, join, JoinSort::Disabled);
    let collides = entries.iter().any(|e| casemap.eq(&e.name, new));
    if collides {
        entries.retain(|e| !casemap.eq(&e.name, old));
    } else {
        for entry in entries.iter_mut().filter(|e| casemap.eq(&e.name, old)) {
            entry.name = new.to_owned();
        }
    }
    build(&entries)
}

/// Reorders `join`.
pub fn sort(casemap: CaseMapping, join: &str, sort: JoinSort) -> String {
    JoinList::split(casemap, sort, join).build()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proto::CaseMapping::Rfc1459;

    fn alpha(join: &str) -> String {
        sort(Rfc1459, join, JoinSort::Alpha)
    }

    #[test]
    fn split_build() {
        assert_eq!(sort(Rfc1459, "", JoinSort::Disabled), "");
        assert_eq!(sort(Rfc1459, "#xyz", JoinSort::Disabled), "#xyz");
        assert_eq!(sort(Rfc1459, "#xyz key_xyz,key_abc", JoinSort::Disabled), "#xyz key_xyz");
        assert_eq!(
            sort(Rfc1459, "#xyz,#abc key_xyz,key_abc", JoinSort::Disabled),
            "#xyz,#abc key_xyz,key_abc"
        );
        assert_eq!(
            sort(Rfc1459, "#xyz,#abc,#def key_xyz", JoinSort::Disabled),
            "#xyz,#abc,#def key_xyz"
        );
        assert_eq!(
            split(Rfc1459, "#a,#b k", JoinSort::Disabled),
            vec![JoinEntry::new("#a", Some("k")), JoinEntry::new("#b", None)]
        );
    }

    #[test]
    fn split_alpha() {
        assert_eq!(
            alpha("#xyz,#def,#abc,#chan[a]^,#CHAN{A}~ key_xyz"),
            "#xyz,#abc,#CHAN{A}~,#def key_xyz"
        );
        assert_eq!(
            alpha("#zzz,#xyz,#ghi,#def,#ABC key_zzz,key_xyz"),
            "#xyz,#zzz,#ABC,#def,#ghi key_xyz,key_zzz"
        );
    }

    #[test]
    fn keyed_entries_stay_first() {
        assert_eq!(add(Rfc1459, "#abc,#xyz", "#def", Some("key")), "#def,#abc,#xyz key");
        assert_eq!(add(Rfc1459, "#abc key_abc", "#xyz", Some("key_xyz")), "#abc,#xyz key_abc,key_xyz");
    }

    #[test]
    fn has_channel() {
        assert!(!has(Rfc1459, "", "#abc"));
        assert!(has(Rfc1459, "#abc,#def key1", "#ABC"));
        assert!(has(Rfc1459, "#chan[a]", "#CHAN{A}"));
        assert!(!has(Rfc1459, "#abc,#def key1", "#ghi"));
    }

    #[test]
    fn add_channel() {
        assert_eq!(add(Rfc1459, "", "#abc", None), "#abc");
        assert_eq!(
            add(Rfc1459, "#abc,#xyz,#def,#ghi key_abc,key_xyz", "#DEF", None),
            "#abc,#xyz,#DEF,#ghi key_abc,key_xyz"
        );
        assert_eq!(
            add(Rfc1459, "#abc,#xyz key_abc", "#xyz", Some("key_xyz")),
            "#abc,#xyz key_abc,key_xyz"
        );
        assert_eq!(add(Rfc1459, "#abc key_abc", "#abc", None), "#abc");
    }

    #[test]
    fn add_is_idempotent() {
        let once = add(Rfc1459, "#a,#b", "#c", Some("k"));
        let twice = add(Rfc1459, &once, "#c", Some("k"));
        assert_eq!(once, twice);
        let entries = split(Rfc1459, &twice, JoinSort::Disabled);
        let c: Vec<_> = entries.iter().filter(|e| e.name == "#c").collect();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].key.as_deref(), Some("k"));
    }

    #[test]
    fn add_many() {
        assert_eq!(
            add_channels(Rfc1459, "#abc,#xyz,#chan2 key_abc", "#chan1,#chan2,#chan3 key1,key2"),
            "#abc,#chan1,#chan2,#xyz,#chan3 key_abc,key1,key2"
        );
        assert_eq!(add_channels(Rfc1459, "", "#a,#b"), "#a,#b");
    }

    #[test]
    fn remove_channel() {
        assert_eq!(remove(Rfc1459, "", "#abc"), "");
        assert_eq!(remove(Rfc1459, "#abc,#def,#ghi key_abc,key_def", "#def"), "#abc,#ghi key_abc");
        assert_eq!(remove(Rfc1459, "#abc,#def", "#ABC"), "#def");
    }

    #[test]
    fn rename_channel() {
        assert_eq!(
            rename(Rfc1459, "#abc,#def,#ghi key_abc,key_def", "#def", "#DEF2"),
            "#abc,#DEF2,#ghi key_abc,key_def"
        );
        assert_eq!(rename(Rfc1459, "#abc,#def", "#abc", "#ABC"), "#abc,#def");
    }

    #[test]
    fn rename_onto_existing_removes() {
        let list = add(Rfc1459, "#b,#c", "#a", None);
        assert_eq!(rename(Rfc1459, &list, "#a", "#b"), "#b,#c");
    }

    #[test]
    fn sort_by_buffer() {
        let number = |name: &str| match name {
            "#zzz" => Some(3),
            "#abc" => Some(5),
            "#key" => Some(9),
            _ => None,
        };
        assert_eq!(
            sort(Rfc1459, "#abc,#def,#zzz,#aaa,#key", JoinSort::Buffer(&number)),
            "#zzz,#abc,#key,#aaa,#def"
        );
        assert_eq!(
            sort(Rfc1459, "#def,#abc,#zzz k", JoinSort::Buffer(&number)),
            "#def,#zzz,#abc k"
        );
    }

    #[test]
    fn round_trip_keeps_pairs() {
        for join in &["#a,#b,#c k1,k2", "#x", "#y,#z k"] {
            let entries = split(Rfc1459, join, JoinSort::Disabled);
            assert_eq!(split(Rfc1459, &build(&entries), JoinSort::Disabled), entries);
        }
    }
}
