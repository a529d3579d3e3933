//! Accumulated `RPL_ISUPPORT` (005) tokens and typed accessors for the ones a session uses.
use crate::casemap::CaseMapping;
use crate::chan::DEFAULT_CHANTYPES;
use crate::mode::ChanModeType;

const DEFAULT_PREFIX_MODES: &str = "ov";
const DEFAULT_PREFIX_CHARS: &str = "@+";
const DEFAULT_CHANMODES: &str = "beI,k,l,imnpst";

/// The feature tokens advertised by a server, in the order they were received.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ISupport {
    tokens: Vec<(String, Option<String>)>,
}

impl ISupport {
    /// Creates an empty set of features.
    pub fn new() -> ISupport {
        ISupport::default()
    }

    /// Records the parameters of one `005` reply: everything between the target nick and the
    /// trailing human readable text. `-TOKEN` withdraws a feature.
    pub fn apply<S: AsRef<str>>(&mut self, params: &[S]) {
        for token in params.iter().map(|p| p.as_ref()) {
            if token.is_empty() || token.contains(' ') {
                continue;
            }
            if let Some(name) = token.strip_prefix('-') {
                self.tokens.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
                continue;
            }
            let mut iter = token.splitn(2, '=');
            let name = iter.next().unwrap_or_default();
            let value = iter.next().map(|v| v.to_owned());
            match self.tokens.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                Some(entry) => entry.1 = value,
                None => self.tokens.push((name.to_owned(), value)),
            }
        }
    }

    /// Forgets every feature (used on disconnect).
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Returns the value of a feature: `Some("")` when advertised without a value, `None` when
    /// not advertised at all.
    pub fn get(&self, feature: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(feature))
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Rebuilds the space separated `FEATURE=value` string, as persisted across upgrades.
    pub fn to_line(&self) -> String {
        self.tokens
            .iter()
            .map(|(n, v)| match v {
                Some(v) => format!("{}={}", n, v),
                None => n.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parses a string produced by `to_line`.
    pub fn from_line(line: &str) -> ISupport {
        let mut isupport = ISupport::new();
        isupport.apply(&line.split(' ').collect::<Vec<_>>());
        isupport
    }

    /// Channel prefix modes and their nick prefix characters, e.g. `("ov", "@+")`.
    pub fn prefix(&self) -> (String, String) {
        let parsed = self.get("PREFIX").and_then(|value| {
            let value = value.strip_prefix('(')?;
            let close = value.find(')')?;
            let (modes, chars) = (&value[..close], &value[close + 1..]);
            if modes.is_empty() || modes.chars().count() != chars.chars().count() {
                return None;
            }
            Some((modes.to_owned(), chars.to_owned()))
        });
        parsed.unwrap_or_else(|| (DEFAULT_PREFIX_MODES.to_owned(), DEFAULT_PREFIX_CHARS.to_owned()))
    }

    /// The `CHANMODES` value: list modes, always-argument modes, set-argument modes, flags.
    pub fn chanmodes(&self) -> &str {
        match self.get("CHANMODES") {
            Some(v) if !v.is_empty() => v,
            _ => DEFAULT_CHANMODES,
        }
    }

    /// Characters a channel name may start with.
    pub fn chantypes(&self) -> &str {
        match self.get("CHANTYPES") {
            Some(v) if !v.is_empty() => v,
            _ => DEFAULT_CHANTYPES,
        }
    }

    /// Maximum number of modes with a parameter in one `MODE` command, clamped to `1..=128`.
    pub fn modes(&self) -> usize {
        match self.get("MODES").map(|v| v.parse::<i64>()) {
            Some(Ok(n)) => n.max(1).min(128) as usize,
            _ => 4,
        }
    }

    /// Maximum nickname length, if advertised.
    pub fn nicklen(&self) -> Option<usize> {
        self.get("NICKLEN").and_then(|v| v.parse().ok()).filter(|n| *n > 0)
    }

    /// The casemapping rule, `rfc1459` if not advertised.
    pub fn casemapping(&self) -> CaseMapping {
        self.get("CASEMAPPING")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Size of the `MONITOR` list, `Some(0)` meaning unlimited, `None` if unsupported.
    pub fn monitor(&self) -> Option<usize> {
        self.get("MONITOR").map(|v| v.parse().unwrap_or(0))
    }

    /// Classifies a channel mode letter. Prefix modes always take an argument (type B).
    pub fn chanmode_type(&self, mode: char) -> ChanModeType {
        if self.prefix().0.contains(mode) {
            return ChanModeType::B;
        }
        ChanModeType::classify(self.chanmodes(), mode)
    }

    /// The letters of the list-type (type A) channel modes.
    pub fn list_modes(&self) -> Vec<char> {
        self.chanmodes()
            .split(',')
            .next()
            .map(|group| group.chars().collect())
            .unwrap_or_default()
    }
}
