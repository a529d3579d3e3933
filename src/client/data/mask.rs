//! Wildcard masks, as used for nick patterns, capability lists and bans.
use crate::proto::CaseMapping;

/// Matches `s` against a pattern where `*` stands for any run of characters.
///
/// # Example
/// ```
/// # use irc_session::client::data::mask::wildcard_match;
/// assert!(wildcard_match("alice", "al*", true));
/// assert!(wildcard_match("ALICE", "*ice", false));
/// assert!(!wildcard_match("bob", "al*", false));
/// ```
pub fn wildcard_match(s: &str, pattern: &str, case_sensitive: bool) -> bool {
    let fold = |text: &str| {
        if case_sensitive {
            text.to_owned()
        } else {
            text.to_lowercase()
        }
    };
    let (s, pattern) = (fold(s), fold(pattern));
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return s == pattern;
    }
    let mut rest = &s[..];
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part);
        } else if !part.is_empty() {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Matches `s` against a list of masks. Masks starting with `!` exclude: `s` matches when at
/// least one plain mask matches and no excluding mask does.
///
/// # Example
/// ```
/// # use irc_session::client::data::mask::match_list;
/// assert!(match_list("multi-prefix", &["*", "!away-notify"]));
/// assert!(!match_list("away-notify", &["*", "!away-notify"]));
/// ```
pub fn match_list(s: &str, masks: &[&str]) -> bool {
    let mut matched = false;
    for mask in masks {
        match mask.strip_prefix('!') {
            Some(excluded) => {
                if wildcard_match(s, excluded, false) {
                    return false;
                }
            }
            None => matched |= wildcard_match(s, mask, false),
        }
    }
    matched
}

/// Matches a nick against a mask under the server casemapping.
pub fn nick_match(casemap: CaseMapping, nick: &str, mask: &str) -> bool {
    wildcard_match(&casemap.to_lower(nick), &casemap.to_lower(mask), true)
}

/// The ban mask of a `user@host`: every nick and user on that host.
pub fn default_ban_mask(host: &str) -> String {
    let host = host.rsplit('@').next().unwrap_or(host);
    format!("*!*@{}", host)
}

#[cfg(test)]
mod test {
    use super::{default_ban_mask, match_list, nick_match, wildcard_match};
    use crate::proto::CaseMapping;

    #[test]
    fn wildcards() {
        assert!(wildcard_match("abc", "*", true));
        assert!(wildcard_match("abc", "a*c", true));
        assert!(wildcard_match("abc", "*b*", true));
        assert!(!wildcard_match("abc", "*d*", true));
        assert!(!wildcard_match("abc", "ab", true));
        assert!(wildcard_match("", "*", true));
        assert!(!wildcard_match("aXc", "a*c*d", true));
    }

    #[test]
    fn excluding_masks() {
        assert!(!match_list("sasl", &[]));
        assert!(match_list("sasl", &["sasl"]));
        assert!(!match_list("sasl", &["!sasl", "*"]));
    }

    #[test]
    fn nick_masks_follow_casemapping() {
        assert!(nick_match(CaseMapping::Rfc1459, "Al[ice]", "al{*"));
        assert!(!nick_match(CaseMapping::Ascii, "Al[ice]", "al{*"));
    }

    #[test]
    fn ban_mask() {
        assert_eq!(default_ban_mask("~al@host.example"), "*!*@host.example");
        assert_eq!(default_ban_mask("host.example"), "*!*@host.example");
    }
}
