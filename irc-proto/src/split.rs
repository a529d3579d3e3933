//! Splitting of outgoing text so that every wire line fits the 512 byte limit.

/// Maximum length of a line on the wire, including `\r\n`.
pub const MAX_LINE_LEN: usize = 512;

/// Splits a logical message on line breaks, dropping carriage returns and empty lines.
///
/// # Example
/// ```
/// # use irc_proto::split::split_lines;
/// assert_eq!(split_lines("one\r\ntwo\n\nthree"), vec!["one", "two", "three"]);
/// ```
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .collect()
}

/// How many bytes of message text fit in `COMMAND target :text` once the server prepends a
/// `:nick!user@host ` source of `source_len` bytes.
pub fn text_budget(command: &str, target: &str, source_len: usize) -> usize {
    let overhead = (1 + source_len + 1) + command.len() + 1 + target.len() + 2 + 2;
    MAX_LINE_LEN.saturating_sub(overhead).max(1)
}

/// Splits `text` into chunks of at most `max_bytes` bytes, cutting on character boundaries and
/// preferring to cut at the last space of a chunk (the space itself is dropped).
pub fn split_text(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > max_bytes {
        let mut cut = max_bytes;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // A single character wider than the budget still has to go somewhere.
            cut = rest.chars().next().map_or(rest.len(), |c| c.len_utf8());
        }
        let space = if rest.as_bytes().get(cut) == Some(&b' ') {
            Some(cut)
        } else {
            rest[..cut].rfind(' ')
        };
        let (chunk, next) = match space {
            Some(space) if space > 0 => (&rest[..space], &rest[space + 1..]),
            _ => (&rest[..cut], &rest[cut..]),
        };
        chunks.push(chunk.to_owned());
        rest = next;
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_owned());
    }
    chunks
}

#[cfg(test)]
mod test {
    use super::{split_lines, split_text, text_budget, MAX_LINE_LEN};

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(split_text("hello world", 100), vec!["hello world"]);
        assert_eq!(split_text("", 100), vec![""]);
    }

    #[test]
    fn cuts_at_spaces() {
        assert_eq!(split_text("aaaa bbbb cccc", 9), vec!["aaaa bbbb", "cccc"]);
        assert_eq!(split_text("aaaa bbbb cccc", 6), vec!["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn cuts_long_words() {
        assert_eq!(split_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn respects_char_boundaries() {
        let chunks = split_text("ééééé", 3);
        assert_eq!(chunks, vec!["é", "é", "é", "é", "é"]);
    }

    #[test]
    fn budget_fits_the_line() {
        let budget = text_budget("PRIVMSG", "#rust", 30);
        let line = format!(":{} PRIVMSG #rust :{}\r\n", "x".repeat(30), "y".repeat(budget));
        assert_eq!(line.len(), MAX_LINE_LEN);
    }

    #[test]
    fn lines() {
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert!(split_lines("\n\r\n").is_empty());
    }
}
