//! Replacement templates.
//!
//! | token      | expands to |
//! |------------|------------|
//! | `$$`       | a literal `$` |
//! | `$&`       | the whole match |
//! | `` $` ``   | text before the match |
//! | `$'`       | text after the match |
//! | `$n`, `$nn`| capture group `n` (1-99) |
//! | `$<name>`  | named capture group |
//!
//! References to groups the expression does not declare stay literal.
use regex::{Captures, Regex};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Whole,
    Before,
    After,
    Group(usize),
    Named(String),
}

/// A replacement template resolved against one compiled expression.
#[derive(Debug, Clone)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(source: &str, regex: &Regex) -> Self {
        // captures_len counts the implicit group 0
        let groups = regex.captures_len().saturating_sub(1);
        let has_named = regex.capture_names().flatten().next().is_some();

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let bytes = source.as_bytes();
        let mut i = 0;

        while i < source.len() {
            if bytes[i] != b'$' || i + 1 >= source.len() {
                let ch = source[i..].chars().next().unwrap_or('$');
                literal.push(ch);
                i += ch.len_utf8();
                continue;
            }

            let (piece, consumed) = match bytes[i + 1] {
                b'$' => (Some(Piece::Literal("$".to_string())), 2),
                b'&' => (Some(Piece::Whole), 2),
                b'`' => (Some(Piece::Before), 2),
                b'\'' => (Some(Piece::After), 2),
                b'0'..=b'9' => group_ref(bytes, i + 1, groups),
                b'<' if has_named => match source[i + 2..].find('>') {
                    Some(end) => {
                        let name = &source[i + 2..i + 2 + end];
                        (Some(Piece::Named(name.to_string())), end + 3)
                    }
                    None => (None, 1),
                },
                _ => (None, 1),
            };

            match piece {
                Some(Piece::Literal(text)) => literal.push_str(&text),
                Some(piece) => {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(piece);
                }
                None => literal.push('$'),
            }
            i += consumed;
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Self { pieces }
    }

    /// Append the expansion for one match of `haystack` to `dst`.
    pub fn expand(&self, caps: &Captures<'_>, haystack: &str, dst: &mut String) {
        let Some(whole) = caps.get(0) else {
            return;
        };
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => dst.push_str(text),
                Piece::Whole => dst.push_str(whole.as_str()),
                Piece::Before => dst.push_str(&haystack[..whole.start()]),
                Piece::After => dst.push_str(&haystack[whole.end()..]),
                Piece::Group(n) => {
                    if let Some(m) = caps.get(*n) {
                        dst.push_str(m.as_str());
                    }
                }
                Piece::Named(name) => {
                    if let Some(m) = caps.name(name) {
                        dst.push_str(m.as_str());
                    }
                }
            }
        }
    }
}

/// Resolve `$n` / `$nn` starting at `bytes[at]` (the first digit).
///
/// The two-digit form wins when that group exists; `$0` and missing
/// groups stay literal.
fn group_ref(bytes: &[u8], at: usize, groups: usize) -> (Option<Piece>, usize) {
    let first = usize::from(bytes[at] - b'0');
    if let Some(second) = bytes.get(at + 1).filter(|b| b.is_ascii_digit()) {
        let two = first * 10 + usize::from(second - b'0');
        if two >= 1 && two <= groups {
            return (Some(Piece::Group(two)), 3);
        }
    }
    if first >= 1 && first <= groups {
        (Some(Piece::Group(first)), 2)
    } else {
        (None, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(pattern: &str, template: &str, haystack: &str) -> String {
        let re = Regex::new(pattern).unwrap();
        let t = Template::parse(template, &re);
        let caps = re.captures(haystack).unwrap();
        let mut out = String::new();
        t.expand(&caps, haystack, &mut out);
        out
    }

    #[test]
    fn test_whole_match_and_groups() {
        assert_eq!(render(r"(\w+)@(\w+)", "$2 at $1 [$&]", "bob@host"), "host at bob [bob@host]");
    }

    #[test]
    fn test_dollar_escape_and_literals() {
        assert_eq!(render("a", "$$1", "a"), "$1");
        assert_eq!(render("a", "$", "a"), "$");
        assert_eq!(render("a", "cost $x", "a"), "cost $x");
    }

    #[test]
    fn test_missing_group_stays_literal() {
        assert_eq!(render("(a)", "$2-$0", "a"), "$2-$0");
        // $10 falls back to group 1 followed by "0"
        assert_eq!(render("(a)", "$10", "a"), "a0");
    }

    #[test]
    fn test_before_and_after() {
        assert_eq!(render("b", "[$`|$']", "abc"), "[a|c]");
    }

    #[test]
    fn test_named_groups() {
        assert_eq!(render(r"(?<y>\d{4})-(?<m>\d{2})", "$<m>/$<y>", "2024-05"), "05/2024");
        // without named groups the token is literal
        assert_eq!(render("a", "$<x>", "a"), "$<x>");
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        assert_eq!(render("(x)?a", "[$1]", "a"), "[]");
    }
}
