//! Flag strings (`"gim"`, `"gy"`, …) and their effect on compilation.
use regex::{Regex, RegexBuilder};

/// Parsed flag string.
///
/// | flag | effect |
/// |------|--------|
/// | `g`  | accepted; every stage already finds all occurrences |
/// | `m`  | `^`/`$` match at line boundaries |
/// | `i`  | case-insensitive |
/// | `y`  | sticky: matches must be contiguous from offset 0 |
/// | `u`, `v` | Unicode mode (always on), mutually exclusive |
/// | `s`  | `.` matches `\n` |
/// | `d`  | accepted; match offsets are always tracked |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub global: bool,
    pub multi_line: bool,
    pub case_insensitive: bool,
    pub sticky: bool,
    pub unicode: bool,
    pub unicode_sets: bool,
    pub dot_all: bool,
    pub indices: bool,
}

impl FlagSet {
    /// Parse a flag string; duplicates, unknown letters and `u`+`v` are rejected.
    pub fn parse(flags: &str) -> Result<Self, String> {
        let mut set = FlagSet::default();
        for c in flags.chars() {
            let slot = match c {
                'g' => &mut set.global,
                'm' => &mut set.multi_line,
                'i' => &mut set.case_insensitive,
                'y' => &mut set.sticky,
                'u' => &mut set.unicode,
                'v' => &mut set.unicode_sets,
                's' => &mut set.dot_all,
                'd' => &mut set.indices,
                other => return Err(format!("invalid flag '{}'", other)),
            };
            if *slot {
                return Err(format!("duplicate flag '{}'", c));
            }
            *slot = true;
        }
        if set.unicode && set.unicode_sets {
            return Err("flags 'u' and 'v' cannot be combined".to_string());
        }
        Ok(set)
    }

    /// Compile `expression` under these flags.
    pub fn compile(&self, expression: &str) -> Result<Regex, String> {
        RegexBuilder::new(expression)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_all)
            .build()
            .map_err(|e| e.to_string())
    }
}

/// Add `flag` if absent, drop it if present. Order of the remaining letters is kept.
pub fn toggle(flags: &str, flag: char) -> String {
    if flags.contains(flag) {
        flags.chars().filter(|c| *c != flag).collect()
    } else {
        let mut out = flags.to_string();
        out.push(flag);
        out
    }
}
