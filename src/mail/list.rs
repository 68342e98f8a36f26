//! Parser for untagged `LIST` responses.
//!
//! Accepted grammar, one response per line:
//!
//! ```text
//! "* LIST" SP "(" [flag *(SP flag)] ")" SP (DQUOTE char DQUOTE / "NIL") SP name
//! name = quoted / atom
//! ```
//!
//! Anything else, including names sent as literals, is skipped.

use log::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub flags: Vec<String>,
    pub name: String,
}

impl ListEntry {
    pub fn is_selectable(&self) -> bool {
        !self
            .flags
            .iter()
            .any(|f| f.eq_ignore_ascii_case("\\Noselect") || f.eq_ignore_ascii_case("\\NonExistent"))
    }
}

/// Parses every well-formed `LIST` line in `raw`.
pub fn parse_list_response(raw: &[u8]) -> Vec<ListEntry> {
    let text = String::from_utf8_lossy(raw);
    text.lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let entry = parse_line(line);
            if entry.is_none() {
                debug!("skipping malformed LIST line: {line}");
            }
            entry
        })
        .collect()
}

pub fn selectable_names(raw: &[u8]) -> Vec<String> {
    parse_list_response(raw)
        .into_iter()
        .filter(|e| {
            if !e.is_selectable() {
                debug!("skipping unselectable mailbox {}", e.name);
            }
            e.is_selectable()
        })
        .map(|e| e.name)
        .collect()
}

fn parse_line(line: &str) -> Option<ListEntry> {
    let rest = strip_prefix_ci(line, "* LIST ")?;

    let rest = rest.strip_prefix('(')?;
    let close = rest.find(')')?;
    let flags = rest[..close].split_whitespace().map(str::to_string).collect();
    let rest = rest[close + 1..].strip_prefix(' ')?;

    // Hierarchy delimiter: NIL or a single quoted character.
    let rest = match strip_prefix_ci(rest, "NIL") {
        Some(r) => r,
        None => {
            let (d, r) = parse_quoted(rest)?;
            if d.chars().count() != 1 {
                return None;
            }
            r
        }
    };
    let rest = rest.strip_prefix(' ')?;

    let name = if rest.starts_with('"') {
        let (name, tail) = parse_quoted(rest)?;
        if !tail.trim().is_empty() {
            return None;
        }
        name
    } else {
        if rest.is_empty() || rest.starts_with('{') || rest.contains(char::is_whitespace) {
            return None;
        }
        rest.to_string()
    };

    Some(ListEntry { flags, name })
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Reads a quoted string from the front of `s`, returning it unescaped plus the remainder.
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match (escaped, c) {
            (true, _) => {
                out.push(c);
                escaped = false;
            }
            (false, '\\') => escaped = true,
            (false, '"') => return Some((out, &body[i + 1..])),
            (false, _) => out.push(c),
        }
    }
    None
}
