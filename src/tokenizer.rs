//! Tokenizer (C1): splits raw text into logical lines, folding
//! continuations and stripping comments (`spec.md §4.1`).
//!
//! Implemented as an iterator adapter over a `Peekable<Enumerate<...>>` of
//! physical lines, mirroring the teacher's `parse_inner` in the original
//! `parser.rs` — no intermediate token vector is materialized, so a caller
//! feeding a streamed `impl Iterator<Item = &str>` never buffers the
//! whole input.

use std::iter::{Enumerate, Peekable};

use crate::error::{ParseError, ParseErrorKind};
use crate::record::Location;

/// One logical line, after comment stripping and continuation folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogicalLine {
    Blank,
    Comment,
    Field { name: String, value: String, loc: Location },
}

/// Regex-free `name: value` matcher for `spec.md §4.1` rule 3:
/// `^(%?[A-Za-z_][A-Za-z0-9_]*)\s*:\s?(.*)$`.
fn match_field_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('%').unwrap_or(line);
    let name_len_in_rest = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len_in_rest == 0 {
        return None;
    }
    let first = rest.as_bytes()[0];
    if first.is_ascii_digit() {
        return None;
    }
    let prefix_len = line.len() - rest.len();
    let name_end = prefix_len + name_len_in_rest;
    let name = &line[..name_end];
    let after_name = line[name_end..].trim_start_matches([' ', '\t']);
    let after_colon = after_name.strip_prefix(':')?;
    let value = after_colon.strip_prefix(' ').unwrap_or(after_colon);
    Some((name, value))
}

/// Strips a trailing `\r` so CRLF-terminated recfiles parse identically
/// to LF-terminated ones (`SPEC_FULL.md` C1 supplement).
fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

pub(crate) struct Tokenizer<'a, I: Iterator<Item = &'a str>> {
    lines: Peekable<Enumerate<I>>,
    file: std::sync::Arc<str>,
    pending: Option<(String, String, Location)>,
}

impl<'a, I: Iterator<Item = &'a str>> Tokenizer<'a, I> {
    pub(crate) fn new(file: impl Into<std::sync::Arc<str>>, lines: I) -> Self {
        Self {
            lines: lines.enumerate().peekable(),
            file: file.into(),
            pending: None,
        }
    }

    fn loc(&self, num: usize) -> Location {
        Location::new(self.file.clone(), (num + 1) as u32)
    }

    /// Pulls the next logical line, folding `+`/backslash continuations
    /// into the field that owns them.
    pub(crate) fn next_logical(&mut self) -> Option<Result<LogicalLine, ParseError>> {
        if let Some((name, value, loc)) = self.pending.take() {
            return Some(Ok(LogicalLine::Field { name, value, loc }));
        }

        let (num, raw) = self.lines.next()?;
        let line = strip_cr(raw);

        if line.trim().is_empty() {
            return Some(Ok(LogicalLine::Blank));
        }
        if line.starts_with('#') {
            return Some(Ok(LogicalLine::Comment));
        }

        if line.starts_with('+') {
            return Some(Err(ParseErrorKind::StrayContinuation.at(self.loc(num))));
        }

        let Some((name, first_value)) = match_field_line(line) else {
            return Some(Err(ParseErrorKind::MalformedField(line.to_string()).at(self.loc(num))));
        };

        let loc = self.loc(num);
        let mut value = self.fold_backslash(first_value.to_string(), num);

        // Fold any following `+`-continuation physical lines into this field.
        while let Some(&(_, peeked)) = self.lines.peek() {
            let peeked = strip_cr(peeked);
            let Some(cont) = peeked.strip_prefix('+') else {
                break;
            };
            let (cnum, _) = self.lines.next().unwrap();
            let (sep, body) = if let Some(body) = cont.strip_prefix(' ') {
                (true, body)
            } else {
                (false, cont)
            };
            let body = self.fold_backslash(body.to_string(), cnum);
            value.push('\n');
            if sep {
                // The leading space after `+` is the separator itself, already
                // consumed; nothing further is inserted here (`spec.md §4.1` rule 4).
            }
            value.push_str(&body);
        }

        Some(Ok(LogicalLine::Field { name: name.to_string(), value, loc }))
    }

    /// Applies `spec.md §4.1` rule 5: a trailing single backslash joins the
    /// next physical line into the current value without an intervening
    /// newline. Only valid within a field's value, so it is applied before
    /// `+`-continuation folding sees the line.
    fn fold_backslash(&mut self, mut value: String, _start_num: usize) -> String {
        while let Some(body) = value.strip_suffix('\\').map(str::to_string) {
            let Some(&(_, peeked)) = self.lines.peek() else {
                value = body;
                break;
            };
            // A `+`-continuation line takes precedence at the next level;
            // backslash-continuation only folds ordinary physical lines.
            let peeked = strip_cr(peeked);
            if peeked.starts_with('+') {
                value = body;
                break;
            }
            let (_, next) = self.lines.next().unwrap();
            value = format!("{body}{}", strip_cr(next));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<LogicalLine> {
        let mut t = Tokenizer::new("<test>", input.lines());
        let mut out = Vec::new();
        while let Some(res) = t.next_logical() {
            out.push(res.unwrap());
        }
        out
    }

    #[test]
    fn blank_and_comment() {
        let lines = collect("# hi\n\nName: A\n");
        assert_eq!(lines[0], LogicalLine::Comment);
        assert_eq!(lines[1], LogicalLine::Blank);
        assert!(matches!(&lines[2], LogicalLine::Field { name, value, .. } if name == "Name" && value == "A"));
    }

    #[test]
    fn plus_continuation_with_space() {
        let lines = collect("Name: A\n+ line2\n+ line3\n");
        assert_eq!(lines.len(), 1);
        assert!(matches!(&lines[0], LogicalLine::Field { value, .. } if value == "A\nline2\nline3"));
    }

    #[test]
    fn plus_continuation_without_space() {
        let lines = collect("Name: A\n+line2\n");
        assert!(matches!(&lines[0], LogicalLine::Field { value, .. } if value == "A\nline2"));
    }

    #[test]
    fn backslash_continuation() {
        let lines = collect("Name: A\\\nB\n");
        assert!(matches!(&lines[0], LogicalLine::Field { value, .. } if value == "AB"));
    }

    #[test]
    fn meta_field_name() {
        let lines = collect("%rec: Book\n");
        assert!(matches!(&lines[0], LogicalLine::Field { name, value, .. } if name == "%rec" && value == "Book"));
    }

    #[test]
    fn stray_continuation_is_fatal() {
        let mut t = Tokenizer::new("<test>", "+ oops\n".lines());
        assert!(t.next_logical().unwrap().is_err());
    }

    #[test]
    fn malformed_line_is_fatal() {
        let mut t = Tokenizer::new("<test>", "not a field\n".lines());
        assert!(t.next_logical().unwrap().is_err());
    }

    #[test]
    fn crlf_is_stripped() {
        let lines = collect("Name: A\r\n");
        assert!(matches!(&lines[0], LogicalLine::Field { value, .. } if value == "A"));
    }
}
