//! Source text helpers shared by the agents.
//!
//! The agents work on raw text, not parse trees. These helpers blank out
//! string literals and line comments so that pattern scans do not fire on
//! text inside them, and provide the indentation and bracket bookkeeping
//! several heuristics need.

use super::AgentError;
use crate::models::Language;
use regex::Regex;
use std::sync::LazyLock;

/// A regex compiled on first use. Compilation errors surface as
/// [`AgentError::Pattern`] through [`compiled`].
pub type LazyRegex = LazyLock<Result<Regex, regex::Error>>;

/// Borrow a lazily compiled regex.
pub fn compiled(pattern: &'static LazyRegex) -> Result<&'static Regex, AgentError> {
    pattern
        .as_ref()
        .map_err(|e| AgentError::Pattern(e.clone()))
}

/// 1-indexed line number of a byte offset.
pub fn line_of_offset(code: &str, offset: usize) -> usize {
    let end = offset.min(code.len());
    code.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// An open string literal.
#[derive(Debug, Clone, Copy)]
struct Quote {
    ch: char,
    triple: bool,
}

impl Quote {
    fn spans_lines(&self) -> bool {
        self.triple || self.ch == '`'
    }
}

/// Blank out string literal contents and drop the trailing line comment.
///
/// Quotes are kept so the line keeps its shape; every masked character is
/// replaced by a space.
#[cfg(test)]
pub fn mask_line(line: &str, language: Language) -> String {
    mask_with(line, language, &mut None)
}

fn mask_with(line: &str, language: Language, quote: &mut Option<Quote>) -> String {
    let chars: Vec<char> = line.chars().collect();
    let repeated = |i: usize, c: char| chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = *quote {
            if c == '\\' {
                out.push(' ');
                if i + 1 < chars.len() {
                    out.push(' ');
                }
                i += 2;
                continue;
            }
            if c == q.ch && (!q.triple || repeated(i, c)) {
                let width = if q.triple { 3 } else { 1 };
                out.extend(std::iter::repeat(c).take(width));
                *quote = None;
                i += width;
                continue;
            }
            out.push(' ');
            i += 1;
            continue;
        }

        if language.hash_comments() && c == '#' {
            break;
        }
        if language.slash_comments() && c == '/' && chars.get(i + 1) == Some(&'/') {
            break;
        }

        match c {
            '\'' if language.has_char_literals() => {
                // 'x' or '\n'; anything else (a Rust lifetime) is left alone
                let width = match (chars.get(i + 1), chars.get(i + 2), chars.get(i + 3)) {
                    (Some('\\'), Some(_), Some('\'')) => Some(4),
                    (Some(_), Some('\''), _) => Some(3),
                    _ => None,
                };
                match width {
                    Some(w) => {
                        out.push('\'');
                        out.push_str(&" ".repeat(w - 2));
                        out.push('\'');
                        i += w;
                        continue;
                    }
                    None => out.push(c),
                }
            }
            '"' | '\'' if language == Language::Python && repeated(i, c) => {
                *quote = Some(Quote { ch: c, triple: true });
                out.extend([c, c, c]);
                i += 3;
                continue;
            }
            '"' | '\'' | '`' => {
                *quote = Some(Quote { ch: c, triple: false });
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }

    if quote.is_some_and(|q| !q.spans_lines()) {
        *quote = None;
    }
    out
}

/// Masked copy of every line of `code`. Triple-quoted and template
/// strings stay masked across line breaks.
pub fn masked_lines(code: &str, language: Language) -> Vec<String> {
    let mut quote = None;
    code.lines()
        .map(|line| mask_with(line, language, &mut quote))
        .collect()
}

/// Masked copy of the whole snippet, line structure preserved.
pub fn masked_code(code: &str, language: Language) -> String {
    masked_lines(code, language).join("\n")
}

/// Bracket kinds checked for balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Paren,
    Brace,
    Square,
}

impl Bracket {
    pub fn message(&self) -> &'static str {
        match self {
            Bracket::Paren => "Mismatched parentheses",
            Bracket::Brace => "Mismatched braces",
            Bracket::Square => "Mismatched brackets",
        }
    }

    fn chars(&self) -> (char, char) {
        match self {
            Bracket::Paren => ('(', ')'),
            Bracket::Brace => ('{', '}'),
            Bracket::Square => ('[', ']'),
        }
    }
}

/// Bracket kinds whose open and close counts differ in the masked code.
pub fn unbalanced(masked: &str, kinds: &[Bracket]) -> Vec<Bracket> {
    kinds
        .iter()
        .copied()
        .filter(|kind| {
            let (open, close) = kind.chars();
            masked.matches(open).count() != masked.matches(close).count()
        })
        .collect()
}

/// Leading whitespace width, tabs counted as four columns.
pub fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// An indentation-delimited block, e.g. a Python function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// 0-indexed header line.
    pub header: usize,
    /// 0-indexed last non-blank line belonging to the block.
    pub last: usize,
    pub indent: usize,
}

impl Block {
    /// 1-indexed header line.
    pub fn line(&self) -> usize {
        self.header + 1
    }

    /// Indices of the body lines (non-blank ones included only).
    pub fn body<'a>(&self, lines: &'a [String]) -> impl Iterator<Item = (usize, &'a String)> + 'a {
        let (start, end) = (self.header + 1, self.last);
        lines
            .iter()
            .enumerate()
            .skip(start)
            .take(end.saturating_sub(start) + 1)
            .filter(move |(idx, line)| *idx <= end && !line.trim().is_empty())
    }
}

/// Find the block opened at `header` by indentation.
pub fn block_at(lines: &[String], header: usize) -> Block {
    let indent = indent_of(&lines[header]);
    let mut last = header;
    let mut depth: i32 = bracket_delta(&lines[header]);

    for (idx, line) in lines.iter().enumerate().skip(header + 1) {
        if line.trim().is_empty() {
            continue;
        }
        // continuation lines of a multi-line signature belong to the header
        if depth > 0 {
            depth += bracket_delta(line);
            last = idx;
            continue;
        }
        if indent_of(line) <= indent {
            break;
        }
        last = idx;
    }

    Block {
        header,
        last,
        indent,
    }
}

/// Net count of opening brackets on a line.
pub fn bracket_delta(line: &str) -> i32 {
    line.chars()
        .map(|c| match c {
            '(' | '[' | '{' => 1,
            ')' | ']' | '}' => -1,
            _ => 0,
        })
        .sum()
}
