//! Recovers the literal multi-line source of a scope declaration from its call site.
//!
//! Lines are accumulated from the declaration line until a [`BalanceChecker`]
//! accepts the text as a complete unit, or [`MAX_SCOPE_LINES`] is reached.

use std::path::Path;

use log::{debug, warn};

/// Upper bound on the lines read for one declaration.
pub const MAX_SCOPE_LINES: usize = 50;

/// Decides whether accumulated source text forms a syntactically complete unit.
pub trait BalanceChecker {
    fn is_complete(&self, source: &str) -> bool;
}

/// Result of an extraction. `complete == false` means `text` is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub complete: bool,
}

impl Extraction {
    fn partial(text: String) -> Self {
        Self { text, complete: false }
    }
}

/// Read `path` and extract the declaration starting at 1-based `line`.
pub fn extract_definition(path: &Path, line: usize, checker: &dyn BalanceChecker) -> Extraction {
    match std::fs::read_to_string(path) {
        Ok(source) => extract_from_source(&source, line, checker),
        Err(err) => {
            warn!("unable to read scope source {}: {err}", path.display());
            Extraction::partial(String::new())
        }
    }
}

pub fn extract_from_source(source: &str, line: usize, checker: &dyn BalanceChecker) -> Extraction {
    let mut lines = source.lines().skip(line.saturating_sub(1));
    let Some(first) = lines.next() else {
        debug!("scope line {line} is past the end of the source");
        return Extraction::partial(String::new());
    };
    let indent = leading_whitespace(first);

    let mut text = String::new();
    for (count, raw) in std::iter::once(first).chain(lines).take(MAX_SCOPE_LINES).enumerate() {
        if count > 0 {
            text.push('\n');
        }
        text.push_str(strip_indent(raw, indent));

        if checker.is_complete(&text) {
            return Extraction { text, complete: true };
        }
    }

    debug!("scope at line {line} never balanced; keeping partial text");
    Extraction::partial(text)
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Drop at most `indent` bytes of leading whitespace, stopping on a char boundary.
fn strip_indent(line: &str, indent: usize) -> &str {
    let cut = line
        .char_indices()
        .find(|&(i, c)| !c.is_whitespace() || i + c.len_utf8() > indent)
        .map_or(line.len(), |(i, _)| i);
    &line[cut..]
}

/// Ruby-aware delimiter depth counter.
///
/// Tracks `()[]{}` depth, `do`/`end`, block keywords in expression position,
/// quoted strings, comments, heredocs and trailing line continuations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimiterBalance;

const BLOCK_OPENERS: &[&str] = &["if", "unless", "while", "until", "for", "case", "begin", "def", "class", "module"];
const LOOP_HEADERS: &[&str] = &["while", "until", "for"];
const CONTINUATIONS: &[char] = &[',', '\\', '+', '-', '*', '&', '|', '.', '=', '<', '>'];
/// A keyword after one of these starts an expression (`v = case ...`), not a modifier.
const EXPRESSION_PUNCTUATION: &[char] = &['=', '(', '[', '{', ',', '|', '&', '!', ';', ':', '?'];
const EXPRESSION_KEYWORDS: &[&str] = &["return", "and", "or", "not", "then", "else", "do", "when", "in", "yield"];

#[derive(Debug, Default)]
struct ScanState {
    parens: i32,
    brackets: i32,
    braces: i32,
    blocks: i32,
    quote: Option<char>,
    heredocs: Vec<String>,
    last_code: Option<char>,
}

impl ScanState {
    fn balanced(&self) -> bool {
        self.parens == 0
            && self.brackets == 0
            && self.braces == 0
            && self.blocks == 0
            && self.quote.is_none()
            && self.heredocs.is_empty()
            && !self.last_code.is_some_and(|c| CONTINUATIONS.contains(&c))
    }

    fn scan_line(&mut self, line: &str) {
        if let Some(terminator) = self.heredocs.first() {
            if line.trim() == terminator {
                self.heredocs.remove(0);
            }
            return;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        let mut first_word = true;
        let mut prev_word: Option<String> = None;
        let mut loop_header = false;

        while i < chars.len() {
            let c = chars[i];

            if let Some(quote) = self.quote {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == quote {
                    self.quote = None;
                    self.last_code = Some(c);
                }
                i += 1;
                continue;
            }

            match c {
                '#' => break,
                '\'' | '"' | '`' => self.quote = Some(c),
                '(' => self.parens += 1,
                ')' => self.parens -= 1,
                '[' => self.brackets += 1,
                ']' => self.brackets -= 1,
                '{' => self.braces += 1,
                '}' => self.braces -= 1,
                '<' if chars.get(i + 1) == Some(&'<') => {
                    if let Some((terminator, consumed)) = heredoc_terminator(&chars[i + 2..]) {
                        self.heredocs.push(terminator);
                        self.last_code = Some('H');
                        i += 2 + consumed;
                        first_word = false;
                        prev_word = None;
                        continue;
                    }
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = i;
                    while i < chars.len() && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '?' | '!')) {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let receiver = start > 0 && matches!(chars[start - 1], '.' | ':');
                    let label = chars.get(i) == Some(&':') && chars.get(i + 1) != Some(&':');
                    if !receiver && !label {
                        let expression_start = first_word
                            || match prev_word.as_deref() {
                                Some(previous) => EXPRESSION_KEYWORDS.contains(&previous),
                                None => self.last_code.is_some_and(|c| EXPRESSION_PUNCTUATION.contains(&c)),
                            };
                        self.count_keyword(&word, expression_start, &mut loop_header);
                    }
                    first_word = false;
                    self.last_code = chars.get(i - 1).copied();
                    prev_word = Some(word);
                    continue;
                }
                _ => {}
            }

            if !c.is_whitespace() {
                self.last_code = Some(c);
                first_word = false;
                prev_word = None;
            }
            i += 1;
        }
    }

    /// `if`/`while`/... after a value are modifiers and open nothing.
    fn count_keyword(&mut self, word: &str, expression_start: bool, loop_header: &mut bool) {
        match word {
            "end" => self.blocks -= 1,
            "do" if *loop_header => *loop_header = false,
            "do" => self.blocks += 1,
            w if expression_start && BLOCK_OPENERS.contains(&w) => {
                self.blocks += 1;
                *loop_header = LOOP_HEADERS.contains(&w);
            }
            _ => {}
        }
    }
}

/// Parse `~ID`, `-ID`, `ID` (uppercase) or quoted forms after `<<`.
fn heredoc_terminator(rest: &[char]) -> Option<(String, usize)> {
    let mut i = 0;
    let flagged = matches!(rest.first(), Some('~' | '-'));
    if flagged {
        i += 1;
    }

    let quote = rest.get(i).copied().filter(|c| matches!(c, '\'' | '"' | '`'));
    if quote.is_some() {
        i += 1;
    }

    let start = i;
    while i < rest.len() && (rest[i].is_alphanumeric() || rest[i] == '_') {
        i += 1;
    }
    let ident: String = rest[start..i].iter().collect();
    if ident.is_empty() {
        return None;
    }
    if !flagged && quote.is_none() && !ident.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()) {
        return None;
    }

    if let Some(q) = quote {
        if rest.get(i) != Some(&q) {
            return None;
        }
        i += 1;
    }

    Some((ident, i))
}

impl BalanceChecker for DelimiterBalance {
    fn is_complete(&self, source: &str) -> bool {
        let mut state = ScanState::default();
        for line in source.lines() {
            state.scan_line(line);
        }
        state.balanced()
    }
}
