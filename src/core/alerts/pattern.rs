// Wildcard and raw expression compilation.
//
// Wildcards: `*` zero or more, `+` one or more, `?` exactly one. A run of
// consecutive wildcard characters collapses into a single repetition of the
// wildcard token; everything else is matched literally. Matching is always
// case-insensitive.

use regex::{Regex, RegexBuilder};

use super::error::PatternError;

/// Token a wildcard run repeats.
const WILDCARD_TOKEN: &str = ".";

/// Upper bound for a compiled program, so a hostile pattern fails at
/// configuration time instead of on every incoming line.
const MAX_COMPILED_SIZE: usize = 1 << 20;

/// What kind of text an anchored expression is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Subject {
    /// Free-form chat text.
    Message,
    /// A canonical `nick!user@host`, where `!` and `@` each occur exactly once.
    Hostmask,
}

impl Subject {
    fn trailing_redundant(self) -> &'static [&'static str] {
        match self {
            Self::Message => &[".*$"],
            Self::Hostmask => &[".*$", ".*@", ".*!"],
        }
    }

    fn leading_redundant(self) -> &'static [&'static str] {
        match self {
            Self::Message => &["^.*"],
            Self::Hostmask => &["^.*", "!.*", "@.*"],
        }
    }
}

/// How a compiled matcher decides whether a candidate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every candidate matches.
    Always,
    /// Anchored at both ends.
    WholeString,
    /// Anchored at the start only.
    Prefix,
    /// Unanchored search anywhere in the candidate.
    Search,
}

/// A compiled, case-insensitive matcher.
#[derive(Debug, Clone)]
pub struct Matcher {
    expression: String,
    strategy: Strategy,
    regex: Regex,
    /// ASCII literal body for anchored strategies, compared without the regex engine.
    literal: Option<String>,
}

impl Matcher {
    /// Compile a message wildcard pattern. The pattern may match anywhere in
    /// the line; with `word` it must start and end on word boundaries.
    pub fn compile_wildcard(text: &str, word: bool) -> Result<Self, PatternError> {
        let mut body = wildcard_to_expression(text);
        if word {
            body = format!(r"\b{body}\b");
        }
        Self::from_anchored(&format!("^.*{body}.*$"), Subject::Message)
    }

    /// Compile a user-supplied regular expression verbatim.
    pub fn compile_raw(expression: &str) -> Result<Self, PatternError> {
        let regex = build_regex(expression)?;
        Ok(Self {
            expression: expression.to_string(),
            strategy: Strategy::Search,
            regex,
            literal: None,
        })
    }

    /// Compile an expression anchored with `^...$`, trimming fragments that
    /// cannot change the outcome and picking the cheapest strategy for what
    /// remains.
    pub(crate) fn from_anchored(expression: &str, subject: Subject) -> Result<Self, PatternError> {
        let optimized = strip_redundant(expression, subject);
        let anchored_start = optimized.starts_with('^');
        let anchored_end = ends_with_anchor(optimized);

        let strategy = if is_trivial(optimized) {
            Strategy::Always
        } else {
            match (anchored_start, anchored_end) {
                (true, true) => Strategy::WholeString,
                (true, false) => Strategy::Prefix,
                _ => Strategy::Search,
            }
        };

        let literal = match strategy {
            Strategy::WholeString | Strategy::Prefix => {
                let start = 1;
                let end = optimized.len() - usize::from(anchored_end);
                unescape_literal(&optimized[start..end])
            }
            _ => None,
        };

        Ok(Self {
            expression: optimized.to_string(),
            strategy,
            regex: build_regex(optimized)?,
            literal,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn always_matches(&self) -> bool {
        self.strategy == Strategy::Always
    }

    pub fn is_match(&self, text: &str) -> bool {
        // Unicode case folding (e.g. the Kelvin sign) needs the regex engine.
        let literal = self.literal.as_deref().filter(|_| text.is_ascii());
        match (self.strategy, literal) {
            (Strategy::Always, _) => true,
            (Strategy::WholeString, Some(lit)) => text.eq_ignore_ascii_case(lit),
            (Strategy::Prefix, Some(lit)) => text
                .get(..lit.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(lit)),
            _ => self.regex.is_match(text),
        }
    }

    /// Wrap every non-empty match in `text` with `prefix` and `suffix`.
    pub fn highlight(&self, text: &str, prefix: &str, suffix: &str) -> String {
        let mut out = String::with_capacity(text.len() + prefix.len() + suffix.len());
        let mut last = 0;
        for m in self.regex.find_iter(text) {
            if m.as_str().is_empty() {
                continue;
            }
            out.push_str(&text[last..m.start()]);
            out.push_str(prefix);
            out.push_str(m.as_str());
            out.push_str(suffix);
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

/// Translate a wildcard pattern into an (unanchored) expression body.
pub fn wildcard_to_expression(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !is_wildcard(c) {
            literal.push(c);
            continue;
        }
        if !literal.is_empty() {
            out.push_str(&regex::escape(&literal));
            literal.clear();
        }

        let (mut stars, mut pluses, mut singles) = (0usize, 0usize, 0usize);
        let mut count = |w: char| match w {
            '*' => stars += 1,
            '+' => pluses += 1,
            _ => singles += 1,
        };
        count(c);
        while let Some(&next) = chars.peek() {
            if !is_wildcard(next) {
                break;
            }
            count(next);
            chars.next();
        }
        let min = pluses + singles;
        let unbounded = stars > 0 || pluses > 0;
        out.push_str(&repeat_token(min, unbounded));
    }
    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }
    out
}

fn is_wildcard(c: char) -> bool {
    matches!(c, '*' | '+' | '?')
}

fn repeat_token(min: usize, unbounded: bool) -> String {
    match (min, unbounded) {
        (0, _) => format!("{WILDCARD_TOKEN}*"),
        (1, true) => format!("{WILDCARD_TOKEN}+"),
        (1, false) => WILDCARD_TOKEN.to_string(),
        (n, true) => format!("{WILDCARD_TOKEN}{{{n},}}"),
        (n, false) => format!("{WILDCARD_TOKEN}{{{n}}}"),
    }
}

fn build_regex(expression: &str) -> Result<Regex, PatternError> {
    RegexBuilder::new(expression)
        .case_insensitive(true)
        .size_limit(MAX_COMPILED_SIZE)
        .build()
        .map_err(PatternError::from)
}

fn strip_redundant(expression: &str, subject: Subject) -> &str {
    let mut expr = expression;
    for &fragment in subject.trailing_redundant() {
        if let Some(rest) = expr.strip_suffix(fragment) {
            expr = rest;
        }
    }
    for &fragment in subject.leading_redundant() {
        if let Some(rest) = expr.strip_prefix(fragment) {
            expr = rest;
        }
    }
    expr
}

/// True if `expr` ends with an unescaped `$`.
fn ends_with_anchor(expr: &str) -> bool {
    let Some(rest) = expr.strip_suffix('$') else {
        return false;
    };
    let backslashes = rest.chars().rev().take_while(|&c| c == '\\').count();
    backslashes % 2 == 0
}

/// An expression that can only consist of anchors and `.*` matches anything.
fn is_trivial(expr: &str) -> bool {
    let mut rest = expr.strip_prefix('^').unwrap_or(expr);
    if ends_with_anchor(rest) {
        rest = &rest[..rest.len() - 1];
    }
    while let Some(r) = rest.strip_prefix(".*") {
        rest = r;
    }
    rest.is_empty()
}

/// Recover the literal text of an escaped expression body, if it has no
/// regex operators and is pure ASCII.
fn unescape_literal(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next()?;
                if escaped.is_ascii_alphanumeric() {
                    return None;
                }
                out.push(escaped);
            }
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' => {
                return None
            }
            _ => out.push(c),
        }
    }
    out.is_ascii().then_some(out)
}
