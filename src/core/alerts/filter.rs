// Ordered allow/deny rules over hostmask patterns.
//
// The first rule whose pattern matches decides. When nothing matches, the
// result is the opposite of the last rule's verdict: a list of denies lets
// everyone else through, a list of allows keeps everyone else out.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use super::error::ImportError;
use super::userpattern::UserPattern;

pub const DEFAULT_CACHE_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
pub struct FilterRule {
    pub allow: bool,
    /// `None` matches every candidate.
    pub pattern: Option<UserPattern>,
}

impl FilterRule {
    /// Parse `+pattern` or `-pattern`. An empty pattern, or one that matches
    /// every hostmask, becomes a catch-all.
    pub fn parse(text: &str) -> Result<Self, ImportError> {
        let (allow, rest) = if let Some(rest) = text.strip_prefix('+') {
            (true, rest)
        } else if let Some(rest) = text.strip_prefix('-') {
            (false, rest)
        } else {
            return Err(ImportError::InvalidFilterRule(text.to_string()));
        };
        let pattern = if rest.is_empty() {
            None
        } else {
            Some(UserPattern::parse(rest)?).filter(|p| !p.always_matches())
        };
        Ok(Self { allow, pattern })
    }

    pub fn is_catch_all(&self) -> bool {
        self.pattern.is_none()
    }

    fn matches(&self, hostmask: &str) -> bool {
        self.pattern.as_ref().map_or(true, |p| p.is_match(hostmask))
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.allow { '+' } else { '-' };
        match &self.pattern {
            Some(pattern) => write!(f, "{sign}{pattern}"),
            None => write!(f, "{sign}"),
        }
    }
}

/// Bounded memo of evaluated hostmasks. Oldest entries are evicted first.
#[derive(Debug, Clone)]
struct VerdictCache {
    capacity: usize,
    verdicts: HashMap<String, bool>,
    order: VecDeque<String>,
}

impl VerdictCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            verdicts: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&self, key: &str) -> Option<bool> {
        self.verdicts.get(key).copied()
    }

    fn insert(&mut self, key: &str, verdict: bool) {
        if self.capacity == 0 {
            return;
        }
        if self.verdicts.insert(key.to_string(), verdict).is_some() {
            return;
        }
        self.order.push_back(key.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.verdicts.remove(&oldest);
            }
        }
    }

    fn invalidate(&mut self) {
        self.verdicts.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.verdicts.len()
    }
}

#[derive(Debug, Clone)]
pub struct FilterChain {
    rules: Vec<FilterRule>,
    cache: VerdictCache,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl FilterChain {
    pub fn with_capacity(cache_capacity: usize) -> Self {
        Self {
            rules: Vec::new(),
            cache: VerdictCache::new(cache_capacity),
        }
    }

    /// Build a chain from `+pattern`/`-pattern` strings.
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self, ImportError> {
        let mut chain = Self::default();
        chain.set_rules(
            rules
                .iter()
                .map(|r| FilterRule::parse(r.as_ref()))
                .collect::<Result<Vec<_>, _>>()?,
        );
        Ok(chain)
    }

    /// Resize the verdict cache, dropping what it held.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache = VerdictCache::new(capacity);
    }

    pub fn set_rules(&mut self, rules: Vec<FilterRule>) {
        self.rules = rules;
        self.cache.invalidate();
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.cache.invalidate();
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules as `+pattern`/`-pattern` strings, in order.
    pub fn to_strings(&self) -> Vec<String> {
        self.rules.iter().map(ToString::to_string).collect()
    }

    /// Human-readable form, or `None` for an empty chain.
    pub fn describe(&self) -> Option<String> {
        let last = self.rules.last()?;
        let rules: Vec<String> = self
            .rules
            .iter()
            .map(|rule| {
                let verdict = if rule.allow { "allow" } else { "deny" };
                match &rule.pattern {
                    Some(pattern) => format!("{verdict} {pattern}"),
                    None => format!("{verdict} everyone"),
                }
            })
            .collect();
        let mut text = rules.join(", then ");
        if !last.is_catch_all() {
            let fallback = if last.allow { "deny" } else { "allow" };
            text.push_str(&format!(", otherwise {fallback}"));
        }
        Some(text)
    }

    pub fn evaluate(&mut self, hostmask: &str) -> bool {
        let Some(first) = self.rules.first() else {
            return true;
        };
        if first.is_catch_all() {
            return first.allow;
        }
        if let Some(verdict) = self.cache.get(hostmask) {
            return verdict;
        }
        let verdict = self.evaluate_uncached(hostmask);
        self.cache.insert(hostmask, verdict);
        verdict
    }

    fn evaluate_uncached(&self, hostmask: &str) -> bool {
        for rule in &self.rules {
            if rule.matches(hostmask) {
                return rule.allow;
            }
        }
        // Non-empty: checked by the caller.
        !self.rules.last().map_or(false, |rule| rule.allow)
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

/// Parse a space-separated rule list such as `+alice -*`.
pub fn parse_rule_list(text: &str) -> Result<Vec<FilterRule>, ImportError> {
    text.split_whitespace().map(FilterRule::parse).collect()
}
