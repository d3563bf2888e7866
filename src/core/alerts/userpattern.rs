// Hostmask patterns: `nick`, `user@host` or `nick!user@host`, each section a
// wildcard pattern. Missing sections default to `*`.

use std::fmt;

use super::error::PatternError;
use super::pattern::{wildcard_to_expression, Matcher, Subject};

#[derive(Debug, Clone)]
pub struct UserPattern {
    source: String,
    matcher: Matcher,
}

impl UserPattern {
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let (nick, user, host) = split_sections(text)
            .ok_or_else(|| PatternError::InvalidUserPattern(text.to_string()))?;

        let expression = format!(
            "^{}!{}@{}$",
            section_expression(nick),
            section_expression(user),
            section_expression(host)
        );
        Ok(Self {
            source: text.to_string(),
            matcher: Matcher::from_anchored(&expression, Subject::Hostmask)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn always_matches(&self) -> bool {
        self.matcher.always_matches()
    }

    /// Test a canonical `nick!user@host` string.
    pub fn is_match(&self, hostmask: &str) -> bool {
        self.matcher.is_match(hostmask)
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

impl fmt::Display for UserPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn section_expression(section: &str) -> String {
    if section.is_empty() {
        wildcard_to_expression("*")
    } else {
        wildcard_to_expression(section)
    }
}

/// Split into (nick, user, host). Allows at most one `!` and one `@`, with
/// the `!` first.
fn split_sections(text: &str) -> Option<(&str, &str, &str)> {
    if text.matches('!').count() > 1 || text.matches('@').count() > 1 {
        return None;
    }
    match (text.find('!'), text.find('@')) {
        (None, None) => Some((text, "", "")),
        (Some(bang), None) => Some((&text[..bang], &text[bang + 1..], "")),
        (None, Some(at)) => Some(("", &text[..at], &text[at + 1..])),
        (Some(bang), Some(at)) if bang < at => {
            Some((&text[..bang], &text[bang + 1..at], &text[at + 1..]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::pattern::Strategy;
    use rstest::rstest;

    #[rstest]
    #[case("nick", "nick!user@host", true)]
    #[case("nick", "NICK!other@elsewhere", true)]
    #[case("nick", "nickname!user@host", false)]
    #[case("user@host", "anybody!user@host", true)]
    #[case("user@host", "anybody!other@host", false)]
    #[case("*@*.example.org", "bob!b@irc.example.org", true)]
    #[case("*@*.example.org", "bob!b@example.org", false)]
    #[case("bob!*", "bob!b@h", true)]
    #[case("b?b!*@*", "bab!x@y", true)]
    #[case("b?b!*@*", "bb!x@y", false)]
    fn test_user_pattern_matching(
        #[case] pattern: &str,
        #[case] hostmask: &str,
        #[case] expected: bool,
    ) {
        let compiled = UserPattern::parse(pattern).unwrap();
        assert_eq!(compiled.is_match(hostmask), expected, "{pattern} vs {hostmask}");
    }

    #[rstest]
    #[case("*")]
    #[case("*!*@*")]
    #[case("*@*")]
    #[case("!@")]
    fn test_catch_all_patterns(#[case] pattern: &str) {
        assert!(UserPattern::parse(pattern).unwrap().always_matches());
    }

    #[test]
    fn test_bare_nick_uses_prefix_strategy() {
        let compiled = UserPattern::parse("Bob").unwrap();
        assert_eq!(compiled.matcher().strategy(), Strategy::Prefix);
        assert!(!compiled.always_matches());
    }

    #[rstest]
    #[case("a!b!c")]
    #[case("a@b@c")]
    #[case("a@b!c")]
    fn test_malformed_patterns(#[case] pattern: &str) {
        let err = UserPattern::parse(pattern).unwrap_err();
        assert_eq!(err, PatternError::InvalidUserPattern(pattern.to_string()));
    }
}
