// Alert entity: one match rule with its formatting, filters and side effects.
//
// Every mutator keeps the derived state (compiled matcher, wraps, strip mask)
// in step with the settings. Pattern changes compile first and only assign on
// success, so a bad pattern leaves the previous state untouched.

use std::fmt;

use crate::core::irc::{self, ColorPair, StripMask};
use crate::core::sound::Sound;

use super::error::PatternError;
use super::filter::{FilterChain, FilterRule};
use super::format::{self, FormatSpec, Wraps};
use super::pattern::Matcher;
use super::registry::RegistryId;

/// Window name used when copying is switched on without a destination.
pub const DEFAULT_COPY_WINDOW: &str = ">>alerts<<";

/// Scope of a text decoration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Decoration {
    #[default]
    Off,
    /// Decorates the matched text.
    On,
    /// Decorates the whole line.
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    Bold,
    Italic,
    Underline,
    Reverse,
}

impl DecorationKind {
    pub fn all() -> &'static [DecorationKind] {
        &[Self::Bold, Self::Italic, Self::Underline, Self::Reverse]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Reverse => "reverse",
        }
    }
}

/// Whether to switch to the window that received a triggering line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Focus {
    #[default]
    Off,
    /// Only when the focused input box is empty.
    On,
    /// Even when the user is typing.
    Force,
}

/// How an alert matches incoming text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSource {
    /// Wildcard pattern (`*`, `+`, `?`).
    Pattern(String),
    /// Regular expression used as-is.
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyTarget {
    /// Copy to [`DEFAULT_COPY_WINDOW`].
    Default,
    Window(String),
}

impl CopyTarget {
    pub fn window(&self) -> &str {
        match self {
            Self::Default => DEFAULT_COPY_WINDOW,
            Self::Window(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    name: String,
    source: MatchSource,
    word: bool,
    format: FormatSpec,
    focus: Focus,
    mute: bool,
    enabled: bool,
    notify: bool,
    flash: bool,
    sound: Option<Sound>,
    copy: Option<CopyTarget>,
    nick_filter: FilterChain,
    /// Stored and editable; not consulted when matching yet.
    channel_filter: FilterChain,

    matcher: Matcher,
    wraps: Wraps,

    pub(super) owner: Option<RegistryId>,
}

impl Alert {
    /// A new alert whose pattern is its own name, matched on word boundaries.
    pub fn new(name: &str) -> Result<Self, PatternError> {
        let matcher = Matcher::compile_wildcard(name, true)?;
        Ok(Self {
            name: name.to_string(),
            source: MatchSource::Pattern(name.to_string()),
            word: true,
            format: FormatSpec::default(),
            focus: Focus::Off,
            mute: false,
            enabled: true,
            notify: false,
            flash: false,
            sound: None,
            copy: None,
            nick_filter: FilterChain::default(),
            channel_filter: FilterChain::default(),
            matcher,
            wraps: Wraps::default(),
            owner: None,
        })
    }

    /// Copy every setting into a new, unregistered alert named `name` whose
    /// pattern is `name`.
    pub fn duplicate(&self, name: &str) -> Result<Self, PatternError> {
        let matcher = Matcher::compile_wildcard(name, self.word)?;
        let mut copy = self.clone();
        copy.name = name.to_string();
        copy.source = MatchSource::Pattern(name.to_string());
        copy.matcher = matcher;
        copy.owner = None;
        Ok(copy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn is_member(&self) -> bool {
        self.owner.is_some()
    }

    pub fn source(&self) -> &MatchSource {
        &self.source
    }

    /// The wildcard pattern, if this alert is in pattern mode.
    pub fn pattern(&self) -> Option<&str> {
        match &self.source {
            MatchSource::Pattern(pattern) => Some(pattern),
            MatchSource::Regex(_) => None,
        }
    }

    /// The expression actually matched: the user's regex, or the one
    /// compiled from the pattern.
    pub fn expression(&self) -> &str {
        match &self.source {
            MatchSource::Regex(regex) => regex,
            MatchSource::Pattern(_) => self.matcher.expression(),
        }
    }

    pub fn uses_pattern(&self) -> bool {
        matches!(self.source, MatchSource::Pattern(_))
    }

    pub fn set_pattern(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.matcher = Matcher::compile_wildcard(pattern, self.word)?;
        self.source = MatchSource::Pattern(pattern.to_string());
        Ok(())
    }

    pub fn set_regex(&mut self, expression: &str) -> Result<(), PatternError> {
        self.matcher = Matcher::compile_raw(expression)?;
        self.source = MatchSource::Regex(expression.to_string());
        Ok(())
    }

    pub fn word(&self) -> bool {
        self.word
    }

    /// Word matching only affects pattern mode; the flag is kept either way.
    pub fn set_word(&mut self, word: bool) -> Result<(), PatternError> {
        if let MatchSource::Pattern(pattern) = &self.source {
            self.matcher = Matcher::compile_wildcard(pattern, word)?;
        }
        self.word = word;
        Ok(())
    }

    pub fn decoration(&self, kind: DecorationKind) -> Decoration {
        match kind {
            DecorationKind::Bold => self.format.bold,
            DecorationKind::Italic => self.format.italic,
            DecorationKind::Underline => self.format.underline,
            DecorationKind::Reverse => self.format.reverse,
        }
    }

    pub fn set_decoration(&mut self, kind: DecorationKind, value: Decoration) {
        let slot = match kind {
            DecorationKind::Bold => &mut self.format.bold,
            DecorationKind::Italic => &mut self.format.italic,
            DecorationKind::Underline => &mut self.format.underline,
            DecorationKind::Reverse => &mut self.format.reverse,
        };
        *slot = value;
        self.recompute();
    }

    pub fn color(&self) -> Option<ColorPair> {
        self.format.color
    }

    pub fn set_color(&mut self, color: Option<ColorPair>) {
        self.format.color = color.filter(|c| !c.is_unset());
        self.recompute();
    }

    pub fn line_color(&self) -> Option<ColorPair> {
        self.format.line_color
    }

    pub fn set_line_color(&mut self, color: Option<ColorPair>) {
        self.format.line_color = color.filter(|c| !c.is_unset());
        self.recompute();
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn notify(&self) -> bool {
        self.notify
    }

    pub fn set_notify(&mut self, notify: bool) {
        self.notify = notify;
    }

    pub fn flash(&self) -> bool {
        self.flash
    }

    pub fn set_flash(&mut self, flash: bool) {
        self.flash = flash;
    }

    pub fn sound(&self) -> Option<&Sound> {
        self.sound.as_ref()
    }

    pub fn set_sound(&mut self, sound: Option<Sound>) {
        self.sound = sound;
    }

    pub fn copy(&self) -> Option<&CopyTarget> {
        self.copy.as_ref()
    }

    pub fn set_copy(&mut self, copy: Option<CopyTarget>) {
        self.copy = copy;
    }

    pub fn nick_filter(&self) -> &FilterChain {
        &self.nick_filter
    }

    pub fn set_nick_filter(&mut self, rules: Vec<FilterRule>) {
        self.nick_filter.set_rules(rules);
    }

    pub fn channel_filter(&self) -> &FilterChain {
        &self.channel_filter
    }

    pub fn set_channel_filter(&mut self, rules: Vec<FilterRule>) {
        self.channel_filter.set_rules(rules);
    }

    /// Resize the memo behind both filters.
    pub fn set_filter_cache_capacity(&mut self, capacity: usize) {
        self.nick_filter.set_cache_capacity(capacity);
        self.channel_filter.set_cache_capacity(capacity);
    }

    /// Recalculate the wrap sequences and strip mask from the formatting
    /// settings. Safe to call any number of times.
    pub fn recompute(&mut self) {
        self.wraps = format::compute(&self.format);
    }

    pub fn format_spec(&self) -> &FormatSpec {
        &self.format
    }

    pub fn wraps(&self) -> &Wraps {
        &self.wraps
    }

    pub fn strip_mask(&self) -> StripMask {
        self.wraps.strip
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Test incoming text. Patterns see the text without control codes,
    /// regexes see it as received.
    pub fn is_match(&self, raw: &str, stripped: &str) -> bool {
        let text = if self.uses_pattern() { stripped } else { raw };
        self.matcher.is_match(text)
    }

    /// Whether the sender passes the nickname filter.
    pub fn admits(&mut self, hostmask: &str) -> bool {
        self.nick_filter.evaluate(hostmask)
    }

    /// Re-render a message: strip what the line formatting replaces,
    /// highlight the match, then wrap the line.
    pub fn render_text(&self, raw: &str) -> String {
        let mut text = if self.wraps.strip.is_empty() {
            raw.to_string()
        } else {
            irc::strip(raw, self.wraps.strip)
        };
        if let Some(wrap) = &self.wraps.matched {
            text = self.matcher.highlight(&text, &wrap.prefix, &wrap.suffix);
        }
        self.wrap_line(&text)
    }

    /// Apply only the line wrap (used for the sender's nickname).
    pub fn wrap_line(&self, text: &str) -> String {
        match &self.wraps.line {
            Some(wrap) => wrap.apply(text),
            None => text.to_string(),
        }
    }

    /// Sample line showing the alert's formatting.
    pub fn preview(&self) -> String {
        let mut inner = String::from("(Matching portion)");
        if let Some(wrap) = &self.wraps.matched {
            inner = wrap.apply(&inner);
        }
        self.wrap_line(&format!("Preview of alert formatting {inner}"))
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alert '{}'", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::irc::{BOLD, RESET};

    #[test]
    fn test_new_alert_defaults() {
        let alert = Alert::new("fire").unwrap();
        assert_eq!(alert.pattern(), Some("fire"));
        assert!(alert.word());
        assert!(alert.enabled());
        assert!(!alert.mute());
        assert!(alert.sound().is_none());
        assert!(alert.copy().is_none());
        assert!(alert.nick_filter().is_empty());
        assert!(!alert.is_member());
        assert_eq!(alert.expression(), r"\bfire\b");
    }

    #[test]
    fn test_bad_regex_keeps_previous_state() {
        let mut alert = Alert::new("fire").unwrap();
        assert!(alert.set_regex("(oops").is_err());
        assert_eq!(alert.pattern(), Some("fire"));
        assert!(alert.is_match("Fire!", "Fire!"));
    }

    #[test]
    fn test_regex_replaces_pattern_and_back() {
        let mut alert = Alert::new("fire").unwrap();
        alert.set_regex(r"wat(er)?").unwrap();
        assert!(alert.pattern().is_none());
        assert_eq!(alert.expression(), "wat(er)?");
        assert!(alert.is_match("Water", "Water"));

        alert.set_pattern("ice").unwrap();
        assert_eq!(alert.source(), &MatchSource::Pattern("ice".into()));
        assert!(!alert.is_match("Water", "Water"));
    }

    #[test]
    fn test_word_toggle_recompiles_pattern() {
        let mut alert = Alert::new("Jon").unwrap();
        assert!(!alert.is_match("Jonathan", "Jonathan"));
        alert.set_word(false).unwrap();
        assert!(alert.is_match("Jonathan", "Jonathan"));
    }

    #[test]
    fn test_pattern_sees_stripped_text_regex_sees_raw() {
        let mut alert = Alert::new("fire").unwrap();
        let raw = "\x02fi\x02re";
        assert!(alert.is_match(raw, "fire"));

        alert.set_regex("fire").unwrap();
        assert!(!alert.is_match(raw, "fire"));
    }

    #[test]
    fn test_render_match_and_line() {
        let mut alert = Alert::new("fire").unwrap();
        alert.set_decoration(DecorationKind::Bold, Decoration::On);
        assert_eq!(
            alert.render_text("fire in the hole"),
            format!("{BOLD}fire{BOLD} in the hole")
        );

        alert.set_decoration(DecorationKind::Bold, Decoration::Line);
        assert_eq!(
            alert.render_text("\x1dfire\x1d in the hole"),
            format!("{BOLD}fire in the hole{RESET}")
        );
        assert_eq!(alert.wrap_line("Bob"), format!("{BOLD}Bob{RESET}"));
    }

    #[test]
    fn test_match_split_by_codes_fires_without_highlight() {
        let mut alert = Alert::new("fire").unwrap();
        alert.set_decoration(DecorationKind::Underline, Decoration::On);
        let raw = "the \x02fi\x02re is here";
        assert!(alert.strip_mask().is_empty());
        assert!(alert.is_match(raw, "the fire is here"));
        // Highlighting runs on the text as received, where the codes split the word.
        assert_eq!(alert.render_text(raw), raw);
    }

    #[test]
    fn test_unset_color_pair_is_cleared() {
        let mut alert = Alert::new("x").unwrap();
        alert.set_color(Some(ColorPair::default()));
        assert!(alert.color().is_none());
        assert!(alert.wraps().matched.is_none());
    }

    #[test]
    fn test_duplicate_takes_new_pattern() {
        let mut alert = Alert::new("fire").unwrap();
        alert.set_flash(true);
        alert.set_regex("blaze").unwrap();
        alert.owner = Some(RegistryId::next());

        let copy = alert.duplicate("smoke").unwrap();
        assert_eq!(copy.name(), "smoke");
        assert_eq!(copy.pattern(), Some("smoke"));
        assert!(copy.flash());
        assert!(!copy.is_member());
    }

    #[test]
    fn test_preview() {
        let mut alert = Alert::new("x").unwrap();
        assert_eq!(
            alert.preview(),
            "Preview of alert formatting (Matching portion)"
        );
        alert.set_decoration(DecorationKind::Underline, Decoration::On);
        assert!(alert.preview().contains("\x1f(Matching portion)\x1f"));
    }

    #[test]
    fn test_copy_target_window() {
        assert_eq!(CopyTarget::Default.window(), DEFAULT_COPY_WINDOW);
        assert_eq!(CopyTarget::Window("#log".into()).window(), "#log");
    }
}
