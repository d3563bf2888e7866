// Named alert settings.
//
// Each Setting kind has a typed getter (`get`) and setter (`apply`) plus a
// text parser (`parse_value`), so command layers can "set any named
// attribute" without reflection. Invalid values never reach the alert.

use std::fmt;

use crate::core::irc::{self, ColorPair, MAX_COLOR, MIN_COLOR};
use crate::core::sound::{Sound, SoundResolver};

use super::error::SettingError;
use super::filter::{self, FilterRule};
use super::model::{Alert, CopyTarget, Decoration, DecorationKind, Focus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Word,
    Mute,
    Enabled,
    Notify,
    Flash,
    Bold,
    Italic,
    Underline,
    Reverse,
    Focus,
    Color,
    LineColor,
    Copy,
    Pattern,
    Regex,
    Sound,
    NickFilter,
}

impl Setting {
    pub fn all() -> &'static [Setting] {
        &[
            Self::Sound,
            Self::Pattern,
            Self::Regex,
            Self::Bold,
            Self::Italic,
            Self::Underline,
            Self::Reverse,
            Self::Focus,
            Self::Word,
            Self::Mute,
            Self::Enabled,
            Self::Notify,
            Self::Flash,
            Self::Color,
            Self::LineColor,
            Self::Copy,
            Self::NickFilter,
        ]
    }

    pub fn parse(name: &str) -> Result<Self, SettingError> {
        let lowered = name.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|setting| setting.name() == lowered)
            .ok_or_else(|| SettingError::UnknownSetting(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Mute => "mute",
            Self::Enabled => "enabled",
            Self::Notify => "notify",
            Self::Flash => "flash",
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Reverse => "reverse",
            Self::Focus => "focus",
            Self::Color => "color",
            Self::LineColor => "linecolor",
            Self::Copy => "copy",
            Self::Pattern => "pattern",
            Self::Regex => "regex",
            Self::Sound => "sound",
            Self::NickFilter => "nickfilter",
        }
    }

    /// Pattern and regex have no off state.
    pub fn is_clearable(self) -> bool {
        !matches!(self, Self::Pattern | Self::Regex)
    }

    /// Settings whose value is the rest of the command line, spaces included.
    pub fn takes_rest_of_line(self) -> bool {
        matches!(
            self,
            Self::Pattern | Self::Regex | Self::Sound | Self::NickFilter
        )
    }

    fn decoration_kind(self) -> Option<DecorationKind> {
        match self {
            Self::Bold => Some(DecorationKind::Bold),
            Self::Italic => Some(DecorationKind::Italic),
            Self::Underline => Some(DecorationKind::Underline),
            Self::Reverse => Some(DecorationKind::Reverse),
            _ => None,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed setting value.
#[derive(Debug, Clone)]
pub enum SettingValue {
    Bool(bool),
    Decoration(Decoration),
    Focus(Focus),
    Color(Option<ColorPair>),
    Copy(Option<CopyTarget>),
    Pattern(String),
    /// `None` when the alert is in pattern mode.
    Regex(Option<String>),
    Sound(Option<Sound>),
    NickFilter(Vec<FilterRule>),
}

const OFF_WORDS: &[&str] = &["off", "f", "false", "none"];

pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "0" | "off" | "f" | "false" => Some(false),
        "1" | "on" | "t" | "true" => Some(true),
        _ => None,
    }
}

pub fn parse_decoration(text: &str) -> Option<Decoration> {
    if text.trim().eq_ignore_ascii_case("line") {
        return Some(Decoration::Line);
    }
    parse_bool(text).map(|on| if on { Decoration::On } else { Decoration::Off })
}

pub fn parse_focus(text: &str) -> Option<Focus> {
    if text.trim().eq_ignore_ascii_case("force") {
        return Some(Focus::Force);
    }
    parse_bool(text).map(|on| if on { Focus::On } else { Focus::Off })
}

fn is_off_word(text: &str) -> bool {
    OFF_WORDS.contains(&text.trim().to_lowercase().as_str())
}

fn invalid(setting: Setting, expected: impl Into<String>) -> SettingError {
    SettingError::InvalidValue {
        setting: setting.name(),
        expected: expected.into(),
    }
}

/// Parse `text` into a value for `setting`.
pub fn parse_value(
    setting: Setting,
    text: &str,
    sounds: &SoundResolver,
) -> Result<SettingValue, SettingError> {
    let value = match setting {
        Setting::Word | Setting::Mute | Setting::Enabled | Setting::Notify | Setting::Flash => {
            SettingValue::Bool(parse_bool(text).ok_or_else(|| invalid(setting, "one of (ON|OFF)"))?)
        }
        Setting::Bold | Setting::Italic | Setting::Underline | Setting::Reverse => {
            SettingValue::Decoration(
                parse_decoration(text).ok_or_else(|| invalid(setting, "one of (ON|OFF|LINE)"))?,
            )
        }
        Setting::Focus => SettingValue::Focus(
            parse_focus(text).ok_or_else(|| invalid(setting, "one of (ON|OFF|FORCE)"))?,
        ),
        Setting::Color | Setting::LineColor => {
            if is_off_word(text) {
                SettingValue::Color(None)
            } else {
                let color = ColorPair::parse_with(text, ',').map_err(|_| {
                    invalid(
                        setting,
                        format!(
                            "one or two comma-separated integers between {MIN_COLOR} and {MAX_COLOR} or OFF"
                        ),
                    )
                })?;
                SettingValue::Color(color)
            }
        }
        Setting::Copy => SettingValue::Copy(match parse_bool(text) {
            Some(true) => Some(CopyTarget::Default),
            Some(false) => None,
            None => Some(CopyTarget::Window(text.trim().to_string())),
        }),
        Setting::Pattern => SettingValue::Pattern(text.to_string()),
        Setting::Regex => SettingValue::Regex(Some(text.to_string())),
        Setting::Sound => SettingValue::Sound(if is_off_word(text) {
            None
        } else {
            Some(sounds.resolve(text.trim()))
        }),
        Setting::NickFilter => SettingValue::NickFilter(if is_off_word(text) {
            Vec::new()
        } else {
            filter::parse_rule_list(text).map_err(|err| invalid(setting, err.to_string()))?
        }),
    };
    Ok(value)
}

pub fn get(alert: &Alert, setting: Setting) -> SettingValue {
    match setting {
        Setting::Word => SettingValue::Bool(alert.word()),
        Setting::Mute => SettingValue::Bool(alert.mute()),
        Setting::Enabled => SettingValue::Bool(alert.enabled()),
        Setting::Notify => SettingValue::Bool(alert.notify()),
        Setting::Flash => SettingValue::Bool(alert.flash()),
        Setting::Bold => SettingValue::Decoration(alert.decoration(DecorationKind::Bold)),
        Setting::Italic => SettingValue::Decoration(alert.decoration(DecorationKind::Italic)),
        Setting::Underline => SettingValue::Decoration(alert.decoration(DecorationKind::Underline)),
        Setting::Reverse => SettingValue::Decoration(alert.decoration(DecorationKind::Reverse)),
        Setting::Focus => SettingValue::Focus(alert.focus()),
        Setting::Color => SettingValue::Color(alert.color()),
        Setting::LineColor => SettingValue::Color(alert.line_color()),
        Setting::Copy => SettingValue::Copy(alert.copy().cloned()),
        Setting::Pattern => SettingValue::Pattern(alert.pattern().unwrap_or_default().to_string()),
        Setting::Regex => {
            SettingValue::Regex((!alert.uses_pattern()).then(|| alert.expression().to_string()))
        }
        Setting::Sound => SettingValue::Sound(alert.sound().cloned()),
        Setting::NickFilter => SettingValue::NickFilter(alert.nick_filter().rules().to_vec()),
    }
}

/// Store a typed value. A value of the wrong shape for `setting` is rejected.
pub fn apply(alert: &mut Alert, setting: Setting, value: SettingValue) -> Result<(), SettingError> {
    match (setting, value) {
        (Setting::Word, SettingValue::Bool(on)) => alert.set_word(on)?,
        (Setting::Mute, SettingValue::Bool(on)) => alert.set_mute(on),
        (Setting::Enabled, SettingValue::Bool(on)) => alert.set_enabled(on),
        (Setting::Notify, SettingValue::Bool(on)) => alert.set_notify(on),
        (Setting::Flash, SettingValue::Bool(on)) => alert.set_flash(on),
        (Setting::Focus, SettingValue::Focus(focus)) => alert.set_focus(focus),
        (Setting::Color, SettingValue::Color(color)) => alert.set_color(color),
        (Setting::LineColor, SettingValue::Color(color)) => alert.set_line_color(color),
        (Setting::Copy, SettingValue::Copy(copy)) => alert.set_copy(copy),
        (Setting::Pattern, SettingValue::Pattern(pattern)) => alert.set_pattern(&pattern)?,
        (Setting::Regex, SettingValue::Regex(Some(regex))) => alert.set_regex(&regex)?,
        (Setting::Sound, SettingValue::Sound(sound)) => alert.set_sound(sound),
        (Setting::NickFilter, SettingValue::NickFilter(rules)) => alert.set_nick_filter(rules),
        (setting, SettingValue::Decoration(decoration)) => match setting.decoration_kind() {
            Some(kind) => alert.set_decoration(kind, decoration),
            None => return Err(invalid(setting, "a value of the matching kind")),
        },
        (setting, _) => return Err(invalid(setting, "a value of the matching kind")),
    }
    Ok(())
}

/// Parse and store `text`, returning the confirmation line.
pub fn set(
    alert: &mut Alert,
    setting: Setting,
    text: &str,
    sounds: &SoundResolver,
) -> Result<String, SettingError> {
    let value = parse_value(setting, text, sounds)?;
    apply(alert, setting, value)?;
    Ok(describe(alert, setting, "set to"))
}

/// Switch a setting off. Pattern and regex have no off state.
pub fn clear(alert: &mut Alert, setting: Setting) -> Result<String, SettingError> {
    let value = match setting {
        Setting::Pattern | Setting::Regex => return Err(SettingError::NotClearable(setting.name())),
        Setting::Word | Setting::Mute | Setting::Enabled | Setting::Notify | Setting::Flash => {
            SettingValue::Bool(false)
        }
        Setting::Bold | Setting::Italic | Setting::Underline | Setting::Reverse => {
            SettingValue::Decoration(Decoration::Off)
        }
        Setting::Focus => SettingValue::Focus(Focus::Off),
        Setting::Color | Setting::LineColor => SettingValue::Color(None),
        Setting::Copy => SettingValue::Copy(None),
        Setting::Sound => SettingValue::Sound(None),
        Setting::NickFilter => SettingValue::NickFilter(Vec::new()),
    };
    apply(alert, setting, value)?;
    Ok(describe(alert, setting, "set to"))
}

/// One line describing the current value.
pub fn show(alert: &Alert, setting: Setting) -> String {
    describe(alert, setting, "is")
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn decoration_text(decoration: Decoration) -> &'static str {
    match decoration {
        Decoration::Off => "off",
        Decoration::On => "on",
        Decoration::Line => "line",
    }
}

fn focus_text(focus: Focus) -> &'static str {
    match focus {
        Focus::Off => "off",
        Focus::On => "on",
        Focus::Force => "force",
    }
}

fn describe(alert: &Alert, setting: Setting, action: &str) -> String {
    let name = setting.name();
    match get(alert, setting) {
        SettingValue::Bool(on) => format!("{name} {action} '{}'", on_off(on)),
        SettingValue::Decoration(decoration) => {
            format!("{name} {action} '{}'", decoration_text(decoration))
        }
        SettingValue::Focus(focus) => format!("{name} {action} '{}'", focus_text(focus)),
        SettingValue::Color(color) => {
            let text = color.map_or_else(|| "not set".to_string(), |c| c.to_string());
            format!("{name} {action} '{text}'")
        }
        SettingValue::Copy(Some(target)) => {
            format!("copy {action} on (copying to '{}')", target.window())
        }
        SettingValue::Copy(None) => format!("copy {action} off"),
        SettingValue::Pattern(pattern) => match alert.pattern() {
            Some(_) => format!(
                "pattern {action} '{pattern}' (word matching is {})",
                on_off(alert.word())
            ),
            None => "alert does not use a pattern".to_string(),
        },
        SettingValue::Regex(Some(regex)) => format!("regex {action} '{regex}'"),
        SettingValue::Regex(None) => format!(
            "regex is '{}' (derived from pattern: '{}')",
            alert.expression(),
            alert.pattern().unwrap_or_default()
        ),
        SettingValue::Sound(Some(sound)) => match &sound.path {
            Some(path) => format!("sound {action} {} (found at {})", sound.name, path.display()),
            None => format!(
                "sound {action} {} {}",
                sound.name,
                irc::bold("(file not found in search path)")
            ),
        },
        SettingValue::Sound(None) => format!("sound {action} off"),
        SettingValue::NickFilter(_) => match alert.nick_filter().describe() {
            Some(text) => format!("nickfilter {action} '{text}'"),
            None => format!("nickfilter {action} off"),
        },
    }
}

/// Commands that recreate `alert`, listing only settings that differ from
/// a fresh alert's.
pub fn dump(alert: &Alert) -> Vec<String> {
    let name = alert.name();
    let mut lines = vec![format!("/alerts add {name}")];
    let mut settings: Vec<String> = Vec::new();

    match alert.pattern() {
        Some(pattern) => {
            if pattern != name {
                lines.push(format!("/alerts pattern {name} {pattern}"));
            }
            if !alert.word() {
                settings.push("word off".to_string());
            }
        }
        None => lines.push(format!("/alerts regex {name} {}", alert.expression())),
    }

    for &kind in DecorationKind::all() {
        let decoration = alert.decoration(kind);
        if decoration != Decoration::Off {
            settings.push(format!("{} {}", kind.name(), decoration_text(decoration)));
        }
    }
    if alert.focus() != Focus::Off {
        settings.push(format!("focus {}", focus_text(alert.focus())));
    }
    for (setting, on, default) in [
        (Setting::Mute, alert.mute(), false),
        (Setting::Enabled, alert.enabled(), true),
        (Setting::Notify, alert.notify(), false),
        (Setting::Flash, alert.flash(), false),
    ] {
        if on != default {
            settings.push(format!("{setting} {}", on_off(on)));
        }
    }
    if let Some(color) = alert.color() {
        settings.push(format!("color {color}"));
    }
    if let Some(color) = alert.line_color() {
        settings.push(format!("linecolor {color}"));
    }
    if let Some(target) = alert.copy() {
        match target {
            CopyTarget::Default => settings.push("copy on".to_string()),
            CopyTarget::Window(window) => settings.push(format!("copy {window}")),
        }
    }
    // Rest-of-line values must come last.
    if let Some(sound) = alert.sound() {
        settings.push(format!("sound {}", sound.name));
    }

    if !settings.is_empty() {
        lines.push(format!("/alerts set {name} {}", settings.join(" ")));
    }
    if !alert.nick_filter().is_empty() {
        lines.push(format!(
            "/alerts set {name} nickfilter {}",
            alert.nick_filter().to_strings().join(" ")
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    fn alert() -> Alert {
        Alert::new("fire").unwrap()
    }

    #[rstest]
    #[case("on", Some(true))]
    #[case("TRUE", Some(true))]
    #[case(" t ", Some(true))]
    #[case("1", Some(true))]
    #[case("off", Some(false))]
    #[case("F", Some(false))]
    #[case("0", Some(false))]
    #[case("false", Some(false))]
    #[case("yes", None)]
    #[case("", None)]
    fn test_parse_bool(#[case] text: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_bool(text), expected);
    }

    #[test]
    fn test_setting_names_round_trip() {
        for &setting in Setting::all() {
            assert_eq!(Setting::parse(setting.name()).unwrap(), setting);
        }
        assert_eq!(Setting::parse("LineColor").unwrap(), Setting::LineColor);
        assert_eq!(
            Setting::parse("volume").unwrap_err(),
            SettingError::UnknownSetting("volume".into())
        );
    }

    #[test]
    fn test_tristates() {
        let sounds = SoundResolver::default();
        let mut alert = alert();
        assert_eq!(
            set(&mut alert, Setting::Bold, "line", &sounds).unwrap(),
            "bold set to 'line'"
        );
        assert_eq!(alert.decoration(DecorationKind::Bold), Decoration::Line);
        assert!(alert.wraps().line.is_some());

        set(&mut alert, Setting::Focus, "FORCE", &sounds).unwrap();
        assert_eq!(alert.focus(), Focus::Force);
        assert_eq!(show(&alert, Setting::Focus), "focus is 'force'");

        let err = set(&mut alert, Setting::Italic, "force", &sounds).unwrap_err();
        assert!(err.to_string().contains("(ON|OFF|LINE)"));
        assert_eq!(alert.decoration(DecorationKind::Italic), Decoration::Off);
    }

    #[test]
    fn test_colors() {
        let sounds = SoundResolver::default();
        let mut alert = alert();
        set(&mut alert, Setting::Color, "4,1", &sounds).unwrap();
        assert_eq!(alert.color(), Some(ColorPair::new(Some(4), Some(1))));
        assert_eq!(show(&alert, Setting::Color), "color is '4,1'");

        assert!(set(&mut alert, Setting::Color, "100", &sounds).is_err());
        assert_eq!(alert.color(), Some(ColorPair::new(Some(4), Some(1))));

        set(&mut alert, Setting::Color, "none", &sounds).unwrap();
        assert!(alert.color().is_none());
        assert_eq!(show(&alert, Setting::LineColor), "linecolor is 'not set'");
    }

    #[test]
    fn test_copy_values() {
        let sounds = SoundResolver::default();
        let mut alert = alert();
        set(&mut alert, Setting::Copy, "on", &sounds).unwrap();
        assert_eq!(alert.copy(), Some(&CopyTarget::Default));
        set(&mut alert, Setting::Copy, "#log", &sounds).unwrap();
        assert_eq!(
            show(&alert, Setting::Copy),
            "copy is on (copying to '#log')"
        );
        clear(&mut alert, Setting::Copy).unwrap();
        assert!(alert.copy().is_none());
    }

    #[test]
    fn test_pattern_and_regex_are_exclusive() {
        let sounds = SoundResolver::default();
        let mut alert = alert();
        set(&mut alert, Setting::Regex, "fire|smoke", &sounds).unwrap();
        assert!(alert.pattern().is_none());
        assert_eq!(show(&alert, Setting::Regex), "regex is 'fire|smoke'");
        assert_eq!(show(&alert, Setting::Pattern), "alert does not use a pattern");

        set(&mut alert, Setting::Pattern, "big fire", &sounds).unwrap();
        assert_eq!(alert.pattern(), Some("big fire"));
        assert_eq!(
            show(&alert, Setting::Regex),
            r"regex is '\bbig fire\b' (derived from pattern: 'big fire')"
        );

        assert!(matches!(
            set(&mut alert, Setting::Regex, "(bad", &sounds),
            Err(SettingError::Pattern(_))
        ));
        assert_eq!(alert.pattern(), Some("big fire"));
        assert_eq!(
            clear(&mut alert, Setting::Pattern).unwrap_err(),
            SettingError::NotClearable("pattern")
        );
    }

    #[test]
    fn test_sound_resolution() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bell.wav"), b"RIFF").unwrap();
        let sounds = SoundResolver::new(vec![dir.path().to_path_buf()]);

        let mut alert = alert();
        let line = set(&mut alert, Setting::Sound, "bell", &sounds).unwrap();
        assert!(line.contains("found at"));
        assert!(alert.sound().unwrap().is_found());

        let line = set(&mut alert, Setting::Sound, "missing", &sounds).unwrap();
        assert!(line.contains("not found"));
        assert!(!alert.sound().unwrap().is_found());

        set(&mut alert, Setting::Sound, "off", &sounds).unwrap();
        assert!(alert.sound().is_none());
    }

    #[test]
    fn test_nick_filter_setting() {
        let sounds = SoundResolver::default();
        let mut alert = alert();
        let line = set(&mut alert, Setting::NickFilter, "+alice -*", &sounds).unwrap();
        assert_eq!(line, "nickfilter set to 'allow alice, then deny everyone'");
        assert!(alert.admits("alice!a@b"));
        assert!(!alert.admits("bob!a@b"));

        assert!(set(&mut alert, Setting::NickFilter, "alice", &sounds).is_err());
        assert_eq!(alert.nick_filter().rules().len(), 2);

        clear(&mut alert, Setting::NickFilter).unwrap();
        assert!(alert.nick_filter().is_empty());
    }

    #[test]
    fn test_apply_rejects_mismatched_value() {
        let mut alert = alert();
        assert!(apply(&mut alert, Setting::Mute, SettingValue::Focus(Focus::On)).is_err());
        assert!(!alert.mute());
    }

    #[test]
    fn test_dump_lists_only_changes() {
        let sounds = SoundResolver::default();
        let mut alert = alert();
        assert_eq!(dump(&alert), vec!["/alerts add fire"]);

        set(&mut alert, Setting::Pattern, "fire*", &sounds).unwrap();
        set(&mut alert, Setting::Word, "off", &sounds).unwrap();
        set(&mut alert, Setting::Bold, "on", &sounds).unwrap();
        set(&mut alert, Setting::Enabled, "off", &sounds).unwrap();
        set(&mut alert, Setting::LineColor, "3", &sounds).unwrap();
        set(&mut alert, Setting::NickFilter, "-bot*", &sounds).unwrap();
        assert_eq!(
            dump(&alert),
            vec![
                "/alerts add fire",
                "/alerts pattern fire fire*",
                "/alerts set fire word off bold on enabled off linecolor 3",
                "/alerts set fire nickfilter -bot*",
            ]
        );
    }
}
