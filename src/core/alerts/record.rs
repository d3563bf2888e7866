// Persisted alert records.
//
// One alert is a JSON object with single-letter keys:
//   n  name
//   f  flag letters, then `,fg;bg,fg;bg` for match and line color
//   p  wildcard pattern, only when it differs from the name
//   r  regular expression, only in regex mode
//   s  sound reference
//   c  copy target: "on" or a window name
//   N  nick filter rules as "+pattern" / "-pattern"
// A collection is an array of records, or a bare record when there is one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::irc::ColorPair;
use crate::core::sound::SoundResolver;

use super::error::ImportError;
use super::filter::FilterRule;
use super::model::{Alert, CopyTarget, Decoration, DecorationKind, Focus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<String>,
    #[serde(rename = "N", default, skip_serializing_if = "Vec::is_empty")]
    pub nick_filter: Vec<String>,
}

/// Flag letters in export order.
const FLAG_LETTERS: [char; 10] = ['b', 'e', 'f', 'g', 'i', 'm', 'n', 'r', 'u', 'w'];

const COPY_ON: &str = "on";

impl AlertRecord {
    pub fn from_alert(alert: &Alert) -> Self {
        let pattern = alert
            .pattern()
            .filter(|pattern| *pattern != alert.name())
            .map(str::to_string);
        let regex = (!alert.uses_pattern()).then(|| alert.expression().to_string());

        Self {
            name: alert.name().to_string(),
            flags: Some(encode_flags(alert)),
            pattern,
            regex,
            sound: alert.sound().map(|sound| sound.name.clone()),
            copy: alert.copy().map(|target| match target {
                CopyTarget::Default => COPY_ON.to_string(),
                CopyTarget::Window(window) => window.clone(),
            }),
            nick_filter: alert.nick_filter().to_strings(),
        }
    }

    /// Validate a loosely-typed record.
    pub fn from_value(value: Value) -> Result<Self, ImportError> {
        let Value::Object(map) = &value else {
            return Err(ImportError::NotARecord);
        };
        if !matches!(map.get("n"), Some(Value::String(_))) {
            return Err(ImportError::MissingName);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Build an unregistered alert. Any invalid field fails the whole record.
    pub fn into_alert(self, sounds: &SoundResolver) -> Result<Alert, ImportError> {
        let mut alert = Alert::new(&self.name)?;

        if let Some(flags) = &self.flags {
            apply_flags(&mut alert, flags)?;
        }

        if let Some(pattern) = &self.pattern {
            alert.set_pattern(pattern)?;
        } else if let Some(regex) = &self.regex {
            alert.set_regex(regex)?;
        }

        if let Some(sound) = &self.sound {
            alert.set_sound(Some(sounds.resolve(sound)));
        }

        alert.set_copy(self.copy.map(|copy| {
            if copy == COPY_ON {
                CopyTarget::Default
            } else {
                CopyTarget::Window(copy)
            }
        }));

        let rules = self
            .nick_filter
            .iter()
            .map(|rule| FilterRule::parse(rule))
            .collect::<Result<Vec<_>, _>>()?;
        alert.set_nick_filter(rules);

        Ok(alert)
    }
}

fn encode_flags(alert: &Alert) -> String {
    let mut out = String::new();
    for letter in FLAG_LETTERS {
        let state = match letter {
            'b' => decoration_state(alert.decoration(DecorationKind::Bold)),
            'i' => decoration_state(alert.decoration(DecorationKind::Italic)),
            'u' => decoration_state(alert.decoration(DecorationKind::Underline)),
            'r' => decoration_state(alert.decoration(DecorationKind::Reverse)),
            'g' => match alert.focus() {
                Focus::Off => None,
                Focus::On => Some(false),
                Focus::Force => Some(true),
            },
            'e' => alert.enabled().then_some(false),
            'f' => alert.flash().then_some(false),
            'm' => alert.mute().then_some(false),
            'n' => alert.notify().then_some(false),
            'w' => alert.word().then_some(false),
            _ => None,
        };
        // Some(true) marks a tristate's alternate state.
        match state {
            Some(true) => out.push(letter.to_ascii_uppercase()),
            Some(false) => out.push(letter),
            None => {}
        }
    }
    for color in [alert.color(), alert.line_color()] {
        out.push(',');
        if let Some(color) = color {
            out.push_str(&color.to_string_with(';'));
        }
    }
    out
}

fn decoration_state(decoration: Decoration) -> Option<bool> {
    match decoration {
        Decoration::Off => None,
        Decoration::On => Some(false),
        Decoration::Line => Some(true),
    }
}

/// Letters that are absent switch their setting off.
fn apply_flags(alert: &mut Alert, text: &str) -> Result<(), ImportError> {
    let mut parts = text.split(',');
    let letters = parts.next().unwrap_or_default();

    if let Some(bad) = letters.chars().find(|c| !FLAG_LETTERS.contains(&c.to_ascii_lowercase())) {
        return Err(ImportError::InvalidFlags(bad));
    }
    let state = |letter: char| {
        if letters.contains(letter.to_ascii_uppercase()) {
            Some(true)
        } else if letters.contains(letter) {
            Some(false)
        } else {
            None
        }
    };
    let boolean = |letter: char| -> Result<bool, ImportError> {
        match state(letter) {
            Some(true) => Err(ImportError::InvalidFlags(letter.to_ascii_uppercase())),
            Some(false) => Ok(true),
            None => Ok(false),
        }
    };
    let decoration = |letter: char| match state(letter) {
        Some(true) => Decoration::Line,
        Some(false) => Decoration::On,
        None => Decoration::Off,
    };

    let color = parse_color(parts.next())?;
    let line_color = parse_color(parts.next())?;
    let extra: Vec<&str> = parts.collect();
    if !extra.is_empty() {
        return Err(ImportError::InvalidColor(extra.join(",")));
    }

    alert.set_enabled(boolean('e')?);
    alert.set_flash(boolean('f')?);
    alert.set_mute(boolean('m')?);
    alert.set_notify(boolean('n')?);
    alert.set_word(boolean('w')?)?;
    alert.set_focus(match state('g') {
        Some(true) => Focus::Force,
        Some(false) => Focus::On,
        None => Focus::Off,
    });
    alert.set_decoration(DecorationKind::Bold, decoration('b'));
    alert.set_decoration(DecorationKind::Italic, decoration('i'));
    alert.set_decoration(DecorationKind::Underline, decoration('u'));
    alert.set_decoration(DecorationKind::Reverse, decoration('r'));
    alert.set_color(color);
    alert.set_line_color(line_color);
    Ok(())
}

fn parse_color(part: Option<&str>) -> Result<Option<ColorPair>, ImportError> {
    match part {
        None => Ok(None),
        Some(text) => {
            ColorPair::parse_with(text, ';').map_err(|_| ImportError::InvalidColor(text.to_string()))
        }
    }
}

/// Serialize records compactly: a bare object for one record, an array
/// otherwise.
pub fn export(records: &[AlertRecord]) -> Result<String, serde_json::Error> {
    match records {
        [single] => serde_json::to_string(single),
        many => serde_json::to_string(many),
    }
}

/// Split a serialized collection into its records, unvalidated.
pub fn read_collection(json: &str) -> Result<Vec<Value>, ImportError> {
    match serde_json::from_str(json)? {
        Value::Array(items) => Ok(items),
        record @ Value::Object(_) => Ok(vec![record]),
        _ => Err(ImportError::NotARecord),
    }
}

#[derive(Debug)]
pub struct ImportFailure {
    /// Position in the collection.
    pub index: usize,
    pub name: Option<String>,
    pub error: ImportError,
}

/// Outcome of importing a collection.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.imported.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alerts::error::PatternError;
    use serde_json::json;

    fn sounds() -> SoundResolver {
        SoundResolver::default()
    }

    #[test]
    fn test_fresh_alert_record() {
        let alert = Alert::new("fire").unwrap();
        let record = AlertRecord::from_alert(&alert);
        assert_eq!(record.flags.as_deref(), Some("ew,,"));
        assert!(record.pattern.is_none());
        assert!(record.regex.is_none());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"n": "fire", "f": "ew,,"})
        );
    }

    #[test]
    fn test_flags_and_colors_encoding() {
        let mut alert = Alert::new("fire").unwrap();
        alert.set_decoration(DecorationKind::Bold, Decoration::Line);
        alert.set_decoration(DecorationKind::Underline, Decoration::On);
        alert.set_focus(Focus::Force);
        alert.set_mute(true);
        alert.set_color(Some(ColorPair::new(Some(4), None)));
        alert.set_line_color(Some(ColorPair::new(None, Some(2))));
        assert_eq!(encode_flags(&alert), "BeGmuw,4,;2");
    }

    #[test]
    fn test_round_trip_preserves_behavior() {
        let mut alert = Alert::new("fire").unwrap();
        alert.set_pattern("fire+hole").unwrap();
        alert.set_word(false).unwrap();
        alert.set_decoration(DecorationKind::Italic, Decoration::Line);
        alert.set_color(Some(ColorPair::new(Some(4), Some(1))));
        alert.set_copy(Some(CopyTarget::Window("#log".into())));
        alert.set_nick_filter(vec![
            FilterRule::parse("+alice").unwrap(),
            FilterRule::parse("-").unwrap(),
        ]);

        let json = export(&[AlertRecord::from_alert(&alert)]).unwrap();
        let values = read_collection(&json).unwrap();
        assert_eq!(values.len(), 1);
        let mut restored = AlertRecord::from_value(values[0].clone())
            .unwrap()
            .into_alert(&sounds())
            .unwrap();

        assert_eq!(restored.pattern(), Some("fire+hole"));
        assert_eq!(restored.expression(), alert.expression());
        assert_eq!(restored.wraps(), alert.wraps());
        assert_eq!(restored.copy(), alert.copy());
        assert_eq!(restored.nick_filter().to_strings(), vec!["+alice", "-"]);
        assert!(restored.is_match("firehole", "fire hole"));
        assert!(restored.admits("alice!x@y"));
        assert!(!restored.admits("bob!x@y"));
    }

    #[test]
    fn test_regex_record() {
        let mut alert = Alert::new("water").unwrap();
        alert.set_regex("wat(er)?").unwrap();
        let record = AlertRecord::from_alert(&alert);
        assert_eq!(record.regex.as_deref(), Some("wat(er)?"));
        assert!(record.pattern.is_none());

        let restored = record.into_alert(&sounds()).unwrap();
        assert!(!restored.uses_pattern());
        assert!(restored.is_match("wat", "wat"));
    }

    #[test]
    fn test_missing_flags_keep_defaults() {
        let record = AlertRecord::from_value(json!({"n": "fire"})).unwrap();
        let alert = record.into_alert(&sounds()).unwrap();
        assert!(alert.enabled());
        assert!(alert.word());
    }

    #[test]
    fn test_present_flags_switch_absent_letters_off() {
        let record = AlertRecord::from_value(json!({"n": "fire", "f": "m"})).unwrap();
        let alert = record.into_alert(&sounds()).unwrap();
        assert!(alert.mute());
        assert!(!alert.enabled());
        assert!(!alert.word());
    }

    #[test]
    fn test_copy_on_uses_default_window() {
        let record = AlertRecord::from_value(json!({"n": "fire", "c": "on"})).unwrap();
        let alert = record.into_alert(&sounds()).unwrap();
        assert_eq!(alert.copy(), Some(&CopyTarget::Default));
    }

    #[test]
    fn test_invalid_records() {
        assert!(matches!(
            AlertRecord::from_value(json!({"f": "e"})),
            Err(ImportError::MissingName)
        ));
        assert!(matches!(
            AlertRecord::from_value(json!("fire")),
            Err(ImportError::NotARecord)
        ));

        let bad_flag = AlertRecord::from_value(json!({"n": "a", "f": "ex"})).unwrap();
        assert!(matches!(
            bad_flag.into_alert(&sounds()),
            Err(ImportError::InvalidFlags('x'))
        ));

        let bad_color = AlertRecord::from_value(json!({"n": "a", "f": "e,200"})).unwrap();
        assert!(matches!(
            bad_color.into_alert(&sounds()),
            Err(ImportError::InvalidColor(_))
        ));

        let extra_color = AlertRecord::from_value(json!({"n": "a", "f": "e,4,5,6;7"})).unwrap();
        assert!(matches!(
            extra_color.into_alert(&sounds()),
            Err(ImportError::InvalidColor(part)) if part == "6;7"
        ));

        let bad_regex = AlertRecord::from_value(json!({"n": "a", "r": "(x"})).unwrap();
        assert!(matches!(
            bad_regex.into_alert(&sounds()),
            Err(ImportError::Pattern(PatternError::Syntax(_)))
        ));

        let bad_filter = AlertRecord::from_value(json!({"n": "a", "N": ["alice"]})).unwrap();
        assert!(matches!(
            bad_filter.into_alert(&sounds()),
            Err(ImportError::InvalidFilterRule(_))
        ));
    }

    #[test]
    fn test_collection_shapes() {
        assert_eq!(read_collection(r#"{"n":"a"}"#).unwrap().len(), 1);
        assert_eq!(read_collection(r#"[{"n":"a"},{"n":"b"}]"#).unwrap().len(), 2);
        assert!(read_collection("[]").unwrap().is_empty());
        assert!(matches!(read_collection("42"), Err(ImportError::NotARecord)));
        assert!(matches!(read_collection("{"), Err(ImportError::Json(_))));

        let records = vec![
            AlertRecord::from_alert(&Alert::new("a").unwrap()),
            AlertRecord::from_alert(&Alert::new("b").unwrap()),
        ];
        assert!(export(&records).unwrap().starts_with('['));
        assert!(export(&records[..1]).unwrap().starts_with('{'));
    }
}
