//! Wrap sequences for re-rendering a matched line.
//!
//! Decorations set to [`Decoration::Line`] and the line color apply to the
//! whole line; decorations set to [`Decoration::On`] and the match color
//! apply to the matched text only.

use crate::core::irc::{self, ColorPair, StripMask};

use super::model::Decoration;

/// Text placed before and after a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrap {
    pub prefix: String,
    pub suffix: String,
}

impl Wrap {
    fn new(prefix: String, suffix: String) -> Self {
        Self { prefix, suffix }
    }

    pub fn apply(&self, text: &str) -> String {
        format!("{}{}{}", self.prefix, text, self.suffix)
    }
}

/// Formatting inputs for one alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatSpec {
    pub bold: Decoration,
    pub italic: Decoration,
    pub underline: Decoration,
    pub reverse: Decoration,
    pub color: Option<ColorPair>,
    pub line_color: Option<ColorPair>,
}

/// Output of [`compute`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wraps {
    pub line: Option<Wrap>,
    pub matched: Option<Wrap>,
    pub strip: StripMask,
}

pub fn compute(spec: &FormatSpec) -> Wraps {
    let decorations = [
        (spec.bold, irc::BOLD),
        (spec.italic, irc::ITALIC),
        (spec.underline, irc::UNDERLINE),
        (spec.reverse, irc::REVERSE),
    ];

    let mut line_prefix = String::new();
    let mut match_prefix = String::new();
    for (decoration, code) in decorations {
        match decoration {
            Decoration::Off => {}
            Decoration::On => match_prefix.push_str(code),
            Decoration::Line => line_prefix.push_str(code),
        }
    }

    let strip = StripMask {
        formatting: !line_prefix.is_empty(),
        colors: spec.line_color.is_some(),
    };

    if let Some(line_color) = spec.line_color {
        line_prefix.push_str(&line_color.code());
    }

    let distinct_color = spec.color.filter(|color| Some(*color) != spec.line_color);

    let line_suffix = irc::RESET.to_string();
    let match_suffix = if match_prefix.is_empty() && spec.color.is_none() {
        String::new()
    } else if distinct_color.is_some() {
        // Reset everything, then restore the line formatting.
        format!("{}{}", irc::RESET, line_prefix)
    } else {
        // Toggles cancel themselves.
        match_prefix.clone()
    };

    if let Some(color) = distinct_color {
        match_prefix.push_str(&color.code());
    }

    Wraps {
        line: (!line_prefix.is_empty()).then(|| Wrap::new(line_prefix, line_suffix)),
        matched: (!match_prefix.is_empty()).then(|| Wrap::new(match_prefix, match_suffix)),
        strip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::irc::{BOLD, COLOR, ITALIC, RESET, UNDERLINE};

    #[test]
    fn test_no_formatting() {
        let wraps = compute(&FormatSpec::default());
        assert!(wraps.line.is_none());
        assert!(wraps.matched.is_none());
        assert!(wraps.strip.is_empty());
    }

    #[test]
    fn test_bold_on_wraps_match_only() {
        let wraps = compute(&FormatSpec {
            bold: Decoration::On,
            ..Default::default()
        });
        assert!(wraps.line.is_none());
        assert_eq!(wraps.matched, Some(Wrap::new(BOLD.into(), BOLD.into())));
        assert!(wraps.strip.is_empty());
    }

    #[test]
    fn test_bold_line_wraps_whole_line() {
        let wraps = compute(&FormatSpec {
            bold: Decoration::Line,
            ..Default::default()
        });
        assert_eq!(wraps.line, Some(Wrap::new(BOLD.into(), RESET.into())));
        assert!(wraps.matched.is_none());
        assert!(wraps.strip.formatting);
        assert!(!wraps.strip.colors);
    }

    #[test]
    fn test_mixed_scopes() {
        let wraps = compute(&FormatSpec {
            bold: Decoration::Line,
            italic: Decoration::On,
            underline: Decoration::On,
            ..Default::default()
        });
        assert_eq!(wraps.line, Some(Wrap::new(BOLD.into(), RESET.into())));
        let both = format!("{ITALIC}{UNDERLINE}");
        assert_eq!(wraps.matched, Some(Wrap::new(both.clone(), both)));
    }

    #[test]
    fn test_line_color_strips_colors() {
        let wraps = compute(&FormatSpec {
            line_color: Some(ColorPair::new(Some(4), None)),
            ..Default::default()
        });
        assert_eq!(
            wraps.line,
            Some(Wrap::new(format!("{COLOR}04"), RESET.into()))
        );
        assert!(wraps.strip.colors);
        assert!(!wraps.strip.formatting);
        assert!(wraps.matched.is_none());
    }

    #[test]
    fn test_match_color_restores_line_prefix() {
        let wraps = compute(&FormatSpec {
            bold: Decoration::Line,
            color: Some(ColorPair::new(Some(4), Some(1))),
            line_color: Some(ColorPair::new(Some(12), None)),
            ..Default::default()
        });
        let line_prefix = format!("{BOLD}{COLOR}12");
        assert_eq!(
            wraps.line,
            Some(Wrap::new(line_prefix.clone(), RESET.into()))
        );
        assert_eq!(
            wraps.matched,
            Some(Wrap::new(
                format!("{COLOR}04,01"),
                format!("{RESET}{line_prefix}")
            ))
        );
        assert_eq!(wraps.strip, StripMask::ALL);
    }

    #[test]
    fn test_match_color_without_line_formatting() {
        let wraps = compute(&FormatSpec {
            color: Some(ColorPair::new(Some(4), None)),
            ..Default::default()
        });
        assert!(wraps.line.is_none());
        assert_eq!(
            wraps.matched,
            Some(Wrap::new(format!("{COLOR}04"), RESET.into()))
        );
    }

    #[test]
    fn test_match_color_equal_to_line_color_is_dropped() {
        let color = ColorPair::new(Some(7), None);
        let wraps = compute(&FormatSpec {
            color: Some(color),
            line_color: Some(color),
            ..Default::default()
        });
        assert!(wraps.line.is_some());
        assert!(wraps.matched.is_none());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let spec = FormatSpec {
            reverse: Decoration::On,
            color: Some(ColorPair::new(None, Some(3))),
            ..Default::default()
        };
        assert_eq!(compute(&spec), compute(&spec));
    }
}
