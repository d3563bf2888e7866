//! IRC text control codes.
//!
//! Formatting toggles, mIRC-style color codes and the stripping helpers used
//! when an alert re-renders a line.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const BOLD: &str = "\x02";
pub const ITALIC: &str = "\x1d";
pub const UNDERLINE: &str = "\x1f";
pub const REVERSE: &str = "\x16";
pub const COLOR: &str = "\x03";
/// Resets all formatting and colors to the client defaults.
pub const RESET: &str = "\x0f";

pub const MIN_COLOR: u8 = 0;
pub const MAX_COLOR: u8 = 99;

lazy_static! {
    static ref COLOR_CODE: Regex =
        Regex::new(r"\x03(?:[0-9]{1,2}(?:,[0-9]{1,2})?|,[0-9]{1,2})?").expect("Invalid color code regex");
    static ref FORMAT_CODE: Regex =
        Regex::new(r"[\x02\x0f\x11\x16\x1d\x1e\x1f]").expect("Invalid format code regex");
}

/// Which classes of control codes to remove from incoming text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripMask {
    /// Bold, italic, underline, reverse and reset codes.
    pub formatting: bool,
    /// Color codes along with their numeric arguments.
    pub colors: bool,
}

impl StripMask {
    pub const NONE: Self = Self {
        formatting: false,
        colors: false,
    };
    pub const ALL: Self = Self {
        formatting: true,
        colors: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.formatting && !self.colors
    }
}

/// Remove the control codes selected by `mask` from `text`.
pub fn strip(text: &str, mask: StripMask) -> String {
    let mut out = if mask.colors {
        COLOR_CODE.replace_all(text, "").into_owned()
    } else {
        text.to_string()
    };
    if mask.formatting {
        out = FORMAT_CODE.replace_all(&out, "").into_owned();
    }
    out
}

/// A foreground/background color pair. Either side may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorPair {
    pub fg: Option<u8>,
    pub bg: Option<u8>,
}

impl ColorPair {
    pub fn new(fg: Option<u8>, bg: Option<u8>) -> Self {
        Self { fg, bg }
    }

    pub fn is_unset(&self) -> bool {
        self.fg.is_none() && self.bg.is_none()
    }

    /// The control sequence that switches to this color pair.
    pub fn code(&self) -> String {
        if self.is_unset() {
            return String::new();
        }
        let mut rv = String::from(COLOR);
        if let Some(fg) = self.fg {
            rv.push_str(&format!("{fg:02}"));
        }
        if let Some(bg) = self.bg {
            rv.push_str(&format!(",{bg:02}"));
        }
        rv
    }

    /// Render as `fg<sep>bg`, dropping a trailing empty background.
    pub fn to_string_with(&self, sep: char) -> String {
        let fg = self.fg.map(|c| c.to_string()).unwrap_or_default();
        match self.bg {
            Some(bg) => format!("{fg}{sep}{bg}"),
            None => fg,
        }
    }

    /// Parse `fg<sep>bg` where either side may be blank.
    ///
    /// Returns `Ok(None)` when both sides are blank.
    pub fn parse_with(s: &str, sep: char) -> Result<Option<Self>, String> {
        let mut parts = s.splitn(2, sep);
        let fg = parse_color_component(parts.next().unwrap_or(""))?;
        let bg = parse_color_component(parts.next().unwrap_or(""))?;
        let pair = Self { fg, bg };
        Ok(if pair.is_unset() { None } else { Some(pair) })
    }
}

impl fmt::Display for ColorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(','))
    }
}

fn parse_color_component(s: &str) -> Result<Option<u8>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let value: u8 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a color number"))?;
    if !(MIN_COLOR..=MAX_COLOR).contains(&value) {
        return Err(format!(
            "color {value} is outside {MIN_COLOR}..={MAX_COLOR}"
        ));
    }
    Ok(Some(value))
}

pub fn bold(text: &str) -> String {
    format!("{BOLD}{text}{BOLD}")
}

/// Table of color numbers, each shown as a background behind white and
/// then black text.
pub fn palette() -> Vec<String> {
    let mut lines = vec![bold("Available colors:")];
    for row in (MIN_COLOR..=MAX_COLOR).collect::<Vec<_>>().chunks(16) {
        for bg in [0, 1] {
            let cells: Vec<String> = row
                .iter()
                .map(|&c| format!("{} {c:02} {RESET}", ColorPair::new(Some(bg), Some(c)).code()))
                .collect();
            lines.push(cells.concat());
        }
    }
    lines.push("Colors are written as fg,bg where either side may be left blank.".to_string());
    lines
}
