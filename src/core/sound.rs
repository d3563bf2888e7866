//! Sound references and their resolution against a search path.

use std::path::{Path, PathBuf};

/// A sound as configured by the user, plus the file it resolved to (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sound {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl Sound {
    pub fn is_found(&self) -> bool {
        self.path.is_some()
    }
}

/// Looks sound names up in an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct SoundResolver {
    search_path: Vec<PathBuf>,
}

impl SoundResolver {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Resolve `name`, trying `<name>.wav` when the bare name is not found.
    pub fn resolve(&self, name: &str) -> Sound {
        let mut path = self.locate(name);
        if path.is_none() && !name.to_lowercase().ends_with(".wav") {
            path = self.locate(&format!("{name}.wav"));
        }
        if path.is_none() {
            log::debug!("Sound '{}' not found in search path", name);
        }
        Sound {
            name: name.to_string(),
            path,
        }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return candidate.exists().then(|| candidate.to_path_buf());
        }
        self.search_path
            .iter()
            .map(|dir| dir.join(candidate))
            .find(|path| path.exists())
    }
}

/// Default sound directories for this platform.
pub fn default_search_path() -> Vec<PathBuf> {
    let raw: &[&str] = if cfg!(windows) {
        &[
            "%APPDATA%\\HexChat\\Sounds",
            "%ProgramFiles%\\HexChat\\Sounds",
            "%ProgramFiles(x86)%\\HexChat\\Sounds",
        ]
    } else {
        &[
            "~/.config/hexchat/sounds",
            "/sbin/HexChat/share/sounds",
            "/usr/sbin/HexChat/share/sounds",
            "/usr/local/bin/HexChat/share/sounds",
        ]
    };
    raw.iter().map(|p| PathBuf::from(expand_path(p))).collect()
}

/// Expand a leading `~` and `%VAR%` references from the environment.
/// Unknown variables are left as written.
pub fn expand_path(path: &str) -> String {
    let mut expanded = match path.strip_prefix('~') {
        Some(rest) => {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| "~".to_string());
            format!("{home}{rest}")
        }
        None => path.to_string(),
    };

    let mut out = String::with_capacity(expanded.len());
    while let Some(start) = expanded.find('%') {
        let Some(len) = expanded[start + 1..].find('%') else {
            break;
        };
        let var = &expanded[start + 1..start + 1 + len];
        out.push_str(&expanded[..start]);
        match std::env::var(var) {
            Ok(value) if !var.is_empty() => out.push_str(&value),
            _ => out.push_str(&expanded[start..start + len + 2]),
        }
        expanded = expanded[start + len + 2..].to_string();
    }
    out.push_str(&expanded);
    out
}

/// Plays resolved sound files. Playback is fire-and-forget.
pub trait SoundPlayer {
    fn play(&self, path: &Path);
}
