//! Theme stylesheets.
//!
//! Two themes ship with the viewer, `default` (empty stylesheet: platform
//! look) and `dark`. A `<name>.qss` file in the theme directory overrides a
//! built-in or adds a new theme.

use log::debug;
use std::path::Path;

pub const DEFAULT_THEME: &str = "default";
pub const DARK_THEME: &str = "dark";

const DARK_STYLESHEET: &str = "\
QWidget { background-color: #2b2b2b; color: #d6d6d6; }
QMainWindow::separator { background: #3c3c3c; width: 1px; height: 1px; }
QDockWidget::title { background: #353535; padding-left: 4px; }
QPushButton { background-color: #3c3f41; border: 1px solid #555555; padding: 3px 8px; }
QPushButton:hover { background-color: #4b5052; }
QSlider::groove:horizontal { background: #3c3c3c; height: 4px; }
QSlider::handle:horizontal { background: #6897bb; width: 10px; margin: -4px 0; }
QListView, QTextEdit { background-color: #232323; border: 1px solid #3c3c3c; }
";

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub name: String,
    pub stylesheet: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThemeError {
    Unknown(String),
    /// Not a plain file stem (separators, `..`, empty).
    InvalidName(String),
    Unreadable { name: String, reason: String },
}

impl std::fmt::Display for ThemeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeError::Unknown(name) => write!(f, "Unknown theme '{}'", name),
            ThemeError::InvalidName(name) => write!(f, "Invalid theme name '{}'", name),
            ThemeError::Unreadable { name, reason } => {
                write!(f, "Theme '{}' could not be read: {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ThemeError {}

fn builtin(name: &str) -> Option<&'static str> {
    match name {
        DEFAULT_THEME => Some(""),
        DARK_THEME => Some(DARK_STYLESHEET),
        _ => None,
    }
}

/// Theme names are file stems inside the theme directory.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', ':'])
}

/// Resolve `name` to a stylesheet, preferring `theme_dir/<name>.qss`.
pub fn resolve(name: &str, theme_dir: Option<&Path>) -> Result<Theme, ThemeError> {
    if !is_plain_name(name) {
        return Err(ThemeError::InvalidName(name.to_string()));
    }
    if let Some(dir) = theme_dir {
        let file = dir.join(format!("{}.qss", name));
        if file.is_file() {
            debug!("Theme '{}' from {}", name, file.display());
            let stylesheet = std::fs::read_to_string(&file).map_err(|e| ThemeError::Unreadable {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Theme {
                name: name.to_string(),
                stylesheet,
            });
        }
    }
    builtin(name)
        .map(|css| Theme {
            name: name.to_string(),
            stylesheet: css.to_string(),
        })
        .ok_or_else(|| ThemeError::Unknown(name.to_string()))
}

/// Built-in names plus any `.qss` files in `theme_dir`, sorted, unique.
pub fn available(theme_dir: Option<&Path>) -> Vec<String> {
    let mut names = vec![DEFAULT_THEME.to_string(), DARK_THEME.to_string()];
    if let Some(dir) = theme_dir {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "qss") {
                    if let Some(stem) = path.file_stem() {
                        names.push(stem.to_string_lossy().into_owned());
                    }
                }
            }
        }
    }
    names.sort();
    names.dedup();
    names
}
