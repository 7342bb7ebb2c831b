//! Filter pipeline ordering.
//!
//! Filters are plugins discovered in a directory; their algorithms live
//! outside the viewer. The model only tracks which filters exist, the order
//! they run in (index 0 runs first) and whether each one is enabled.

use glob::glob;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Plugin extensions recognised on every platform.
const PLUGIN_EXTENSIONS: [&str; 3] = ["so", "dll", "dylib"];

#[derive(Debug, Clone, PartialEq)]
pub struct FilterInfo {
    pub name: String,
    pub path: Option<PathBuf>,
    pub enabled: bool,
}

impl FilterInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    Unknown(String),
    AlreadyFirst(String),
    AlreadyLast(String),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::Unknown(name) => write!(f, "Unknown filter '{}'", name),
            FilterError::AlreadyFirst(name) => write!(f, "Filter '{}' already runs first", name),
            FilterError::AlreadyLast(name) => write!(f, "Filter '{}' already runs last", name),
        }
    }
}

impl std::error::Error for FilterError {}

#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    filters: Vec<FilterInfo>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            filters: names.into_iter().map(FilterInfo::new).collect(),
        }
    }

    pub fn filters(&self) -> &[FilterInfo] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Names in execution order.
    pub fn order(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name.clone()).collect()
    }

    pub fn enabled_names(&self) -> Vec<String> {
        self.filters
            .iter()
            .filter(|f| f.enabled)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.filters.iter().position(|f| f.name == name)
    }

    /// Move one slot later (lower priority). Returns the new index.
    pub fn move_down(&mut self, name: &str) -> Result<usize, FilterError> {
        let idx = self
            .position(name)
            .ok_or_else(|| FilterError::Unknown(name.to_string()))?;
        if idx + 1 >= self.filters.len() {
            return Err(FilterError::AlreadyLast(name.to_string()));
        }
        self.filters.swap(idx, idx + 1);
        Ok(idx + 1)
    }

    /// Move one slot earlier (higher priority). Returns the new index.
    pub fn move_up(&mut self, name: &str) -> Result<usize, FilterError> {
        let idx = self
            .position(name)
            .ok_or_else(|| FilterError::Unknown(name.to_string()))?;
        if idx == 0 {
            return Err(FilterError::AlreadyFirst(name.to_string()));
        }
        self.filters.swap(idx, idx - 1);
        Ok(idx - 1)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), FilterError> {
        let filter = self
            .filters
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| FilterError::Unknown(name.to_string()))?;
        filter.enabled = enabled;
        Ok(())
    }

    /// Reorder to follow `preferred`; names it lacks keep their relative
    /// order after the listed ones, unknown names in `preferred` are ignored.
    pub fn apply_order(&mut self, preferred: &[String]) {
        let rank = |f: &FilterInfo| {
            preferred
                .iter()
                .position(|n| *n == f.name)
                .unwrap_or(usize::MAX)
        };
        // Stable sort keeps discovery order among unranked filters
        self.filters.sort_by_key(rank);
    }

    /// Replace the pipeline with the plugins found in `dir`.
    ///
    /// Filters already known keep their position and enabled flag; newly
    /// found ones are appended in name order; vanished ones are dropped.
    pub fn reload_from_dir(&mut self, dir: &Path) -> usize {
        let found = discover_plugins(dir);
        let found_names: HashSet<&str> = found.iter().map(|f| f.name.as_str()).collect();

        let mut next: Vec<FilterInfo> = self
            .filters
            .iter()
            .filter(|f| found_names.contains(f.name.as_str()))
            .cloned()
            .collect();
        for plugin in &found {
            match next.iter_mut().find(|f| f.name == plugin.name) {
                Some(existing) => existing.path = plugin.path.clone(),
                None => next.push(plugin.clone()),
            }
        }
        debug!(
            "Filter reload from {}: {} -> {} filters",
            dir.display(),
            self.filters.len(),
            next.len()
        );
        self.filters = next;
        self.filters.len()
    }
}

/// Plugin files in `dir`, sorted by filter name.
fn discover_plugins(dir: &Path) -> Vec<FilterInfo> {
    let mut found = Vec::new();
    for ext in PLUGIN_EXTENSIONS {
        let pattern = dir.join(format!("*.{}", ext));
        let pattern = pattern.to_string_lossy();
        let entries = match glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Bad plugin pattern {}: {}", pattern, e);
                continue;
            }
        };
        for path in entries.flatten() {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            // libfoo.so and foo.dll name the same filter
            let name = stem.strip_prefix("lib").unwrap_or(&stem).to_string();
            found.push(FilterInfo {
                name,
                path: Some(path),
                enabled: true,
            });
        }
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found.dedup_by(|a, b| a.name == b.name);
    found
}
