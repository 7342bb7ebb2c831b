//! Application model shared by all commands.
//!
//! `AppContext` is built once at startup and handed to the front controller
//! by `Arc`. Commands reach it through their `CommandContext`; nothing in the
//! crate reaches it through a global.
//!
//! Mutation discipline: model state is written on the UI thread only, either
//! during a synchronous dispatch or inside a continuation posted back by a
//! worker. The mutexes make the type `Sync`, they are not there to arbitrate
//! concurrent writers.

pub mod decoder;
pub mod filters;
pub mod sequence;
pub mod settings;
pub mod theme;

use log::{debug, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::CancelSource;
pub use decoder::{AnnexBDecoder, BitstreamDecoder, FileSystem, HmVersion, RealFileSystem};
pub use filters::{FilterError, FilterInfo, FilterPipeline};
pub use sequence::{DecodedSequence, NavError, Picture, SequenceState};
pub use settings::{SettingsStore, keys};
pub use theme::{Theme, ThemeError};

pub struct AppContext {
    settings: Mutex<SettingsStore>,
    sequence: Mutex<SequenceState>,
    filters: Mutex<FilterPipeline>,
    theme: Mutex<Option<Theme>>,
    decode_cancel: CancelSource,
    decode_busy: AtomicBool,
    decoder: Arc<dyn BitstreamDecoder>,
    fs: Arc<dyn FileSystem>,
}

impl AppContext {
    /// Context with the bundled decoder and the real file system.
    ///
    /// Restores the filter pipeline from the plugin directory and the saved
    /// filter order.
    pub fn new(settings: SettingsStore) -> Self {
        Self::with_collaborators(settings, Arc::new(AnnexBDecoder::default()), Arc::new(RealFileSystem))
    }

    pub fn with_collaborators(
        settings: SettingsStore,
        decoder: Arc<dyn BitstreamDecoder>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let mut filters = FilterPipeline::new();
        if let Some(dir) = settings.get_path(keys::PLUGIN_DIR) {
            filters.reload_from_dir(&dir);
        }
        filters.apply_order(&settings.get_str_list(keys::FILTER_ORDER));
        info!("Model initialised: {} filter(s)", filters.len());

        Self {
            settings: Mutex::new(settings),
            sequence: Mutex::new(SequenceState::default()),
            filters: Mutex::new(filters),
            theme: Mutex::new(None),
            decode_cancel: CancelSource::new(),
            decode_busy: AtomicBool::new(false),
            decoder,
            fs,
        }
    }

    /// No preferences file, bundled decoder.
    pub fn in_memory() -> Self {
        Self::new(SettingsStore::in_memory())
    }

    pub fn settings(&self) -> MutexGuard<'_, SettingsStore> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sequence(&self) -> MutexGuard<'_, SequenceState> {
        self.sequence.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn filters(&self) -> MutexGuard<'_, FilterPipeline> {
        self.filters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current_theme(&self) -> Option<Theme> {
        self.theme.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_theme(&self, theme: Theme) {
        debug!("Theme -> {}", theme.name);
        *self.theme.lock().unwrap_or_else(|e| e.into_inner()) = Some(theme);
    }

    pub fn decoder(&self) -> Arc<dyn BitstreamDecoder> {
        Arc::clone(&self.decoder)
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn decode_cancel(&self) -> &CancelSource {
        &self.decode_cancel
    }

    pub fn is_decoding(&self) -> bool {
        self.decode_busy.load(Ordering::SeqCst)
    }

    pub fn set_decoding(&self, busy: bool) {
        self.decode_busy.store(busy, Ordering::SeqCst);
    }

    /// Persist the current filter order into preferences.
    pub fn save_filter_order(&self) {
        let order = self.filters().order();
        let mut settings = self.settings();
        settings.set(keys::FILTER_ORDER, order);
        settings.persist();
    }

    /// Configured directory, if any, for a path-valued preference.
    pub fn setting_path(&self, key: &str) -> Option<PathBuf> {
        self.settings().get_path(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_restores_filter_order() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["a.so", "b.so", "c.so"] {
            std::fs::write(dir.path().join(f), b"").unwrap();
        }
        let mut settings = SettingsStore::in_memory();
        settings.set(keys::PLUGIN_DIR, dir.path().to_string_lossy().into_owned());
        settings.set(keys::FILTER_ORDER, vec!["c", "a"]);

        let app = AppContext::new(settings);
        assert_eq!(app.filters().order(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_save_filter_order() {
        let app = AppContext::in_memory();
        *app.filters() = FilterPipeline::from_names(["x", "y"]);
        app.filters().move_down("x").unwrap();
        app.save_filter_order();
        assert_eq!(app.settings().get_str_list(keys::FILTER_ORDER), vec!["y", "x"]);
    }
}
