//! Headless front end.
//!
//! `ConsoleView` stands in for the main window: it subscribes to the same
//! update names a windowed front end would and keeps what it would render in
//! a [`ViewState`]. Snapshots are written to disk as PNG.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::commands::{names, updates};
use crate::core::{InvocationEvent, SubscriptionId, UpdateBus, UpdateEvent};
use crate::model::{AppContext, Picture, keys};

/// Slider range of the frame progress bar.
pub const PROGRESS_MIN: i64 = 0;
pub const PROGRESS_MAX: i64 = 100;

/// Everything the view would currently display.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub picture_size: Option<(u32, u32)>,
    pub total_frames: i64,
    /// 1-based frame counter as shown next to the slider.
    pub current_frame: i64,
    pub progress: i64,
    pub stylesheet: String,
    pub theme_name: String,
    pub sequence_name: Option<String>,
    pub filter_order: Vec<String>,
    pub busy: bool,
    pub errors: Vec<String>,
    pub update_available: Option<bool>,
    pub snapshots: Vec<PathBuf>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            picture_size: None,
            total_frames: -1,
            current_frame: -1,
            progress: 0,
            stylesheet: String::new(),
            theme_name: String::new(),
            sequence_name: None,
            filter_order: Vec::new(),
            busy: false,
            errors: Vec::new(),
            update_available: None,
            snapshots: Vec::new(),
        }
    }
}

/// Slider position for a 1-based frame counter.
pub fn progress_position(current: i64, total: i64) -> i64 {
    if total == 1 || total <= 0 {
        return 0;
    }
    (current - 1) * (PROGRESS_MAX - PROGRESS_MIN) / (total - 1)
}

/// Percent to request when the slider is dragged to `position`.
pub fn slider_percent(position: i64) -> i64 {
    let span = (PROGRESS_MAX - PROGRESS_MIN) as f64;
    (100.0 * (position - PROGRESS_MIN) as f64 / span) as i64
}

/// Where a snapshot goes: a `.png` preference is used as-is, anything else
/// is treated as a directory.
pub fn snapshot_target(saving_path: Option<&Path>, sequence: Option<&str>, poc: i32) -> PathBuf {
    let base = saving_path.unwrap_or_else(|| Path::new("."));
    let is_file = base
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if is_file {
        return base.to_path_buf();
    }
    let stem = sequence
        .and_then(|s| Path::new(s).file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    base.join(format!("{}_poc{:04}.png", stem, poc))
}

fn save_snapshot(picture: &Picture, target: &Path) -> Result<()> {
    if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    picture
        .image
        .save_with_format(target, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write snapshot {}", target.display()))
}

pub struct ConsoleView {
    state: Arc<Mutex<ViewState>>,
    subscriptions: Vec<SubscriptionId>,
}

impl ConsoleView {
    /// Subscribe to every update the view renders.
    pub fn attach(bus: &UpdateBus, app: Arc<AppContext>) -> Self {
        let state = Arc::new(Mutex::new(ViewState::default()));
        let mut subscriptions = Vec::new();

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::PICTURE, move |evt| {
            if let Ok(picture) = evt.get_handle_as::<Picture>(updates::PICTURE) {
                lock(&s).picture_size = Some((picture.width(), picture.height()));
            }
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to_params(
            [updates::TOTAL_FRAME_NUM, updates::CURRENT_FRAME_POC],
            move |evt| on_poc_info(&mut lock(&s), evt),
        ));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::THEME_STYLESHEET, move |evt| {
            let mut st = lock(&s);
            st.stylesheet = evt.get_str(updates::THEME_STYLESHEET).unwrap_or_default().to_string();
            if let Ok(name) = evt.get_str(updates::THEME_NAME) {
                st.theme_name = name.to_string();
            }
            debug!("Stylesheet applied ({})", st.theme_name);
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::SNAPSHOT, move |evt| {
            let Ok(picture) = evt.get_handle_as::<Picture>(updates::SNAPSHOT) else {
                warn!("Snapshot update without a picture");
                return;
            };
            let sequence = lock(&s).sequence_name.clone();
            let saving = app.settings().get_path(keys::SNAPSHOT_SAVING_PATH);
            let target = snapshot_target(saving.as_deref(), sequence.as_deref(), picture.poc);
            match save_snapshot(&picture, &target) {
                Ok(()) => {
                    info!("Snapshot saved to {}", target.display());
                    lock(&s).snapshots.push(target);
                }
                Err(e) => warn!("Snapshot saving failed: {:#}", e),
            }
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::SEQUENCE_NAME, move |evt| {
            lock(&s).sequence_name = evt.get_str(updates::SEQUENCE_NAME).ok().map(str::to_string);
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::FILTER_ORDER, move |evt| {
            if let Ok(order) = evt.get_str_list(updates::FILTER_ORDER) {
                lock(&s).filter_order = order.to_vec();
            }
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::DECODE_BUSY, move |evt| {
            let busy = evt.get_bool(updates::DECODE_BUSY).unwrap_or(false);
            lock(&s).busy = busy;
            if busy {
                info!("Decoding...");
            }
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::ERROR_MESSAGE, move |evt| {
            let msg = evt.get_str(updates::ERROR_MESSAGE).unwrap_or("unknown error");
            eprintln!("Error: {}", msg);
            lock(&s).errors.push(msg.to_string());
        }));

        let s = Arc::clone(&state);
        subscriptions.push(bus.listen_to(updates::UPDATE_AVAILABLE, move |evt| {
            let available = evt.get_bool(updates::UPDATE_AVAILABLE).unwrap_or(false);
            if available {
                let latest = evt.get_str(updates::LATEST_VERSION).unwrap_or("?");
                match evt.get_str(updates::DOWNLOAD_URL) {
                    Ok(url) => println!("Version {} is available: {}", latest, url),
                    Err(_) => println!("Version {} is available", latest),
                }
            }
            lock(&s).update_available = Some(available);
        }));

        debug!("Console view attached ({} subscriptions)", subscriptions.len());
        Self { state, subscriptions }
    }

    /// Drop every subscription made by `attach`.
    pub fn detach(&mut self, bus: &UpdateBus) {
        for id in self.subscriptions.drain(..) {
            bus.remove_subscriber(id);
        }
    }

    pub fn state(&self) -> ViewState {
        lock(&self.state).clone()
    }

    /// Invocation a slider drag would dispatch.
    pub fn seek_event(position: i64) -> InvocationEvent {
        InvocationEvent::new(names::JUMPTO_PERCENT).with("percent", slider_percent(position))
    }

    /// One-line status as printed by the headless driver.
    pub fn status_line(&self) -> String {
        let st = lock(&self.state);
        let size = st
            .picture_size
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_else(|| "-".into());
        format!(
            "{} frame {}/{} [{}] picture {}{}",
            st.sequence_name.as_deref().unwrap_or("<none>"),
            st.current_frame.max(0),
            st.total_frames.max(0),
            st.progress,
            size,
            if st.busy { " (decoding)" } else { "" }
        )
    }
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Counters arrive together or alone; the slider uses the last known pair.
fn on_poc_info(st: &mut ViewState, evt: &UpdateEvent) {
    if let Ok(total) = evt.get_int(updates::TOTAL_FRAME_NUM) {
        st.total_frames = total;
    }
    if let Ok(poc) = evt.get_int(updates::CURRENT_FRAME_POC) {
        st.current_frame = poc + 1;
    }
    st.progress = progress_position(st.current_frame, st.total_frames);
}
