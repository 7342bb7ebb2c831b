//! Viewer commands and the names they are registered under.
//!
//! `controller()` wires a ready-to-use front controller: worker pool sharing
//! the decode cancellation epoch, a fresh update bus owned by the calling
//! thread, and every command below.

pub mod decode;
pub mod filters;
pub mod navigation;
pub mod snapshot;
pub mod theme;
pub mod update;

use std::sync::Arc;

use crate::core::{BusResult, FrontController, UpdateBus, UpdateEvent, Workers};
use crate::model::AppContext;

/// Invocation surface.
pub mod names {
    pub const PREV_FRAME: &str = "prev_frame";
    pub const NEXT_FRAME: &str = "next_frame";
    pub const JUMPTO_PERCENT: &str = "jumpto_percent";
    pub const JUMPTO_FRAME: &str = "jumpto_frame";
    pub const DECODE_BITSTREAM: &str = "decode_bitstream";
    pub const CANCEL_DECODE: &str = "cancel_decode";
    pub const PRINT_SCREEN: &str = "print_screen";
    pub const CHECK_UPDATE: &str = "check_update";
    pub const RELOAD_FILTER: &str = "reload_filter";
    pub const FILTER_ORDER_UP: &str = "filter_order_up";
    pub const FILTER_ORDER_DOWN: &str = "filter_order_down";
    pub const FILTER_ENABLE: &str = "filter_enable";
    pub const SWITCH_THEME: &str = "switch_theme";
}

/// Update parameter names widgets subscribe to.
pub mod updates {
    pub const PICTURE: &str = "picture";
    pub const TOTAL_FRAME_NUM: &str = "total_frame_num";
    pub const CURRENT_FRAME_POC: &str = "current_frame_poc";
    pub const SEQUENCE_NAME: &str = "sequence_name";
    pub const DECODE_BUSY: &str = "decode_busy";
    pub const THEME_STYLESHEET: &str = "theme_stylesheet";
    pub const THEME_NAME: &str = "theme_name";
    pub const SNAPSHOT: &str = "snapshot";
    pub const FILTER_ORDER: &str = "filter_order";
    pub const ENABLED_FILTERS: &str = "enabled_filters";
    pub const LATEST_VERSION: &str = "latest_version";
    pub const UPDATE_AVAILABLE: &str = "update_available";
    pub const DOWNLOAD_URL: &str = "download_url";
    pub use crate::core::front_controller::ERROR_MESSAGE;
}

/// Register every viewer command.
pub fn register_all(fc: &mut FrontController) -> BusResult<()> {
    fc.register(Box::new(navigation::PrevFrame))?;
    fc.register(Box::new(navigation::NextFrame))?;
    fc.register(Box::new(navigation::JumpToPercent))?;
    fc.register(Box::new(navigation::JumpToFrame))?;
    fc.register(Box::new(decode::DecodeBitstream))?;
    fc.register(Box::new(decode::CancelDecode))?;
    fc.register(Box::new(snapshot::PrintScreen))?;
    fc.register(Box::new(update::CheckUpdate))?;
    fc.register(Box::new(filters::ReloadFilter))?;
    fc.register(Box::new(filters::FilterOrderUp))?;
    fc.register(Box::new(filters::FilterOrderDown))?;
    fc.register(Box::new(filters::FilterEnable))?;
    fc.register(Box::new(theme::SwitchTheme))?;
    Ok(())
}

/// Front controller with all commands, owned by the calling (UI) thread.
pub fn controller(app: Arc<AppContext>, num_threads: usize) -> BusResult<FrontController> {
    let workers = Arc::new(Workers::new(num_threads, app.decode_cancel().epoch_ref()));
    let mut fc = FrontController::new(app, UpdateBus::new(), workers);
    register_all(&mut fc)?;
    Ok(fc)
}

/// Frame counters plus current picture, read under one lock.
pub(crate) fn frame_update(app: &AppContext, with_total: bool) -> Option<UpdateEvent> {
    let seq = app.sequence();
    let picture = seq.current_picture()?;
    let mut evt = UpdateEvent::new()
        .with(updates::CURRENT_FRAME_POC, picture.poc)
        .with(updates::PICTURE, crate::core::Handle::from_arc(picture));
    if with_total {
        evt.set(updates::TOTAL_FRAME_NUM, seq.total());
    }
    Some(evt)
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_all_commands_registered() {
        let fc = test_controller();
        for name in [
            names::PREV_FRAME,
            names::NEXT_FRAME,
            names::JUMPTO_PERCENT,
            names::JUMPTO_FRAME,
            names::DECODE_BITSTREAM,
            names::CANCEL_DECODE,
            names::PRINT_SCREEN,
            names::CHECK_UPDATE,
            names::RELOAD_FILTER,
            names::FILTER_ORDER_UP,
            names::FILTER_ORDER_DOWN,
            names::FILTER_ENABLE,
            names::SWITCH_THEME,
        ] {
            assert!(fc.contains(name), "{} not registered", name);
        }
        assert_eq!(fc.command_names().len(), 13);
    }

    #[test]
    fn test_register_twice_fails() {
        let mut fc = test_controller();
        assert!(register_all(&mut fc).is_err());
    }
}
