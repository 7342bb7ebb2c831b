//! Filter pipeline commands.
//!
//! Every change publishes `filter_order` (names, execution order) and
//! `enabled_filters` so the filter list widget redraws without querying the
//! model. Reordering is persisted to preferences.

use log::info;

use super::{names, updates};
use crate::core::{BusError, BusResult, Command, CommandContext, InvocationEvent, Params, UpdateEvent};
use crate::model::{AppContext, FilterError, keys};

fn order_update(app: &AppContext) -> UpdateEvent {
    let filters = app.filters();
    UpdateEvent::new()
        .with(updates::FILTER_ORDER, filters.order())
        .with(updates::ENABLED_FILTERS, filters.enabled_names())
}

fn filter_failed(command: &str, err: FilterError) -> BusError {
    BusError::failed(command, err.to_string())
}

/// Shared body of the up/down commands.
fn reorder(
    ctx: &CommandContext<'_>,
    command: &str,
    input: &Params,
    mv: fn(&mut crate::model::FilterPipeline, &str) -> Result<usize, FilterError>,
) -> BusResult<Params> {
    let name = input.get_str("filter_name")?;
    let index = mv(&mut *ctx.app().filters(), name).map_err(|e| filter_failed(command, e))?;
    ctx.app().save_filter_order();
    ctx.publish(order_update(ctx.app()));
    Ok(Params::new().with("index", index))
}

/// `filter_name`: move one slot later in the pipeline.
pub struct FilterOrderDown;

impl Command for FilterOrderDown {
    fn name(&self) -> &'static str {
        names::FILTER_ORDER_DOWN
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        reorder(ctx, self.name(), input, crate::model::FilterPipeline::move_down)
    }
}

/// `filter_name`: move one slot earlier in the pipeline.
pub struct FilterOrderUp;

impl Command for FilterOrderUp {
    fn name(&self) -> &'static str {
        names::FILTER_ORDER_UP
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        reorder(ctx, self.name(), input, crate::model::FilterPipeline::move_up)
    }
}

/// `filter_name`, `enable`.
pub struct FilterEnable;

impl Command for FilterEnable {
    fn name(&self) -> &'static str {
        names::FILTER_ENABLE
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        let name = input.get_str("filter_name")?;
        let enable = input.get_bool("enable")?;
        ctx.app()
            .filters()
            .set_enabled(name, enable)
            .map_err(|e| filter_failed(self.name(), e))?;
        ctx.publish(order_update(ctx.app()));
        Ok(Params::new().with("enable", enable))
    }
}

/// Rescan the plugin directory, then optionally chain into another command.
///
/// `command_name` plus any other parameters are forwarded, e.g. opening a
/// dropped file after refreshing plugins:
/// `reload_filter command_name=decode_bitstream filename=clip.bin`.
pub struct ReloadFilter;

impl Command for ReloadFilter {
    fn name(&self) -> &'static str {
        names::RELOAD_FILTER
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        let chained = input.opt_str("command_name")?.map(str::to_string);
        if chained.as_deref() == Some(self.name()) {
            return Err(BusError::invalid("command_name", "reload_filter cannot chain into itself"));
        }

        let count = match ctx.app().setting_path(keys::PLUGIN_DIR) {
            Some(dir) => {
                let mut filters = ctx.app().filters();
                let count = filters.reload_from_dir(&dir);
                filters.apply_order(&ctx.app().settings().get_str_list(keys::FILTER_ORDER));
                info!("Reloaded {} filter(s) from {}", count, dir.display());
                count
            }
            None => {
                info!("No plugin directory configured, keeping current filters");
                ctx.app().filters().len()
            }
        };
        ctx.publish(order_update(ctx.app()));

        let mut out = match chained {
            Some(command) => {
                let mut forwarded = input.clone();
                forwarded.remove("command_name");
                ctx.dispatch(&InvocationEvent::with_params(command, forwarded))?
            }
            None => Params::new(),
        };
        out.set("filter_count", count);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{controller_with, test_controller};
    use crate::model::{FilterPipeline, SettingsStore};
    use std::sync::{Arc, Mutex};

    fn with_filters(names: &[&str]) -> crate::core::FrontController {
        let fc = test_controller();
        *fc.app().filters() = FilterPipeline::from_names(names.iter().copied());
        fc
    }

    #[test]
    fn test_order_down_publishes_and_persists() {
        let fc = with_filters(&["deblock", "qp_map", "motion"]);
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let s = Arc::clone(&seen);
        fc.bus().listen_to(updates::FILTER_ORDER, move |evt| {
            *s.lock().unwrap() = evt.get_str_list(updates::FILTER_ORDER).unwrap().to_vec();
        });

        let out = InvocationEvent::new(names::FILTER_ORDER_DOWN)
            .with("filter_name", "deblock")
            .dispatch(&fc)
            .unwrap();
        assert_eq!(out.get_int("index"), Ok(1));
        assert_eq!(*seen.lock().unwrap(), vec!["qp_map", "deblock", "motion"]);
        assert_eq!(
            fc.app().settings().get_str_list(keys::FILTER_ORDER),
            vec!["qp_map", "deblock", "motion"]
        );
    }

    #[test]
    fn test_order_down_failures() {
        let fc = with_filters(&["deblock", "motion"]);
        let last = InvocationEvent::new(names::FILTER_ORDER_DOWN)
            .with("filter_name", "motion")
            .dispatch(&fc);
        assert!(matches!(last, Err(BusError::CommandFailed { .. })));

        let unknown = InvocationEvent::new(names::FILTER_ORDER_DOWN)
            .with("filter_name", "ghost")
            .dispatch(&fc);
        assert!(matches!(unknown, Err(BusError::CommandFailed { .. })));
        assert_eq!(fc.app().filters().order(), vec!["deblock", "motion"]);
    }

    #[test]
    fn test_order_up_and_enable() {
        let fc = with_filters(&["deblock", "motion"]);
        InvocationEvent::new(names::FILTER_ORDER_UP)
            .with("filter_name", "motion")
            .dispatch(&fc)
            .unwrap();
        InvocationEvent::new(names::FILTER_ENABLE)
            .with("filter_name", "deblock")
            .with("enable", false)
            .dispatch(&fc)
            .unwrap();
        assert_eq!(fc.app().filters().order(), vec!["motion", "deblock"]);
        assert_eq!(fc.app().filters().enabled_names(), vec!["motion"]);
    }

    #[test]
    fn test_reload_and_chain() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deblock.so"), b"").unwrap();
        let mut settings = SettingsStore::in_memory();
        settings.set(keys::PLUGIN_DIR, dir.path().to_string_lossy().into_owned());
        let fc = controller_with(settings);
        assert_eq!(fc.app().filters().order(), vec!["deblock"]);

        std::fs::write(dir.path().join("motion.so"), b"").unwrap();
        let out = InvocationEvent::new(names::RELOAD_FILTER)
            .with("command_name", names::SWITCH_THEME)
            .with("theme_name", "dark")
            .dispatch(&fc)
            .unwrap();
        assert_eq!(out.get_int("filter_count"), Ok(2));
        // Chained command output comes back merged
        assert_eq!(out.get_str(updates::THEME_NAME), Ok("dark"));
        assert_eq!(fc.app().filters().order(), vec!["deblock", "motion"]);
    }

    #[test]
    fn test_reload_cannot_chain_itself() {
        let fc = test_controller();
        let res = InvocationEvent::new(names::RELOAD_FILTER)
            .with("command_name", names::RELOAD_FILTER)
            .dispatch(&fc);
        assert!(matches!(res, Err(BusError::InvalidParameter { .. })));
    }

    #[test]
    fn test_reload_chain_failure_shown_once() {
        let fc = test_controller();
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));
        let e = Arc::clone(&errors);
        fc.bus().listen_to(updates::ERROR_MESSAGE, move |evt| {
            e.lock()
                .unwrap()
                .push(evt.get_str(updates::ERROR_MESSAGE).unwrap().to_string());
        });

        // Drop-to-open: refresh plugins, then open the dropped file
        let res = InvocationEvent::new(names::RELOAD_FILTER)
            .with("command_name", names::DECODE_BITSTREAM)
            .with("filename", "/no/such.bin")
            .dispatch(&fc);
        assert!(matches!(res, Err(BusError::ResourceUnavailable(_))));
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("/no/such.bin"));
    }

    #[test]
    fn test_reload_chain_unknown_command() {
        let fc = test_controller();
        let res = InvocationEvent::new(names::RELOAD_FILTER)
            .with("command_name", "open_sesame")
            .dispatch(&fc);
        assert_eq!(res, Err(BusError::UnknownCommand("open_sesame".into())));
    }
}
