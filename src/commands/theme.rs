//! Theme switching.
//!
//! Parameters: `theme_name`, or `load_theme_from_pref = true` to apply the
//! theme saved in preferences (used once at startup). Publishes
//! `theme_stylesheet` and `theme_name` in a single update.

use log::warn;

use super::{names, updates};
use crate::core::{BusError, BusResult, Command, CommandContext, Params, UpdateEvent};
use crate::model::theme::{self, DEFAULT_THEME};
use crate::model::{ThemeError, keys};

pub struct SwitchTheme;

impl Command for SwitchTheme {
    fn name(&self) -> &'static str {
        names::SWITCH_THEME
    }

    fn execute(&self, ctx: &CommandContext<'_>, input: &Params) -> BusResult<Params> {
        let from_pref = input.opt_bool("load_theme_from_pref")?.unwrap_or(false);
        let theme_dir = ctx.app().setting_path(keys::THEME_DIR);

        let theme = if from_pref {
            let saved = ctx.app().settings().get_str_or(keys::THEME_NAME, DEFAULT_THEME);
            // A stale preference must not leave the UI unstyled
            theme::resolve(&saved, theme_dir.as_deref()).or_else(|e| {
                warn!("{}; falling back to '{}'", e, DEFAULT_THEME);
                theme::resolve(DEFAULT_THEME, theme_dir.as_deref())
            })
        } else {
            let name = input.get_str("theme_name")?;
            theme::resolve(name, theme_dir.as_deref())
        }
        .map_err(|e| match e {
            ThemeError::Unknown(_) | ThemeError::InvalidName(_) => {
                BusError::invalid("theme_name", e.to_string())
            }
            ThemeError::Unreadable { .. } => BusError::ResourceUnavailable(e.to_string()),
        })?;

        {
            let mut settings = ctx.app().settings();
            settings.set(keys::THEME_NAME, theme.name.as_str());
            settings.persist();
        }
        ctx.app().set_theme(theme.clone());

        ctx.publish(
            UpdateEvent::new()
                .with(updates::THEME_STYLESHEET, theme.stylesheet)
                .with(updates::THEME_NAME, theme.name.as_str()),
        );
        Ok(Params::new().with(updates::THEME_NAME, theme.name))
    }
}
