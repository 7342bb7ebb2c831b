//! `check_update`: compare the running version against a release manifest.
//!
//! The manifest location comes from the `update_manifest` preference and is
//! read on a worker; the result is posted back as an update:
//! ```json
//! { "latest_version": "0.2.0", "download_url": "https://..." }
//! ```

use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{names, updates};
use crate::core::{BusError, BusResult, Command, CommandContext, Params, UpdateEvent};
use crate::model::keys;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateManifest {
    pub latest_version: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Numeric dotted-version comparison; non-numeric parts count as 0.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .trim_start_matches('v')
            .split(['.', '-'])
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    };
    let (mut a, mut b) = (parse(candidate), parse(current));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a > b
}

fn read_manifest(path: &Path) -> BusResult<UpdateManifest> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| BusError::ResourceUnavailable(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map_err(|e| BusError::failed(names::CHECK_UPDATE, format!("bad manifest: {}", e)))
}

pub struct CheckUpdate;

impl Command for CheckUpdate {
    fn name(&self) -> &'static str {
        names::CHECK_UPDATE
    }

    fn execute(&self, ctx: &CommandContext<'_>, _input: &Params) -> BusResult<Params> {
        let manifest: PathBuf = ctx
            .app()
            .setting_path(keys::UPDATE_MANIFEST)
            .ok_or_else(|| BusError::ResourceUnavailable("no update manifest configured".into()))?;
        let poster = ctx.poster();
        debug!("Checking for updates via {}", manifest.display());

        ctx.workers().execute(move || match read_manifest(&manifest) {
            Ok(m) => {
                let current = env!("CARGO_PKG_VERSION");
                let available = is_newer(&m.latest_version, current);
                info!("Latest version {} (running {})", m.latest_version, current);
                let mut evt = UpdateEvent::new()
                    .with(updates::LATEST_VERSION, m.latest_version)
                    .with(updates::UPDATE_AVAILABLE, available);
                if let Some(url) = m.download_url {
                    evt.set(updates::DOWNLOAD_URL, url);
                }
                poster.post_update(evt);
            }
            Err(err) => poster.post_task(move |ctx| ctx.report(&err)),
        });

        Ok(Params::new().with("accepted", true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{controller_with, pump_until, test_controller};
    use crate::core::InvocationEvent;
    use crate::model::SettingsStore;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_is_newer() {
        assert!(is_newer("0.2.0", "0.1.9"));
        assert!(is_newer("v1.0", "0.9.9"));
        assert!(is_newer("0.1.0.1", "0.1.0"));
        assert!(!is_newer("0.1.0", "0.1.0"));
        assert!(!is_newer("0.0.9", "0.1.0"));
    }

    #[test]
    fn test_no_manifest_configured() {
        let fc = test_controller();
        let res = InvocationEvent::new(names::CHECK_UPDATE).dispatch(&fc);
        assert!(matches!(res, Err(BusError::ResourceUnavailable(_))));
    }

    #[test]
    fn test_update_available_posted_from_worker() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("latest.json");
        std::fs::write(
            &manifest,
            r#"{ "latest_version": "99.0.0", "download_url": "https://example.invalid/dl" }"#,
        )
        .unwrap();
        let mut settings = SettingsStore::in_memory();
        settings.set(keys::UPDATE_MANIFEST, manifest.to_string_lossy().into_owned());
        let fc = controller_with(settings);

        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        fc.bus().listen_to(updates::UPDATE_AVAILABLE, move |evt| {
            *s.lock().unwrap() = Some((
                evt.get_bool(updates::UPDATE_AVAILABLE).unwrap(),
                evt.get_str(updates::LATEST_VERSION).unwrap().to_string(),
            ));
        });

        InvocationEvent::new(names::CHECK_UPDATE).dispatch(&fc).unwrap();
        assert!(pump_until(&fc, || seen.lock().unwrap().is_some()));
        assert_eq!(*seen.lock().unwrap(), Some((true, "99.0.0".to_string())));
    }

    #[test]
    fn test_broken_manifest_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("latest.json");
        std::fs::write(&manifest, "nope").unwrap();
        let mut settings = SettingsStore::in_memory();
        settings.set(keys::UPDATE_MANIFEST, manifest.to_string_lossy().into_owned());
        let fc = controller_with(settings);

        let errors = Arc::new(Mutex::new(0));
        let e = Arc::clone(&errors);
        fc.bus().listen_to(updates::ERROR_MESSAGE, move |_| {
            *e.lock().unwrap() += 1;
        });

        InvocationEvent::new(names::CHECK_UPDATE).dispatch(&fc).unwrap();
        assert!(pump_until(&fc, || *errors.lock().unwrap() > 0));
    }
}
