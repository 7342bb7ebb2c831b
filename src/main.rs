//! Headless bitview driver.
//!
//! Wires the front controller, applies the saved theme, opens the bitstream
//! given on the command line and runs scripted commands, pumping the UI
//! queue until background work has settled.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitview::cli::Args;
use bitview::commands::{self, names};
use bitview::model::{SettingsStore, keys};
use bitview::paths::{self, PathConfig};
use bitview::{AppContext, ConsoleView, FrontController, InvocationEvent};

/// Upper bound for waiting on a single decode or update check.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(120);
const PUMP_SLICE: Duration = Duration::from_millis(50);

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| paths::data_file(paths::LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging, respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Command-line paths override (and are saved to) preferences.
fn apply_overrides(settings: &mut SettingsStore, args: &Args) {
    let as_str = |p: &Path| p.to_string_lossy().into_owned();
    if let Some(dir) = &args.plugin_dir {
        settings.set(keys::PLUGIN_DIR, as_str(dir));
    }
    if let Some(dir) = &args.theme_dir {
        settings.set(keys::THEME_DIR, as_str(dir));
    }
    if let Some(path) = &args.snapshot {
        settings.set(keys::SNAPSHOT_SAVING_PATH, as_str(path));
    }
}

/// Pump until no decode is running and the queue is empty.
fn settle(fc: &FrontController) {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    loop {
        fc.pump();
        if !fc.app().is_decoding() && fc.bus().pending() == 0 {
            return;
        }
        if Instant::now() >= deadline {
            warn!("Background work still running after {:?}", SETTLE_TIMEOUT);
            return;
        }
        fc.pump_blocking(PUMP_SLICE);
    }
}

/// Pump until `done` holds or the settle timeout passes.
fn wait_for(fc: &FrontController, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while !done() {
        if Instant::now() >= deadline {
            warn!("Gave up waiting after {:?}", SETTLE_TIMEOUT);
            return;
        }
        fc.pump_blocking(PUMP_SLICE);
    }
}

/// Dispatch and wait for any background work it started. Failures are
/// already logged and shown by the view.
fn run(fc: &FrontController, event: InvocationEvent) -> bool {
    let name = event.name().to_string();
    let ok = match event.dispatch(fc) {
        Ok(out) => {
            debug!("{} -> {:?}", name, out);
            true
        }
        Err(e) => {
            debug!("{} failed: {}", name, e);
            false
        }
    };
    settle(fc);
    ok
}

fn open_bitstream(fc: &FrontController, file: &Path, args: &Args) {
    if !fc.app().fs().exists(file) {
        warn!("File not found.");
        return;
    }
    info!("Input file: {}", file.display());
    run(
        fc,
        InvocationEvent::new(names::DECODE_BITSTREAM)
            .with("filename", file.to_string_lossy().into_owned())
            .with("skip_decode", args.skip_decode)
            .with("version", args.version_tag.as_str()),
    );
}

fn run_script(fc: &FrontController, script: &Path) -> Result<()> {
    let text = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match InvocationEvent::parse_line(line) {
            Ok(event) => {
                run(fc, event);
            }
            Err(e) => warn!("{}:{}: {}", script.display(), lineno + 1, e),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;

    info!("Bitview {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let settings_path = paths::config_file(paths::SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());
    let mut settings = SettingsStore::load_or_default(settings_path);
    apply_overrides(&mut settings, &args);

    let app = Arc::new(AppContext::new(settings));
    let workers = args
        .workers
        .unwrap_or_else(|| num_cpus::get().saturating_sub(1))
        .max(1);
    let fc = commands::controller(Arc::clone(&app), workers)?;
    let mut view = ConsoleView::attach(fc.bus(), Arc::clone(&app));

    // Theme: explicit choice wins over the saved preference
    let theme = match &args.theme {
        Some(name) => InvocationEvent::new(names::SWITCH_THEME).with("theme_name", name.as_str()),
        None => InvocationEvent::new(names::SWITCH_THEME).with("load_theme_from_pref", true),
    };
    run(&fc, theme);

    if let Some(file) = &args.file_path {
        open_bitstream(&fc, file, &args);
    } else {
        info!("No input file provided, starting with empty state");
    }

    if let Some(percent) = args.jump {
        run(&fc, InvocationEvent::new(names::JUMPTO_PERCENT).with("percent", percent));
    }
    if let Some(steps) = args.steps {
        let name = if steps < 0 { names::PREV_FRAME } else { names::NEXT_FRAME };
        for _ in 0..steps.unsigned_abs() {
            if !run(&fc, InvocationEvent::new(name)) {
                break;
            }
        }
    }
    if let Some(script) = &args.script {
        run_script(&fc, script)?;
    }
    if args.snapshot.is_some() {
        run(&fc, InvocationEvent::new(names::PRINT_SCREEN));
    }
    if args.check_update {
        let errors_before = view.state().errors.len();
        if InvocationEvent::new(names::CHECK_UPDATE).dispatch(&fc).is_ok() {
            // Result arrives from a worker as an update or an error
            wait_for(&fc, || {
                let st = view.state();
                st.update_available.is_some() || st.errors.len() > errors_before
            });
        }
    }

    settle(&fc);
    println!("{}", view.status_line());

    view.detach(fc.bus());
    app.settings().persist();
    info!("Bitview finished");
    Ok(())
}
