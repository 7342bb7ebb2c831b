use clap::Parser;
use std::path::PathBuf;

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Decoder: Annex-B access unit preview (HM-compatible tokens)\n",
    "Target:  ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// HEVC bitstream viewer (headless)
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Bitstream file to open (H.265 Annex-B)
    #[arg(value_name = "FILE")]
    pub file_path: Option<PathBuf>,

    /// Decoder version token, e.g. HM-16.20 (default: auto)
    #[arg(short = 't', long = "version-tag", value_name = "TAG", default_value = "auto")]
    pub version_tag: String,

    /// Reuse the decoded output of the same file instead of decoding again
    #[arg(long = "skip-decode")]
    pub skip_decode: bool,

    /// Theme to apply instead of the one saved in preferences
    #[arg(long = "theme", value_name = "NAME")]
    pub theme: Option<String>,

    /// Plugin filter directory (saved to preferences)
    #[arg(long = "plugins", value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Theme stylesheet directory with <name>.qss files (saved to preferences)
    #[arg(long = "themes", value_name = "DIR")]
    pub theme_dir: Option<PathBuf>,

    /// Take a snapshot of the final frame and save it here (file or directory)
    #[arg(long = "snapshot", value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Jump to this position (percent) after decoding
    #[arg(long = "jump", value_name = "PERCENT")]
    pub jump: Option<i64>,

    /// Step this many frames after decoding (negative steps back)
    #[arg(long = "steps", value_name = "N", allow_hyphen_values = true)]
    pub steps: Option<i64>,

    /// Command script: one `name key=value ...` per line, `#` comments
    #[arg(short = 's', long = "script", value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Check the configured update manifest for a newer version
    #[arg(long = "check-update")]
    pub check_update: bool,

    /// Enable debug logging to file (default: bitview.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Worker threads for background decoding (default: CPU count - 1)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "bitview", "clip.bin", "-t", "HM-16.20", "--jump", "50", "--steps", "-2", "-vv",
            "--log",
        ])
        .unwrap();
        assert_eq!(args.file_path, Some(PathBuf::from("clip.bin")));
        assert_eq!(args.version_tag, "HM-16.20");
        assert_eq!(args.jump, Some(50));
        assert_eq!(args.steps, Some(-2));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["bitview"]).unwrap();
        assert!(args.file_path.is_none());
        assert_eq!(args.version_tag, "auto");
        assert!(args.log_file.is_none());
        assert!(!args.skip_decode);
    }
}
