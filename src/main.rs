//! `flic`: verify a FLAC collection a slice at a time.
//!
//! Usage:
//!     flic --flac /usr/bin/flac --folder ~/Music --report ~/flic.csv --age -2 --min-percentage 5

use std::path::PathBuf;
use std::process;

use clap::Parser;
use clap::error::ErrorKind;
use thiserror::Error;
use tracing::error;

use flic::config::{self, ConfigError, Settings};
use flic::flac::FlacTool;
use flic::integrity::selection::SelectionError;
use flic::integrity::{
    AgeRule, CheckError, CheckRequest, ProportionRole, ProportionRule, SelectionPolicy,
    SystemClock, check,
};
use flic::logging;

const EXIT_USAGE: i32 = -1;
const EXIT_VERIFICATION: i32 = -2;
const EXIT_FAILURE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "flic", version, about = "Incremental integrity checks for a FLAC collection")]
struct Args {
    /// Path of the `flac` executable (may come from the settings file)
    #[arg(long, value_name = "PATH", env = "FLIC_FLAC")]
    flac: Option<PathBuf>,

    /// Path of the `metaflac` executable (defaults to the one next to `flac`)
    #[arg(long, value_name = "PATH")]
    metaflac: Option<PathBuf>,

    /// Root folder of the collection
    #[arg(long, value_name = "DIR")]
    folder: PathBuf,

    /// History file of past checks
    #[arg(long, value_name = "FILE")]
    report: PathBuf,

    /// Minutes since the last check; -1 = never checked, -2 = not checked today
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    age: Option<i64>,

    /// Check at least this share of the collection
    #[arg(
        long,
        value_name = "PERCENT",
        value_parser = clap::value_parser!(i64).range(1..=100),
        conflicts_with = "max_percentage"
    )]
    min_percentage: Option<i64>,

    /// Check at most this share of the collection
    #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(i64).range(1..=100))]
    max_percentage: Option<i64>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Check(#[from] CheckError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Selection(_) => EXIT_USAGE,
            Self::Check(err) if err.is_verification_failure() => EXIT_VERIFICATION,
            Self::Config(_) | Self::Check(_) => EXIT_FAILURE,
        }
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            process::exit(EXIT_USAGE);
        }
    };

    // Captured before logging spawns its writer thread.
    let clock = SystemClock::local();
    if let Err(err) = logging::init("flic") {
        eprintln!("Logging disabled: {err}");
    }
    let code = match run(args, clock) {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    };
    logging::shutdown();
    process::exit(code);
}

fn run(args: Args, clock: SystemClock) -> Result<(), CliError> {
    let settings = config::load(args.config.as_deref())?;
    let policy = selection_policy(&args)?;
    let tool = flac_tool(&args, &settings)?;

    let request = CheckRequest {
        extensions: settings.extensions.clone(),
        separator: settings.separator_byte()?,
        modtime_tolerance: settings.modtime_tolerance(),
        autosave_interval: settings.autosave_interval(),
        ..CheckRequest::new(args.folder, args.report, policy)
    };
    check(&request, &tool, clock)?;
    Ok(())
}

fn selection_policy(args: &Args) -> Result<SelectionPolicy, SelectionError> {
    let age = args.age.map(AgeRule::from_flag).transpose()?;
    let proportion = match (args.min_percentage, args.max_percentage) {
        (Some(percent), _) => Some(ProportionRule::new(percent, ProportionRole::Min)?),
        (None, Some(percent)) => Some(ProportionRule::new(percent, ProportionRole::Max)?),
        (None, None) => None,
    };
    Ok(SelectionPolicy { age, proportion })
}

/// Command-line paths win over the settings file.
fn flac_tool(args: &Args, settings: &Settings) -> Result<FlacTool, CliError> {
    let flac = args
        .flac
        .clone()
        .or_else(|| settings.flac_path.clone())
        .ok_or_else(|| CliError::Usage("Missing --flac (or `flac_path` in settings)".into()))?;
    let tool = FlacTool::new(flac);
    Ok(match args.metaflac.clone().or_else(|| settings.metaflac_path.clone()) {
        Some(metaflac) => tool.with_metaflac(metaflac),
        None => tool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let base = ["flic", "--folder", "/music", "--report", "/tmp/report.csv"];
        Args::try_parse_from(base.iter().chain(extra))
    }

    #[test]
    fn negative_age_flags_parse() {
        let args = parse(&["--age", "-2"]).unwrap();
        assert_eq!(
            selection_policy(&args).unwrap().age,
            Some(AgeRule::NotCheckedToday)
        );
        let args = parse(&["--age", "-1"]).unwrap();
        assert_eq!(selection_policy(&args).unwrap().age, Some(AgeRule::NeverChecked));
    }

    #[test]
    fn unknown_negative_age_is_a_usage_error() {
        let args = parse(&["--age", "-7"]).unwrap();
        let err = CliError::from(selection_policy(&args).unwrap_err());
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn percentages_are_bounded_and_exclusive() {
        assert!(parse(&["--min-percentage", "0"]).is_err());
        assert!(parse(&["--max-percentage", "101"]).is_err());
        let err = parse(&["--min-percentage", "5", "--max-percentage", "10"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let args = parse(&["--max-percentage", "25"]).unwrap();
        let rule = selection_policy(&args).unwrap().proportion.unwrap();
        assert_eq!(rule.percent(), 25);
        assert_eq!(rule.role(), ProportionRole::Max);
    }

    #[test]
    fn folder_and_report_are_required() {
        let err = Args::try_parse_from(["flic", "--folder", "/music"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn flac_path_falls_back_to_settings() {
        let args = parse(&[]).unwrap();
        let err = flac_tool(&args, &Settings::default()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE);

        let settings = Settings {
            flac_path: Some(PathBuf::from("/opt/flac/flac")),
            ..Settings::default()
        };
        let tool = flac_tool(&args, &settings).unwrap();
        assert_eq!(tool.metaflac_path(), PathBuf::from("/opt/flac/metaflac"));

        let args = parse(&["--flac", "/usr/bin/flac", "--metaflac", "/x/metaflac"]).unwrap();
        let tool = flac_tool(&args, &settings).unwrap();
        assert_eq!(tool.flac_path(), PathBuf::from("/usr/bin/flac"));
        assert_eq!(tool.metaflac_path(), PathBuf::from("/x/metaflac"));
    }
}
