//! Re-encode FLAC files in place with the encoder's verify pass enabled.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use flic::flac::{AudioVerifier, FlacTool};
use flic::{config, logging};

#[derive(Parser, Debug)]
#[command(
    name = "flic-reencode",
    version,
    about = "Re-encode FLAC files in place and verify the result"
)]
struct Args {
    /// Path of the `flac` executable (may come from the settings file)
    #[arg(long, value_name = "PATH")]
    flac: Option<PathBuf>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Files to re-encode
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = logging::init("flic-reencode") {
        eprintln!("Logging disabled: {err}");
    }
    let code = match run(args) {
        Ok(()) => 0,
        Err(Failure::Setup(message)) => {
            error!("{message}");
            1
        }
        Err(Failure::Verify(message)) => {
            error!("{message}");
            -2
        }
    };
    logging::shutdown();
    std::process::exit(code);
}

enum Failure {
    Setup(String),
    Verify(String),
}

fn run(args: Args) -> Result<(), Failure> {
    let settings =
        config::load(args.config.as_deref()).map_err(|err| Failure::Setup(err.to_string()))?;
    let flac = args
        .flac
        .or(settings.flac_path)
        .ok_or_else(|| Failure::Setup("Missing --flac (or `flac_path` in settings)".into()))?;
    let tool = FlacTool::new(flac);

    for file in &args.files {
        info!(path = %file.display(), "Re-encoding");
        tool.reencode(file).map_err(|err| {
            Failure::Verify(match err.output() {
                Some(output) => format!("{err}\n{output}"),
                None => err.to_string(),
            })
        })?;
    }
    info!(files = args.files.len(), "Re-encoding finished");
    Ok(())
}
