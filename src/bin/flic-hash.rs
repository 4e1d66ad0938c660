//! Print the MD5 of the decoded audio stored in each FLAC file's header.

use std::path::PathBuf;

use clap::Parser;

use flic::config;
use flic::flac::{AudioVerifier, FlacTool};

#[derive(Parser, Debug)]
#[command(name = "flic-hash", version, about = "Show the audio MD5 recorded in FLAC files")]
struct Args {
    /// Path of the `metaflac` executable
    #[arg(long, value_name = "PATH")]
    metaflac: Option<PathBuf>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let settings = config::load(args.config.as_deref()).map_err(|err| err.to_string())?;
    let metaflac = args
        .metaflac
        .or(settings.metaflac_path)
        .or_else(|| {
            settings
                .flac_path
                .map(|flac| FlacTool::new(flac).metaflac_path().to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("metaflac"));
    let tool = FlacTool::new("flac").with_metaflac(metaflac);

    let mut failures = 0usize;
    for file in &args.files {
        match tool.hash(file) {
            Ok(md5) => println!("{md5}  {}", file.display()),
            Err(err) => {
                eprintln!("{err}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(format!("{failures} of {} file(s) could not be hashed", args.files.len()));
    }
    Ok(())
}
