use apkparser::{to_pretty_json, Apk, ApkError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apkparser")]
#[command(version, about = "Inspect the manifest, resources and bytecode of an Android package", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the manifest as XML with resource references resolved
    Manifest {
        /// Path to the package
        apk: PathBuf,
    },
    /// Print the resource table strings, one per line
    Strings {
        /// Path to the package
        apk: PathBuf,
    },
    /// Print class names and string literals of the bytecode as JSON
    Dexes {
        /// Path to the package
        apk: PathBuf,
    },
    /// Print everything as one JSON document
    All {
        /// Path to the package
        apk: PathBuf,
    },
}

#[derive(Debug)]
enum CliError {
    Apk(ApkError),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Apk(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "failed writing JSON: {err}"),
        }
    }
}

impl From<ApkError> for CliError {
    fn from(value: ApkError) -> Self {
        CliError::Apk(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        CliError::Json(value)
    }
}

fn run(command: Commands) -> Result<String, CliError> {
    let output = match command {
        Commands::Manifest { apk } => Apk::open(apk)?.manifest()?,
        Commands::Strings { apk } => {
            let mut text = String::new();
            for line in Apk::open(apk)?.strings()? {
                text.push_str(&line);
                text.push('\n');
            }
            text
        }
        Commands::Dexes { apk } => {
            let mut json = to_pretty_json(&Apk::open(apk)?.dexes())?;
            json.push('\n');
            json
        }
        Commands::All { apk } => {
            let mut json = to_pretty_json(&Apk::open(apk)?.all()?)?;
            json.push('\n');
            json
        }
    };
    Ok(output)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
