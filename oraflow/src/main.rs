//! Oracle forecast transfer tool.
//!
//! Downloads the latest forecast snapshot into Excel and Parquet files, and
//! uploads delimited files into the consolidation table after validating
//! them against the table's schema.
//!
//! # Security Guarantees
//! - Credentials are prompted once and cached AES-GCM encrypted per machine
//! - Passwords never appear in logs, errors, or process output
//! - All SQL values are bound as parameters

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use oraflow_core::{
    config::AppConfig,
    credentials::{ConsolePrompt, CredentialStore},
    error::OraflowError,
    logging::init_logging,
    pipeline::download::{self, DownloadOptions},
    pipeline::upload::{self, UploadOutcome},
    ConnectionManager, Result,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "oraflow")]
#[command(about = "Oracle forecast download and file upload tool")]
#[command(version)]
#[command(long_about = "
oraflow - move forecast data between Oracle and local files

COMMANDS:
  download-forecast   Run the forecast query and write an Excel/Parquet
                      snapshot folder named after the data's validity date
  upload-data         Validate a delimited file against the target table
                      and bulk load it in batches

CREDENTIALS:
  Prompted on first use and cached encrypted (AES-GCM, machine-scoped key)
  in the configured store file. Use --reset-credentials to replace them.

EXIT CODES:
  0  success
  1  general failure (including partial write or load failures)
  2  upload rejected by schema validation; nothing was loaded
  3  database connection failure
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Configuration file path
    #[arg(long, env = "ORAFLOW_CONFIG", help = "Path to oraflow.yaml")]
    config: Option<PathBuf>,

    /// Discard cached credentials and prompt again
    #[arg(long, help = "Discard cached credentials and prompt again")]
    reset_credentials: bool,

    /// Verbose logging
    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Download the latest forecast snapshot
    DownloadForecast {
        /// Directory the snapshot folder is created under
        #[arg(long, default_value = ".", help = "Base directory for the snapshot folder")]
        output_dir: PathBuf,

        /// Skip the Excel workbooks
        #[arg(long, help = "Do not write Excel workbooks")]
        no_excel: bool,

        /// Skip the Parquet mirror
        #[arg(long, help = "Do not write the Parquet mirror")]
        no_parquet: bool,

        /// Print the distribution drive URL after a successful run
        #[arg(long, help = "Print the configured distribution URL")]
        open_drive: bool,
    },

    /// Upload a delimited file into the consolidation table
    UploadData {
        /// Input file; without it, files in the working directory are listed
        #[arg(short, long, help = "Delimited input file (.csv, .tsv, .txt)")]
        file: Option<PathBuf>,

        /// Target table, overriding the configured default
        #[arg(short, long, help = "Target table name")]
        table: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.debug, cli.global.quiet) {
        eprintln!("Error: {e}");
        return ExitCode::from(1);
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(e: &OraflowError) -> ExitCode {
    match e {
        OraflowError::Connection { .. } => ExitCode::from(3),
        _ => ExitCode::from(1),
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.global.config.as_deref())?;
    let store = CredentialStore::new(&config.credentials_file);

    if cli.global.reset_credentials {
        store.clear()?;
        info!("Stored credentials cleared");
    }

    let descriptor = config.active_host()?.descriptor();
    let prompt = ConsolePrompt::new(descriptor);
    let manager = ConnectionManager::new(config.connection_config()?);
    let mut client = manager.establish(&store, &prompt)?;

    let code = match &cli.command {
        Command::DownloadForecast {
            output_dir,
            no_excel,
            no_parquet,
            open_drive,
        } => {
            let options = DownloadOptions {
                excel: !no_excel,
                parquet: !no_parquet,
            };
            let outcome =
                download::download_forecast(&config, client.as_mut(), options, output_dir)?;

            println!(
                "Snapshot written to {} ({} rows, {} workbooks, {} parquet files)",
                outcome.folder.display(),
                outcome.row_count,
                outcome.excel_files.len(),
                outcome.parquet_files.len()
            );
            for (path, reason) in &outcome.writer_failures {
                warn!("Not written: {} ({reason})", path.display());
            }
            if *open_drive {
                match &outcome.drive_url {
                    Some(url) => println!("Distribution drive: {url}"),
                    None => warn!("No distribution drive URL configured"),
                }
            }
            if outcome.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }

        Command::UploadData { file, table } => {
            let path = match file {
                Some(path) => path.clone(),
                None => select_input_file()?,
            };
            let outcome = upload::upload_file(&config, client.as_mut(), &path, table.as_deref())?;
            match outcome {
                UploadOutcome::Rejected(report) => {
                    eprintln!("Upload rejected, nothing was loaded.\n{report}");
                    ExitCode::from(2)
                }
                UploadOutcome::Loaded(summary) => {
                    println!(
                        "Loaded {}/{} rows ({} failed batches)",
                        summary.rows_committed, summary.rows_attempted, summary.batches_failed
                    );
                    if let Some(reason) = &summary.first_failure {
                        eprintln!("First failure: {reason}");
                    }
                    if summary.is_complete() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(1)
                    }
                }
            }
        }
    };

    client.close()?;
    Ok(code)
}

/// Lists uploadable files in the working directory and asks for a pick.
fn select_input_file() -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(".")
        .map_err(|e| OraflowError::io("listing the working directory", e))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_uploadable(path))
        .collect();
    candidates.sort();

    if candidates.is_empty() {
        return Err(OraflowError::file_format(
            "no .csv, .tsv or .txt files in the working directory; use --file",
        ));
    }

    println!("Select a file to upload:");
    for (index, path) in candidates.iter().enumerate() {
        println!("  [{}] {}", index + 1, path.display());
    }
    print!("File number: ");
    std::io::stdout()
        .flush()
        .map_err(|e| OraflowError::io("flushing stdout before prompt", e))?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|e| OraflowError::io("reading file selection", e))?;
    let choice: usize = answer
        .trim()
        .parse()
        .map_err(|_| OraflowError::configuration(format!("not a number: '{}'", answer.trim())))?;

    candidates
        .get(choice.wrapping_sub(1))
        .cloned()
        .ok_or_else(|| {
            OraflowError::configuration(format!(
                "selection {choice} is out of range 1..={}",
                candidates.len()
            ))
        })
}

fn is_uploadable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "tsv" | "txt"))
}
