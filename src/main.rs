use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use timbre_table::config::AppConfig;
use timbre_table::dataset::{self, BuildOptions};
use timbre_table::schema::Feature;

#[derive(Parser)]
#[command(name = "timbre-table", version, about = "Audio feature table builder")]
struct Cli {
    /// Path to a config file (defaults to the XDG config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract features from every audio file in a directory and write a CSV table
    Build {
        /// Directory holding the audio files (not searched recursively)
        directory: PathBuf,

        /// Where to write the table (defaults to <DIRECTORY>/Result.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop at the first file that fails instead of skipping it
        #[arg(long)]
        fail_fast: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Extract features from a single file and print them
    Extract {
        /// Audio file to analyze
        file: PathBuf,

        /// Print the full record as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show the table columns and their row counts
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Build {
            directory,
            output,
            fail_fast,
            no_progress,
        } => {
            anyhow::ensure!(
                directory.is_dir(),
                "{} is not a directory",
                directory.display()
            );
            let options = BuildOptions {
                output: config.output_for(&directory, output),
                fail_fast: fail_fast || config.fail_fast,
                progress: config.progress && !no_progress,
            };
            let report = dataset::build(&directory, &options).context("Build failed")?;

            println!(
                "Build complete: {} rows written to {}, {} failed",
                report.table.len(),
                report.output.display(),
                report.failures.len()
            );
            for failure in &report.failures {
                println!("  {}: {}", failure.id, failure.error);
            }
        }

        Commands::Extract { file, json } => {
            let id = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let record = timbre_table::analyzer::extract(&id, &file)
                .with_context(|| format!("Extraction failed for {}", file.display()))?;

            if json {
                let text = serde_json::to_string_pretty(&record).context("Serialization failed")?;
                println!("{}", text);
                return Ok(());
            }

            println!("{}", record.id);
            println!();
            println!(
                "{:<20} {:>6} {:>8} {:>12} {:>12} {:>12}",
                "Feature", "Rows", "Frames", "Min", "Mean", "Max"
            );
            println!("{}", "-".repeat(75));
            for (feature, array) in record.features.iter() {
                let (rows, frames) = array.dim();
                let mean = array.mean().unwrap_or(0.0);
                let min = array.iter().copied().fold(f32::INFINITY, f32::min);
                let max = array.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                println!(
                    "{:<20} {:>6} {:>8} {:>12.4} {:>12.4} {:>12.4}",
                    feature.name(),
                    rows,
                    frames,
                    min,
                    mean,
                    max
                );
            }
        }

        Commands::Schema => {
            println!("{:<20} {:>6}", "Column", "Rows");
            println!("{}", "-".repeat(27));
            println!("{:<20} {:>6}", timbre_table::schema::ID_COLUMN, "-");
            for feature in Feature::ALL {
                println!("{:<20} {:>6}", feature.name(), feature.rows());
            }
            println!();
            println!(
                "Supported formats: {}",
                timbre_table::SUPPORTED_EXTENSIONS.join(", ")
            );
        }
    }

    Ok(())
}
