pub mod table;

pub use table::DatasetTable;

use crate::analyzer::{self, ExtractError};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Cell encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed table {path}: {message}")]
    Malformed { path: String, message: String },
    #[error("Extraction failed for {id}: {source}")]
    Extract {
        id: String,
        #[source]
        source: ExtractError,
    },
}

/// How a directory build runs and where it writes.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Destination of the CSV table.
    pub output: PathBuf,
    /// Stop at the first file that fails instead of recording it and moving on.
    pub fail_fast: bool,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl BuildOptions {
    /// Defaults for `directory`: write `Result.csv` inside it, isolate
    /// per-file failures, no progress bar.
    pub fn for_directory(directory: &Path) -> Self {
        Self {
            output: directory.join(crate::DEFAULT_OUTPUT_NAME),
            fail_fast: false,
            progress: false,
        }
    }
}

/// A file that produced no record, and why.
#[derive(Debug)]
pub struct FileFailure {
    pub id: String,
    pub error: ExtractError,
}

pub struct BuildReport {
    pub table: DatasetTable,
    pub failures: Vec<FileFailure>,
    pub output: PathBuf,
}

/// Plain files directly inside `directory`, sorted by name, excluding `skip`.
pub fn list_files(directory: &Path, skip: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let skip = skip.canonicalize().ok();
    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if skip.is_some() && entry.path().canonicalize().ok() == skip {
            log::debug!("Skipping output file {}", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Extract features from every file in `directory` and write the table.
///
/// The output file is opened first, so an unwritable destination fails
/// before any audio is decoded. Files are processed one at a time in name
/// order, each keyed by its file name. A file that fails is logged and
/// listed in the report unless `fail_fast` is set, in which case the error
/// is returned and nothing is written.
pub fn build(directory: &Path, options: &BuildOptions) -> Result<BuildReport, DatasetError> {
    // Left untruncated until the table is ready
    let existed = options.output.exists();
    let out = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&options.output)?;

    let files = list_files(directory, &options.output)?;
    log::info!(
        "Extracting features from {} files in {}",
        files.len(),
        directory.display()
    );

    let pb = progress_bar(files.len() as u64, options.progress);
    let mut table = DatasetTable::new();
    let mut failures = Vec::new();

    for path in &files {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        pb.set_message(id.clone());

        match analyzer::extract(&id, path) {
            Ok(record) => table.push(record),
            Err(error) if options.fail_fast => {
                pb.abandon_with_message(format!("Failed on {}", id));
                drop(out);
                if !existed {
                    std::fs::remove_file(&options.output)?;
                }
                return Err(DatasetError::Extract { id, source: error });
            }
            Err(error) => {
                log::warn!("Skipping {}: {}", id, error);
                failures.push(FileFailure { id, error });
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {} extracted, {} failed",
        table.len(),
        failures.len()
    ));

    out.set_len(0)?;
    table.write_csv_to(BufWriter::new(out))?;
    log::info!(
        "Wrote {} rows to {}",
        table.len(),
        options.output.display()
    );

    Ok(BuildReport {
        table,
        failures,
        output: options.output.clone(),
    })
}
