pub mod analyzer;
pub mod config;
pub mod dataset;
pub mod schema;

/// Audio file extensions the decoder understands
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "wave", "flac"];

/// Table file written into the source directory when no output is given
pub const DEFAULT_OUTPUT_NAME: &str = "Result.csv";

/// Application name for XDG paths
pub const APP_NAME: &str = "timbre-table";
