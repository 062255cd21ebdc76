// Command-line interface
// Flag definitions and their resolution into validated import options

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::config::{
    normalize_parent_hash, parse_parent_meta, ConflictPolicy, FileConfig, ImportOptions,
    DEFAULT_OUTPUT, DEFAULT_SOURCE,
};
use crate::error::{ImportError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "hashlookup-import",
    about = "Directory importer for hashlookup server",
    version
)]
pub struct Cli {
    /// Directory to import
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Source name to be used as meta [default: hashlookup-import]
    #[arg(short = 's', long = "source")]
    pub source: Option<String>,

    /// Update existing records instead of deleting and reinserting them
    #[arg(short = 'u', long = "update", conflicts_with = "skip_exists")]
    pub update: bool,

    /// Skip files whose hash already exists
    #[arg(short = 'e', long = "skip-exists")]
    pub skip_exists: bool,

    /// SHA-1 of the parent artifact every record is linked to
    #[arg(short = 'p', long = "parent")]
    pub parent: Option<String>,

    /// Metadata for the parent link, as key,value (repeatable)
    #[arg(long = "parent-meta", value_name = "KEY,VALUE", num_args = 1..)]
    pub parent_meta: Vec<String>,

    /// Print sink responses and a version banner
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// TOML file with default values for the options above
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON Lines file records are appended to [default: hashlookup-import.jsonl]
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Hash and report, but keep records in memory only
    #[arg(long = "dry-run", conflicts_with = "output")]
    pub dry_run: bool,

    /// Do not classify file content
    #[arg(long = "no-mime")]
    pub no_mime: bool,

    /// Skip TLSH and SSDEEP
    #[arg(long = "no-fuzzy")]
    pub no_fuzzy: bool,
}

/// Exit status for configuration errors, including rejected command lines
pub const EXIT_CONFIG: u8 = 1;

/// Exit status when the sink did not accept every record
pub const EXIT_SINK: u8 = 2;

/// Where records go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    DryRun,
    JsonLines(PathBuf),
}

impl Cli {
    /// Exit status for a command line clap refused to parse.
    /// `--help` and `--version` land here too and are not failures.
    pub fn parse_error_status(err: &clap::Error) -> u8 {
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => EXIT_CONFIG,
        }
    }

    /// Usage text printed alongside configuration errors
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }

    /// Merge the config file (if any) under the flags and validate the result.
    /// Fails before any file under the root is touched.
    pub fn resolve(&self) -> Result<(ImportOptions, Output)> {
        let root = self
            .dir
            .clone()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| ImportError::MissingRequiredArgument {
                argument: "--dir".to_string(),
            })?;

        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let mut meta_entries = file.parent_meta.clone();
        meta_entries.extend(self.parent_meta.iter().cloned());
        let parent_meta = parse_parent_meta(&meta_entries)?;

        let parent = self
            .parent
            .as_deref()
            .or(file.parent.as_deref())
            .map(normalize_parent_hash)
            .transpose()?;

        let update = self.update || file.update.unwrap_or(false);
        let skip_exists = self.skip_exists || file.skip_exists.unwrap_or(false);

        let output = if self.dry_run {
            Output::DryRun
        } else {
            Output::JsonLines(
                self.output
                    .clone()
                    .or(file.output)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            )
        };

        let mut options = ImportOptions::new(root)
            .with_source(
                self.source
                    .clone()
                    .or(file.source)
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            )
            .with_policy(ConflictPolicy::from_flags(update, skip_exists))
            .with_verbose(self.verbose);
        options.publish = file.publish.unwrap_or(true);
        options.parent = parent;
        options.parent_meta = parent_meta;
        options.detect_mime = !self.no_mime;
        options.fuzzy = !self.no_fuzzy;
        if let Output::JsonLines(path) = &output {
            options.exclude = Some(path.clone());
        }

        options.validate()?;
        Ok((options, output))
    }
}
