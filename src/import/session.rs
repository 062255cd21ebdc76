//! Import session: walk the root, hash each eligible file, submit its record.
//!
//! One file is read, hashed and submitted before the next is looked at.
//! Per-file problems become a [`FileOutcome`]; only configuration errors
//! stop a run.

use std::path::Path;
use std::time::{Duration, Instant};

use super::walk::{check_eligibility, Eligibility, SkipReason, Walker};
use crate::config::ImportOptions;
use crate::error::{ImportError, Result};
use crate::hash::{HashComputer, HashType};
use crate::record::FileRecord;
use crate::sink::{InsertResult, RecordSink};

/// Why a file could not be imported
#[derive(Debug)]
pub enum FileFailure {
    /// Open or read failed; the file is skipped
    Access(ImportError),
    /// The sink refused or failed the insertion
    Sink(ImportError),
}

/// What happened to one enumerated entry
#[derive(Debug)]
pub enum FileOutcome {
    Submitted(InsertResult),
    Skipped(SkipReason),
    Failed(FileFailure),
}

/// Reported to the observer of [`ImportSession::run_with`]
#[derive(Debug)]
pub enum ImportEvent<'a> {
    /// An eligible file is about to be read and submitted
    Importing(&'a Path),
    /// Final outcome for an enumerated entry
    Finished(&'a Path, &'a FileOutcome),
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub access_failures: usize,
    pub sink_failures: usize,
    pub total_bytes: u64,
    pub duration: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        self.discovered += 1;
        match outcome {
            FileOutcome::Submitted(_) => self.submitted += 1,
            FileOutcome::Skipped(_) => self.skipped += 1,
            FileOutcome::Failed(FileFailure::Access(_)) => self.access_failures += 1,
            FileOutcome::Failed(FileFailure::Sink(_)) => self.sink_failures += 1,
        }
    }

    pub fn has_sink_failures(&self) -> bool {
        self.sink_failures > 0
    }
}

/// The single handle every submission in a run goes through
pub struct ImportSession<S: RecordSink> {
    options: ImportOptions,
    sink: S,
    computer: HashComputer,
}

impl<S: RecordSink> ImportSession<S> {
    /// Validate the options and bind them to a sink. Nothing is read yet.
    pub fn new(options: ImportOptions, sink: S) -> Result<Self> {
        options.validate()?;
        let computer = HashComputer::new()
            .with_algorithms(&HashType::active_set(options.fuzzy))
            .with_mime_detection(options.detect_mime);
        Ok(Self {
            options,
            sink,
            computer,
        })
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Import every eligible file under the root.
    pub fn run(&mut self) -> RunSummary {
        self.run_with(|_| {})
    }

    /// Like [`run`](Self::run), reporting each file before it is read and
    /// each entry once its outcome is known.
    pub fn run_with<F>(&mut self, mut observer: F) -> RunSummary
    where
        F: FnMut(ImportEvent<'_>),
    {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        tracing::info!(
            root = %self.options.root.display(),
            source = %self.options.source,
            policy = self.options.policy.description(),
            "starting import"
        );

        let walker = Walker::new(&self.options.root).with_exclude(self.options.exclude.as_deref());
        for path in walker.entries() {
            let outcome = if walker.is_excluded(&path) {
                FileOutcome::Skipped(SkipReason::Excluded)
            } else {
                self.import_file(&path, &mut summary, &mut observer)
            };

            if let FileOutcome::Skipped(reason) = &outcome {
                if *reason != SkipReason::Directory {
                    tracing::debug!(path = %path.display(), %reason, "skipped");
                }
            }

            // Directories are traversed, not counted as files
            if !matches!(outcome, FileOutcome::Skipped(SkipReason::Directory)) {
                summary.record(&outcome);
            }
            observer(ImportEvent::Finished(&path, &outcome));
        }

        if let Err(err) = self.sink.flush() {
            tracing::error!("{}", err);
            summary.sink_failures += 1;
        }
        summary.duration = start.elapsed();

        tracing::info!(
            submitted = summary.submitted,
            skipped = summary.skipped,
            access_failures = summary.access_failures,
            sink_failures = summary.sink_failures,
            total_bytes = summary.total_bytes,
            "import complete"
        );
        summary
    }

    fn import_file<F>(
        &mut self,
        path: &Path,
        summary: &mut RunSummary,
        observer: &mut F,
    ) -> FileOutcome
    where
        F: FnMut(ImportEvent<'_>),
    {
        match check_eligibility(path) {
            Ok(Eligibility::Eligible) => {}
            Ok(Eligibility::Skip(reason)) => return FileOutcome::Skipped(reason),
            Err(e) => {
                let err = ImportError::from_io_error(e, "checking", Some(path.to_path_buf()));
                tracing::warn!("{}", err);
                return FileOutcome::Failed(FileFailure::Access(err));
            }
        }

        observer(ImportEvent::Importing(path));
        let record = match self.build_record(path) {
            Ok(record) => record,
            // Removed after the eligibility check
            Err(ImportError::FileNotFound { .. }) => {
                return FileOutcome::Skipped(SkipReason::Vanished)
            }
            Err(err) => {
                tracing::warn!("{}", err);
                return FileOutcome::Failed(FileFailure::Access(err));
            }
        };

        match self.sink.insert(&record) {
            Ok(result) => {
                summary.total_bytes += record.file_size().unwrap_or(0);
                FileOutcome::Submitted(result)
            }
            Err(err) => {
                tracing::error!(path = %path.display(), "{}", err);
                FileOutcome::Failed(FileFailure::Sink(err))
            }
        }
    }

    /// Hash a file and attach metadata and the parent link
    pub fn build_record(&self, path: &Path) -> Result<FileRecord> {
        let digest = self.computer.compute_file(path)?;
        let file_name = path.to_string_lossy();
        let mut record = FileRecord::from_digest(&file_name, &digest);

        if let Some(parent) = &self.options.parent {
            record.add_parent(parent.as_str());
            for meta in &self.options.parent_meta {
                record.add_parent_meta(parent.as_str(), meta.key.as_str(), meta.value.as_str());
            }
        }
        Ok(record)
    }
}
