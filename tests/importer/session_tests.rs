// End-to-end tests for ImportSession

use std::cell::RefCell;
use std::rc::Rc;

use tempfile::tempdir;

use hashlookup_importer::config::{parse_parent_meta, ConflictPolicy};
use hashlookup_importer::error::Result;
use hashlookup_importer::hash::HashType;
use hashlookup_importer::import::{FileFailure, FileOutcome, ImportEvent, SkipReason};
use hashlookup_importer::record::META_MIMETYPE;
use hashlookup_importer::sink::{InsertAction, InsertResult};
use hashlookup_importer::{
    FileRecord, ImportError, ImportOptions, ImportSession, RecordSink, SessionConfig,
};

use crate::common::{memory_sink, options_with_policy, write_file};

const PARENT: &str = "0123456789abcdef0123456789abcdef01234567";

#[test]
fn test_two_files_with_defaults() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"hello");
    let b = write_file(dir.path(), "sub/b.bin", b"\x00\x01\x02");

    let options = ImportOptions::new(dir.path());
    let sink = memory_sink(&options);
    let mut session = ImportSession::new(options, sink).unwrap();
    let summary = session.run();

    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.total_bytes, 8);

    let sink = session.into_sink();
    assert_eq!(sink.len(), 2);

    let name_a = a.to_string_lossy().into_owned();
    let name_b = b.to_string_lossy().into_owned();
    let records: Vec<&FileRecord> = sink.records().map(|s| &s.record).collect();
    let rec_a = *records
        .iter()
        .find(|r| r.file_name() == Some(name_a.as_str()))
        .expect("a.txt submitted");
    let rec_b = *records
        .iter()
        .find(|r| r.file_name() == Some(name_b.as_str()))
        .expect("b.bin submitted");

    assert_eq!(rec_a.file_size(), Some(5));
    assert_eq!(rec_b.file_size(), Some(3));
    assert_eq!(
        rec_a.hash(HashType::Md5),
        Some("5D41402ABC4B2A76B9719D911017C592")
    );
    assert_eq!(
        rec_a.meta.get(META_MIMETYPE).and_then(|v| v.as_str()),
        Some("text/plain")
    );
    for record in [rec_a, rec_b] {
        for algorithm in HashType::CRYPTOGRAPHIC {
            assert!(record.hash(algorithm).is_some());
        }
        assert!(record.parent.is_none());
    }

    for stored in sink.records() {
        assert_eq!(stored.source, "hashlookup-import");
        assert!(stored.published);
    }
}

#[test]
fn test_parent_and_parent_meta_on_every_record() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one", b"first file");
    write_file(dir.path(), "two", b"second file");
    write_file(dir.path(), "nested/three", b"third file");

    let meta = parse_parent_meta(&["FileName,disk.img", "source,case-42"]).unwrap();
    let options = ImportOptions::new(dir.path()).with_parent(PARENT, meta).unwrap();
    let sink = memory_sink(&options);
    let mut session = ImportSession::new(options, sink).unwrap();
    session.run();

    let sink = session.into_sink();
    assert_eq!(sink.len(), 3);
    let expected_parent = PARENT.to_ascii_uppercase();
    for stored in sink.records() {
        let record = &stored.record;
        assert_eq!(record.parent.as_deref(), Some(expected_parent.as_str()));
        assert_eq!(record.parent_meta.len(), 2);
        assert!(record.parent_meta.iter().all(|m| m.parent == expected_parent));
        assert_eq!(record.parent_meta[0].key, "FileName");
        assert_eq!(record.parent_meta[0].value, "disk.img");
        assert_eq!(record.parent_meta[1].key, "source");
    }
}

fn run_duplicates(policy: ConflictPolicy) -> (Vec<InsertAction>, hashlookup_importer::MemorySink) {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"same content");
    write_file(dir.path(), "b.txt", b"same content");

    let options = options_with_policy(dir.path(), policy);
    let sink = memory_sink(&options);
    let mut session = ImportSession::new(options, sink).unwrap();
    let summary = session.run();
    assert_eq!(summary.submitted, 2);

    let sink = session.into_sink();
    let actions = sink.history().iter().map(|(_, r)| r.action).collect();
    (actions, sink)
}

#[test]
fn test_skip_policy_keeps_first_record() {
    let (actions, sink) = run_duplicates(ConflictPolicy::Skip);
    assert_eq!(actions, [InsertAction::Inserted, InsertAction::SkippedExisting]);
    assert_eq!(sink.len(), 1);
    let name = sink.records().next().unwrap().record.file_name().unwrap().to_string();
    assert!(name.ends_with("a.txt"));
}

#[test]
fn test_update_policy_merges_into_existing() {
    let (actions, sink) = run_duplicates(ConflictPolicy::Update);
    assert_eq!(actions, [InsertAction::Inserted, InsertAction::Updated]);
    assert_eq!(sink.len(), 1);
    let name = sink.records().next().unwrap().record.file_name().unwrap().to_string();
    assert!(name.ends_with("b.txt"));
}

#[test]
fn test_replace_policy_is_the_default() {
    assert_eq!(ConflictPolicy::default(), ConflictPolicy::Replace);
    let (actions, sink) = run_duplicates(ConflictPolicy::Replace);
    assert_eq!(actions, [InsertAction::Inserted, InsertAction::Replaced]);
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_rerun_on_unchanged_tree_yields_identical_hashes() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "stable.bin", &vec![7u8; 70_000]);

    let mut hashes = Vec::new();
    for _ in 0..2 {
        let options = ImportOptions::new(dir.path());
        let sink = memory_sink(&options);
        let mut session = ImportSession::new(options, sink).unwrap();
        session.run();
        let sink = session.into_sink();
        hashes.push(sink.records().next().unwrap().record.hashes.clone());
    }
    assert_eq!(hashes[0], hashes[1]);
}

struct FailingSink {
    session: SessionConfig,
    attempts: usize,
}

impl RecordSink for FailingSink {
    fn version(&self) -> String {
        "failing".to_string()
    }

    fn session(&self) -> &SessionConfig {
        &self.session
    }

    fn insert(&mut self, record: &FileRecord) -> Result<InsertResult> {
        self.attempts += 1;
        Err(ImportError::SinkRejected {
            key: record.primary_key().unwrap_or_default().to_string(),
            reason: "service unavailable".to_string(),
        })
    }
}

#[test]
fn test_sink_failure_does_not_stop_the_run() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "x", b"x");
    write_file(dir.path(), "y", b"y");
    write_file(dir.path(), "z/z", b"z");

    let options = ImportOptions::new(dir.path());
    let sink = FailingSink {
        session: SessionConfig::from_options(&options),
        attempts: 0,
    };
    let mut session = ImportSession::new(options, sink).unwrap();
    let mut sink_errors = 0;
    let summary = session.run_with(|event| {
        if let ImportEvent::Finished(_, FileOutcome::Failed(FileFailure::Sink(err))) = event {
            assert!(err.is_sink());
            sink_errors += 1;
        }
    });

    assert_eq!(sink_errors, 3);
    assert_eq!(summary.sink_failures, 3);
    assert_eq!(summary.submitted, 0);
    assert!(summary.has_sink_failures());
    assert_eq!(session.sink().attempts, 3);
}

struct UnflushableSink {
    inner: hashlookup_importer::MemorySink,
}

impl RecordSink for UnflushableSink {
    fn version(&self) -> String {
        "unflushable".to_string()
    }

    fn session(&self) -> &SessionConfig {
        self.inner.session()
    }

    fn insert(&mut self, record: &FileRecord) -> Result<InsertResult> {
        self.inner.insert(record)
    }

    fn flush(&mut self) -> Result<()> {
        Err(ImportError::sink_io(
            std::io::Error::new(std::io::ErrorKind::Other, "device full"),
            "flushing output",
        ))
    }
}

#[test]
fn test_failed_final_flush_keeps_the_summary() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "one", b"1");
    write_file(dir.path(), "two", b"2");

    let options = ImportOptions::new(dir.path());
    let sink = UnflushableSink {
        inner: memory_sink(&options),
    };
    let mut session = ImportSession::new(options, sink).unwrap();
    let summary = session.run();

    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.sink_failures, 1);
    assert!(summary.has_sink_failures());
}

#[test]
fn test_observer_sees_files_before_submission() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "d/f.txt", b"content");

    let options = ImportOptions::new(dir.path());
    let sink = memory_sink(&options);
    let mut session = ImportSession::new(options, sink).unwrap();
    let mut seen = Vec::new();
    let summary = session.run_with(|event| {
        let (path, tag) = match event {
            ImportEvent::Importing(path) => (path, "importing"),
            ImportEvent::Finished(path, FileOutcome::Submitted(_)) => (path, "submitted"),
            ImportEvent::Finished(path, FileOutcome::Skipped(SkipReason::Directory)) => {
                (path, "directory")
            }
            ImportEvent::Finished(path, FileOutcome::Skipped(_)) => (path, "skipped"),
            ImportEvent::Finished(path, FileOutcome::Failed(_)) => (path, "failed"),
        };
        seen.push((path.file_name().unwrap().to_string_lossy().into_owned(), tag));
    });

    assert_eq!(
        seen,
        [
            ("d".to_string(), "directory"),
            ("f.txt".to_string(), "importing"),
            ("f.txt".to_string(), "submitted")
        ]
    );
    // Directories are not counted as discovered files
    assert_eq!(summary.discovered, 1);
}

#[test]
fn test_excluded_output_is_not_imported() {
    let dir = tempdir().unwrap();
    let out = write_file(dir.path(), "records.jsonl", b"");
    write_file(dir.path(), "data.txt", b"data");

    let options = ImportOptions::new(dir.path()).with_exclude(Some(out));
    let sink = memory_sink(&options);
    let mut session = ImportSession::new(options, sink).unwrap();
    let summary = session.run();

    assert_eq!(summary.submitted, 1);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn test_missing_root_is_config_error() {
    let dir = tempdir().unwrap();
    let options = ImportOptions::new(dir.path().join("missing"));
    let sink = memory_sink(&options);
    let err = ImportSession::new(options, sink).err().unwrap();
    assert!(err.is_config());
    assert!(matches!(err, ImportError::DirectoryNotFound { .. }));
}

#[test]
fn test_file_as_root_is_config_error() {
    let dir = tempdir().unwrap();
    let file = write_file(dir.path(), "file", b"x");
    let options = ImportOptions::new(&file);
    let sink = memory_sink(&options);
    let err = ImportSession::new(options, sink).err().unwrap();
    assert!(matches!(err, ImportError::NotADirectory { .. }));
}

#[test]
fn test_parent_meta_without_parent_is_config_error() {
    let dir = tempdir().unwrap();
    let mut options = ImportOptions::new(dir.path());
    options.parent_meta = parse_parent_meta(&["k,v"]).unwrap();
    let sink = memory_sink(&options);
    let err = ImportSession::new(options, sink).err().unwrap();
    assert!(matches!(err, ImportError::ParentMetaWithoutParent));
}

struct PendingSink {
    session: SessionConfig,
    inserts: usize,
    seen_before_insert: Vec<String>,
    announced: Rc<RefCell<Vec<String>>>,
}

impl RecordSink for PendingSink {
    fn version(&self) -> String {
        "pending".to_string()
    }

    fn session(&self) -> &SessionConfig {
        &self.session
    }

    fn insert(&mut self, record: &FileRecord) -> Result<InsertResult> {
        self.inserts += 1;
        self.seen_before_insert = self.announced.borrow().clone();
        Ok(InsertResult {
            key: record.primary_key().unwrap_or_default().to_string(),
            action: InsertAction::Inserted,
        })
    }
}

#[test]
fn test_path_is_announced_before_the_sink_call() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "slow.bin", b"payload");

    let announced = Rc::new(RefCell::new(Vec::new()));
    let options = ImportOptions::new(dir.path());
    let sink = PendingSink {
        session: SessionConfig::from_options(&options),
        inserts: 0,
        seen_before_insert: Vec::new(),
        announced: announced.clone(),
    };
    let mut session = ImportSession::new(options, sink).unwrap();
    session.run_with(|event| {
        if let ImportEvent::Importing(path) = event {
            announced
                .borrow_mut()
                .push(path.file_name().unwrap().to_string_lossy().into_owned());
        }
    });

    let sink = session.into_sink();
    assert_eq!(sink.inserts, 1);
    assert_eq!(sink.seen_before_insert, ["slow.bin"]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_unreadable_file_is_skipped_and_run_continues() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"first");
    // Opens fine and reports as a regular file, but reading offset 0 fails with EIO
    symlink("/proc/self/mem", dir.path().join("b_mem")).unwrap();
    write_file(dir.path(), "c.txt", b"third");

    let options = ImportOptions::new(dir.path());
    let sink = memory_sink(&options);
    let mut session = ImportSession::new(options, sink).unwrap();
    let mut failed = Vec::new();
    let summary = session.run_with(|event| {
        if let ImportEvent::Finished(path, FileOutcome::Failed(FileFailure::Access(err))) =
            event
        {
            failed.push((path.to_path_buf(), err.to_string()));
        }
    });

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.submitted, 2);
    assert_eq!(summary.access_failures, 1);
    assert_eq!(summary.sink_failures, 0);
    assert_eq!(failed.len(), 1);
    assert!(failed[0].0.ends_with("b_mem"));
    assert!(failed[0].1.contains("b_mem"));

    let sink = session.into_sink();
    assert_eq!(sink.len(), 2);
    assert!(sink
        .records()
        .all(|s| !s.record.file_name().unwrap().ends_with("b_mem")));
}
