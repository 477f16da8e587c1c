//! End-to-end runs over a scratch source tree.

use nova_archiver::archive::{list_entries, read_entry};
use nova_archiver::{ArchiveEngine, Fingerprint, HistoryStore, JobConfig, Snapshot};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    source: PathBuf,
    work: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("project");
        let work = temp.path().join("work");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), b"hello").unwrap();
        fs::write(source.join("b.txt"), b"hello").unwrap();
        fs::write(source.join("skip.tmp"), b"x").unwrap();
        Self {
            _temp: temp,
            source,
            work,
        }
    }

    fn engine(&self) -> ArchiveEngine {
        ArchiveEngine::new(JobConfig::new("job", &self.source, &self.work).with_exclude(r".*\.tmp"))
    }

    fn history(&self) -> Vec<String> {
        let mut lines: Vec<String> = fs::read_to_string(self.work.join("job.history"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    }
}

fn snapshot_map(archive: &Path) -> BTreeMap<String, Fingerprint> {
    Snapshot::from_archive(archive)
        .unwrap()
        .expect("archive should carry a snapshot")
        .entries
        .into_iter()
        .map(|e| (e.path, e.md5))
        .collect()
}

#[test]
fn first_run_stores_first_seen_content_once() {
    let fixture = Fixture::new();
    let report = fixture.engine().run().unwrap();
    let hello = Fingerprint::from_bytes(b"hello");

    assert_eq!(report.new_files, 1);
    assert_eq!(report.visited, 2);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.history_before, 0);
    assert_eq!(report.history_after, 1);
    assert_eq!(report.entries, 2);
    assert_eq!(report.archive, fixture.work.join("job.zip"));
    assert_eq!(report.archive_size, fs::metadata(&report.archive).unwrap().len());

    assert_eq!(
        list_entries(&report.archive).unwrap(),
        vec!["project/a.txt".to_string(), "snapshot.json".to_string()]
    );
    assert_eq!(
        read_entry(&report.archive, "project/a.txt").unwrap().unwrap(),
        b"hello"
    );

    let expected: BTreeMap<String, Fingerprint> = [
        ("project/a.txt".to_string(), hello.clone()),
        ("project/b.txt".to_string(), hello.clone()),
    ]
    .into_iter()
    .collect();
    assert_eq!(snapshot_map(&report.archive), expected);

    assert_eq!(fixture.history(), vec![hello.to_string()]);
}

#[test]
fn unchanged_second_run_produces_empty_archive() {
    let fixture = Fixture::new();
    fixture.engine().run().unwrap();
    let history_after_first = fs::read_to_string(fixture.work.join("job.history")).unwrap();

    let report = fixture.engine().run().unwrap();

    assert_eq!(report.new_files, 0);
    assert_eq!(report.visited, 2);
    assert_eq!(report.entries, 0);
    assert!(report.archive.exists());
    assert!(list_entries(&report.archive).unwrap().is_empty());
    assert!(Snapshot::from_archive(&report.archive).unwrap().is_none());
    assert_eq!(
        fs::read_to_string(fixture.work.join("job.history")).unwrap(),
        history_after_first
    );
}

#[test]
fn changed_file_adds_new_fingerprint_and_keeps_old() {
    let fixture = Fixture::new();
    fixture.engine().run().unwrap();
    fixture.engine().run().unwrap();

    fs::write(fixture.source.join("a.txt"), b"world").unwrap();
    let report = fixture.engine().run().unwrap();

    let hello = Fingerprint::from_bytes(b"hello");
    let world = Fingerprint::from_bytes(b"world");

    assert_eq!(report.new_files, 1);
    assert_eq!(
        list_entries(&report.archive).unwrap(),
        vec!["project/a.txt".to_string(), "snapshot.json".to_string()]
    );
    assert_eq!(
        read_entry(&report.archive, "project/a.txt").unwrap().unwrap(),
        b"world"
    );

    let snapshot = snapshot_map(&report.archive);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["project/a.txt"], world);
    assert_eq!(snapshot["project/b.txt"], hello);

    let mut expected = vec![hello.to_string(), world.to_string()];
    expected.sort();
    assert_eq!(fixture.history(), expected);
}

#[test]
fn excluded_files_appear_nowhere() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.source.join("nested")).unwrap();
    fs::write(fixture.source.join("nested").join("cache.tmp"), b"unique").unwrap();

    let report = fixture.engine().run().unwrap();

    assert_eq!(report.excluded, 2);
    let names = list_entries(&report.archive).unwrap();
    assert!(names.iter().all(|n| !n.ends_with(".tmp")));
    assert!(snapshot_map(&report.archive).keys().all(|p| !p.ends_with(".tmp")));

    let history = HistoryStore::load(&fixture.work, "job").unwrap();
    assert!(!history.contains(&Fingerprint::from_bytes(b"unique")));
    assert!(!history.contains(&Fingerprint::from_bytes(b"x")));
}

#[test]
fn history_never_shrinks() {
    let fixture = Fixture::new();
    fs::write(fixture.source.join("c.txt"), b"third").unwrap();
    fixture.engine().run().unwrap();
    let before = fixture.history();

    fs::remove_file(fixture.source.join("c.txt")).unwrap();
    fs::remove_file(fixture.source.join("a.txt")).unwrap();
    let report = fixture.engine().run().unwrap();

    let after = fixture.history();
    assert!(before.iter().all(|fp| after.contains(fp)));
    assert_eq!(report.history_after, report.history_before);
}

#[test]
fn empty_source_yields_valid_empty_archive() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("empty");
    let work = temp.path().join("work");
    fs::create_dir_all(source.join("only").join("dirs")).unwrap();

    let report = ArchiveEngine::new(JobConfig::new("job", &source, &work))
        .run()
        .unwrap();

    assert_eq!(report.new_files, 0);
    assert_eq!(report.visited, 0);
    assert!(list_entries(&report.archive).unwrap().is_empty());
    assert_eq!(fs::read_to_string(work.join("job.history")).unwrap(), "");
}

#[test]
fn stale_archive_is_replaced_not_merged() {
    let fixture = Fixture::new();
    fs::create_dir_all(&fixture.work).unwrap();
    fs::write(fixture.work.join("job.zip"), b"not a zip").unwrap();

    let report = fixture.engine().run().unwrap();

    assert_eq!(list_entries(&report.archive).unwrap().len(), 2);
}

#[test]
fn restore_chain_resolves_every_path() {
    let fixture = Fixture::new();
    let first = fixture.engine().run().unwrap();
    let first_copy = fixture.work.join("run1.zip");
    fs::rename(&first.archive, &first_copy).unwrap();

    fs::write(fixture.source.join("c.txt"), b"new content").unwrap();
    let second = fixture.engine().run().unwrap();

    // every fingerprint in the latest snapshot is stored in one of the archives
    let mut stored = Vec::new();
    for archive in [&first_copy, &second.archive] {
        let snapshot = snapshot_map(archive);
        for name in list_entries(archive).unwrap() {
            if let Some(fp) = snapshot.get(&name) {
                stored.push(fp.clone());
            }
        }
    }
    for fp in snapshot_map(&second.archive).values() {
        assert!(stored.contains(fp), "{} is not stored anywhere", fp);
    }
}
