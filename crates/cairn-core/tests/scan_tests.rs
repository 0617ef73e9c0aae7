use cairn_core::hasher::fingerprint_bytes;
use cairn_core::storage::{Catalog, Database, Entry};
use cairn_core::{Error, ProgressReporter, Reconciler, Scanner, WalkOptions};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn setup_catalog(db: &Database, root: &Path) -> Catalog {
    let catalog = Catalog::new("test", &root.to_string_lossy(), "test-host");
    db.create_catalog(&catalog).unwrap();
    catalog
}

fn relative_paths(db: &Database, catalog: &Catalog) -> Vec<String> {
    let mut paths: Vec<String> = db
        .list_entries(&catalog.id)
        .unwrap()
        .into_iter()
        .map(|e| e.relative_path)
        .collect();
    paths.sort();
    paths
}

fn entry_at(db: &Database, catalog: &Catalog, root: &Path, relative: &str) -> Entry {
    db.get_entry(&root.join(relative).to_string_lossy(), &catalog.id)
        .unwrap()
}

fn shift_mtime(path: &Path, back: Duration) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - back).unwrap();
}

fn build_tree(root: &Path) {
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/b.txt"), "bravo!").unwrap();
    fs::write(root.join("sub/.secret"), "x").unwrap();
    fs::write(root.join(".hidden"), "x").unwrap();
    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(".git/config"), "x").unwrap();
}

#[test]
fn test_scan_records_visible_entries_only() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());

    let stats = Scanner::new(&db).scan(&catalog.id, dir.path(), false).unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.directories, 1);
    assert_eq!(stats.total_size, 11);

    assert_eq!(relative_paths(&db, &catalog), vec!["a.txt", "sub", "sub/b.txt"]);

    let stored = db.get_catalog(&catalog.id).unwrap();
    assert_eq!(stored.total_entries, 3);
    assert_eq!(stored.total_size, 11);
    assert!(stored.last_sync.is_some());
}

#[test]
fn test_scan_fingerprints_only_when_requested() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    fs::write(dir.path().join("copy.txt"), "alpha").unwrap();
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());

    Scanner::new(&db).scan(&catalog.id, dir.path(), false).unwrap();
    assert!(db
        .list_entries(&catalog.id)
        .unwrap()
        .iter()
        .all(|e| e.fingerprint.is_none()));

    Scanner::new(&db).scan(&catalog.id, dir.path(), true).unwrap();
    let a = entry_at(&db, &catalog, dir.path(), "a.txt");
    let copy = entry_at(&db, &catalog, dir.path(), "copy.txt");
    let sub = entry_at(&db, &catalog, dir.path(), "sub");
    assert_eq!(a.fingerprint, Some(fingerprint_bytes(b"alpha")));
    assert_eq!(a.fingerprint, copy.fingerprint);
    assert!(sub.is_dir);
    assert!(sub.fingerprint.is_none());
}

#[test]
fn test_scan_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());

    let first = Scanner::new(&db).scan(&catalog.id, dir.path(), true).unwrap();
    let second = Scanner::new(&db).scan(&catalog.id, dir.path(), true).unwrap();
    assert_eq!(first, second);
    assert_eq!(db.list_entries(&catalog.id).unwrap().len(), 3);
}

#[test]
fn test_scan_honours_ignore_patterns() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    fs::create_dir(dir.path().join("node_modules")).unwrap();
    fs::write(dir.path().join("node_modules/pkg.js"), "x").unwrap();
    fs::write(dir.path().join("scratch.tmp"), "x").unwrap();
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());

    let options = WalkOptions {
        ignore_patterns: vec!["*/node_modules".to_string(), "*.tmp".to_string()],
    };
    Scanner::new(&db)
        .with_walk_options(options)
        .scan(&catalog.id, dir.path(), false)
        .unwrap();
    assert_eq!(relative_paths(&db, &catalog), vec!["a.txt", "sub", "sub/b.txt"]);
}

#[test]
fn test_scan_missing_root_fails_at_startup() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("absent");
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, &root);

    let err = Scanner::new(&db).scan(&catalog.id, &root, false).unwrap_err();
    assert!(matches!(err, Error::Startup { .. }));
}

#[test]
fn test_scan_unknown_catalog_is_not_found() {
    let dir = tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let err = Scanner::new(&db).scan("missing", dir.path(), false).unwrap_err();
    assert!(matches!(err, Error::CatalogNotFound(_)));
}

#[test]
fn test_reconcile_without_changes_is_clean() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    Scanner::new(&db).scan(&catalog.id, dir.path(), true).unwrap();

    let stats = Reconciler::new(&db)
        .reconcile(&catalog.id, dir.path(), false)
        .unwrap();
    assert!(stats.is_clean());
    assert_eq!(stats.unchanged, 3);

    let again = Reconciler::new(&db)
        .reconcile(&catalog.id, dir.path(), false)
        .unwrap();
    assert!(again.is_clean());
}

#[test]
fn test_reconcile_adds_and_removes() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    Scanner::new(&db).scan(&catalog.id, dir.path(), false).unwrap();

    fs::write(dir.path().join("new.txt"), "fresh").unwrap();
    fs::remove_dir_all(dir.path().join("sub")).unwrap();

    let stats = Reconciler::new(&db)
        .reconcile(&catalog.id, dir.path(), false)
        .unwrap();
    assert_eq!(stats.added, 1);
    assert_eq!(stats.removed, 2);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.unchanged, 1);

    assert_eq!(relative_paths(&db, &catalog), vec!["a.txt", "new.txt"]);
    let stored = db.get_catalog(&catalog.id).unwrap();
    assert_eq!(stored.total_entries, 2);
    assert_eq!(stored.total_size, 10);

    // New files get a fingerprint even when none was requested.
    let added = entry_at(&db, &catalog, dir.path(), "new.txt");
    assert_eq!(added.fingerprint, Some(fingerprint_bytes(b"fresh")));
}

#[test]
fn test_reconcile_detects_size_and_mtime_changes() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    Scanner::new(&db).scan(&catalog.id, dir.path(), false).unwrap();

    fs::write(dir.path().join("a.txt"), "alpha, longer now").unwrap();
    shift_mtime(&dir.path().join("sub/b.txt"), Duration::from_secs(3600));

    let stats = Reconciler::new(&db)
        .reconcile(&catalog.id, dir.path(), false)
        .unwrap();
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.added, 0);
    assert_eq!(stats.removed, 0);

    let a = entry_at(&db, &catalog, dir.path(), "a.txt");
    assert_eq!(a.size, 17);
    assert_eq!(db.get_catalog(&catalog.id).unwrap().total_size, 23);
}

#[test]
fn test_reconcile_carries_fingerprint_forward_unless_requested() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("data.bin");
    fs::write(&file, "aaaa").unwrap();
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    Scanner::new(&db).scan(&catalog.id, dir.path(), true).unwrap();

    // Same size, different content and mtime.
    fs::write(&file, "bbbb").unwrap();
    shift_mtime(&file, Duration::from_secs(7200));
    let stats = Reconciler::new(&db)
        .reconcile(&catalog.id, dir.path(), false)
        .unwrap();
    assert_eq!(stats.updated, 1);
    let carried = entry_at(&db, &catalog, dir.path(), "data.bin");
    assert_eq!(carried.fingerprint, Some(fingerprint_bytes(b"aaaa")));

    shift_mtime(&file, Duration::from_secs(3600));
    Reconciler::new(&db)
        .reconcile(&catalog.id, dir.path(), true)
        .unwrap();
    let refreshed = entry_at(&db, &catalog, dir.path(), "data.bin");
    assert_eq!(refreshed.fingerprint, Some(fingerprint_bytes(b"bbbb")));
}

#[test]
fn test_reconcile_missing_root_leaves_catalog_intact() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("tree");
    fs::create_dir(&root).unwrap();
    build_tree(&root);
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, &root);
    Scanner::new(&db).scan(&catalog.id, &root, false).unwrap();

    fs::remove_dir_all(&root).unwrap();
    let err = Reconciler::new(&db)
        .reconcile(&catalog.id, &root, false)
        .unwrap_err();
    assert!(matches!(err, Error::Startup { .. }));
    assert_eq!(db.list_entries(&catalog.id).unwrap().len(), 3);
}

#[derive(Default)]
struct RecordingReporter {
    started: Mutex<Vec<(String, Option<u64>)>>,
    entries: AtomicU64,
    completed: AtomicU64,
}

impl ProgressReporter for RecordingReporter {
    fn on_walk_start(&self, label: &str, total_files: Option<u64>) {
        self.started
            .lock()
            .unwrap()
            .push((label.to_string(), total_files));
    }

    fn on_entry(&self, _relative_path: &str, _files_seen: u64, _bytes_seen: u64) {
        self.entries.fetch_add(1, Ordering::SeqCst);
    }

    fn on_walk_complete(&self, files: u64, _duration_secs: f64) {
        self.completed.store(files, Ordering::SeqCst);
    }
}

#[test]
fn test_progress_reporter_sees_every_file() {
    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    let reporter = RecordingReporter::default();

    Scanner::new(&db)
        .with_reporter(&reporter)
        .with_count_timeout(Some(Duration::from_secs(30)))
        .scan(&catalog.id, dir.path(), false)
        .unwrap();

    let started = reporter.started.lock().unwrap().clone();
    assert_eq!(started, vec![("Indexing".to_string(), Some(2))]);
    assert_eq!(reporter.entries.load(Ordering::SeqCst), 2);
    assert_eq!(reporter.completed.load(Ordering::SeqCst), 2);
}

#[cfg(unix)]
fn make_fifo(path: &Path) {
    let status = std::process::Command::new("mkfifo")
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success());
}

#[cfg(unix)]
#[test]
fn test_named_pipes_are_recorded_without_fingerprint() {
    use std::sync::mpsc;
    use std::thread;

    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    make_fifo(&root.join("pipe"));

    let (tx, rx) = mpsc::channel();
    let worker_root = root.clone();
    thread::spawn(move || {
        let db = Database::open_in_memory().unwrap();
        let catalog = setup_catalog(&db, &worker_root);
        Scanner::new(&db).scan(&catalog.id, &worker_root, true).unwrap();
        let scanned = (
            entry_at(&db, &catalog, &worker_root, "a.txt"),
            entry_at(&db, &catalog, &worker_root, "pipe"),
        );

        make_fifo(&worker_root.join("later"));
        let stats = Reconciler::new(&db)
            .reconcile(&catalog.id, &worker_root, true)
            .unwrap();
        let later = entry_at(&db, &catalog, &worker_root, "later");
        let _ = tx.send((scanned, stats.added, later));
    });

    let ((a, pipe), added, later) = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("scan blocked on a named pipe");
    assert_eq!(a.fingerprint, Some(fingerprint_bytes(b"alpha")));
    assert!(!pipe.is_dir);
    assert!(pipe.fingerprint.is_none());
    assert_eq!(added, 1);
    assert!(later.fingerprint.is_none());
}

#[cfg(unix)]
#[test]
fn test_scan_skips_unreadable_directory_and_keeps_siblings() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    build_tree(dir.path());
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("inner.txt"), "x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    // Privileged users can still list it.
    let unreadable = fs::read_dir(&locked).is_err();

    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    let result = Scanner::new(&db).scan(&catalog.id, dir.path(), true);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let stats = result.unwrap();
    let paths = relative_paths(&db, &catalog);
    for sibling in ["a.txt", "locked", "sub", "sub/b.txt"] {
        assert!(paths.contains(&sibling.to_string()), "missing {}", sibling);
    }
    if unreadable {
        assert!(!paths.contains(&"locked/inner.txt".to_string()));
        assert_eq!(stats.files, 2);
    }
    let a = entry_at(&db, &catalog, dir.path(), "a.txt");
    assert_eq!(a.fingerprint, Some(fingerprint_bytes(b"alpha")));
}

#[test]
fn test_store_rejection_aborts_scan_naming_the_entry() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bad"), "x").unwrap();
    fs::write(dir.path().join("good.txt"), "y").unwrap();
    let db = Database::open_in_memory().unwrap();
    let catalog = setup_catalog(&db, dir.path());
    db.connection()
        .execute_batch(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON entry
             WHEN NEW.relative_path = 'bad'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

    let err = Scanner::new(&db)
        .scan(&catalog.id, dir.path(), false)
        .unwrap_err();
    match err {
        Error::Record { path, .. } => assert!(path.ends_with("bad"), "{}", path),
        other => panic!("expected Record, got {:?}", other),
    }
    assert!(!relative_paths(&db, &catalog).contains(&"bad".to_string()));
    assert!(db.get_catalog(&catalog.id).unwrap().last_sync.is_none());
}
