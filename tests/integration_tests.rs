use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use chrono::{Local, NaiveDate, TimeZone};
use tempfile::TempDir;
use pairwatch::{
    FsNotice, MonitorEvent, NoticeKind, PairwatchConfig, RecordTag, Session, Snapshot,
};

fn work_dir(root: &Path, project: &str) -> PathBuf {
    let work = root.join(project).join("Работа");
    fs::create_dir_all(&work).expect("Failed to create work dir");
    work
}

fn write_with_mtime(path: &Path, day: u32, hour: u32) {
    fs::write(path, b"model").expect("Failed to write test file");
    let when: SystemTime = Local
        .with_ymd_and_hms(2024, 1, day, hour, 0, 0)
        .single()
        .expect("Unambiguous local time")
        .into();
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(when))
        .expect("Failed to set mtime");
}

fn canonical_root(dir: &TempDir) -> PathBuf {
    dir.path().canonicalize().expect("Failed to canonicalize temp dir")
}

#[test]
fn test_end_to_end_scan_then_delete() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");
    let rvt = work.join("core.rvt");
    let ifc = work.join("core.ifc");
    write_with_mtime(&rvt, 1, 12);
    write_with_mtime(&ifc, 1, 12);

    let session = Session::in_memory(&root, &PairwatchConfig::default())
        .expect("Failed to open session");
    assert_eq!(session.initial_scan().unwrap(), 2);

    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.rows[0].filename, "core.ifc");
    assert_eq!(snapshot.rows[0].tags, vec![RecordTag::Ifc, RecordTag::Highlighted]);
    assert_eq!(snapshot.rows[1].filename, "core.rvt");
    assert_eq!(snapshot.rows[1].tags, vec![RecordTag::Rvt, RecordTag::Highlighted]);
    assert_eq!(snapshot.rows[0].parent_folder, "ProjectA");
    assert_eq!(
        snapshot.rows[0].last_modified.date(),
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    );

    fs::remove_file(&rvt).expect("Failed to delete test file");
    let snapshot = session
        .handle_notice(&FsNotice::new(NoticeKind::Deleted, rvt.clone()))
        .unwrap()
        .expect("Deletion should produce a snapshot");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.rows[0].path, ifc);
    assert_eq!(snapshot.rows[0].tags, vec![RecordTag::Ifc]);
    assert!(snapshot.highlighted.is_empty());
}

#[test]
fn test_pairs_on_different_days_are_not_highlighted() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");
    write_with_mtime(&work.join("tower.rvt"), 1, 23);
    write_with_mtime(&work.join("tower.ifc"), 2, 1);

    let session = Session::in_memory(&root, &PairwatchConfig::default()).unwrap();
    session.initial_scan().unwrap();

    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.highlighted.is_empty());
    // Sorted by modification time inside the folder
    assert_eq!(snapshot.rows[0].filename, "tower.rvt");
}

#[test]
fn test_threshold_boundary_through_session() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");
    // similarity("tower", "tower_v1") == 77
    write_with_mtime(&work.join("tower.rvt"), 1, 9);
    write_with_mtime(&work.join("tower_v1.ifc"), 1, 17);

    let mut config = PairwatchConfig::default();
    config.matching.threshold = "77".to_string();
    let session = Session::in_memory(&root, &config).unwrap();
    session.initial_scan().unwrap();
    assert_eq!(session.snapshot().unwrap().highlighted.len(), 2);

    session.set_threshold("78");
    assert!(session.snapshot().unwrap().highlighted.is_empty());
}

#[test]
fn test_groups_are_reported_per_project() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let a = work_dir(&root, "ProjectA");
    let b = work_dir(&root, "ProjectB");
    write_with_mtime(&a.join("core.rvt"), 1, 9);
    write_with_mtime(&a.join("core.ifc"), 1, 10);
    write_with_mtime(&b.join("core.rvt"), 1, 9);
    write_with_mtime(&root.join("ProjectB").join("core.ifc"), 1, 9);

    let session = Session::in_memory(&root, &PairwatchConfig::default()).unwrap();
    session.initial_scan().unwrap();

    let groups = session.groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key.parent_folder, "ProjectA");
    assert_eq!(groups[0].paths.len(), 2);
}

#[test]
fn test_store_file_is_recreated_on_open() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");
    write_with_mtime(&work.join("core.rvt"), 1, 9);

    let mut config = PairwatchConfig::default();
    config.store.path = root.join("files.db");
    fs::write(&config.store.path, b"not a database").unwrap();

    // Whatever was at the store location is replaced by a fresh database.
    let session = Session::open(&root, &config).expect("Failed to open session");
    assert!(session.snapshot().unwrap().is_empty());

    session.initial_scan().unwrap();
    assert_eq!(session.snapshot().unwrap().len(), 1);
    assert_ne!(fs::read(&config.store.path).unwrap(), b"not a database".to_vec());
}

fn wait_for<F>(session: &Session, monitor: &pairwatch::FolderMonitor, done: F) -> bool
where
    F: Fn(&Snapshot) -> bool,
{
    for _ in 0..25 {
        match monitor.recv_timeout(Duration::from_millis(200)) {
            Ok(MonitorEvent::Notice(notice)) => {
                if let Ok(Some(snapshot)) = session.handle_notice(&notice) {
                    if done(&snapshot) {
                        return true;
                    }
                }
            }
            Ok(MonitorEvent::Stop) => return false,
            Err(_) => continue,
        }
    }
    false
}

#[test]
fn test_live_monitoring_tracks_create_and_delete() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");

    let session = Session::in_memory(&root, &PairwatchConfig::default()).unwrap();
    let monitor = session.subscribe().expect("Failed to create file watcher");
    session.initial_scan().unwrap();

    let rvt = work.join("hall.rvt");
    let ifc = work.join("hall.ifc");
    fs::write(&rvt, b"model").expect("Failed to write test file");
    fs::write(&ifc, b"model").expect("Failed to write test file");

    let paired = wait_for(&session, &monitor, |s| s.highlighted.len() == 2);
    assert!(paired, "Did not see both files highlighted");

    fs::remove_file(&rvt).expect("Failed to delete test file");
    let removed = wait_for(&session, &monitor, |s| s.row(&rvt).is_none());
    assert!(removed, "Did not receive deletion event");

    let snapshot = session.snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.highlighted.is_empty());
}

#[test]
fn test_live_monitoring_follows_directory_moves() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");
    write_with_mtime(&work.join("core.rvt"), 1, 9);
    write_with_mtime(&work.join("core.ifc"), 1, 9);

    let outside = TempDir::new().expect("Failed to create temp dir");
    let staged = work_dir(outside.path(), "ProjectC");
    write_with_mtime(&staged.join("hall.rvt"), 2, 9);
    write_with_mtime(&staged.join("hall.ifc"), 2, 9);

    let session = Session::in_memory(&root, &PairwatchConfig::default()).unwrap();
    let monitor = session.subscribe().expect("Failed to create file watcher");
    assert_eq!(session.initial_scan().unwrap(), 2);

    let old = root.join("ProjectA");
    let new = root.join("ProjectB");
    fs::rename(&old, &new).expect("Failed to rename project");
    let renamed = wait_for(&session, &monitor, |s| {
        s.len() == 2 && s.rows.iter().all(|r| r.parent_folder == "ProjectB")
    });
    assert!(renamed, "Rows did not follow the renamed project");

    fs::rename(outside.path().join("ProjectC"), root.join("ProjectC"))
        .expect("Failed to move project in");
    let arrived = wait_for(&session, &monitor, |s| s.len() == 4);
    assert!(arrived, "Moved-in project was not recorded");

    let snapshot = session.snapshot().unwrap();
    assert!(snapshot.rows.iter().all(|r| !r.path.starts_with(&old)));
    assert_eq!(snapshot.highlighted.len(), 4);
}

#[test]
fn test_watch_runs_until_stopped() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = canonical_root(&temp_dir);
    let work = work_dir(&root, "ProjectA");
    write_with_mtime(&work.join("core.rvt"), 1, 9);

    let session = Arc::new(Session::in_memory(&root, &PairwatchConfig::default()).unwrap());
    let (stop_tx, stop_rx) = mpsc::channel();
    let (seen_tx, seen_rx) = mpsc::channel::<usize>();

    let worker = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let mut sink = move |snapshot: &Snapshot| {
                let _ = seen_tx.send(snapshot.len());
            };
            session.watch(&mut sink, |monitor| {
                let _ = stop_tx.send(monitor.stop_handle());
                Ok(())
            })
        })
    };

    let stop = stop_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("Monitor never started");
    let first = seen_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("No initial snapshot");
    assert_eq!(first, 1);

    stop.send(MonitorEvent::Stop).unwrap();
    let result = worker.join().expect("Watch thread panicked");
    assert!(result.is_ok());
}
