use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;
use crate::events::{FsNotice, MonitorEvent, NoticeKind};

/// Recursive filesystem subscription delivering [`MonitorEvent`]s in order.
pub struct FolderMonitor {
    _watcher: RecommendedWatcher,
    event_rx: Receiver<MonitorEvent>,
    event_tx: Sender<MonitorEvent>,
}

impl FolderMonitor {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let (event_tx, event_rx) = mpsc::channel::<MonitorEvent>();

        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(path, RecursiveMode::Recursive)?;

        let forward_tx = event_tx.clone();

        // Translate notify events off the callback thread
        thread::spawn(move || {
            while let Ok(result) = rx.recv() {
                match result {
                    Ok(event) => {
                        for notice in translate(event) {
                            if forward_tx.send(MonitorEvent::Notice(notice)).is_err() {
                                return; // Receiver dropped, exit thread
                            }
                        }
                    }
                    Err(err) => {
                        tracing::error!("File watcher error: {}", err);
                    }
                }
            }
        });

        tracing::debug!("Watching {} recursively", path.display());

        Ok(Self {
            _watcher: watcher,
            event_rx,
            event_tx,
        })
    }

    /// Handle that can stop the monitor from another thread (signal handlers).
    pub fn stop_handle(&self) -> Sender<MonitorEvent> {
        self.event_tx.clone()
    }

    pub fn stop(&self) {
        let _ = self.event_tx.send(MonitorEvent::Stop);
    }

    pub fn try_recv(&self) -> std::result::Result<MonitorEvent, mpsc::TryRecvError> {
        self.event_rx.try_recv()
    }

    pub fn recv(&self) -> std::result::Result<MonitorEvent, mpsc::RecvError> {
        self.event_rx.recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<MonitorEvent, mpsc::RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }
}

/// Map one notify event onto zero or more core notices.
///
/// Renames become a deletion of the old path and a creation of the new one.
pub fn translate(event: Event) -> Vec<FsNotice> {
    let Event { kind, paths, .. } = event;

    match kind {
        EventKind::Create(CreateKind::Folder) => paths
            .into_iter()
            .map(|p| FsNotice::new(NoticeKind::Created, p).directory())
            .collect(),
        EventKind::Create(_) => paths
            .into_iter()
            .map(|p| observed(NoticeKind::Created, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .into_iter()
            .map(|p| FsNotice::new(NoticeKind::Deleted, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
            .into_iter()
            .map(|p| observed(NoticeKind::Created, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            let mut notices = Vec::new();
            if let Some(from) = paths.next() {
                notices.push(FsNotice::new(NoticeKind::Deleted, from));
            }
            if let Some(to) = paths.next() {
                notices.push(observed(NoticeKind::Created, to));
            }
            notices
        }
        // Backends that cannot tell which side of a rename this is
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|p| {
                if p.exists() {
                    observed(NoticeKind::Created, p)
                } else {
                    FsNotice::new(NoticeKind::Deleted, p)
                }
            })
            .collect(),
        EventKind::Modify(_) => paths
            .into_iter()
            .map(|p| observed(NoticeKind::Modified, p))
            .collect(),
        EventKind::Remove(RemoveKind::Folder) => paths
            .into_iter()
            .map(|p| FsNotice::new(NoticeKind::Deleted, p).directory())
            .collect(),
        EventKind::Remove(_) => paths
            .into_iter()
            .map(|p| FsNotice::new(NoticeKind::Deleted, p))
            .collect(),
        _ => Vec::new(),
    }
}

fn observed(kind: NoticeKind, path: PathBuf) -> FsNotice {
    let is_dir = path.is_dir();
    let notice = FsNotice::new(kind, path);
    if is_dir {
        notice.directory()
    } else {
        notice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_translate_create_modify_remove() {
        let created = translate(event(EventKind::Create(CreateKind::File), &["/nowhere/a.rvt"]));
        assert_eq!(created, vec![FsNotice::new(NoticeKind::Created, PathBuf::from("/nowhere/a.rvt"))]);

        let modified = translate(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/nowhere/a.rvt"],
        ));
        assert_eq!(modified[0].kind, NoticeKind::Modified);

        let removed = translate(event(EventKind::Remove(RemoveKind::File), &["/nowhere/a.rvt"]));
        assert_eq!(removed[0].kind, NoticeKind::Deleted);
        assert!(!removed[0].is_dir);
    }

    #[test]
    fn test_translate_folder_events_are_directories() {
        let created = translate(event(EventKind::Create(CreateKind::Folder), &["/nowhere/Работа"]));
        assert!(created[0].is_dir);

        let removed = translate(event(EventKind::Remove(RemoveKind::Folder), &["/nowhere/Работа"]));
        assert!(removed[0].is_dir);
    }

    #[test]
    fn test_translate_rename_both_splits() {
        let notices = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/nowhere/old.rvt", "/nowhere/new.rvt"],
        ));

        assert_eq!(
            notices,
            vec![
                FsNotice::new(NoticeKind::Deleted, PathBuf::from("/nowhere/old.rvt")),
                FsNotice::new(NoticeKind::Created, PathBuf::from("/nowhere/new.rvt")),
            ]
        );
    }

    #[test]
    fn test_translate_rename_from_is_delete() {
        let notices = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/nowhere/old.rvt"],
        ));
        assert_eq!(notices[0].kind, NoticeKind::Deleted);
    }

    #[test]
    fn test_translate_ignores_access() {
        let notices = translate(event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/nowhere/a.rvt"],
        ));
        assert!(notices.is_empty());
    }

    #[test]
    fn test_stop_is_delivered() {
        let dir = tempfile::TempDir::new().unwrap();
        let monitor = FolderMonitor::new(dir.path()).unwrap();

        monitor.stop();

        let mut stopped = false;
        for _ in 0..10 {
            match monitor.recv_timeout(Duration::from_millis(200)) {
                Ok(MonitorEvent::Stop) => {
                    stopped = true;
                    break;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        assert!(stopped);
    }
}
