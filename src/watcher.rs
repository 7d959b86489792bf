//! # Filesystem Watch Source Module
//!
//! Thin boundary between the OS notification backend and the watch manager.
//!
//! ## Responsibilities:
//! - Defines `WatchEvent`, the only events the pipeline reacts to
//! - Defines `WatchSource`, so the backend can be swapped for a fake in tests
//! - Implements `NotifySource` on top of `notify`'s recommended watcher
//!
//! ## Event translation:
//! | native event            | `WatchEvent`                               |
//! |-------------------------|--------------------------------------------|
//! | file created            | `Created`                                  |
//! | file removed            | `Deleted`                                  |
//! | rename, old name        | `Deleted`                                  |
//! | rename, new name        | `Created`                                  |
//! | rename, both names      | ignored, the halves were already reported  |
//! | rename, side unknown    | `Created` if the path exists, else `Deleted` |
//! | folders, content writes | ignored                                    |
//!
//! Renames are deliberately flattened into delete + create: not every backend
//! reports them atomically, and the rename filter works on that lowest common
//! denominator.

use crate::error::Result;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// Filesystem event as seen by the watch manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Error(String),
}

/// Keeps a watch alive; dropping it stops the watch
pub trait WatchHandle: Send {}

impl WatchHandle for notify::RecommendedWatcher {}

/// Something that can watch a directory tree and report `WatchEvent`s
pub trait WatchSource: Send + Sync {
    fn watch(&self, root: &Path, events: mpsc::UnboundedSender<WatchEvent>) -> Result<Box<dyn WatchHandle>>;
}

/// Recursive watch backed by the platform's native notification API
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySource;

impl WatchSource for NotifySource {
    fn watch(&self, root: &Path, events: mpsc::UnboundedSender<WatchEvent>) -> Result<Box<dyn WatchHandle>> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for translated in translate_event(event) {
                    // receiver gone means the watch is being torn down
                    let _ = events.send(translated);
                }
            }
            Err(e) => {
                let _ = events.send(WatchEvent::Error(e.to_string()));
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!("Native watch registered on {}", root.display());
        Ok(Box::new(watcher))
    }
}

/// Map one native event to zero or more `WatchEvent`s
pub fn translate_event(event: Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => event.paths.into_iter().map(WatchEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(mode, event.paths),
        _ => Vec::new(),
    }
}

fn translate_rename(mode: RenameMode, paths: Vec<PathBuf>) -> Vec<WatchEvent> {
    match mode {
        RenameMode::From => paths.into_iter().map(WatchEvent::Deleted).collect(),
        RenameMode::To => paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .map(WatchEvent::Created)
            .collect(),
        // inotify sends `From` and `To` first, then this summary of the pair
        RenameMode::Both => Vec::new(),
        _ => paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .map(|path| {
                if path.exists() {
                    WatchEvent::Created(path)
                } else {
                    WatchEvent::Deleted(path)
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_file_create_and_remove() {
        assert_eq!(
            translate_event(event(EventKind::Create(CreateKind::File), &["/nope/a.png"])),
            vec![WatchEvent::Created(PathBuf::from("/nope/a.png"))]
        );
        assert_eq!(
            translate_event(event(EventKind::Remove(RemoveKind::File), &["/nope/a.png"])),
            vec![WatchEvent::Deleted(PathBuf::from("/nope/a.png"))]
        );
    }

    #[test]
    fn test_folders_and_writes_are_ignored() {
        assert!(translate_event(event(EventKind::Create(CreateKind::Folder), &["/nope/dir"])).is_empty());
        assert!(translate_event(event(EventKind::Remove(RemoveKind::Folder), &["/nope/dir"])).is_empty());
        assert!(translate_event(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/nope/a.png"]
        ))
        .is_empty());
    }

    #[test]
    fn test_rename_pair_summary_is_ignored() {
        let translated = translate_event(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/nope/old.png", "/nope/new.png"],
        ));
        assert!(translated.is_empty());
    }

    #[test]
    fn test_rename_halves() {
        assert_eq!(
            translate_event(event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/nope/a.png"])),
            vec![WatchEvent::Deleted(PathBuf::from("/nope/a.png"))]
        );
        assert_eq!(
            translate_event(event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/nope/b.png"])),
            vec![WatchEvent::Created(PathBuf::from("/nope/b.png"))]
        );
    }

    #[test]
    fn test_rename_of_unknown_side_checks_existence() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("present.png");
        std::fs::write(&present, b"x").unwrap();
        let gone = temp_dir.path().join("gone.png");

        let translated = translate_event(
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
                .add_path(present.clone())
                .add_path(gone.clone()),
        );
        assert_eq!(translated, vec![WatchEvent::Created(present), WatchEvent::Deleted(gone)]);
    }

    #[tokio::test]
    async fn test_notify_source_rejects_missing_directory() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = NotifySource.watch(Path::new("/definitely/not/a/real/dir"), tx);
        assert!(result.is_err());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_notify_source_reports_rename_into_place_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = std::fs::canonicalize(temp_dir.path()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = NotifySource.watch(&root, tx).unwrap();

        let partial = root.join("dl.png.part");
        let file = root.join("dl.png");
        std::fs::write(&partial, b"png bytes").unwrap();
        std::fs::rename(&partial, &file).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let created: Vec<&WatchEvent> = events
            .iter()
            .filter(|event| **event == WatchEvent::Created(file.clone()))
            .collect();
        let deleted: Vec<&WatchEvent> = events
            .iter()
            .filter(|event| **event == WatchEvent::Deleted(partial.clone()))
            .collect();
        assert_eq!(created.len(), 1, "{:?}", events);
        assert_eq!(deleted.len(), 1, "{:?}", events);
    }
}
