// src/watch/event.rs

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// Kind of change reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
    Permission,
    Invalid,
}

impl FileEventKind {
    /// Map a `notify` event kind. Access notifications are not changes and
    /// map to `None`.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(FileEventKind::Created),
            // The old name of a rename is gone; the new name is a new path.
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FileEventKind::Deleted),
            EventKind::Modify(ModifyKind::Name(_)) => Some(FileEventKind::Created),
            EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions | MetadataKind::Ownership,
            )) => Some(FileEventKind::Permission),
            EventKind::Modify(_) => Some(FileEventKind::Modified),
            EventKind::Remove(_) => Some(FileEventKind::Deleted),
            EventKind::Any | EventKind::Other => Some(FileEventKind::Invalid),
        }
    }

    /// Per-path changes carried by one notify event. A rename reporting
    /// both names deletes the first path and creates the second.
    pub fn changes(event: &Event) -> Vec<(PathBuf, Self)> {
        let Some(kind) = Self::from_notify(&event.kind) else {
            return Vec::new();
        };
        match &event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let kind = if i == 0 {
                        FileEventKind::Deleted
                    } else {
                        FileEventKind::Created
                    };
                    (path.clone(), kind)
                })
                .collect(),
            _ => event.paths.iter().map(|path| (path.clone(), kind)).collect(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FileEventKind::Created => "was created",
            FileEventKind::Modified => "was modified",
            FileEventKind::Deleted => "was deleted",
            FileEventKind::Permission => "permissions changed",
            FileEventKind::Invalid => "is invalid",
        }
    }
}

/// A de-duplicated change notification.
///
/// `time` is the file's modification time, or a synthetic time slightly in
/// the past for deletions. Consumers compare it to discard stale events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
    pub time: SystemTime,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind, time: SystemTime) -> Self {
        Self {
            path: path.into(),
            kind,
            time,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.kind == FileEventKind::Deleted
    }
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path.display(), self.kind.describe())
    }
}

#[cfg(test)]
mod tests {
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    use super::*;

    #[test]
    fn notify_kinds_map_to_change_kinds() {
        assert_eq!(FileEventKind::from_notify(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Create(CreateKind::File)),
            Some(FileEventKind::Created)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FileEventKind::Modified)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            Some(FileEventKind::Permission)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(FileEventKind::Created)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Remove(RemoveKind::File)),
            Some(FileEventKind::Deleted)
        );
    }

    #[test]
    fn renames_split_into_deletion_and_creation() {
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(FileEventKind::Deleted)
        );

        let moved_away = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/w/src/a.rs"));
        assert_eq!(
            FileEventKind::changes(&moved_away),
            vec![(PathBuf::from("/w/src/a.rs"), FileEventKind::Deleted)]
        );

        let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/old.rs"))
            .add_path(PathBuf::from("/w/new.rs"));
        assert_eq!(
            FileEventKind::changes(&renamed),
            vec![
                (PathBuf::from("/w/old.rs"), FileEventKind::Deleted),
                (PathBuf::from("/w/new.rs"), FileEventKind::Created),
            ]
        );

        let read = Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/w/a"));
        assert!(FileEventKind::changes(&read).is_empty());
    }

    #[test]
    fn display_reads_like_a_sentence() {
        let e = FileEvent::new("/tmp/a.txt", FileEventKind::Deleted, SystemTime::now());
        assert_eq!(e.to_string(), "/tmp/a.txt was deleted");
    }
}
