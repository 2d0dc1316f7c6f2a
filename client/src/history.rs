use std::sync::Arc;

use banana_shared::{
    decode_snapshot, encode_snapshot, CanvasScene, SnapshotDecodeError, SnapshotEncodeError,
};

pub const MAX_HISTORY: usize = 50;

/// An encoded canvas scene. Immutable once captured.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
}

impl Snapshot {
    pub fn capture(scene: &CanvasScene) -> Result<Self, SnapshotEncodeError> {
        encode_snapshot(scene).map(|bytes| Self { bytes })
    }

    #[cfg(test)]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn restore(&self) -> Result<CanvasScene, SnapshotDecodeError> {
        decode_snapshot(&self.bytes)
    }
}

/// Linear undo log. `index` is `None` only while the log is empty.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<Arc<Snapshot>>,
    index: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry after the pointer, appends, then evicts from the front
    /// down to `MAX_HISTORY`. The pointer ends on the new entry.
    pub fn append(&mut self, snapshot: Arc<Snapshot>) {
        let keep = self.index.map_or(0, |index| index + 1);
        self.entries.truncate(keep);
        self.entries.push(snapshot);
        if self.entries.len() > MAX_HISTORY {
            let overflow = self.entries.len() - MAX_HISTORY;
            self.entries.drain(..overflow);
        }
        self.index = Some(self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> Option<Arc<Snapshot>> {
        if !self.can_undo() {
            return None;
        }
        let index = self.index? - 1;
        self.index = Some(index);
        self.entries.get(index).cloned()
    }

    pub fn redo(&mut self) -> Option<Arc<Snapshot>> {
        if !self.can_redo() {
            return None;
        }
        let index = self.index? + 1;
        self.index = Some(index);
        self.entries.get(index).cloned()
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.index, Some(index) if index > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.index, Some(index) if index + 1 < self.entries.len())
    }

    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.index.and_then(|index| self.entries.get(index))
    }

    /// Pointer position, `-1` when empty.
    pub fn index(&self) -> isize {
        self.index.map_or(-1, |index| index as isize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(tag: u8) -> Arc<Snapshot> {
        Arc::new(Snapshot::from_bytes(vec![tag]))
    }

    #[test]
    fn starts_empty_with_no_moves() {
        let mut history = History::new();
        assert_eq!(history.index(), -1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(history.current().is_none());
    }

    #[test]
    fn appends_track_index_and_cap() {
        for n in [1usize, 2, 49, 50, 51, 120] {
            let mut history = History::new();
            for i in 0..n {
                history.append(snap(i as u8));
            }
            assert_eq!(history.len(), n.min(MAX_HISTORY));
            assert_eq!(history.index(), history.len() as isize - 1);
            assert!(!history.can_redo());
        }
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY + 3) {
            history.append(snap(i as u8));
        }
        let first = history.entries.first().unwrap();
        assert_eq!(first.bytes, vec![3u8]);
        assert_eq!(history.current().unwrap().bytes, vec![(MAX_HISTORY + 2) as u8]);
    }

    #[test]
    fn undo_then_redo_returns_the_same_snapshot() {
        let mut history = History::new();
        let a = snap(1);
        let b = snap(2);
        history.append(a.clone());
        history.append(b.clone());

        let undone = history.undo().unwrap();
        assert!(Arc::ptr_eq(&undone, &a));
        let redone = history.redo().unwrap();
        assert!(Arc::ptr_eq(&redone, &b));
        assert!(Arc::ptr_eq(history.current().unwrap(), &b));
    }

    #[test]
    fn append_after_undo_discards_the_redo_branch() {
        let mut history = History::new();
        for i in 0..5 {
            history.append(snap(i));
        }
        history.undo();
        history.undo();
        assert_eq!(history.index(), 2);

        history.append(snap(9));
        assert_eq!(history.len(), 4);
        assert_eq!(history.index(), 3);
        assert!(!history.can_redo());
        assert_eq!(history.current().unwrap().bytes, vec![9]);
    }

    #[test]
    fn edge_queries_follow_the_pointer() {
        let mut history = History::new();
        history.append(snap(0));
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        history.append(snap(1));
        assert!(history.can_undo());
        history.undo();
        assert_eq!(history.index(), 0);
        assert!(!history.can_undo());
        assert!(history.can_redo());
        assert!(history.undo().is_none());
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn capture_and_restore_scene() {
        let scene = CanvasScene::default();
        let snapshot = Snapshot::capture(&scene).unwrap();
        assert!(snapshot.bytes.len() > 8);
        assert_eq!(snapshot.restore().unwrap(), scene);
    }
}
