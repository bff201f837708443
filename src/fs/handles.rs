//! Open-file handle table.
//!
//! Each open file gets a fresh handle owning an in-memory byte buffer,
//! the dirty flag, and (for writable records) the snapshot the file was
//! opened against. Writes and the following flush run under the
//! per-handle mutex, so a handle observes its own writes in issue order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::marshal::issue::IssueDoc;
use super::node::Node;
use crate::model::{Document, Label};

/// What the flush path diffs against.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Issue(IssueDoc),
    Document(Document),
    Label(Label),
}

#[derive(Debug)]
pub struct OpenFile {
    pub node: Node,
    pub buffer: Vec<u8>,
    pub dirty: bool,
    /// Set once a trigger has dispatched its creation; repeat flushes on
    /// the same handle are no-ops.
    pub created: bool,
    pub snapshot: Option<Snapshot>,
}

impl OpenFile {
    pub fn new(node: Node) -> Self {
        Self { node, buffer: Vec::new(), dirty: false, created: false, snapshot: None }
    }

    pub fn with_content(node: Node, buffer: Vec<u8>, snapshot: Option<Snapshot>) -> Self {
        Self { node, buffer, dirty: false, created: false, snapshot }
    }

    /// Accumulate one write at `offset`, zero-filling any gap.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[offset..end].copy_from_slice(data);
        self.dirty = true;
    }

    /// Honour a size change from `setattr` (shell `>` truncation).
    pub fn truncate(&mut self, size: usize) {
        if size != self.buffer.len() {
            self.buffer.resize(size, 0);
            self.dirty = true;
        }
    }
}

pub struct HandleTable {
    next: AtomicU64,
    open: Mutex<HashMap<u64, Arc<Mutex<OpenFile>>>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1), open: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, file: OpenFile) -> u64 {
        let fh = self.next.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut open) = self.open.lock() {
            open.insert(fh, Arc::new(Mutex::new(file)));
        }
        fh
    }

    pub fn get(&self, fh: u64) -> Option<Arc<Mutex<OpenFile>>> {
        self.open.lock().ok()?.get(&fh).cloned()
    }

    pub fn remove(&self, fh: u64) -> Option<Arc<Mutex<OpenFile>>> {
        self.open.lock().ok()?.remove(&fh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_assemble_in_order_with_gaps_zero_filled() {
        let mut file = OpenFile::new(Node::Readme);
        file.write_at(0, b"hello");
        file.write_at(7, b"world");
        assert_eq!(file.buffer, b"hello\0\0world");
        assert!(file.dirty);
    }

    #[test]
    fn truncate_marks_dirty_only_on_change() {
        let mut file = OpenFile::with_content(Node::Readme, b"content".to_vec(), None);
        file.truncate(7);
        assert!(!file.dirty);
        file.truncate(0);
        assert!(file.dirty);
        assert!(file.buffer.is_empty());
    }

    #[test]
    fn handles_are_unique_and_removable() {
        let table = HandleTable::new();
        let a = table.insert(OpenFile::new(Node::Readme));
        let b = table.insert(OpenFile::new(Node::Readme));
        assert_ne!(a, b);
        assert!(table.get(a).is_some());
        table.remove(a);
        assert!(table.get(a).is_none());
        assert!(table.get(b).is_some());
    }
}
