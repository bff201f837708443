//! Kernel cache invalidation.
//!
//! After a mutation the kernel must drop its cached attributes for the
//! changed inode and its cached directory entry for the name, or reads
//! keep serving the pre-mutation view until the TTLs lapse. The notifier
//! is attached once after mount; before that (and in tests) every call
//! is a no-op and never panics.

use std::ffi::OsStr;
use std::sync::OnceLock;

use fuser::{INodeNo, Notifier};
use tracing::debug;

#[derive(Default)]
pub struct Invalidator {
    notifier: OnceLock<Notifier>,
}

impl Invalidator {
    pub fn new() -> Self {
        Self { notifier: OnceLock::new() }
    }

    /// Attach the mounted session's notifier; set-once, later calls are
    /// ignored.
    pub fn attach(&self, notifier: Notifier) {
        let _ = self.notifier.set(notifier);
    }

    /// Drop the kernel's attribute and data caches for `ino`.
    pub fn inode(&self, ino: INodeNo) {
        if let Some(notifier) = self.notifier.get() {
            // ENOENT here just means the kernel had nothing cached.
            if let Err(e) = notifier.inval_inode(ino, 0, 0) {
                debug!(ino = ino.0, "inval_inode: {e}");
            }
        }
    }

    /// Drop the kernel's cached entry for `name` under `parent`.
    pub fn entry(&self, parent: INodeNo, name: &str) {
        if let Some(notifier) = self.notifier.get() {
            if let Err(e) = notifier.inval_entry(parent, OsStr::new(name)) {
                debug!(parent = parent.0, name, "inval_entry: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_invalidator_is_a_no_op() {
        let invalidator = Invalidator::new();
        invalidator.inode(INodeNo(42));
        invalidator.entry(INodeNo(1), "teams");
        invalidator.entry(INodeNo(7), "issue.md");
    }
}
