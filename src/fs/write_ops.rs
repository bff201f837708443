//! `write`, `flush`, `release`, and `fsync`.
//!
//! Writes only accumulate into the handle buffer; the mutation happens
//! in `flush`, where errors can still reach the caller's `close()`.
//! `release` retries a dirty buffer once more and then drops it.

use tracing::warn;

use super::prelude::*;

#[allow(clippy::too_many_arguments)]
pub fn write(
    fs: &TrailFs,
    _req: &Request,
    _ino: INodeNo,
    fh: FileHandle,
    offset: u64,
    data: &[u8],
    reply: ReplyWrite,
) {
    let Some(file) = fs.handles.get(fh.0) else {
        reply.error(Errno::EBADF);
        return;
    };
    let Ok(mut file) = file.lock() else {
        reply.error(Errno::EIO);
        return;
    };
    if !(file.node.is_writable_record() || file.node.is_trigger()) {
        reply.error(Errno::EACCES);
        return;
    }
    file.write_at(offset as usize, data);
    reply.written(data.len() as u32);
}

pub fn flush(fs: &TrailFs, _req: &Request, _ino: INodeNo, fh: FileHandle, reply: ReplyEmpty) {
    let Some(file) = fs.handles.get(fh.0) else {
        // close() on a handle we never seeded (dup of fh 0) is fine.
        reply.ok();
        return;
    };
    let Ok(mut file) = file.lock() else {
        reply.error(Errno::EIO);
        return;
    };
    match pipeline::flush(&fs.eng, &mut file) {
        Ok(()) => reply.ok(),
        Err(e) => reply.error(e.errno()),
    }
}

pub fn release(fs: &TrailFs, _req: &Request, _ino: INodeNo, fh: FileHandle, reply: ReplyEmpty) {
    if let Some(file) = fs.handles.remove(fh.0) {
        if let Ok(mut file) = file.lock() {
            // Last chance for buffered edits; close() already returned,
            // so a failure can only be logged.
            if file.dirty {
                if let Err(e) = pipeline::flush(&fs.eng, &mut file) {
                    warn!(?e, "dropping dirty buffer at release");
                }
            }
        }
    }
    reply.ok();
}

/// Persistence happens in `flush`; sync is a no-op.
pub fn fsync(
    _fs: &TrailFs,
    _req: &Request,
    _ino: INodeNo,
    _fh: FileHandle,
    _datasync: bool,
    reply: ReplyEmpty,
) {
    reply.ok();
}
