//! `getattr` and `setattr`.

use super::prelude::*;

pub fn getattr(fs: &TrailFs, _req: &Request, ino: INodeNo, fh: Option<FileHandle>, reply: ReplyAttr) {
    let Some(node) = fs.node_for(ino) else {
        reply.error(Errno::ENOENT);
        return;
    };

    // An open handle's buffer is the live size (dirty edits included).
    if let Some(fh) = fh {
        if let Some(file) = fs.handles.get(fh.0) {
            if let Ok(file) = file.lock() {
                let mut attr = fs.attr_shell(&node);
                attr.size = file.buffer.len() as u64;
                reply.attr(&node.attr_ttl(), &attr);
                return;
            }
        }
    }

    match fs.attr(OpCtx::read(), &node) {
        Ok(attr) => reply.attr(&node.attr_ttl(), &attr),
        Err(e) => reply.error(e.errno()),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn setattr(
    fs: &TrailFs,
    _req: &Request,
    ino: INodeNo,
    _mode: Option<u32>,
    _uid: Option<u32>,
    _gid: Option<u32>,
    size: Option<u64>,
    fh: Option<FileHandle>,
    reply: ReplyAttr,
) {
    let Some(node) = fs.node_for(ino) else {
        reply.error(Errno::ENOENT);
        return;
    };

    let writable = node.is_writable_record() || node.is_trigger();
    if size.is_some() && !writable {
        reply.error(Errno::EACCES);
        return;
    }

    // Size changes land in the open buffer so shell `>` redirection can
    // truncate a trigger or record before writing.
    if let (Some(size), Some(fh)) = (size, fh) {
        if let Some(file) = fs.handles.get(fh.0) {
            if let Ok(mut file) = file.lock() {
                file.truncate(size as usize);
                let mut attr = fs.attr_shell(&node);
                attr.size = file.buffer.len() as u64;
                reply.attr(&node.attr_ttl(), &attr);
                return;
            }
        }
    }

    let mut attr = fs.attr_shell(&node);
    if let Some(size) = size {
        attr.size = size;
    }
    reply.attr(&node.attr_ttl(), &attr);
}
