//! `lookup`, `readdir`, `open`, `read`, and `readlink`.

use super::prelude::*;

pub fn lookup(fs: &TrailFs, _req: &Request, parent: INodeNo, name: &OsStr, reply: ReplyEntry) {
    let Some(parent_node) = fs.node_for(parent) else {
        reply.error(Errno::ENOENT);
        return;
    };
    let Some(name) = name.to_str() else {
        reply.error(Errno::ENOENT);
        return;
    };

    let ctx = OpCtx::read();
    match tree::lookup(&fs.eng, ctx, &parent_node, name) {
        Ok(node) => {
            fs.register(&node);
            match fs.attr(ctx, &node) {
                Ok(attr) => reply.entry(&node.entry_ttl(), &attr, Generation(0)),
                Err(e) => reply.error(e.errno()),
            }
        }
        Err(e) => reply.error(e.errno()),
    }
}

pub fn readdir(
    fs: &TrailFs,
    _req: &Request,
    ino: INodeNo,
    _fh: FileHandle,
    offset: u64,
    mut reply: ReplyDirectory,
) {
    let Some(node) = fs.node_for(ino) else {
        reply.error(Errno::ENOENT);
        return;
    };

    let ctx = OpCtx::read();
    let children = match tree::readdir(&fs.eng, ctx, &node) {
        Ok(children) => children,
        Err(e) => {
            reply.error(e.errno());
            return;
        }
    };

    let mut entries: Vec<(INodeNo, FileType, String)> = vec![
        (ino, FileType::Directory, ".".to_string()),
        (INodeNo::ROOT, FileType::Directory, "..".to_string()),
    ];
    for child in children {
        let child_ino = fs.register(&child.node);
        entries.push((child_ino, child.node.file_type(), child.name));
    }

    for (idx, (entry_ino, kind, name)) in entries.iter().enumerate().skip(offset as usize) {
        if reply.add(*entry_ino, (idx + 1) as u64, *kind, name) {
            break;
        }
    }
    reply.ok();
}

pub fn open(fs: &TrailFs, _req: &Request, ino: INodeNo, flags: OpenFlags, reply: ReplyOpen) {
    let Some(node) = fs.node_for(ino) else {
        reply.error(Errno::ENOENT);
        return;
    };
    if node.is_dir() {
        reply.error(Errno::EISDIR);
        return;
    }
    let ctx = OpCtx::read();
    let wants_write = flags.acc_mode() != OpenAccMode::O_RDONLY;

    match &node {
        // Triggers are write-only; reads are refused outright and the
        // kernel page cache is bypassed so every write reaches us.
        Node::Trigger(_) => {
            if flags.acc_mode() == OpenAccMode::O_RDONLY {
                reply.error(Errno::EACCES);
                return;
            }
            let fh = fs.handles.insert(OpenFile::new(node.clone()));
            reply.opened(FileHandle(fh), FopenFlags::FOPEN_DIRECT_IO);
        }

        // Writable records open against a snapshot of the current text.
        Node::IssueFile { issue_id } => {
            let seeded = fs.eng.repo.issue_by_id(ctx, issue_id).and_then(|issue| {
                let issue = issue.ok_or(FsError::NotFound)?;
                let doc = content::issue_snapshot(&fs.eng, ctx, &issue)?;
                let buffer = super::marshal::issue::format(&doc).into_bytes();
                Ok(OpenFile::with_content(node.clone(), buffer, Some(Snapshot::Issue(doc))))
            });
            match seeded {
                Ok(file) => {
                    let fh = fs.handles.insert(file);
                    reply.opened(FileHandle(fh), FopenFlags::FOPEN_KEEP_CACHE);
                }
                Err(e) => reply.error(e.errno()),
            }
        }
        Node::DocFile { doc_id } => {
            let seeded = fs.eng.repo.document_by_id(ctx, doc_id).and_then(|doc| {
                let doc = doc.ok_or(FsError::NotFound)?;
                let buffer = super::marshal::records::document_text(&doc).into_bytes();
                Ok(OpenFile::with_content(node.clone(), buffer, Some(Snapshot::Document(doc))))
            });
            match seeded {
                Ok(file) => {
                    let fh = fs.handles.insert(file);
                    reply.opened(FileHandle(fh), FopenFlags::FOPEN_KEEP_CACHE);
                }
                Err(e) => reply.error(e.errno()),
            }
        }
        Node::LabelFile { label_id } => {
            let seeded = fs
                .eng
                .repo
                .cache()
                .label_by_id(label_id)
                .map_err(FsError::from)
                .and_then(|label| {
                    let label = label.ok_or(FsError::NotFound)?;
                    let buffer = super::marshal::records::label_text(&label).into_bytes();
                    Ok(OpenFile::with_content(node.clone(), buffer, Some(Snapshot::Label(label))))
                });
            match seeded {
                Ok(file) => {
                    let fh = fs.handles.insert(file);
                    reply.opened(FileHandle(fh), FopenFlags::FOPEN_KEEP_CACHE);
                }
                Err(e) => reply.error(e.errno()),
            }
        }

        // Embedded binaries stream through the blob cache on read.
        Node::BinFile { .. } => {
            if wants_write {
                reply.error(Errno::EACCES);
                return;
            }
            let fh = fs.handles.insert(OpenFile::new(node.clone()));
            reply.opened(FileHandle(fh), FopenFlags::FOPEN_KEEP_CACHE);
        }

        Node::Symlink { .. } => reply.error(Errno::EPERM),

        // Everything else is stable read-only synthesized text.
        _ => {
            if wants_write {
                reply.error(Errno::EACCES);
                return;
            }
            match content::read_node(&fs.eng, ctx, &node) {
                Ok(buffer) => {
                    let fh =
                        fs.handles.insert(OpenFile::with_content(node.clone(), buffer, None));
                    reply.opened(FileHandle(fh), FopenFlags::FOPEN_KEEP_CACHE);
                }
                Err(e) => reply.error(e.errno()),
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn read(
    fs: &TrailFs,
    _req: &Request,
    _ino: INodeNo,
    fh: FileHandle,
    offset: u64,
    size: u32,
    reply: ReplyData,
) {
    let Some(file) = fs.handles.get(fh.0) else {
        reply.error(Errno::EBADF);
        return;
    };
    let Ok(file) = file.lock() else {
        reply.error(Errno::EIO);
        return;
    };

    match &file.node {
        Node::Trigger(_) => reply.error(Errno::EACCES),
        Node::BinFile { file_id } => {
            let ctx = OpCtx::read();
            let record = match fs.eng.repo.cache().file_by_id(file_id) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    reply.error(Errno::ENOENT);
                    return;
                }
                Err(_) => {
                    reply.error(Errno::EIO);
                    return;
                }
            };
            match fs.eng.blobs.read(&fs.eng.repo, ctx, &record, offset, size) {
                Ok(bytes) => reply.data(&bytes),
                Err(e) => reply.error(e.errno()),
            }
        }
        _ => {
            let data = &file.buffer;
            let start = offset as usize;
            if start >= data.len() {
                reply.data(&[]);
                return;
            }
            let end = start.saturating_add(size as usize).min(data.len());
            reply.data(&data[start..end]);
        }
    }
}

pub fn readlink(fs: &TrailFs, _req: &Request, ino: INodeNo, reply: ReplyData) {
    match fs.node_for(ino) {
        Some(Node::Symlink { target }) => reply.data(target.as_bytes()),
        Some(_) => reply.error(Errno::EINVAL),
        None => reply.error(Errno::ENOENT),
    }
}
