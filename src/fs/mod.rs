//! The virtual filesystem engine.
//!
//! [`Engine`] is the shared context every node materialisation sees:
//! repository, blob cache, kernel invalidator, and the mount's identity.
//! [`TrailFs`] wraps it with the inode registry and open-handle table
//! and implements the FUSE trait as a thin dispatcher; the real logic
//! lives in the per-operation modules, mirroring their names.

pub mod attr;
pub mod content;
pub mod create;
pub mod delete;
pub mod handles;
pub mod ino;
pub mod invalidate;
pub mod marshal;
pub mod name;
pub mod node;
pub mod pipeline;
pub mod prelude;
pub mod read;
pub mod rename;
pub mod resolve;
pub mod tree;
pub mod write_ops;

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use fuser::{
    BsdFileFlags, FileAttr, FileHandle, Filesystem, INodeNo, KernelConfig, LockOwner, OpenFlags,
    RenameFlags, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow, WriteFlags,
};
use tracing::debug;

use crate::api::OpCtx;
use crate::blobcache::BlobCache;
use crate::error::FsResult;
use crate::repo::Repository;
use handles::HandleTable;
use invalidate::Invalidator;
use node::Node;

/// Size reported for an embedded file before its bytes are known.
const PLACEHOLDER_FILE_SIZE: u64 = 1 << 20;

/// Shared engine context, one per mount.
pub struct Engine {
    pub repo: Arc<Repository>,
    pub blobs: BlobCache,
    pub invalidator: Invalidator,
    pub uid: u32,
    pub gid: u32,
    /// Expose `initiatives/` at the root.
    pub initiatives: bool,
}

/// The mounted filesystem: engine context plus kernel-facing state.
pub struct TrailFs {
    pub eng: Arc<Engine>,
    /// Materialised descriptors by stable inode; repopulated on every
    /// lookup, so entries surviving a restart are re-learned on demand.
    nodes: Mutex<HashMap<INodeNo, Node>>,
    pub handles: HandleTable,
}

impl TrailFs {
    pub fn new(eng: Arc<Engine>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(INodeNo::ROOT, Node::Root);
        Self { eng, nodes: Mutex::new(nodes), handles: HandleTable::new() }
    }

    /// Record a materialised node under its stable inode.
    pub fn register(&self, node: &Node) -> INodeNo {
        let ino = node.ino();
        if let Ok(mut nodes) = self.nodes.lock() {
            nodes.insert(ino, node.clone());
        }
        ino
    }

    pub fn node_for(&self, ino: INodeNo) -> Option<Node> {
        if ino == INodeNo::ROOT {
            return Some(Node::Root);
        }
        self.nodes.lock().ok()?.get(&ino).cloned()
    }

    /// Attributes without content sizing: identity, mode, link count.
    pub fn attr_shell(&self, node: &Node) -> FileAttr {
        FileAttr {
            ino: node.ino(),
            size: 0,
            blocks: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind: node.file_type(),
            perm: node.perm(),
            nlink: if node.is_dir() { 2 } else { 1 },
            uid: self.eng.uid,
            gid: self.eng.gid,
            rdev: 0,
            flags: 0,
            blksize: 512,
        }
    }

    /// Full attributes: sizes come from the generated content so `ls -l`
    /// always matches a subsequent read.
    pub fn attr(&self, ctx: OpCtx, node: &Node) -> FsResult<FileAttr> {
        let mut attr = self.attr_shell(node);
        let (mtime, crtime) = content::node_times(&self.eng, ctx, node);
        attr.mtime = mtime;
        attr.ctime = mtime;
        attr.crtime = crtime;

        attr.size = match node {
            node if node.is_dir() => 0,
            Node::Symlink { target } => target.len() as u64,
            Node::Trigger(_) => 0,
            Node::BinFile { file_id } => {
                let record = self.eng.repo.cache().file_by_id(file_id)?;
                record
                    .and_then(|f| self.eng.blobs.known_size(&f))
                    .unwrap_or(PLACEHOLDER_FILE_SIZE)
            }
            _ => content::read_node(&self.eng, ctx, node)?.len() as u64,
        };
        attr.blocks = attr.size.div_ceil(512);
        Ok(attr)
    }
}

/// FUSE trait implementation: a router into the operation modules.
#[allow(clippy::too_many_arguments)]
impl Filesystem for TrailFs {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> io::Result<()> {
        debug!("filesystem initialised");
        Ok(())
    }

    fn destroy(&mut self) {
        debug!("filesystem destroyed");
    }

    fn lookup(&self, req: &Request, parent: INodeNo, name: &std::ffi::OsStr, reply: ReplyEntry) {
        read::lookup(self, req, parent, name, reply);
    }

    fn getattr(&self, req: &Request, ino: INodeNo, fh: Option<FileHandle>, reply: ReplyAttr) {
        attr::getattr(self, req, ino, fh, reply);
    }

    fn setattr(
        &self,
        req: &Request,
        ino: INodeNo,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        fh: Option<FileHandle>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<BsdFileFlags>,
        reply: ReplyAttr,
    ) {
        attr::setattr(self, req, ino, mode, uid, gid, size, fh, reply);
    }

    fn readlink(&self, req: &Request, ino: INodeNo, reply: ReplyData) {
        read::readlink(self, req, ino, reply);
    }

    fn mkdir(
        &self,
        req: &Request,
        parent: INodeNo,
        name: &std::ffi::OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        create::mkdir(self, req, parent, name, reply);
    }

    fn unlink(&self, req: &Request, parent: INodeNo, name: &std::ffi::OsStr, reply: ReplyEmpty) {
        delete::unlink(self, req, parent, name, reply);
    }

    fn rmdir(&self, req: &Request, parent: INodeNo, name: &std::ffi::OsStr, reply: ReplyEmpty) {
        delete::rmdir(self, req, parent, name, reply);
    }

    fn rename(
        &self,
        req: &Request,
        parent: INodeNo,
        name: &std::ffi::OsStr,
        newparent: INodeNo,
        newname: &std::ffi::OsStr,
        _flags: RenameFlags,
        reply: ReplyEmpty,
    ) {
        rename::rename(self, req, parent, name, newparent, newname, reply);
    }

    fn open(&self, req: &Request, ino: INodeNo, flags: OpenFlags, reply: ReplyOpen) {
        read::open(self, req, ino, flags, reply);
    }

    fn read(
        &self,
        req: &Request,
        ino: INodeNo,
        fh: FileHandle,
        offset: u64,
        size: u32,
        _flags: OpenFlags,
        _lock_owner: Option<LockOwner>,
        reply: ReplyData,
    ) {
        read::read(self, req, ino, fh, offset, size, reply);
    }

    fn write(
        &self,
        req: &Request,
        ino: INodeNo,
        fh: FileHandle,
        offset: u64,
        data: &[u8],
        _write_flags: WriteFlags,
        _flags: OpenFlags,
        _lock_owner: Option<LockOwner>,
        reply: ReplyWrite,
    ) {
        write_ops::write(self, req, ino, fh, offset, data, reply);
    }

    fn flush(
        &self,
        req: &Request,
        ino: INodeNo,
        fh: FileHandle,
        _lock_owner: LockOwner,
        reply: ReplyEmpty,
    ) {
        write_ops::flush(self, req, ino, fh, reply);
    }

    fn release(
        &self,
        req: &Request,
        ino: INodeNo,
        fh: FileHandle,
        _flags: OpenFlags,
        _lock_owner: Option<LockOwner>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        write_ops::release(self, req, ino, fh, reply);
    }

    fn fsync(
        &self,
        req: &Request,
        ino: INodeNo,
        fh: FileHandle,
        datasync: bool,
        reply: ReplyEmpty,
    ) {
        write_ops::fsync(self, req, ino, fh, datasync, reply);
    }

    fn readdir(
        &self,
        req: &Request,
        ino: INodeNo,
        fh: FileHandle,
        offset: u64,
        reply: ReplyDirectory,
    ) {
        read::readdir(self, req, ino, fh, offset, reply);
    }

    fn create(
        &self,
        req: &Request,
        parent: INodeNo,
        name: &std::ffi::OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        create::create(self, req, parent, name, reply);
    }
}
