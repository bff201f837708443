//! Shared imports for the FUSE operation modules.
//!
//! One place for the fuser types, error plumbing, and engine handles the
//! per-operation files (`attr`, `read`, `write_ops`, `create`, `delete`,
//! `rename`) all need.

pub use fuser::{
    Errno, FileAttr, FileHandle, FileType, FopenFlags, Generation, INodeNo, OpenAccMode,
    OpenFlags, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyWrite, Request, TimeOrNow,
};

pub use std::ffi::OsStr;

pub use super::TrailFs;
pub use super::content;
pub use super::handles::{OpenFile, Snapshot};
pub use super::node::{Node, TriggerKind};
pub use super::pipeline;
pub use super::tree;
pub use crate::api::OpCtx;
pub use crate::error::{FsError, FsResult};
