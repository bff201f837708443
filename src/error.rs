//! Crate-wide error type with its POSIX mapping.
//!
//! Everything below the FUSE dispatch layer returns `Result<T, FsError>`;
//! the dispatch modules convert to an [`Errno`] at the reply boundary and
//! nowhere else.

use fuser::Errno;
use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    /// Path not present in the virtual tree.
    #[error("no such entry")]
    NotFound,

    /// The node exists but refuses this operation (delete a trigger,
    /// rmdir a synthetic directory, ...).
    #[error("operation not permitted")]
    NotPermitted,

    /// Access-mode violation (read a write-only trigger, write a
    /// read-only file).
    #[error("permission denied")]
    Denied,

    #[error("not a directory")]
    NotDirectory,

    #[error("is a directory")]
    IsDirectory,

    #[error("directory not empty")]
    NotEmpty,

    /// Rename across two different synthetic directories.
    #[error("cross-device rename")]
    CrossDevice,

    /// Malformed user input: bad header, unknown trigger field,
    /// unresolved token.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// Backend, network, or local cache failure.
    #[error("i/o error: {0}")]
    Io(String),
}

impl FsError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        FsError::Invalid(msg.into())
    }

    pub fn io(msg: impl std::fmt::Display) -> Self {
        FsError::Io(msg.to_string())
    }

    pub fn from_io(e: std::io::Error) -> Self {
        FsError::Io(e.to_string())
    }

    /// The errno crossing the kernel boundary, per the interface contract.
    pub fn errno(&self) -> Errno {
        match self {
            FsError::NotFound => Errno::ENOENT,
            FsError::NotPermitted => Errno::EPERM,
            FsError::Denied => Errno::EACCES,
            FsError::NotDirectory => Errno::ENOTDIR,
            FsError::IsDirectory => Errno::EISDIR,
            FsError::NotEmpty => Errno::ENOTEMPTY,
            FsError::CrossDevice => Errno::EXDEV,
            FsError::Invalid(_) => Errno::EINVAL,
            FsError::Io(_) => Errno::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_is_stable() {
        assert_eq!(FsError::NotFound.errno().code(), Errno::ENOENT.code());
        assert_eq!(FsError::NotPermitted.errno().code(), Errno::EPERM.code());
        assert_eq!(FsError::Denied.errno().code(), Errno::EACCES.code());
        assert_eq!(FsError::CrossDevice.errno().code(), Errno::EXDEV.code());
        assert_eq!(FsError::invalid("x").errno().code(), Errno::EINVAL.code());
        assert_eq!(FsError::io("x").errno().code(), Errno::EIO.code());
    }
}
