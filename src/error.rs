//! Error taxonomy for the client core
//!
//! Every fallible operation in this crate returns a `Result<T, FsError>`.
//! `FsError` is deliberately a plain enum with a hand-written `Display`,
//! matching the rest of this crate's avoidance of a derive-macro error
//! crate: the kinds are few and fixed, and the only place they need to
//! become something else is the single `to_errno` mapping at the kernel
//! callback boundary.

use std::fmt;

/// Error kinds surfaced by the client core.
///
/// See the error table in the specification: `NoSpace` maps to `ENOSPC`
/// at the kernel callback boundary, everything else maps to `EIO`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FsError {
    /// The requested resource (dentry, inode) does not exist.
    NotExist,
    /// A create call collided with an existing resource.
    AlreadyExist,
    /// The space allocator or backing storage is exhausted.
    NoSpace,
    /// An RPC to one of the backend services failed in transport.
    Remote(String),
    /// An invariant was violated, or a merge/divide computation could not
    /// reconcile its inputs.
    Internal(String),
    /// A partial failure left durable state out of sync with metadata
    /// (e.g. data was written to the block device but the inode update
    /// that should record it failed).
    Inconsistent(String),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotExist => write!(f, "resource does not exist"),
            FsError::AlreadyExist => write!(f, "resource already exists"),
            FsError::NoSpace => write!(f, "no space left on backing volume"),
            FsError::Remote(msg) => write!(f, "remote call failed: {msg}"),
            FsError::Internal(msg) => write!(f, "internal invariant violation: {msg}"),
            FsError::Inconsistent(msg) => write!(f, "metadata/data inconsistency: {msg}"),
        }
    }
}

impl std::error::Error for FsError {}

impl FsError {
    /// Map this error to the POSIX errno surfaced across the kernel
    /// callback boundary. `OK` is represented by `Result::Ok` and is not
    /// a variant here.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            FsError::NoSpace => libc::ENOSPC,
            FsError::NotExist
            | FsError::AlreadyExist
            | FsError::Remote(_)
            | FsError::Internal(_)
            | FsError::Inconsistent(_) => libc::EIO,
        }
    }
}
