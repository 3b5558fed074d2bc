//! Per-inode metadata service contract.

use crate::error::FsError;
use crate::model::{Dentry, Inode, InodeCreateParam};

/// Client for the per-inode metadata service: inodes and dentries live
/// here, this client is the source of truth the caches write through to.
pub trait MetaServerClient: Send + Sync {
    /// Fetch an inode by id. `Err(FsError::NotExist)` if absent.
    fn get_inode(&self, fsid: u32, id: u64) -> Result<Inode, FsError>;

    /// Create a new inode, letting the service assign its id.
    fn create_inode(&self, param: &InodeCreateParam) -> Result<Inode, FsError>;

    /// Replace the stored copy of an inode.
    fn update_inode(&self, inode: &Inode) -> Result<(), FsError>;

    /// Delete an inode by id.
    fn delete_inode(&self, fsid: u32, id: u64) -> Result<(), FsError>;

    /// Fetch a single dentry by `(parent, name)`.
    fn get_dentry(&self, fsid: u32, parent: u64, name: &[u8]) -> Result<Dentry, FsError>;

    /// Create a dentry. `Err(FsError::AlreadyExist)` if the name is taken.
    fn create_dentry(&self, dentry: &Dentry) -> Result<(), FsError>;

    /// Delete a dentry by `(parent, name)`.
    fn delete_dentry(&self, fsid: u32, parent: u64, name: &[u8]) -> Result<(), FsError>;

    /// List up to `limit` dentries in `parent` whose names sort after
    /// `last_name` (empty for the first page). A page shorter than
    /// `limit` signals end-of-stream (spec §9).
    fn list_dentry(
        &self,
        fsid: u32,
        parent: u64,
        last_name: &[u8],
        limit: usize,
    ) -> Result<Vec<Dentry>, FsError>;
}
