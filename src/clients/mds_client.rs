//! Metadata directory service contract.

use crate::error::FsError;
use crate::model::FsInfo;

/// Client for the metadata directory service: the service that knows
/// which filesystems exist and brokers mount/unmount.
pub trait MdsClient: Send + Sync {
    /// Look up a filesystem's snapshot by name.
    ///
    /// Returns `Err(FsError::NotExist)` when no such filesystem has been
    /// created yet; `Err(FsError::Remote(_))` on transport failure.
    fn get_fs_info(&self, name: &str) -> Result<FsInfo, FsError>;

    /// Create a new filesystem.
    fn create_fs(&self, name: &str, block_size: u32, volume: &str) -> Result<(), FsError>;

    /// Mount a filesystem, returning its snapshot.
    fn mount_fs(&self, name: &str, mount_point: &str) -> Result<FsInfo, FsError>;

    /// Unmount a filesystem.
    fn umount_fs(&self, name: &str, mount_point: &str) -> Result<(), FsError>;
}
