//! Space allocator contract.

use crate::error::FsError;
use crate::model::{AllocCategory, AllocInfo, Allocated};

/// Client for the block-space allocator.
pub trait SpaceClient: Send + Sync {
    /// Allocate physical space satisfying `hints`, one `Allocated` per
    /// `AllocInfo`, in the same order.
    fn alloc_extents(
        &self,
        fsid: u32,
        hints: &[AllocInfo],
        category: AllocCategory,
    ) -> Result<Vec<Allocated>, FsError>;

    /// Return previously allocated extents to the free pool. Used as the
    /// compensating action when a merge fails after a successful
    /// allocation (spec §4.4).
    fn dealloc_extents(&self, fsid: u32, extents: &[Allocated]) -> Result<(), FsError>;
}
