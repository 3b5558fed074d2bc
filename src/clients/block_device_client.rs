//! Raw block device contract.

use crate::error::FsError;

/// Byte-addressable access to the volume backing a filesystem.
/// Offsets are absolute within the volume, not within any one file.
pub trait BlockDeviceClient: Send + Sync {
    /// Write `buf` at `offset`.
    fn write(&self, buf: &[u8], offset: u64) -> Result<(), FsError>;

    /// Read `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<(), FsError>;
}
