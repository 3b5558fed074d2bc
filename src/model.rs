//! Core data model: inodes, dentries, extents, and the filesystem snapshot.
//!
//! These types carry no behavior beyond small accessors; the operations
//! that act on them live in [`crate::extent_manager`],
//! [`crate::inode_cache`], and [`crate::dentry_cache`].

use bitflags::bitflags;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Kind of filesystem object. Only `File` carries a volume-extent list.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum FsFileType {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// A single entry in a file's logical-to-physical extent list.
///
/// Invariant (enforced by [`crate::extent_manager`]): `length > 0`; across
/// the list entries are disjoint and sorted ascending by `fs_offset`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct VolumeExtent {
    /// Offset within the file's logical address space.
    pub fs_offset: u64,
    /// Offset within the volume's physical address space.
    pub volume_offset: u64,
    /// Length in bytes, shared by both offsets.
    pub length: u64,
    /// Whether the device bytes backing this extent have been written.
    pub is_written: bool,
}

impl VolumeExtent {
    /// Exclusive end of the logical range this entry covers.
    pub fn fs_end(&self) -> u64 {
        self.fs_offset + self.length
    }

    /// Exclusive end of the physical range this entry covers.
    pub fn volume_end(&self) -> u64 {
        self.volume_offset + self.length
    }
}

/// A physical extent derived by dividing a byte range against a
/// volume-extent list. Never stored; produced on demand by
/// [`crate::extent_manager::divide_extents`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PExtent {
    /// Offset within the volume, meaningless when `un_written` is true.
    pub p_offset: u64,
    /// Length in bytes.
    pub len: u64,
    /// True for holes and for allocated-but-unwritten ranges: readers
    /// must zero-fill instead of issuing device I/O.
    pub un_written: bool,
}

/// A pending allocation request produced by
/// [`crate::extent_manager::get_to_alloc_extents`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AllocInfo {
    /// Logical offset of the gap being allocated for.
    pub logical_offset: u64,
    /// Physical end of the previous mapped extent, if it abuts this gap
    /// (0 otherwise). A hint the allocator may use to prefer contiguity.
    pub hint_prev_physical: u64,
    /// Length to allocate, rounded up to an allocator grain.
    pub length: u64,
}

/// An allocation returned by the space allocator for one `AllocInfo`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Allocated {
    /// Physical offset assigned by the allocator.
    pub offset: u64,
    /// Length assigned. May differ from the request only in ways that
    /// still cover it; [`crate::extent_manager::merge_alloced_extents`]
    /// validates the pairing.
    pub length: u64,
}

/// Allocation size category, chosen by the write pipeline from the
/// inode's current length and the write size.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AllocCategory {
    /// Below `big_file_threshold`.
    Small,
    /// At or above `big_file_threshold`.
    Big,
}

bitflags! {
    /// Bitmask selecting which `setattr` fields to apply.
    #[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
    pub struct SetattrToSet: u32 {
        /// Update `mode`.
        const MODE = 1 << 0;
        /// Update `uid`.
        const UID = 1 << 1;
        /// Update `gid`.
        const GID = 1 << 2;
        /// Update `length`.
        const SIZE = 1 << 3;
        /// Update `atime_ms` to the supplied value.
        const ATIME = 1 << 4;
        /// Update `mtime_ms` to the supplied value.
        const MTIME = 1 << 5;
        /// Update `ctime_ms` to the supplied value.
        const CTIME = 1 << 6;
        /// Update `atime_ms` to the current time, overriding `ATIME`.
        const ATIME_NOW = 1 << 7;
        /// Update `mtime_ms` to the current time, overriding `MTIME`.
        const MTIME_NOW = 1 << 8;
    }
}

/// The metadata record for a file or directory.
#[derive(Debug, Clone)]
pub struct Inode {
    /// 64-bit id, unique within `fsid`.
    pub id: u64,
    /// Filesystem this inode belongs to.
    pub fsid: u32,
    /// POSIX permission bits.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Hard link count. Always 1 in this client's no-hardlink semantics,
    /// except for directories where it also counts `.`/subdirectory `..`.
    pub nlink: u32,
    /// Length in bytes. Always >= 0 (represented unsigned).
    pub length: u64,
    /// Last access time, milliseconds since the Unix epoch.
    pub atime_ms: i64,
    /// Last modification time, milliseconds since the Unix epoch.
    pub mtime_ms: i64,
    /// Last metadata change time, milliseconds since the Unix epoch.
    pub ctime_ms: i64,
    /// File or directory.
    pub file_type: FsFileType,
    /// Logical-to-physical extent list. Empty and unused for directories.
    pub extents: Vec<VolumeExtent>,
}

impl Inode {
    /// True if this inode is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FsFileType::Directory)
    }
}

/// Parameters supplied to create a new inode remotely.
#[derive(Debug, Clone)]
pub struct InodeCreateParam {
    /// Filesystem the new inode belongs to.
    pub fsid: u32,
    /// Initial permission bits.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// File or directory.
    pub file_type: FsFileType,
    /// Device number for special files (mknod); 0 otherwise.
    pub rdev: u32,
}

/// A directed edge from `(fsid, parent, name)` to a child inode id.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dentry {
    /// Filesystem this dentry belongs to.
    pub fsid: u32,
    /// Id of the parent directory's inode.
    pub parent: u64,
    /// Name within the parent. Non-empty, unique within the parent.
    pub name: Vec<u8>,
    /// Id of the child inode this dentry names.
    pub inode_id: u64,
}

/// Per-mount snapshot. Immutable for the lifetime of the mount.
#[derive(Debug, Clone)]
pub struct FsInfo {
    /// Filesystem id, assigned by the metadata directory service.
    pub fsid: u32,
    /// Filesystem name, also used as the volume name.
    pub fsname: String,
    /// Allocator/IO block size in bytes.
    pub block_size: u32,
    /// Name of the backing volume.
    pub volume: String,
}

/// A parsed `"host:path"` mount point, per spec §6 (no colon defaults the
/// host to `"unknownhost"`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MountPoint {
    /// Host component, or `"unknownhost"` if none was given.
    pub host: String,
    /// Path component.
    pub path: String,
}

impl MountPoint {
    /// Parse a colon-delimited `"host:path"` string.
    pub fn parse(s: &str) -> MountPoint {
        match s.split_once(':') {
            Some((host, path)) => MountPoint {
                host: host.to_string(),
                path: path.to_string(),
            },
            None => MountPoint {
                host: "unknownhost".to_string(),
                path: s.to_string(),
            },
        }
    }
}

/// The mount option record a caller supplies to mount a filesystem.
#[derive(Debug, Clone)]
pub struct MountOption {
    /// Volume name, also used as the filesystem name.
    pub volume: String,
    /// Raw `"host:path"` mount point string.
    pub mount_point: String,
}
