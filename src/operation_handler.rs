//! Operation Handler: orchestrates every filesystem operation by
//! composing the session, the two caches, the extent manager, and the
//! two remaining backend clients (spec §4.7, the largest component).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};
use parking_lot::Mutex;

use crate::clients::{BlockDeviceClient, MetaServerClient, SpaceClient};
use crate::dentry_cache::DentryCache;
use crate::dir_buffer::ListingBufferPool;
use crate::error::FsError;
use crate::extent_manager::{divide_extents, get_to_alloc_extents, mark_extents_written, merge_alloced_extents};
use crate::inode_cache::InodeCache;
use crate::model::{AllocCategory, Dentry, FsFileType, Inode, InodeCreateParam, MountOption, SetattrToSet};
use crate::session::FsSession;
use crate::time::now_millis;

/// Default minimum allocation granularity (spec §4.3).
pub const DEFAULT_MIN_ALLOC_SIZE: u64 = 4096;
/// Default threshold above which writes/files use the `Big` allocation
/// category (spec §4.3).
pub const DEFAULT_BIG_FILE_THRESHOLD: u64 = 1 << 20;
/// Entry/attribute cache timeout reported to the kernel callback layer,
/// matching end-to-end scenario 2.
pub const ATTR_TIMEOUT: Duration = Duration::from_secs(1);

/// Kernel-callback-shaped view of an inode's attributes.
#[derive(Debug, Clone, Copy)]
pub struct FileAttr {
    /// Inode id.
    pub ino: u64,
    /// Length in bytes.
    pub size: u64,
    /// File or directory.
    pub kind: FsFileType,
    /// POSIX permission bits.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Hard link count.
    pub nlink: u32,
    /// Last access time, milliseconds since the Unix epoch.
    pub atime_ms: i64,
    /// Last modification time, milliseconds since the Unix epoch.
    pub mtime_ms: i64,
    /// Last metadata change time, milliseconds since the Unix epoch.
    pub ctime_ms: i64,
}

/// Reply shape for `lookup`/`mknod`/`create`/`mkdir`: an attribute plus
/// the timeouts the kernel callback layer should cache it for.
#[derive(Debug, Clone, Copy)]
pub struct EntryReply {
    /// The looked-up or newly created inode's attributes.
    pub attr: FileAttr,
    /// How long the kernel may cache the name -> inode mapping.
    pub entry_timeout: Duration,
    /// How long the kernel may cache `attr` itself.
    pub attr_timeout: Duration,
}

/// `GetAttrFromInode`: translate the internal model into the kernel
/// callback layer's attribute shape.
pub fn get_attr_from_inode(inode: &Inode) -> FileAttr {
    FileAttr {
        ino: inode.id,
        size: inode.length,
        kind: inode.file_type,
        mode: inode.mode,
        uid: inode.uid,
        gid: inode.gid,
        nlink: inode.nlink,
        atime_ms: inode.atime_ms,
        mtime_ms: inode.mtime_ms,
        ctime_ms: inode.ctime_ms,
    }
}

/// `GetDentryParamFromInode`: build the entry reply for a freshly
/// looked-up or created inode.
pub fn get_dentry_param_from_inode(inode: &Inode) -> EntryReply {
    EntryReply {
        attr: get_attr_from_inode(inode),
        entry_timeout: ATTR_TIMEOUT,
        attr_timeout: ATTR_TIMEOUT,
    }
}

/// Fields a `setattr` call may update, gated by `to_set`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetattrRequest {
    /// Which fields below are actually applied.
    pub to_set: SetattrToSet,
    /// New permission bits, applied if `to_set` contains `MODE`.
    pub mode: u32,
    /// New owning user id, applied if `to_set` contains `UID`.
    pub uid: u32,
    /// New owning group id, applied if `to_set` contains `GID`.
    pub gid: u32,
    /// New length, applied if `to_set` contains `SIZE`.
    pub size: u64,
    /// New access time, applied if `to_set` contains `ATIME` and not `ATIME_NOW`.
    pub atime_ms: i64,
    /// New modification time, applied if `to_set` contains `MTIME` and not `MTIME_NOW`.
    pub mtime_ms: i64,
    /// New change time, applied if `to_set` contains `CTIME`.
    pub ctime_ms: i64,
}

/// Orchestrates all filesystem operations over the session, caches,
/// extent manager, and the space/block-device clients.
pub struct OperationHandler {
    session: Arc<FsSession>,
    dentry_cache: DentryCache,
    inode_cache: InodeCache,
    space_client: Arc<dyn SpaceClient>,
    block_device: Arc<dyn BlockDeviceClient>,
    dir_buffers: ListingBufferPool,
    write_locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
    min_alloc_size: u64,
    big_file_threshold: u64,
}

impl OperationHandler {
    pub fn new(
        session: Arc<FsSession>,
        meta_client: Arc<dyn MetaServerClient>,
        space_client: Arc<dyn SpaceClient>,
        block_device: Arc<dyn BlockDeviceClient>,
        min_alloc_size: u64,
        big_file_threshold: u64,
    ) -> Self {
        OperationHandler {
            session,
            dentry_cache: DentryCache::with_defaults(meta_client.clone()),
            inode_cache: InodeCache::new(meta_client),
            space_client,
            block_device,
            dir_buffers: ListingBufferPool::new(),
            write_locks: Mutex::new(HashMap::new()),
            min_alloc_size,
            big_file_threshold,
        }
    }

    /// Build a handler using the default allocation constants.
    pub fn with_defaults(
        session: Arc<FsSession>,
        meta_client: Arc<dyn MetaServerClient>,
        space_client: Arc<dyn SpaceClient>,
        block_device: Arc<dyn BlockDeviceClient>,
    ) -> Self {
        Self::new(
            session,
            meta_client,
            space_client,
            block_device,
            DEFAULT_MIN_ALLOC_SIZE,
            DEFAULT_BIG_FILE_THRESHOLD,
        )
    }

    fn fsid(&self) -> Result<u32, FsError> {
        self.session.fsid()
    }

    fn write_lock_for(&self, ino: u64) -> Arc<Mutex<()>> {
        self.write_locks
            .lock()
            .entry(ino)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Mount the session and bring the handler up. Called once before
    /// any other operation.
    pub fn init(&self, opt: &MountOption) -> Result<(), FsError> {
        self.session.mount(opt)
    }

    /// Unmount the session and drop every outstanding listing buffer.
    /// Called once, after every other operation has returned.
    pub fn destroy(&self) -> Result<(), FsError> {
        self.dir_buffers.free_all();
        self.session.unmount()
    }

    pub fn lookup(&self, parent: u64, name: &[u8]) -> Result<EntryReply, FsError> {
        let fsid = self.fsid()?;
        let dentry = self.dentry_cache.get(fsid, parent, name)?;
        let inode = self.inode_cache.get(fsid, dentry.inode_id)?;
        Ok(get_dentry_param_from_inode(&inode))
    }

    pub fn getattr(&self, ino: u64) -> Result<FileAttr, FsError> {
        let fsid = self.fsid()?;
        let inode = self.inode_cache.get(fsid, ino)?;
        Ok(get_attr_from_inode(&inode))
    }

    pub fn setattr(&self, ino: u64, req: &SetattrRequest) -> Result<FileAttr, FsError> {
        let fsid = self.fsid()?;
        let mut inode = self.inode_cache.get(fsid, ino)?;
        if req.to_set.contains(SetattrToSet::MODE) {
            inode.mode = req.mode;
        }
        if req.to_set.contains(SetattrToSet::UID) {
            inode.uid = req.uid;
        }
        if req.to_set.contains(SetattrToSet::GID) {
            inode.gid = req.gid;
        }
        if req.to_set.contains(SetattrToSet::SIZE) {
            // SIZE changes truncate/extend length only; the extent map
            // and device contents are left untouched (spec §4.7).
            inode.length = req.size;
        }
        if req.to_set.contains(SetattrToSet::ATIME_NOW) {
            inode.atime_ms = now_millis();
        } else if req.to_set.contains(SetattrToSet::ATIME) {
            inode.atime_ms = req.atime_ms;
        }
        if req.to_set.contains(SetattrToSet::MTIME_NOW) {
            inode.mtime_ms = now_millis();
        } else if req.to_set.contains(SetattrToSet::MTIME) {
            inode.mtime_ms = req.mtime_ms;
        }
        if req.to_set.contains(SetattrToSet::CTIME) {
            inode.ctime_ms = req.ctime_ms;
        }
        self.inode_cache.update(inode.clone())?;
        Ok(get_attr_from_inode(&inode))
    }

    /// Shared body behind `mknod`, `create`, and `mkdir`.
    fn make_node(
        &self,
        parent: u64,
        name: &[u8],
        mode: u32,
        uid: u32,
        gid: u32,
        file_type: FsFileType,
        rdev: u32,
    ) -> Result<EntryReply, FsError> {
        let fsid = self.fsid()?;
        let inode = self.inode_cache.create(&InodeCreateParam {
            fsid,
            mode,
            uid,
            gid,
            file_type,
            rdev,
        })?;
        let dentry = Dentry {
            fsid,
            parent,
            name: name.to_vec(),
            inode_id: inode.id,
        };
        match self.dentry_cache.create(dentry) {
            Ok(()) => Ok(get_dentry_param_from_inode(&inode)),
            Err(e) => {
                // Accepted inconsistency (spec §9): the inode is now
                // orphaned on the server. Not compensated by default.
                warn!(
                    "dentry create for inode {} failed after inode create succeeded, inode is orphaned: {e}",
                    inode.id
                );
                Err(e)
            }
        }
    }

    pub fn mknod(&self, parent: u64, name: &[u8], mode: u32, rdev: u32, uid: u32, gid: u32) -> Result<EntryReply, FsError> {
        self.make_node(parent, name, mode, uid, gid, FsFileType::File, rdev)
    }

    pub fn create(&self, parent: u64, name: &[u8], mode: u32, uid: u32, gid: u32) -> Result<EntryReply, FsError> {
        self.make_node(parent, name, mode, uid, gid, FsFileType::File, 0)
    }

    pub fn mkdir(&self, parent: u64, name: &[u8], mode: u32, uid: u32, gid: u32) -> Result<EntryReply, FsError> {
        self.make_node(parent, name, mode, uid, gid, FsFileType::Directory, 0)
    }

    /// Shared body behind `unlink` and `rmdir`. Does not verify that a
    /// directory is empty — that belongs to the metadata service
    /// contract (spec §4.7).
    fn remove_node(&self, parent: u64, name: &[u8]) -> Result<(), FsError> {
        let fsid = self.fsid()?;
        let dentry = self.dentry_cache.get(fsid, parent, name)?;
        self.dentry_cache.delete(fsid, parent, name)?;
        self.inode_cache.delete(fsid, dentry.inode_id)?;
        Ok(())
    }

    pub fn unlink(&self, parent: u64, name: &[u8]) -> Result<(), FsError> {
        self.remove_node(parent, name)
    }

    pub fn rmdir(&self, parent: u64, name: &[u8]) -> Result<(), FsError> {
        self.remove_node(parent, name)
    }

    pub fn open(&self, ino: u64) -> Result<(), FsError> {
        let fsid = self.fsid()?;
        self.inode_cache.get(fsid, ino).map(|_| ())
    }

    /// Clamp-divide-zero-fill read pipeline (spec §4.5).
    pub fn read(&self, ino: u64, off: u64, size: u64) -> Result<Vec<u8>, FsError> {
        let fsid = self.fsid()?;
        let inode = self.inode_cache.get(fsid, ino)?;
        if off >= inode.length {
            return Ok(Vec::new());
        }
        let clamped = size.min(inode.length - off);
        if clamped == 0 {
            return Ok(Vec::new());
        }
        let pextents = divide_extents(&inode.extents, off, clamped);
        let mut buf = vec![0u8; clamped as usize];
        let mut cursor = 0usize;
        for p in &pextents {
            let len = p.len as usize;
            if !p.un_written {
                self.block_device.read(&mut buf[cursor..cursor + len], p.p_offset)?;
            }
            cursor += len;
        }
        Ok(buf)
    }

    /// Plan-allocate-merge-divide-write-mark-update write pipeline (spec
    /// §4.4), serialized per inode.
    pub fn write(&self, ino: u64, off: u64, data: &[u8]) -> Result<u64, FsError> {
        let fsid = self.fsid()?;
        let lock = self.write_lock_for(ino);
        let _guard = lock.lock();

        let mut inode = self.inode_cache.get(fsid, ino)?;
        let size = data.len() as u64;

        let plan = get_to_alloc_extents(&inode.extents, off, size, self.min_alloc_size);
        if !plan.is_empty() {
            let category = if inode.length >= self.big_file_threshold || size >= self.big_file_threshold {
                AllocCategory::Big
            } else {
                AllocCategory::Small
            };
            let allocated = self.space_client.alloc_extents(fsid, &plan, category)?;
            if let Err(e) = merge_alloced_extents(&plan, &allocated, &mut inode.extents) {
                warn!("merge failed for inode {ino}, returning {} extents to the allocator", allocated.len());
                self.space_client.dealloc_extents(fsid, &allocated)?;
                return Err(e);
            }
        }

        let pextents = divide_extents(&inode.extents, off, size);
        let mut cursor = 0usize;
        for p in &pextents {
            let len = p.len as usize;
            self.block_device.write(&data[cursor..cursor + len], p.p_offset)?;
            cursor += len;
        }

        mark_extents_written(&mut inode.extents, off, size);
        if off + size > inode.length {
            inode.length = off + size;
        }

        match self.inode_cache.update(inode) {
            Ok(()) => Ok(size),
            Err(e) => {
                error!("inode {ino} update failed after a successful device write: data is durable, metadata diverged ({e})");
                Err(FsError::Inconsistent(format!(
                    "inode {ino} update failed after write: {e}"
                )))
            }
        }
    }

    pub fn opendir(&self, ino: u64) -> Result<u32, FsError> {
        let fsid = self.fsid()?;
        self.inode_cache.get(fsid, ino)?;
        Ok(self.dir_buffers.new_handle())
    }

    /// Fills the listing buffer on first call, then slices it by entry
    /// index. `start` past the end returns an empty page, matching
    /// "short page ends the scan" for the kernel-side reader too.
    pub fn readdir(&self, ino: u64, handle: u32, start: usize) -> Result<Vec<Dentry>, FsError> {
        let fsid = self.fsid()?;
        if self.dir_buffers.was_read(handle) != Some(true) {
            let entries = self.dentry_cache.list(fsid, ino)?;
            self.dir_buffers.fill(handle, entries);
        }
        Ok(self
            .dir_buffers
            .with_entries(handle, |entries| entries.get(start..).map(<[Dentry]>::to_vec).unwrap_or_default())
            .unwrap_or_default())
    }

    pub fn releasedir(&self, handle: u32) -> Result<(), FsError> {
        self.dir_buffers.release(handle);
        Ok(())
    }
}
