//! In-memory fakes for the four backend contracts, used by this crate's
//! own tests and available to integration tests as a runnable fixture.
//! Not behind a feature flag: the teacher keeps its mock filesystem
//! helpers in the open the same way.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::clients::{BlockDeviceClient, MdsClient, MetaServerClient, SpaceClient};
use crate::error::FsError;
use crate::model::{AllocCategory, AllocInfo, Allocated, Dentry, FsInfo, Inode, InodeCreateParam};
use crate::time::now_millis;

/// In-memory stand-in for the metadata directory service.
pub struct FakeMdsClient {
    pub filesystems: Mutex<BTreeMap<String, FsInfo>>,
    next_fsid: AtomicU64,
    pub fail_mount: AtomicBool,
}

impl Default for FakeMdsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMdsClient {
    pub fn new() -> Self {
        FakeMdsClient {
            filesystems: Mutex::new(BTreeMap::new()),
            next_fsid: AtomicU64::new(1),
            fail_mount: AtomicBool::new(false),
        }
    }
}

impl MdsClient for FakeMdsClient {
    fn get_fs_info(&self, name: &str) -> Result<FsInfo, FsError> {
        self.filesystems
            .lock()
            .get(name)
            .cloned()
            .ok_or(FsError::NotExist)
    }

    fn create_fs(&self, name: &str, block_size: u32, volume: &str) -> Result<(), FsError> {
        let mut fs = self.filesystems.lock();
        if fs.contains_key(name) {
            return Err(FsError::AlreadyExist);
        }
        let fsid = self.next_fsid.fetch_add(1, Ordering::SeqCst) as u32;
        fs.insert(
            name.to_string(),
            FsInfo {
                fsid,
                fsname: name.to_string(),
                block_size,
                volume: volume.to_string(),
            },
        );
        Ok(())
    }

    fn mount_fs(&self, name: &str, _mount_point: &str) -> Result<FsInfo, FsError> {
        if self.fail_mount.load(Ordering::SeqCst) {
            return Err(FsError::Remote("mount refused".into()));
        }
        self.get_fs_info(name)
    }

    fn umount_fs(&self, name: &str, _mount_point: &str) -> Result<(), FsError> {
        if !self.filesystems.lock().contains_key(name) {
            return Err(FsError::NotExist);
        }
        Ok(())
    }
}

/// In-memory stand-in for the per-inode metadata service.
pub struct FakeMetaServerClient {
    pub inodes: Mutex<BTreeMap<u64, Inode>>,
    pub dentries: Mutex<BTreeMap<(u64, Vec<u8>), Dentry>>,
    next_inode_id: AtomicU64,
    get_inode_calls: AtomicUsize,
    get_dentry_calls: AtomicUsize,
    list_dentry_calls: AtomicUsize,
    pub fail_create_dentry: AtomicBool,
    pub fail_update_inode: AtomicBool,
}

impl Default for FakeMetaServerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMetaServerClient {
    pub fn new() -> Self {
        FakeMetaServerClient {
            inodes: Mutex::new(BTreeMap::new()),
            dentries: Mutex::new(BTreeMap::new()),
            next_inode_id: AtomicU64::new(100),
            get_inode_calls: AtomicUsize::new(0),
            get_dentry_calls: AtomicUsize::new(0),
            list_dentry_calls: AtomicUsize::new(0),
            fail_create_dentry: AtomicBool::new(false),
            fail_update_inode: AtomicBool::new(false),
        }
    }

    pub fn get_inode_calls(&self) -> usize {
        self.get_inode_calls.load(Ordering::SeqCst)
    }

    pub fn get_dentry_calls(&self) -> usize {
        self.get_dentry_calls.load(Ordering::SeqCst)
    }

    pub fn list_dentry_calls(&self) -> usize {
        self.list_dentry_calls.load(Ordering::SeqCst)
    }
}

impl MetaServerClient for FakeMetaServerClient {
    fn get_inode(&self, _fsid: u32, id: u64) -> Result<Inode, FsError> {
        self.get_inode_calls.fetch_add(1, Ordering::SeqCst);
        self.inodes.lock().get(&id).cloned().ok_or(FsError::NotExist)
    }

    fn create_inode(&self, param: &InodeCreateParam) -> Result<Inode, FsError> {
        let id = self.next_inode_id.fetch_add(1, Ordering::SeqCst);
        let now = now_millis();
        let inode = Inode {
            id,
            fsid: param.fsid,
            mode: param.mode,
            uid: param.uid,
            gid: param.gid,
            nlink: 1,
            length: 0,
            atime_ms: now,
            mtime_ms: now,
            ctime_ms: now,
            file_type: param.file_type,
            extents: Vec::new(),
        };
        self.inodes.lock().insert(id, inode.clone());
        Ok(inode)
    }

    fn update_inode(&self, inode: &Inode) -> Result<(), FsError> {
        if self.fail_update_inode.load(Ordering::SeqCst) {
            return Err(FsError::Remote("induced update failure".into()));
        }
        self.inodes.lock().insert(inode.id, inode.clone());
        Ok(())
    }

    fn delete_inode(&self, _fsid: u32, id: u64) -> Result<(), FsError> {
        self.inodes
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(FsError::NotExist)
    }

    fn get_dentry(&self, _fsid: u32, parent: u64, name: &[u8]) -> Result<Dentry, FsError> {
        self.get_dentry_calls.fetch_add(1, Ordering::SeqCst);
        self.dentries
            .lock()
            .get(&(parent, name.to_vec()))
            .cloned()
            .ok_or(FsError::NotExist)
    }

    fn create_dentry(&self, dentry: &Dentry) -> Result<(), FsError> {
        if self.fail_create_dentry.load(Ordering::SeqCst) {
            return Err(FsError::AlreadyExist);
        }
        let mut dentries = self.dentries.lock();
        let key = (dentry.parent, dentry.name.clone());
        if dentries.contains_key(&key) {
            return Err(FsError::AlreadyExist);
        }
        dentries.insert(key, dentry.clone());
        Ok(())
    }

    fn delete_dentry(&self, _fsid: u32, parent: u64, name: &[u8]) -> Result<(), FsError> {
        self.dentries
            .lock()
            .remove(&(parent, name.to_vec()))
            .map(|_| ())
            .ok_or(FsError::NotExist)
    }

    fn list_dentry(
        &self,
        _fsid: u32,
        parent: u64,
        last_name: &[u8],
        limit: usize,
    ) -> Result<Vec<Dentry>, FsError> {
        self.list_dentry_calls.fetch_add(1, Ordering::SeqCst);
        let dentries = self.dentries.lock();
        let page: Vec<Dentry> = dentries
            .range((parent, last_name.to_vec())..(parent + 1, Vec::new()))
            .map(|(_, d)| d.clone())
            .filter(|d| d.name.as_slice() > last_name)
            .take(limit)
            .collect();
        Ok(page)
    }
}

/// In-memory stand-in for the block-space allocator: hands out
/// monotonically increasing physical offsets, never reusing freed space.
pub struct FakeSpaceClient {
    next_offset: AtomicU64,
    pub freed: Mutex<Vec<Allocated>>,
    pub fail_alloc: AtomicBool,
}

impl Default for FakeSpaceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSpaceClient {
    pub fn new() -> Self {
        FakeSpaceClient {
            next_offset: AtomicU64::new(0),
            freed: Mutex::new(Vec::new()),
            fail_alloc: AtomicBool::new(false),
        }
    }
}

impl SpaceClient for FakeSpaceClient {
    fn alloc_extents(
        &self,
        _fsid: u32,
        hints: &[AllocInfo],
        _category: AllocCategory,
    ) -> Result<Vec<Allocated>, FsError> {
        if self.fail_alloc.load(Ordering::SeqCst) {
            return Err(FsError::NoSpace);
        }
        Ok(hints
            .iter()
            .map(|hint| {
                let offset = self.next_offset.fetch_add(hint.length, Ordering::SeqCst);
                Allocated {
                    offset,
                    length: hint.length,
                }
            })
            .collect())
    }

    fn dealloc_extents(&self, _fsid: u32, extents: &[Allocated]) -> Result<(), FsError> {
        self.freed.lock().extend_from_slice(extents);
        Ok(())
    }
}

/// In-memory stand-in for the raw block device: a growable byte buffer.
pub struct FakeBlockDeviceClient {
    bytes: Mutex<Vec<u8>>,
}

impl Default for FakeBlockDeviceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBlockDeviceClient {
    pub fn new() -> Self {
        FakeBlockDeviceClient {
            bytes: Mutex::new(Vec::new()),
        }
    }
}

impl BlockDeviceClient for FakeBlockDeviceClient {
    fn write(&self, buf: &[u8], offset: u64) -> Result<(), FsError> {
        let mut bytes = self.bytes.lock();
        let end = offset as usize + buf.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[offset as usize..end].copy_from_slice(buf);
        Ok(())
    }

    fn read(&self, buf: &mut [u8], offset: u64) -> Result<(), FsError> {
        let bytes = self.bytes.lock();
        let end = offset as usize + buf.len();
        if bytes.len() < end {
            return Err(FsError::Internal("read past end of backing store".into()));
        }
        buf.copy_from_slice(&bytes[offset as usize..end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_client_allocates_increasing_offsets() {
        let space = FakeSpaceClient::new();
        let hints = vec![
            AllocInfo { logical_offset: 0, hint_prev_physical: 0, length: 100 },
            AllocInfo { logical_offset: 100, hint_prev_physical: 0, length: 50 },
        ];
        let allocated = space.alloc_extents(1, &hints, AllocCategory::Small).unwrap();
        assert_eq!(allocated[0].offset, 0);
        assert_eq!(allocated[1].offset, 100);
    }

    #[test]
    fn block_device_write_then_read_roundtrips() {
        let dev = FakeBlockDeviceClient::new();
        dev.write(&[1, 2, 3, 4], 10).unwrap();
        let mut buf = [0u8; 4];
        dev.read(&mut buf, 10).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}
