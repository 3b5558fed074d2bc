//! Inode cache: `id -> Inode`, write-through to the metadata service,
//! with per-id update serialization (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::clients::MetaServerClient;
use crate::error::FsError;
use crate::model::{Inode, InodeCreateParam};

/// Write-through cache of inodes, keyed by id. Updates are serialized
/// per-id so two concurrent `setattr`/write-length bumps on the same
/// inode can't interleave their remote writes out of order.
pub struct InodeCache {
    meta_client: Arc<dyn MetaServerClient>,
    entries: Mutex<HashMap<u64, Inode>>,
    update_locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl InodeCache {
    pub fn new(meta_client: Arc<dyn MetaServerClient>) -> Self {
        InodeCache {
            meta_client,
            entries: Mutex::new(HashMap::new()),
            update_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: u64) -> Arc<Mutex<()>> {
        self.update_locks
            .lock()
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the cached inode, falling back to a remote fetch and
    /// caching the result on success.
    pub fn get(&self, fsid: u32, id: u64) -> Result<Inode, FsError> {
        if let Some(inode) = self.entries.lock().get(&id) {
            debug!("inode cache hit for id={id}");
            return Ok(inode.clone());
        }
        let inode = self.meta_client.get_inode(fsid, id)?;
        self.entries.lock().insert(id, inode.clone());
        Ok(inode)
    }

    /// Create an inode remotely, returning and caching the service's copy
    /// (which carries the assigned id).
    pub fn create(&self, param: &InodeCreateParam) -> Result<Inode, FsError> {
        let inode = self.meta_client.create_inode(param)?;
        self.entries.lock().insert(inode.id, inode.clone());
        Ok(inode)
    }

    /// Replace the stored inode remotely first, then in the cache.
    /// Serialized per-id: concurrent updates to the same inode block on
    /// each other rather than racing their remote calls.
    pub fn update(&self, inode: Inode) -> Result<(), FsError> {
        let lock = self.lock_for(inode.id);
        let _guard = lock.lock();
        self.meta_client.update_inode(&inode)?;
        self.entries.lock().insert(inode.id, inode);
        Ok(())
    }

    /// Delete an inode remotely first, then evict it locally.
    pub fn delete(&self, fsid: u32, id: u64) -> Result<(), FsError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        self.meta_client.delete_inode(fsid, id)?;
        self.entries.lock().remove(&id);
        self.update_locks.lock().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FsFileType;
    use crate::testing::FakeMetaServerClient;

    fn inode(id: u64) -> Inode {
        Inode {
            id,
            fsid: 1,
            mode: 0o644,
            uid: 0,
            gid: 0,
            nlink: 1,
            length: 0,
            atime_ms: 0,
            mtime_ms: 0,
            ctime_ms: 0,
            file_type: FsFileType::File,
            extents: Vec::new(),
        }
    }

    #[test]
    fn get_caches_after_remote_miss() {
        let meta = Arc::new(FakeMetaServerClient::new());
        meta.inodes.lock().insert(7, inode(7));
        let cache = InodeCache::new(meta.clone());
        let got = cache.get(1, 7).unwrap();
        assert_eq!(got.id, 7);
        assert_eq!(meta.get_inode_calls(), 1);
        cache.get(1, 7).unwrap();
        assert_eq!(meta.get_inode_calls(), 1);
    }

    #[test]
    fn update_is_remote_first() {
        let meta = Arc::new(FakeMetaServerClient::new());
        meta.fail_update_inode.store(true, std::sync::atomic::Ordering::SeqCst);
        let cache = InodeCache::new(meta.clone());
        let err = cache.update(inode(7)).unwrap_err();
        assert!(matches!(err, FsError::Remote(_)));
        assert!(cache.entries.lock().get(&7).is_none());
    }

    #[test]
    fn delete_evicts_cache_and_update_lock() {
        let meta = Arc::new(FakeMetaServerClient::new());
        meta.inodes.lock().insert(7, inode(7));
        let cache = InodeCache::new(meta.clone());
        cache.get(1, 7).unwrap();
        cache.delete(1, 7).unwrap();
        assert!(cache.entries.lock().get(&7).is_none());
        assert!(cache.update_locks.lock().get(&7).is_none());
    }
}
