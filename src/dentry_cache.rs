//! Dentry cache: `(parent, name) -> Dentry`, write-through to the
//! metadata service.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::clients::MetaServerClient;
use crate::error::FsError;
use crate::model::Dentry;

/// Default page size for [`DentryCache::list`].
pub const DEFAULT_MAX_LIST_COUNT: usize = 10;

type Bucket = HashMap<Vec<u8>, Dentry>;

/// Write-through cache of dentries, keyed two levels deep by parent inode
/// id and then name. A single mutex protects both levels (spec §4.1).
pub struct DentryCache {
    meta_client: Arc<dyn MetaServerClient>,
    entries: Mutex<HashMap<u64, Bucket>>,
    max_list_count: usize,
}

impl DentryCache {
    /// Build a cache backed by `meta_client`, paging `list` calls at
    /// `max_list_count` entries per remote round trip.
    pub fn new(meta_client: Arc<dyn MetaServerClient>, max_list_count: usize) -> Self {
        DentryCache {
            meta_client,
            entries: Mutex::new(HashMap::new()),
            max_list_count,
        }
    }

    /// Build a cache with the default page size.
    pub fn with_defaults(meta_client: Arc<dyn MetaServerClient>) -> Self {
        Self::new(meta_client, DEFAULT_MAX_LIST_COUNT)
    }

    /// Return the cached dentry, falling back to a remote lookup and
    /// caching the result on success. No negative caching: a miss that
    /// turns out not to exist remotely is never remembered.
    pub fn get(&self, fsid: u32, parent: u64, name: &[u8]) -> Result<Dentry, FsError> {
        if let Some(d) = self.entries.lock().get(&parent).and_then(|b| b.get(name)) {
            debug!("dentry cache hit for parent={parent} name={name:?}");
            return Ok(d.clone());
        }
        let dentry = self.meta_client.get_dentry(fsid, parent, name)?;
        self.entries
            .lock()
            .entry(parent)
            .or_default()
            .insert(name.to_vec(), dentry.clone());
        Ok(dentry)
    }

    /// Create a dentry remotely first, then cache it. The cache is left
    /// untouched if the remote call fails.
    pub fn create(&self, dentry: Dentry) -> Result<(), FsError> {
        self.meta_client.create_dentry(&dentry)?;
        self.entries
            .lock()
            .entry(dentry.parent)
            .or_default()
            .insert(dentry.name.clone(), dentry);
        Ok(())
    }

    /// Delete a dentry remotely first, then drop it locally. Drops the
    /// parent's bucket entirely once it becomes empty.
    pub fn delete(&self, fsid: u32, parent: u64, name: &[u8]) -> Result<(), FsError> {
        self.meta_client.delete_dentry(fsid, parent, name)?;
        let mut entries = self.entries.lock();
        if let Some(bucket) = entries.get_mut(&parent) {
            bucket.remove(name);
            if bucket.is_empty() {
                entries.remove(&parent);
            }
        }
        Ok(())
    }

    /// List every dentry in `parent`, paging through the metadata
    /// service. Never served from cache — always reflects remote state.
    /// A page shorter than the configured page size ends the scan.
    pub fn list(&self, fsid: u32, parent: u64) -> Result<Vec<Dentry>, FsError> {
        let mut out = Vec::new();
        let mut last_name: Vec<u8> = Vec::new();
        loop {
            let page = self
                .meta_client
                .list_dentry(fsid, parent, &last_name, self.max_list_count)?;
            let page_len = page.len();
            if let Some(last) = page.last() {
                last_name = last.name.clone();
            }
            out.extend(page);
            if page_len < self.max_list_count {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMetaServerClient;

    fn dentry(parent: u64, name: &str, inode_id: u64) -> Dentry {
        Dentry {
            fsid: 1,
            parent,
            name: name.as_bytes().to_vec(),
            inode_id,
        }
    }

    #[test]
    fn get_caches_after_remote_miss_then_hit() {
        let meta = Arc::new(FakeMetaServerClient::new());
        meta.dentries.lock().insert((1, b"a".to_vec()), dentry(1, "a", 2));
        let cache = DentryCache::with_defaults(meta.clone());

        let d = cache.get(1, 1, b"a").unwrap();
        assert_eq!(d.inode_id, 2);
        assert_eq!(meta.get_dentry_calls(), 1);

        // Second call is served from cache, no further remote calls.
        let d2 = cache.get(1, 1, b"a").unwrap();
        assert_eq!(d2.inode_id, 2);
        assert_eq!(meta.get_dentry_calls(), 1);
    }

    #[test]
    fn get_missing_does_not_cache_negatively() {
        let meta = Arc::new(FakeMetaServerClient::new());
        let cache = DentryCache::with_defaults(meta.clone());
        assert!(matches!(cache.get(1, 1, b"x").unwrap_err(), FsError::NotExist));
        assert_eq!(meta.get_dentry_calls(), 1);
        // Still not cached: a second miss issues a second remote call.
        assert!(cache.get(1, 1, b"x").is_err());
        assert_eq!(meta.get_dentry_calls(), 2);
    }

    #[test]
    fn create_is_remote_first() {
        let meta = Arc::new(FakeMetaServerClient::new());
        meta.fail_create_dentry.store(true, std::sync::atomic::Ordering::SeqCst);
        let cache = DentryCache::with_defaults(meta.clone());
        let err = cache.create(dentry(1, "a", 2)).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExist));
        // Cache untouched on failure.
        assert!(cache.get(1, 1, b"a").is_err());
    }

    #[test]
    fn delete_removes_empty_parent_bucket() {
        let meta = Arc::new(FakeMetaServerClient::new());
        let cache = DentryCache::with_defaults(meta.clone());
        cache.create(dentry(1, "a", 2)).unwrap();
        cache.delete(1, 1, b"a").unwrap();
        assert_eq!(cache.entries.lock().len(), 0);
    }

    // Property 5: after delete, a subsequent get returns NotExist even if
    // a prior get had cached it.
    #[test]
    fn property_delete_then_get_is_not_exist() {
        let meta = Arc::new(FakeMetaServerClient::new());
        meta.dentries.lock().insert((1, b"a".to_vec()), dentry(1, "a", 2));
        let cache = DentryCache::with_defaults(meta.clone());
        cache.get(1, 1, b"a").unwrap();
        cache.delete(1, 1, b"a").unwrap();
        meta.dentries.lock().remove(&(1, b"a".to_vec()));
        assert!(matches!(cache.get(1, 1, b"a").unwrap_err(), FsError::NotExist));
    }

    #[test]
    fn list_pages_until_short_page() {
        let meta = Arc::new(FakeMetaServerClient::new());
        for i in 0..25u64 {
            meta.dentries
                .lock()
                .insert((1, format!("f{i:02}").into_bytes()), dentry(1, &format!("f{i:02}"), i + 10));
        }
        let cache = DentryCache::new(meta.clone(), 10);
        let listed = cache.list(1, 1).unwrap();
        assert_eq!(listed.len(), 25);
        assert_eq!(meta.list_dentry_calls(), 3);
    }
}
