//! Directory-listing buffer pool: hands out 32-bit handles for the
//! lifetime of an `opendir`/`readdir`/`releasedir` sequence, recycling
//! released handles FIFO (spec §4.5, Property 6).
//!
//! Two locks guard the pool: `buffer_mtx` over the handle -> buffer map
//! and `index_mtx` over handle allocation. Every operation that needs
//! both acquires `buffer_mtx` first, `index_mtx` second — never the
//! reverse — to rule out deadlock between concurrent callers.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::model::Dentry;

struct ListingBuffer {
    entries: Vec<Dentry>,
    was_read: bool,
}

struct PoolIndex {
    next_handle: u32,
    free_list: VecDeque<u32>,
}

impl PoolIndex {
    fn alloc(&mut self) -> u32 {
        if let Some(h) = self.free_list.pop_front() {
            return h;
        }
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn free(&mut self, handle: u32) {
        self.free_list.push_back(handle);
    }
}

/// Pool of buffered directory listings, addressed by handle across the
/// `opendir`/`readdir`/`releasedir` triple.
pub struct ListingBufferPool {
    buffer_mtx: Mutex<HashMap<u32, ListingBuffer>>,
    index_mtx: Mutex<PoolIndex>,
}

impl Default for ListingBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingBufferPool {
    pub fn new() -> Self {
        ListingBufferPool {
            buffer_mtx: Mutex::new(HashMap::new()),
            index_mtx: Mutex::new(PoolIndex {
                next_handle: 0,
                free_list: VecDeque::new(),
            }),
        }
    }

    /// Allocate an empty, unread buffer and return its handle. Entries
    /// are filled in later by [`ListingBufferPool::fill`], on the first
    /// `readdir` call against the handle.
    pub fn new_handle(&self) -> u32 {
        let mut buffers = self.buffer_mtx.lock();
        let mut index = self.index_mtx.lock();
        let handle = index.alloc();
        buffers.insert(
            handle,
            ListingBuffer {
                entries: Vec::new(),
                was_read: false,
            },
        );
        handle
    }

    /// Whether `handle` has been filled yet. `None` if the handle is not
    /// (or no longer) live.
    pub fn was_read(&self, handle: u32) -> Option<bool> {
        self.buffer_mtx.lock().get(&handle).map(|b| b.was_read)
    }

    /// Store the full directory listing for `handle` and mark it read.
    /// No-op if the handle isn't live.
    pub fn fill(&self, handle: u32, entries: Vec<Dentry>) {
        if let Some(b) = self.buffer_mtx.lock().get_mut(&handle) {
            b.entries = entries;
            b.was_read = true;
        }
    }

    /// Run `f` over the buffered entries for `handle`, if it is live.
    pub fn with_entries<F, R>(&self, handle: u32, f: F) -> Option<R>
    where
        F: FnOnce(&[Dentry]) -> R,
    {
        let buffers = self.buffer_mtx.lock();
        buffers.get(&handle).map(|b| f(&b.entries))
    }

    /// Release a handle, returning its buffer and recycling the handle
    /// for the next [`ListingBufferPool::new_handle`] call.
    pub fn release(&self, handle: u32) {
        let mut buffers = self.buffer_mtx.lock();
        let mut index = self.index_mtx.lock();
        buffers.remove(&handle);
        index.free(handle);
    }

    /// Drop every live buffer and recyclable handle. Used at `destroy`.
    pub fn free_all(&self) {
        let mut buffers = self.buffer_mtx.lock();
        let mut index = self.index_mtx.lock();
        buffers.clear();
        index.free_list.clear();
        index.next_handle = 0;
    }

    /// Number of currently live (unreleased) buffers.
    pub fn live_count(&self) -> usize {
        self.buffer_mtx.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dentry(name: &str) -> Dentry {
        Dentry {
            fsid: 1,
            parent: 1,
            name: name.as_bytes().to_vec(),
            inode_id: 2,
        }
    }

    #[test]
    fn new_handle_then_fill_then_release() {
        let pool = ListingBufferPool::new();
        let h = pool.new_handle();
        assert_eq!(pool.was_read(h), Some(false));
        pool.fill(h, vec![dentry("a"), dentry("b")]);
        assert_eq!(pool.was_read(h), Some(true));
        let names: Vec<_> = pool
            .with_entries(h, |entries| entries.iter().map(|d| d.name.clone()).collect())
            .unwrap();
        assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec()]);
        pool.release(h);
        assert!(pool.with_entries(h, |_| ()).is_none());
        assert_eq!(pool.was_read(h), None);
    }

    // Property 6: released handles are recycled in FIFO order.
    #[test]
    fn property_handles_recycle_fifo() {
        let pool = ListingBufferPool::new();
        let h1 = pool.new_handle();
        let h2 = pool.new_handle();
        let h3 = pool.new_handle();
        pool.release(h1);
        pool.release(h2);
        // Next two allocations reuse h1 then h2, in the order freed.
        let h4 = pool.new_handle();
        let h5 = pool.new_handle();
        assert_eq!(h4, h1);
        assert_eq!(h5, h2);
        pool.release(h3);
        pool.release(h4);
        pool.release(h5);
    }

    #[test]
    fn free_all_drops_everything() {
        let pool = ListingBufferPool::new();
        pool.new_handle();
        pool.new_handle();
        assert_eq!(pool.live_count(), 2);
        pool.free_all();
        assert_eq!(pool.live_count(), 0);
        let h = pool.new_handle();
        assert_eq!(h, 0);
    }
}
