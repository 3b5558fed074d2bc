//! Client core for a distributed filesystem.
//!
//! This crate implements the part of a FUSE-style client that sits
//! between the kernel filesystem callback layer and three backend
//! services: a metadata directory service, a per-inode metadata service,
//! and a block-space allocator, plus a raw block device for file data.
//! It holds the dentry and inode caches, the logical-to-physical extent
//! manager, the directory-listing buffer pool, and the operation handler
//! that composes them.
//!
//! The kernel callback layer itself, the RPC wire protocols, and the
//! block device driver are out of scope: [`clients`] defines the trait
//! surface this crate calls against, and a real deployment supplies the
//! implementations.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod clients;
pub mod config;
pub mod dentry_cache;
pub mod dir_buffer;
pub mod error;
pub mod extent_manager;
pub mod inode_cache;
pub mod model;
pub mod operation_handler;
pub mod session;
pub mod testing;
pub mod time;

pub use clients::{BlockDeviceClient, MdsClient, MetaServerClient, SpaceClient};
pub use config::{ClientConfig, ConfigError};
pub use dentry_cache::DentryCache;
pub use dir_buffer::ListingBufferPool;
pub use error::FsError;
pub use inode_cache::InodeCache;
pub use model::{
    AllocCategory, AllocInfo, Allocated, Dentry, FsFileType, FsInfo, Inode, InodeCreateParam,
    MountOption, MountPoint, PExtent, SetattrToSet, VolumeExtent,
};
pub use operation_handler::{EntryReply, FileAttr, OperationHandler, SetattrRequest};
pub use session::FsSession;
