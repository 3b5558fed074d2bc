//! External RPC client contracts.
//!
//! These traits are the boundary the spec calls out as "external
//! collaborators, specified only at their contract surface" (spec §1):
//! the metadata directory service, the per-inode metadata service, the
//! space allocator, and the raw block device. This crate never implements
//! the wire protocol for any of them — production code plugs in a real
//! RPC stub; tests plug in [`crate::testing`]'s in-memory fakes.

mod block_device_client;
mod mds_client;
mod metaserver_client;
mod space_client;

pub use block_device_client::BlockDeviceClient;
pub use mds_client::MdsClient;
pub use metaserver_client::MetaServerClient;
pub use space_client::SpaceClient;
