//! Filesystem session: the mount/unmount handshake with the metadata
//! directory service. Owns the [`FsInfo`] snapshot for the lifetime of
//! the mount (spec §4, "Filesystem Session").
//!
//! Grounded on the teacher's synchronous, multi-threaded session model
//! (`std::sync` primitives, blocking calls treated as ordinary function
//! calls) rather than its tokio-async one: spec §5 mandates a "parallel
//! threads" scheduling model with no internal task suspension.

use std::sync::{Arc, OnceLock};

use log::info;

use crate::clients::MdsClient;
use crate::error::FsError;
use crate::model::{FsInfo, MountOption, MountPoint};

/// Default block size used when a filesystem must be created because it
/// doesn't exist yet (end-to-end scenario 1).
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

struct Mounted {
    fs_info: FsInfo,
    mount_point: MountPoint,
}

/// Owns the handshake with the metadata directory service and the
/// resulting [`FsInfo`]. Immutable once mounted, per spec §3.
pub struct FsSession {
    mds_client: Arc<dyn MdsClient>,
    mounted: OnceLock<Mounted>,
}

impl FsSession {
    pub fn new(mds_client: Arc<dyn MdsClient>) -> Self {
        FsSession {
            mds_client,
            mounted: OnceLock::new(),
        }
    }

    /// Mount `opt.volume` at `opt.mount_point`, creating the filesystem
    /// first if the metadata directory service doesn't know it yet.
    pub fn mount(&self, opt: &MountOption) -> Result<(), FsError> {
        let mount_point = MountPoint::parse(&opt.mount_point);
        match self.mds_client.get_fs_info(&opt.volume) {
            Ok(_) => {}
            Err(FsError::NotExist) => {
                info!("filesystem {} does not exist yet, creating it", opt.volume);
                self.mds_client
                    .create_fs(&opt.volume, DEFAULT_BLOCK_SIZE, &opt.volume)?;
            }
            Err(e) => return Err(e),
        }
        let fs_info = self.mds_client.mount_fs(&opt.volume, &opt.mount_point)?;
        info!(
            "mounted fsid={} fsname={} at {}:{}",
            fs_info.fsid, fs_info.fsname, mount_point.host, mount_point.path
        );
        self.mounted
            .set(Mounted {
                fs_info,
                mount_point,
            })
            .map_err(|_| FsError::Internal("session already mounted".into()))
    }

    /// Unmount, notifying the metadata directory service.
    pub fn unmount(&self) -> Result<(), FsError> {
        let mounted = self
            .mounted
            .get()
            .ok_or_else(|| FsError::Internal("not mounted".into()))?;
        self.mds_client.umount_fs(
            &mounted.fs_info.fsname,
            &format!("{}:{}", mounted.mount_point.host, mounted.mount_point.path),
        )
    }

    /// The current mount's snapshot. Fails with `Internal` if not mounted.
    pub fn fs_info(&self) -> Result<FsInfo, FsError> {
        self.mounted
            .get()
            .map(|m| m.fs_info.clone())
            .ok_or_else(|| FsError::Internal("not mounted".into()))
    }

    /// Shorthand for `fs_info().fsid`, used on every operation path.
    pub fn fsid(&self) -> Result<u32, FsError> {
        self.fs_info().map(|i| i.fsid)
    }
}
