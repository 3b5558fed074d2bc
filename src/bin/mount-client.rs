//! Mount-client entry point.
//!
//! Grounded on `examples/simple.rs`'s `fn main`: a `clap::Command` with a
//! `-v` verbosity counter feeding `env_logger`, and process exit codes
//! for startup failures instead of panics.
//!
//! This crate defines the `MdsClient`/`MetaServerClient`/`SpaceClient`/
//! `BlockDeviceClient` contracts but not their RPC implementations (spec
//! §1, out of scope). `--demo` runs the handler against the in-memory
//! fakes in [`distfs_client::testing`] so the wiring can be exercised
//! without a real cluster; without it, the binary loads and validates
//! configuration, then reports that it has no backend to attach to.

use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command, crate_version};
use distfs_client::testing::{FakeBlockDeviceClient, FakeMdsClient, FakeMetaServerClient, FakeSpaceClient};
use distfs_client::{ClientConfig, FsSession, MountOption, OperationHandler};
use log::{LevelFilter, error, info};

fn main() {
    let matches = Command::new("mount-client")
        .version(crate_version!())
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .default_value("/etc/distfs/client.conf")
                .help("Path to the key=value client configuration file"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("NAME")
                .required(true)
                .help("Filesystem/volume name to mount"),
        )
        .arg(
            Arg::new("mount-point")
                .long("mount-point")
                .value_name("HOST:PATH")
                .required(true)
                .help("Mount point, as host:path (host defaults to unknownhost)"),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .action(ArgAction::SetTrue)
                .help("Run against in-memory fake backends instead of a real cluster"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .action(ArgAction::Count)
                .help("Sets the level of verbosity"),
        )
        .get_matches();

    let verbosity = matches.get_count("v");
    let log_level = match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::builder()
        .format_timestamp_nanos()
        .filter_level(log_level)
        .init();

    let config_path = PathBuf::from(matches.get_one::<String>("config").unwrap());
    let config = match ClientConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load configuration from {}: {e}", config_path.display());
            exit(1);
        }
    };
    info!(
        "loaded configuration: mds={} metaserver={} spaceserver={}",
        config.mds_addr, config.metaserver_addr, config.spaceserver_addr
    );

    let mount_option = MountOption {
        volume: matches.get_one::<String>("volume").unwrap().to_string(),
        mount_point: matches.get_one::<String>("mount-point").unwrap().to_string(),
    };

    if !matches.get_flag("demo") {
        error!(
            "no RPC client implementation is linked into this binary; pass --demo to exercise \
             the operation handler against in-memory fakes, or link real MdsClient/\
             MetaServerClient/SpaceClient/BlockDeviceClient implementations"
        );
        exit(1);
    }

    if let Err(e) = run_demo(&mount_option) {
        error!("demo run failed: {e}");
        exit(1);
    }
}

fn run_demo(mount_option: &MountOption) -> Result<(), distfs_client::FsError> {
    let mds = Arc::new(FakeMdsClient::new());
    let meta = Arc::new(FakeMetaServerClient::new());
    let space = Arc::new(FakeSpaceClient::new());
    let block_device = Arc::new(FakeBlockDeviceClient::new());

    let session = Arc::new(FsSession::new(mds));
    let handler = OperationHandler::with_defaults(session, meta, space, block_device);
    handler.init(mount_option)?;

    let root = 1u64;
    let entry = handler.create(root, b"hello.txt", 0o644, 0, 0)?;
    info!("created inode {}", entry.attr.ino);
    let written = handler.write(entry.attr.ino, 0, b"hello, distfs")?;
    info!("wrote {written} bytes");
    let data = handler.read(entry.attr.ino, 0, written)?;
    info!("read back {:?}", String::from_utf8_lossy(&data));

    let dir = handler.mkdir(root, b"a-directory", 0o755, 0, 0)?;
    let handle = handler.opendir(dir.attr.ino)?;
    let listing = handler.readdir(dir.attr.ino, handle, 0)?;
    info!("directory {} has {} entries", dir.attr.ino, listing.len());
    handler.releasedir(handle)?;

    handler.destroy()?;
    Ok(())
}
