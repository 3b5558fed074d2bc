//! Exercises `ClientConfig::load` against a real file on disk, as
//! opposed to `config.rs`'s unit tests which only exercise `parse`.

use std::io::Write;

use distfs_client::ClientConfig;

#[test]
fn loads_a_well_formed_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "mds.mdsaddr=10.0.0.1:6700\n\
         mds.rpcTimeoutMs=3000\n\
         metaserver.msaddr=10.0.0.2:6701\n\
         metaserver.rpcTimeoutMs=3000\n\
         spaceserver.spaceaddr=10.0.0.3:6702\n\
         spaceserver.rpcTimeoutMs=3000\n\
         bdev.confpath=/etc/bdev.conf\n\
         defer.close.second=5\n"
    )
    .unwrap();

    let config = ClientConfig::load(file.path()).unwrap();
    assert_eq!(config.mds_addr, "10.0.0.1:6700");
    assert_eq!(config.defer_close_seconds, 5);
}

#[test]
fn missing_file_is_an_error() {
    let err = ClientConfig::load(std::path::Path::new("/nonexistent/path.conf")).unwrap_err();
    assert!(err.0.contains("cannot read"));
}
