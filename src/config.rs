//! Key=value configuration file loading.
//!
//! Grounded on `original_source/curvefs/src/client/config.cpp`'s
//! `InitMdsOption`/`InitMetaServerOption`/`InitSpaceServerOption`/
//! `InitBlockDeviceOption`: a missing or malformed key is fatal at
//! startup. Here "fatal" is expressed as `Result`, and it is the binary
//! entry point's job (see `src/bin/mount-client.rs`) to log and exit.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// A malformed or missing required configuration key.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed, validated configuration for the client core and its three
/// backend connections.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `mds.mdsaddr`
    pub mds_addr: String,
    /// `mds.rpcTimeoutMs`
    pub mds_rpc_timeout_ms: u64,
    /// `metaserver.msaddr`
    pub metaserver_addr: String,
    /// `metaserver.rpcTimeoutMs`
    pub metaserver_rpc_timeout_ms: u64,
    /// `spaceserver.spaceaddr`
    pub spaceserver_addr: String,
    /// `spaceserver.rpcTimeoutMs`
    pub spaceserver_rpc_timeout_ms: u64,
    /// `bdev.confpath`
    pub bdev_confpath: String,
    /// `defer.close.second`. Parsed and validated like every other key,
    /// but unused by this crate since the RPC transport layer it tunes is
    /// out of scope here (see DESIGN.md).
    pub defer_close_seconds: i64,
}

impl ClientConfig {
    /// Load and validate a configuration file at `path`.
    ///
    /// The file format is one `key=value` pair per line; blank lines and
    /// lines starting with `#` are ignored. All keys below are required;
    /// a missing or non-numeric-where-numeric-expected value is an error.
    pub fn load(path: &Path) -> Result<ClientConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    /// Parse configuration from an in-memory key=value document.
    pub fn parse(contents: &str) -> Result<ClientConfig, ConfigError> {
        let mut kv = HashMap::new();
        for (lineno, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError(format!("line {}: expected `key=value`", lineno + 1))
            })?;
            kv.insert(key.trim().to_string(), value.trim().to_string());
        }

        let get_str = |key: &str| -> Result<String, ConfigError> {
            kv.get(key)
                .cloned()
                .ok_or_else(|| ConfigError(format!("missing required key `{key}`")))
        };
        let get_u64 = |key: &str| -> Result<u64, ConfigError> {
            get_str(key)?
                .parse::<u64>()
                .map_err(|_| ConfigError(format!("key `{key}` is not a valid unsigned integer")))
        };
        let get_i64 = |key: &str| -> Result<i64, ConfigError> {
            get_str(key)?
                .parse::<i64>()
                .map_err(|_| ConfigError(format!("key `{key}` is not a valid integer")))
        };

        Ok(ClientConfig {
            mds_addr: get_str("mds.mdsaddr")?,
            mds_rpc_timeout_ms: get_u64("mds.rpcTimeoutMs")?,
            metaserver_addr: get_str("metaserver.msaddr")?,
            metaserver_rpc_timeout_ms: get_u64("metaserver.rpcTimeoutMs")?,
            spaceserver_addr: get_str("spaceserver.spaceaddr")?,
            spaceserver_rpc_timeout_ms: get_u64("spaceserver.rpcTimeoutMs")?,
            bdev_confpath: get_str("bdev.confpath")?,
            defer_close_seconds: get_i64("defer.close.second")?,
        })
    }
}
