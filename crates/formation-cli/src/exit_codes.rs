//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - settings file or flags failed validation
pub const CONFIG_ERROR: i32 = 2;

/// Expansion error - a resource spec could not be expanded
pub const EXPANSION_ERROR: i32 = 3;

/// Cluster error - client setup or the controller loop failed
pub const CLUSTER_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
