//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - the batch ran, whatever the per-package outcomes
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Manifest error - the manifest list is missing or malformed
pub const MANIFEST_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Source error - a locator could not be resolved to an endpoint
pub const SOURCE_ERROR: i32 = 6;

/// Feed error - a feed failed while strict source handling was on
pub const FEED_ERROR: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
