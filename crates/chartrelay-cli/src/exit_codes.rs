//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - every phase completed
pub const SUCCESS: u8 = 0;

/// General error - a fatal pipeline failure, or failed items with `--strict`
pub const ERROR: u8 = 1;

/// Configuration error - missing, unreadable or invalid configuration
pub const CONFIG_ERROR: u8 = 2;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: u8 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: u8 = 64;
