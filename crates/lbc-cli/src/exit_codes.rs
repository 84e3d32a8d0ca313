//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Parse error - malformed `--set` value, pass-through arguments or credentials
pub const PARSE_ERROR: i32 = 2;

/// State conflict - release state or namespace arguments do not allow the operation
pub const STATE_CONFLICT: i32 = 3;

/// Data loss risk - persistent volumes would be deleted
pub const DATA_LOSS_RISK: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// A helm or kubectl command that had to succeed failed
pub const COMMAND_FAILED: i32 = 6;

/// Console deployments are not healthy
pub const VERIFY_FAILED: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Required tool missing or too old, or the cluster is unavailable (EX_UNAVAILABLE)
pub const UNAVAILABLE: i32 = 69;
