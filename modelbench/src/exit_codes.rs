//! Stable exit codes for modelbench CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid usage or configuration, or an attempted operation that failed.
pub const INVALID: i32 = 1;
/// No provider was available or none satisfied the routing constraints.
pub const UNAVAILABLE: i32 = 2;
