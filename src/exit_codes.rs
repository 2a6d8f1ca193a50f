//! Exit code policy for wireprobe.
//!
//! Check outcomes never change the exit code: a run that reached the end
//! exits `0` even when every check failed. Non-zero codes mean the harness
//! could not run at all.
//!
//! - `0` = Run completed
//! - `12` = Configuration error (bad config file or CLI value)

/// Exit code: run completed (whatever the checks said)
pub const COMPLETED: i32 = 0;

/// Exit code: configuration error
pub const CONFIG_ERROR: i32 = 12;
