//! Protocol bounds.

pub const MIN_PLAYERS: i64 = 2;
pub const MAX_PLAYERS: i64 = 100;

/// Lock time of the deposits, in minutes after the protocol start
pub const MIN_LOCK_TIME_MINUTES: i64 = 1;
pub const MAX_LOCK_TIME_MINUTES: i64 = 7 * 24 * 60;

/// Upper bound of the minimal secret length, in bytes
pub const MAX_MIN_LENGTH: i64 = 512;

/// Lock time values from here on are unix timestamps rather than heights
pub const LOCK_TIME_THRESHOLD: i64 = 500_000_000;

/// Suggested start times are rounded down to this many seconds
pub const START_TIME_GRANULARITY_SECS: i64 = 5 * 60;
