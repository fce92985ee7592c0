//! Configuration.
//!
//! This module contains anything which can be tweaked and customized to the users preferences.
//! Everything in here is a compile-time constant; nothing is read from the environment.

/// The arena granularity.
///
/// Every time the allocator runs out of free blocks, it asks the OS for exactly this many bytes.
/// A single allocation can never be larger than one such chunk.
pub const ARENA_SIZE: usize = 2 * 1024 * 1024;

/// The minimum log level.
///
/// Messages with a level below this are dropped.
pub const MIN_LOG_LEVEL: u8 = 0;

/// The log target (a file descriptor).
///
/// This points to stderr, but could be changed arbitrarily.
pub const LOG_TARGET: i32 = 2;

/// The size of the stack buffer a single log message is formatted into.
///
/// Longer messages are truncated and marked with `...`.
pub const LOG_BUFFER_SIZE: usize = 256;
