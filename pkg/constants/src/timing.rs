//! Retry, timeout, and requeue timing constants.

/// Attempts against the host checkpoint endpoint before giving up.
pub const CHECKPOINT_RETRY_ATTEMPTS: u32 = 5;

/// Initial delay between checkpoint endpoint attempts, in seconds.
pub const CHECKPOINT_RETRY_INITIAL_SECS: u64 = 2;

/// Multiplier applied to the delay after each failed attempt.
pub const CHECKPOINT_RETRY_FACTOR: u32 = 2;

/// Overall deadline for one agent Checkpoint RPC, wrapping the retry loop.
pub const CHECKPOINT_RPC_TIMEOUT_SECS: u64 = 30;

/// Standard requeue delay while waiting on another object to advance.
pub const REQUEUE_SHORT_SECS: u64 = 2;

/// Requeue delay while polling a restored pod for its terminal state.
pub const RESTORE_POLL_SECS: u64 = 5;

/// Periodic full relist of every kind, catching missed watch events.
pub const RESYNC_INTERVAL_SECS: u64 = 30;
