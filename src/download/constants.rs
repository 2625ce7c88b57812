//! Constants for the download module (timeouts, buffering).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout between reads of one response (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Ceiling on a whole exchange, body included (300 seconds for large files).
pub const REQUEST_DEADLINE_SECS: u64 = 300;

/// Write buffer in front of each `.part` file (8 KiB chunks).
pub const WRITE_CHUNK_SIZE: usize = 8 * 1024;
