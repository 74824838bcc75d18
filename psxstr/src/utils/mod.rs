//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, variable-length code tables, error handling,
//! buffer management, and the small numeric types shared by the index records.

pub mod bitset;
pub mod bitstream_io;
pub mod buffer_pool;
pub mod disc_speed;
pub mod errors;
pub mod fraction;
pub mod vlc;
