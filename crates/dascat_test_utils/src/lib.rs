//! dascat Test Utilities
//!
//! Fixture builders for packet directories, reference files and SEG-Y packets.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dascat_test_utils::{indexed_matrix, packet_name, write_container_packet, FixtureDir};
//!
//! let fixture = FixtureDir::new();
//! let day = fixture.mkdir("local/20231114");
//! let matrix = indexed_matrix(0, 1000, 32);
//! write_container_packet(&day, &packet_name(1_699_920_000.0), &matrix, 100.0, 4.08);
//! ```
//!
//! Helpers panic on I/O errors; they are meant for tests only.

pub mod fixture;
pub mod packets;
pub mod segy;

// Re-exports for convenience
pub use fixture::FixtureDir;
pub use packets::{
    indexed_matrix, packet_name, write_container_packet, write_container_with, write_reference,
};
pub use segy::{segy_bytes, segy_file_name, write_segy_info, write_segy_packet};
