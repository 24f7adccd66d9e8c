//! dascat Scout - Packet Discovery & Validation Layer
//!
//! Scout turns a day directory of upstream packet files into an ordered,
//! validated sequence of packet descriptors. Payloads are not read here;
//! each descriptor loads its matrix on demand.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  LOCALPATH/  │     │   naming +   │     │  reference   │     │  ordered,    │
//! │  YYYYMMDD/   │────▶│   headers    │────▶│  validation  │────▶│  de-duped    │
//! │  packets     │     │  (no data)   │     │              │     │  descriptors │
//! └──────────────┘     └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The directory of the current UTC day is never opened: the upstream client
//! may still be writing to it.

pub mod catalog;
pub mod config;
pub mod error;
pub mod naming;
pub mod packet;
pub mod segy;
pub mod sidecar;

// Re-exports for convenience
pub use catalog::{DayListing, PacketCatalog};
pub use config::{PacketFormat, SourceConfig};
pub use error::{CatalogError, PacketRejection, RejectedPacket, Result};
pub use packet::PacketDescriptor;
