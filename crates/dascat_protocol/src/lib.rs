//! dascat protocol - shared data model for the packet concatenator.
//!
//! Everything that more than one crate needs to agree on lives here:
//!
//! - [`Matrix`]: the float32 time × space sample block carried by packets and chunks
//! - [`Attributes`]: container attributes (`DX_down`, `PRR_down`, optional system keys)
//! - [`Reference`]: the validated reference configuration captured at startup
//! - [`time`]: UTC day arithmetic and deterministic timestamp formatting
//! - [`container`]: the on-disk container codec (HDF5, dataset `data_down`)

pub mod attrs;
pub mod container;
pub mod error;
pub mod matrix;
pub mod reference;
pub mod time;

pub use attrs::{AttrValue, Attributes};
pub use error::{ProtocolError, Result};
pub use matrix::Matrix;
pub use reference::{Mismatch, Reference};
pub use time::UtcDay;
