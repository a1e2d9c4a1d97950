//! Utility modules.

pub mod conv;
pub(crate) mod crc;
pub(crate) mod filename;
