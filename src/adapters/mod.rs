//! Input adapters that normalise heterogeneous device exports.

pub mod manual_import;

pub use manual_import::*;
