//! Export functionality for inventory reports

pub mod csv;

pub use csv::*;
