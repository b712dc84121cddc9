//! Catalog records: drug dictionary entries and local price observations.

pub mod drug;
pub mod price;

pub use drug::*;
pub use price::*;
