//! Compute module - Rasterization, similarity scoring and search.

pub mod evolution;
mod raster;
mod shape;
mod similarity;

pub use raster::*;
pub use shape::*;
pub use similarity::*;
