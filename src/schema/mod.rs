//! Schema module - Configuration, genotype and result types for shape searches.

mod config;
mod genotype;
mod mode;
mod progress;

pub use config::*;
pub use genotype::*;
pub use mode::*;
pub use progress::*;
