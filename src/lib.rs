//! Biomorph search - recover the genotype of a branching shape from its silhouette.
//!
//! Given a reference image, this crate searches the bounded integer parameter
//! space of a procedural branching figure for the genotype whose rendering
//! looks most like the reference.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Modes, genotypes, configuration and result types
//! - `compute`: Shape generation, rasterization, similarity metrics, and the
//!   evolutionary and exhaustive searches
//!
//! # Example
//!
//! ```rust,no_run
//! use biomorph_search::{
//!     EvolutionEngine,
//!     compute::{Reference, ReferenceOptions, load_reference_image, prepare_reference},
//!     schema::SearchConfig,
//! };
//!
//! let config = SearchConfig::default();
//! let image = load_reference_image("reference.png")?;
//! let reference = prepare_reference(&image, &config.render, ReferenceOptions::default());
//!
//! let mut engine = EvolutionEngine::new(Reference::Binary(reference), config)?;
//! let result = engine.run();
//!
//! println!("Best genotype {} (score {:.3})", result.genotype, result.score);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{CancelToken, EvolutionEngine, ExhaustiveSearch, brute_force};
pub use compute::{Biomorph, Reference, prepare_grayscale_reference, prepare_reference};
pub use schema::{BruteForceConfig, Genotype, Mode, SearchConfig, SearchResult};
