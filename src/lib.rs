//! Guided selection of a large-language-model offering from a static catalog.
//!
//! The core is [`evaluation::evaluate`]: a pure function that narrows the
//! catalog through ordered elimination stages ([`filter`]) and ranks the
//! survivors by a weighted blend of cost and performance percentiles.

pub mod catalog;
pub mod config;
pub mod evaluation;
pub mod filter;
pub mod models;
pub mod output;
pub mod runner;
pub mod stats;

pub use evaluation::evaluate;
pub use filter::filter_candidates;
