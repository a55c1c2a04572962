//! Hierarchical navigable small world index for cosine similarity over unit vectors.
//!
//! Inputs are assumed to be L2 normalized. Distance is `1 - dot(a, b)`, so a perfect match
//! scores `0.0` and opposite vectors score `2.0`.

mod config;
mod distance;
mod error;
mod graph;
mod index;

pub use config::HnswConfig;
pub use distance::{cosine_distance, dot};
pub use error::{Error, Result};
pub use index::{HnswIndex, Neighbor};
