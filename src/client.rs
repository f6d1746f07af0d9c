//! Client for the GenAIPro VEO API.
//!
//! Keep the public surface small and predictable. Implementation details are
//! split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod error_classification;
mod execution;
pub mod generation;
mod policy;
mod preflight;
pub mod signals;
pub mod types;

pub use builder::VeoClientBuilder;
pub use core::{VeoClient, MAX_PAGE_SIZE};
pub use generation::GenerationStream;
pub use signals::{InflightSnapshot, SignalsSnapshot};
pub use types::CallStats;
