//! Contains the shared building blocks of the tilefan engine: image buffers,
//! tile geometry, stage messages, pipeline configuration and the bounded
//! work-queue primitive.

pub mod config;
pub use config::*;
pub mod queue;
pub use queue::*;
pub mod types;
pub use types::*;
