//! Tilefan Pipeline Engine
//!
//! This crate implements the tilefan **dispatch engine**: a pipelined,
//! multi-worker system that splits large images into overlapping tiles,
//! normalizes them, dispatches them to a detector, and stitches the per-tile
//! detections back into whole-image results with seam deduplication.
//!
//! The main entry point is [`Pipeline`], which wires up all stages and runs
//! them as tokio tasks. The detector itself is an external collaborator,
//! plugged in through the [`Detector`] trait.

mod helpers;
mod pipeline;
mod stages;
mod traits;

pub use helpers::{DebugDetector, MockDetector, NullDetector};
pub use pipeline::Pipeline;
pub use traits::Detector;
