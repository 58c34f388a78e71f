//! # Tilefan
//!
//! Tilefan is a pipelined, multi-worker dispatch engine for tiled object
//! detection on large images: it splits each image into overlapping tiles,
//! normalizes them, fans them out to a detector, and stitches the per-tile
//! detections back together with seam deduplication.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tilefan::{core::*, pipeline::*};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::with_labels(vec!["plane".to_string()]);
//!     let detector = Arc::new(NullDetector::new(config.class_num()));
//!
//!     let mut pipeline = Pipeline::spawn(&config, detector)?;
//!     pipeline
//!         .send(ImageJob {
//!             name: "example".to_string(),
//!             image: ImageData::new_empty(512, 512),
//!         })
//!         .await?;
//!     pipeline.close_ingress().await?;
//!
//!     while let Some(record) = pipeline.next_result().await {
//!         println!("{}: {} objects", record.image, record.objects.len());
//!     }
//!     pipeline.join().await
//! }
//! ```

pub use tilefan_core as core;
pub use tilefan_geometry as geometry;
pub use tilefan_pipeline as pipeline;
