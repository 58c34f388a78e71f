use anyhow::Result;
use async_trait::async_trait;
use tilefan_core::{Detection, TileTensor};

/// The external detector model, seen from the pipeline as a black box that
/// turns one normalized tile tensor into raw boxes and per-class scores.
///
/// Implementations must be safe to call from several adapter workers at once.
/// A returned error is *not* fatal: the adapter logs it and substitutes an
/// empty detection for that tile, so the image still completes. Retries are
/// the implementation's own business.
#[async_trait]
pub trait Detector: Send + Sync {
	/// Human-readable name used in log records.
	fn name(&self) -> &str;

	/// Runs the model on one tile.
	async fn detect(&self, tile: &TileTensor) -> Result<Detection>;
}
