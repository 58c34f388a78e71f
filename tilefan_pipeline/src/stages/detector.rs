//! Stage 3: the detector adapters. D workers pulling tile tensors off the
//! shared detector-input queue, driving the external [`Detector`] and pushing
//! its raw output to the detector-output queue.
//!
//! A failing detector call is not fatal: the tile is forwarded as an empty
//! detection so the stitcher still reaches its patch count. Tiles are never
//! retried here.

use crate::traits::Detector;
use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;
use tilefan_core::{Detection, RawTileOutput, TileTensor, WorkReceiver, WorkSender};

pub(crate) async fn run_detector_adapter(
	input: WorkReceiver<TileTensor>,
	output: WorkSender<RawTileOutput>,
	detector: Arc<dyn Detector>,
	class_num: usize,
) -> Result<()> {
	while let Some(tile) = input.recv().await {
		let detection = match detector.detect(&tile).await {
			Ok(detection) => match detection.validate() {
				Ok(()) => detection,
				Err(e) => {
					warn!(
						"{}: inconsistent output for tile {:?} of '{}': {e:#}",
						detector.name(),
						tile.offset,
						tile.name
					);
					Detection::new_empty(class_num)
				}
			},
			Err(e) => {
				warn!(
					"{}: failed on tile {:?} of '{}': {e:#}",
					detector.name(),
					tile.offset,
					tile.name
				);
				Detection::new_empty(class_num)
			}
		};
		debug!(
			"tile {:?} of '{}': {} raw boxes after {:.1}ms",
			tile.offset,
			tile.name,
			detection.boxes.len(),
			tile.t_start.elapsed().as_secs_f64() * 1000.0
		);
		let raw = RawTileOutput {
			detection,
			offset: tile.offset,
			name: tile.name,
			patch_num: tile.patch_num,
			t_start: tile.t_start,
		};
		output.send(raw).await?;
	}
	output.finish().await
}
