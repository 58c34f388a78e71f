//! Stage 4: the tile-NMS workers. M workers applying per-class polygon NMS
//! to one tile's raw detections and translating the survivors from
//! tile-local to image-global coordinates.

use anyhow::Result;
use tilefan_core::{DetectionConfig, RawTileOutput, TileResult, WorkReceiver, WorkSender};
use tilefan_geometry::multiclass_nms_scored;

pub(crate) async fn run_tile_nms(
	input: WorkReceiver<RawTileOutput>,
	output: WorkSender<TileResult>,
	cfg: DetectionConfig,
) -> Result<()> {
	while let Some(raw) = input.recv().await {
		let class_num = raw.detection.scores.classes();
		let (mut rboxes, labels) = multiclass_nms_scored(&raw.detection.boxes, &raw.detection.scores, &cfg)?;

		// tile-local → image-global; x slots get offset.0, y slots offset.1
		let (dx, dy) = (raw.offset.0 as f32, raw.offset.1 as f32);
		for rbox in &mut rboxes {
			rbox.translate(dx, dy);
		}

		let result = TileResult {
			rboxes,
			labels,
			name: raw.name,
			patch_num: raw.patch_num,
			class_num,
		};
		output.send(result).await?;
	}
	output.finish().await
}
