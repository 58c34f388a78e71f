//! Stage 5: the stitcher. Single worker; gathers all tile results of the
//! image currently in flight, deduplicates detections across tile seams with
//! a second NMS pass, emits the image result and releases the ingress gate.
//!
//! The ingress gate guarantees that tiles of different images never
//! interleave here, so a single-image accumulator suffices. A tile carrying a
//! foreign name is a broken invariant and kills the worker.

use anyhow::{Result, anyhow, ensure};
use std::sync::Arc;
use tilefan_core::{ImageResult, RBox, TileResult, WorkReceiver};
use tilefan_geometry::multiclass_nms_labeled;
use tokio::sync::{Semaphore, mpsc};

#[derive(Default)]
struct Accumulator {
	cur_name: Option<String>,
	boxes: Vec<RBox>,
	labels: Vec<u32>,
	patch_count: usize,
	expected: usize,
	class_num: usize,
}

impl Accumulator {
	fn push(&mut self, result: TileResult) -> Result<()> {
		match &self.cur_name {
			None => {
				self.cur_name = Some(result.name);
				self.expected = result.patch_num;
				self.class_num = result.class_num;
			}
			Some(name) => ensure!(
				*name == result.name,
				"tile of '{}' arrived while '{name}' is being stitched",
				result.name
			),
		}
		self.boxes.extend(result.rboxes);
		self.labels.extend(result.labels);
		self.patch_count += 1;
		Ok(())
	}

	fn complete(&self) -> bool {
		self.patch_count == self.expected
	}

	fn flush(&mut self, nms_threshold: f32) -> Result<ImageResult> {
		let name = self
			.cur_name
			.take()
			.ok_or_else(|| anyhow!("flush on an empty accumulator"))?;
		let (rboxes, labels) =
			multiclass_nms_labeled(&self.boxes, &self.labels, self.class_num, nms_threshold)?;
		self.boxes.clear();
		self.labels.clear();
		self.patch_count = 0;
		self.expected = 0;
		Ok(ImageResult { name, rboxes, labels })
	}
}

pub(crate) async fn run_stitcher(
	input: WorkReceiver<TileResult>,
	egress: mpsc::Sender<Option<ImageResult>>,
	log_tx: mpsc::Sender<usize>,
	gate: Arc<Semaphore>,
	nms_threshold: f32,
) -> Result<()> {
	let mut acc = Accumulator::default();
	while let Some(result) = input.recv().await {
		acc.push(result)?;
		if acc.complete() {
			let image_result = acc.flush(nms_threshold)?;
			let det_num = image_result.labels.len();
			egress
				.send(Some(image_result))
				.await
				.map_err(|_| anyhow!("egress channel closed"))?;
			log_tx
				.send(det_num)
				.await
				.map_err(|_| anyhow!("log channel closed"))?;
			gate.add_permits(1);
		}
	}
	ensure!(
		acc.cur_name.is_none(),
		"pipeline drained while '{}' was incomplete ({}/{} tiles)",
		acc.cur_name.as_deref().unwrap_or_default(),
		acc.patch_count,
		acc.expected
	);
	egress
		.send(None)
		.await
		.map_err(|_| anyhow!("egress channel closed during shutdown"))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tile(name: &str, patch_num: usize, confidence: f32) -> TileResult {
		TileResult {
			rboxes: vec![RBox::new([0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0], confidence)],
			labels: vec![0],
			name: name.to_string(),
			patch_num,
			class_num: 1,
		}
	}

	#[test]
	fn accumulator_completes_at_patch_num() {
		let mut acc = Accumulator::default();
		acc.push(tile("a", 3, 0.5)).unwrap();
		assert!(!acc.complete());
		acc.push(tile("a", 3, 0.6)).unwrap();
		acc.push(tile("a", 3, 0.7)).unwrap();
		assert!(acc.complete());

		let result = acc.flush(0.5).unwrap();
		assert_eq!(result.name, "a");
		// the three boxes are identical, seam dedup keeps the best one
		assert_eq!(result.labels, [0]);
		assert_eq!(result.rboxes[0].confidence(), 0.7);
	}

	#[test]
	fn interleaved_images_are_fatal() {
		let mut acc = Accumulator::default();
		acc.push(tile("a", 2, 0.5)).unwrap();
		assert!(acc.push(tile("b", 2, 0.5)).is_err());
	}

	#[test]
	fn flush_resets_the_accumulator() {
		let mut acc = Accumulator::default();
		acc.push(tile("a", 1, 0.5)).unwrap();
		acc.flush(0.5).unwrap();
		assert!(acc.cur_name.is_none());
		acc.push(tile("b", 1, 0.5)).unwrap();
		let result = acc.flush(0.5).unwrap();
		assert_eq!(result.name, "b");
		assert_eq!(result.labels.len(), 1);
	}

	#[test]
	fn zero_detection_tiles_still_count() {
		let mut acc = Accumulator::default();
		acc.push(TileResult {
			rboxes: vec![],
			labels: vec![],
			name: "a".to_string(),
			patch_num: 2,
			class_num: 1,
		})
		.unwrap();
		acc.push(TileResult {
			rboxes: vec![],
			labels: vec![],
			name: "a".to_string(),
			patch_num: 2,
			class_num: 1,
		})
		.unwrap();
		assert!(acc.complete());
		let result = acc.flush(0.5).unwrap();
		assert!(result.labels.is_empty());
	}
}
