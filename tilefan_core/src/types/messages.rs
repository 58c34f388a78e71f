//! Message types flowing between the pipeline stages.
//!
//! Every stage boundary has its own payload type; the channels carry them
//! wrapped in `Option`, where `None` is the end-of-stream sentinel.

use super::{ImageData, RBox, TileRect};
use anyhow::{Result, ensure};
use serde::Serialize;
use std::{sync::Arc, time::Instant};

/// The unit entering the system: a named full-resolution image in BGR order.
#[derive(Debug)]
pub struct ImageJob {
	/// Stable identifier, typically a file path. Unique while in flight.
	pub name: String,
	/// H×W×3 byte image, BGR.
	pub image: ImageData,
}

/// Per-image bookkeeping recorded by the splitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageMeta {
	pub name: String,
	pub width: u32,
	pub height: u32,
	/// Edge length of a full tile in pixels.
	pub patch_size: u32,
	/// Overlap between neighbouring tiles in pixels.
	pub gap: u32,
	/// Number of tiles the image was split into.
	pub patch_num: usize,
}

/// One preprocessor's share of an image: the shared RGB buffer plus the
/// consecutive run of tiles assigned to this worker. The batch may be empty
/// when an image has fewer tiles than there are preprocessors.
#[derive(Clone, Debug)]
pub struct TileBatch {
	pub image: Arc<ImageData>,
	pub tiles: Vec<TileRect>,
	pub meta: ImageMeta,
	pub t_start: Instant,
}

/// A tensor-ready tile: normalized f32 pixels in CHW order (an implied batch
/// dimension of 1 in front), zero-padded on the bottom/right when the source
/// tile was shorter than `patch_size`.
#[derive(Clone, Debug)]
pub struct TileTensor {
	/// `3 * patch_size * patch_size` values, channel-major.
	pub data: Vec<f32>,
	/// Edge length of the (padded) tile.
	pub patch_size: u32,
	/// Origin of the tile in image coordinates, `(x0, y0)`.
	pub offset: (u32, u32),
	pub name: String,
	pub patch_num: usize,
	pub t_start: Instant,
}

/// Row-major K×C matrix of per-class scores.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreMatrix {
	data: Vec<f32>,
	classes: usize,
}

impl ScoreMatrix {
	/// Wraps a row-major buffer of `K * classes` scores.
	///
	/// # Errors
	///
	/// Fails if the buffer length is not a multiple of `classes`.
	pub fn new(data: Vec<f32>, classes: usize) -> Result<Self> {
		ensure!(classes > 0, "score matrix needs at least one class");
		ensure!(
			data.len() % classes == 0,
			"score buffer of {} values is not divisible by {classes} classes",
			data.len()
		);
		Ok(Self { data, classes })
	}

	/// A matrix with zero rows.
	pub fn new_empty(classes: usize) -> Self {
		Self {
			data: Vec::new(),
			classes,
		}
	}

	/// Number of classes (columns).
	pub fn classes(&self) -> usize {
		self.classes
	}

	/// Number of detections (rows).
	pub fn rows(&self) -> usize {
		if self.classes == 0 {
			0
		} else {
			self.data.len() / self.classes
		}
	}

	/// The score of detection `row` for class `class`.
	pub fn score(&self, row: usize, class: usize) -> f32 {
		self.data[row * self.classes + class]
	}
}

/// What the detector returns for one tile: K raw boxes and their K×C
/// per-class scores.
#[derive(Clone, Debug)]
pub struct Detection {
	pub boxes: Vec<RBox>,
	pub scores: ScoreMatrix,
}

impl Detection {
	/// A detection with zero boxes, used when the detector fails on a tile.
	pub fn new_empty(classes: usize) -> Self {
		Self {
			boxes: Vec::new(),
			scores: ScoreMatrix::new_empty(classes),
		}
	}

	/// Checks that boxes and score rows line up.
	///
	/// # Errors
	///
	/// Fails on a row-count mismatch.
	pub fn validate(&self) -> Result<()> {
		ensure!(
			self.boxes.len() == self.scores.rows(),
			"{} boxes but {} score rows",
			self.boxes.len(),
			self.scores.rows()
		);
		Ok(())
	}
}

/// A tile's raw detector output together with the fields carried forward from
/// the tile tensor.
#[derive(Clone, Debug)]
pub struct RawTileOutput {
	pub detection: Detection,
	pub offset: (u32, u32),
	pub name: String,
	pub patch_num: usize,
	pub t_start: Instant,
}

/// One tile after per-tile NMS, with coordinates translated to image space.
#[derive(Clone, Debug)]
pub struct TileResult {
	pub rboxes: Vec<RBox>,
	pub labels: Vec<u32>,
	pub name: String,
	pub patch_num: usize,
	pub class_num: usize,
}

/// A whole image after cross-tile NMS.
#[derive(Clone, Debug)]
pub struct ImageResult {
	pub name: String,
	pub rboxes: Vec<RBox>,
	pub labels: Vec<u32>,
}

/// One detection in egress form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectedObject {
	pub label: String,
	#[serde(rename = "box")]
	pub coords: [f32; 8],
	pub confidence: f32,
}

/// The egress record: everything that was found in one image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageObjects {
	pub image: String,
	pub objects: Vec<DetectedObject>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn score_matrix_validates_shape() {
		assert!(ScoreMatrix::new(vec![0.0; 6], 3).is_ok());
		assert!(ScoreMatrix::new(vec![0.0; 7], 3).is_err());
		assert!(ScoreMatrix::new(vec![], 0).is_err());
	}

	#[test]
	fn score_matrix_indexes_row_major() {
		let m = ScoreMatrix::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3).unwrap();
		assert_eq!(m.rows(), 2);
		assert_eq!(m.score(0, 2), 0.3);
		assert_eq!(m.score(1, 0), 0.4);
	}

	#[test]
	fn empty_detection_is_consistent() {
		let d = Detection::new_empty(5);
		assert!(d.validate().is_ok());
		assert_eq!(d.scores.classes(), 5);
		assert_eq!(d.scores.rows(), 0);
	}

	#[test]
	fn detection_validation_catches_mismatch() {
		let d = Detection {
			boxes: vec![RBox::new([0.0; 8], 1.0)],
			scores: ScoreMatrix::new_empty(2),
		};
		assert!(d.validate().is_err());
	}
}
