//! Detectors without a model behind them: a scriptable mock for tests, a
//! null detector that never finds anything, and a debug detector that marks
//! every tile so the whole pipeline can be exercised end-to-end.

use crate::traits::Detector;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::{
	collections::{HashMap, HashSet},
	sync::atomic::{AtomicUsize, Ordering},
};
use tilefan_core::{Detection, RBox, ScoreMatrix, TileTensor};

/// Builds a detection from tile-local boxes and a row-major score buffer.
pub fn make_detection(boxes: Vec<RBox>, scores: Vec<f32>, classes: usize) -> Detection {
	Detection {
		boxes,
		scores: ScoreMatrix::new(scores, classes).expect("score buffer must be divisible by the class count"),
	}
}

/// A scriptable detector keyed by tile offset. Unknown offsets yield an empty
/// detection; offsets registered via [`MockDetector::fail_at`] return an
/// error, which the adapter must swallow.
pub struct MockDetector {
	class_num: usize,
	responses: HashMap<(u32, u32), Detection>,
	failures: HashSet<(u32, u32)>,
	calls: AtomicUsize,
}

impl MockDetector {
	pub fn new(class_num: usize) -> Self {
		Self {
			class_num,
			responses: HashMap::new(),
			failures: HashSet::new(),
			calls: AtomicUsize::new(0),
		}
	}

	/// Registers the response for the tile at `offset`.
	pub fn respond(mut self, offset: (u32, u32), detection: Detection) -> Self {
		self.responses.insert(offset, detection);
		self
	}

	/// Makes the detector fail on the tile at `offset`.
	pub fn fail_at(mut self, offset: (u32, u32)) -> Self {
		self.failures.insert(offset);
		self
	}

	/// Number of tiles this detector has been asked about.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::Relaxed)
	}
}

#[async_trait]
impl Detector for MockDetector {
	fn name(&self) -> &str {
		"mock"
	}

	async fn detect(&self, tile: &TileTensor) -> Result<Detection> {
		self.calls.fetch_add(1, Ordering::Relaxed);
		if self.failures.contains(&tile.offset) {
			bail!("scripted failure at {:?}", tile.offset);
		}
		Ok(
			self
				.responses
				.get(&tile.offset)
				.cloned()
				.unwrap_or_else(|| Detection::new_empty(self.class_num)),
		)
	}
}

/// A detector that never detects anything.
pub struct NullDetector {
	class_num: usize,
}

impl NullDetector {
	pub fn new(class_num: usize) -> Self {
		Self { class_num }
	}
}

#[async_trait]
impl Detector for NullDetector {
	fn name(&self) -> &str {
		"null"
	}

	async fn detect(&self, _tile: &TileTensor) -> Result<Detection> {
		Ok(Detection::new_empty(self.class_num))
	}
}

/// A detector that reports one synthetic class-0 box in the middle of every
/// tile. Useful for smoke-testing the full pipeline without a model.
pub struct DebugDetector {
	class_num: usize,
}

impl DebugDetector {
	pub fn new(class_num: usize) -> Self {
		Self { class_num }
	}
}

#[async_trait]
impl Detector for DebugDetector {
	fn name(&self) -> &str {
		"debug"
	}

	async fn detect(&self, tile: &TileTensor) -> Result<Detection> {
		let q = tile.patch_size as f32 / 4.0;
		let rbox = RBox::new([q, q, 3.0 * q, q, 3.0 * q, 3.0 * q, q, 3.0 * q], 0.9);
		let mut scores = vec![0.0; self.class_num];
		scores[0] = 0.9;
		Ok(make_detection(vec![rbox], scores, self.class_num))
	}
}
