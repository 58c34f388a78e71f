//! Pipeline configuration, fixed at stage construction.
//!
//! All knobs deserialize from a config file with per-field defaults, so a
//! partial file (or none at all) yields a working configuration.

use anyhow::{Result, ensure};
use serde::Deserialize;

/// How images are split into overlapping tiles.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
	/// Edge length of a tile in pixels.
	#[serde(default = "default_subsize")]
	pub subsize: u32,
	/// Overlap between neighbouring tiles in pixels.
	#[serde(default = "default_gap")]
	pub gap: u32,
}

fn default_subsize() -> u32 {
	1024
}

fn default_gap() -> u32 {
	200
}

impl Default for SplitConfig {
	fn default() -> Self {
		Self {
			subsize: default_subsize(),
			gap: default_gap(),
		}
	}
}

/// Per-channel normalization applied to every tile before dispatch.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NormalizeConfig {
	#[serde(default = "default_true")]
	pub enable: bool,
	/// Per-channel mean, RGB order.
	#[serde(default = "default_mean")]
	pub mean: [f32; 3],
	/// Per-channel standard deviation, RGB order.
	#[serde(default = "default_std")]
	pub std: [f32; 3],
}

fn default_true() -> bool {
	true
}

fn default_mean() -> [f32; 3] {
	[123.675, 116.28, 103.53]
}

fn default_std() -> [f32; 3] {
	[58.395, 57.12, 57.375]
}

impl Default for NormalizeConfig {
	fn default() -> Self {
		Self {
			enable: true,
			mean: default_mean(),
			std: default_std(),
		}
	}
}

/// Thresholds of the two NMS passes.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
	/// Minimum per-class score for a box to enter per-tile NMS.
	#[serde(default = "default_score_threshold")]
	pub score_threshold: f32,
	/// Polygon-IoU threshold above which a box is suppressed.
	#[serde(default = "default_nms_threshold")]
	pub nms_threshold: f32,
	/// Upper bound on detections per tile after per-tile NMS.
	#[serde(default = "default_max_det_num")]
	pub max_det_num: usize,
}

fn default_score_threshold() -> f32 {
	0.1
}

fn default_nms_threshold() -> f32 {
	0.1
}

fn default_max_det_num() -> usize {
	2000
}

impl Default for DetectionConfig {
	fn default() -> Self {
		Self {
			score_threshold: default_score_threshold(),
			nms_threshold: default_nms_threshold(),
			max_det_num: default_max_det_num(),
		}
	}
}

/// The complete pipeline configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
	/// Number of preprocessor workers (N).
	#[serde(default = "default_workers")]
	pub num_preprocessors: usize,
	/// Number of tile-NMS workers (M).
	#[serde(default = "default_workers")]
	pub num_tile_nms: usize,
	/// Number of detector adapter workers (D).
	#[serde(default = "default_num_detectors")]
	pub num_detectors: usize,
	/// Capacity of the cache queue between tile-NMS workers and the stitcher.
	/// Must be at least the largest `patch_num` of any single image.
	#[serde(default = "default_cache_size")]
	pub cache_size: usize,
	#[serde(default)]
	pub split: SplitConfig,
	#[serde(default)]
	pub normalization: NormalizeConfig,
	#[serde(default)]
	pub detection: DetectionConfig,
	/// Class labels, indexed by class id.
	pub labels: Vec<String>,
}

fn default_workers() -> usize {
	num_cpus::get()
}

fn default_num_detectors() -> usize {
	1
}

fn default_cache_size() -> usize {
	64
}

impl PipelineConfig {
	/// A default configuration with the given label table.
	pub fn with_labels(labels: Vec<String>) -> Self {
		Self {
			num_preprocessors: default_workers(),
			num_tile_nms: default_workers(),
			num_detectors: default_num_detectors(),
			cache_size: default_cache_size(),
			split: SplitConfig::default(),
			normalization: NormalizeConfig::default(),
			detection: DetectionConfig::default(),
			labels,
		}
	}

	/// Number of detector classes.
	pub fn class_num(&self) -> usize {
		self.labels.len()
	}

	/// Checks all invariants between the knobs.
	///
	/// # Errors
	///
	/// Fails on the first violated invariant.
	pub fn validate(&self) -> Result<()> {
		ensure!(self.num_preprocessors > 0, "num_preprocessors must be > 0");
		ensure!(self.num_tile_nms > 0, "num_tile_nms must be > 0");
		ensure!(self.num_detectors > 0, "num_detectors must be > 0");
		ensure!(self.cache_size > 0, "cache_size must be > 0");
		ensure!(
			self.split.gap < self.split.subsize,
			"split.gap ({}) must be smaller than split.subsize ({})",
			self.split.gap,
			self.split.subsize
		);
		ensure!(
			self.normalization.std.iter().all(|&s| s != 0.0),
			"normalization.std must not contain zeros"
		);
		ensure!(
			(0.0..=1.0).contains(&self.detection.score_threshold),
			"detection.score_threshold must be in [0, 1]"
		);
		ensure!(
			(0.0..=1.0).contains(&self.detection.nms_threshold),
			"detection.nms_threshold must be in [0, 1]"
		);
		ensure!(self.detection.max_det_num > 0, "detection.max_det_num must be > 0");
		ensure!(!self.labels.is_empty(), "labels must not be empty");
		Ok(())
	}
}
