//! Per-class polygon non-maximum suppression.
//!
//! Two entry points share one greedy core: [`multiclass_nms_scored`] runs
//! inside a tile on raw detector output (score matrix, score threshold,
//! detection cap) and [`multiclass_nms_labeled`] runs across tiles on already
//! labeled boxes (no threshold, no cap).

use crate::polygon_iou;
use anyhow::{Result, ensure};
use tilefan_core::{DetectionConfig, RBox, ScoreMatrix};

/// Greedy suppression over `candidates` (box index, ranking score). Ranking
/// is by descending score with the box index as tie-break, so equal inputs
/// always produce equal outputs. Survivors are returned in rank order.
fn greedy_nms(boxes: &[RBox], mut candidates: Vec<(usize, f32)>, nms_threshold: f32) -> Vec<(usize, f32)> {
	candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
	let mut keep: Vec<(usize, f32)> = Vec::new();
	'candidates: for (index, score) in candidates {
		for &(kept, _) in &keep {
			if polygon_iou(&boxes[index], &boxes[kept]) > f64::from(nms_threshold) {
				continue 'candidates;
			}
		}
		keep.push((index, score));
	}
	keep
}

/// Per-tile NMS on raw detector output.
///
/// For each class: candidates scoring at least `score_threshold` are ranked
/// by that score and greedily suppressed at `nms_threshold`. A surviving box
/// is emitted with its confidence slot rewritten to the ranking score. If the
/// concatenation over all classes exceeds `max_det_num`, only the top-scoring
/// `max_det_num` survive.
///
/// # Errors
///
/// Fails if `boxes` and `scores` disagree on the number of detections.
pub fn multiclass_nms_scored(
	boxes: &[RBox],
	scores: &ScoreMatrix,
	cfg: &DetectionConfig,
) -> Result<(Vec<RBox>, Vec<u32>)> {
	ensure!(
		boxes.len() == scores.rows(),
		"{} boxes but {} score rows",
		boxes.len(),
		scores.rows()
	);

	let mut out_boxes = Vec::new();
	let mut out_labels = Vec::new();
	for class in 0..scores.classes() {
		let candidates = (0..boxes.len())
			.filter_map(|i| {
				let score = scores.score(i, class);
				(score >= cfg.score_threshold).then_some((i, score))
			})
			.collect();
		for (index, score) in greedy_nms(boxes, candidates, cfg.nms_threshold) {
			let mut rbox = boxes[index];
			rbox.set_confidence(score);
			out_boxes.push(rbox);
			out_labels.push(class as u32);
		}
	}

	if out_boxes.len() > cfg.max_det_num {
		let mut order: Vec<usize> = (0..out_boxes.len()).collect();
		order.sort_by(|&a, &b| {
			out_boxes[b]
				.confidence()
				.total_cmp(&out_boxes[a].confidence())
				.then(a.cmp(&b))
		});
		order.truncate(cfg.max_det_num);
		order.sort_unstable(); // keep the class-major emission order
		out_boxes = order.iter().map(|&i| out_boxes[i]).collect();
		out_labels = order.iter().map(|&i| out_labels[i]).collect();
	}

	Ok((out_boxes, out_labels))
}

/// Cross-tile NMS on labeled, image-global boxes. Per class, boxes are ranked
/// by their confidence slot and greedily suppressed at `nms_threshold`; there
/// is no score threshold and no cap at this stage. Running this on its own
/// output is a no-op.
///
/// # Errors
///
/// Fails if `boxes` and `labels` differ in length or a label is out of range.
pub fn multiclass_nms_labeled(
	boxes: &[RBox],
	labels: &[u32],
	class_num: usize,
	nms_threshold: f32,
) -> Result<(Vec<RBox>, Vec<u32>)> {
	ensure!(
		boxes.len() == labels.len(),
		"{} boxes but {} labels",
		boxes.len(),
		labels.len()
	);
	ensure!(
		labels.iter().all(|&l| (l as usize) < class_num),
		"label out of range for {class_num} classes"
	);

	let mut out_boxes = Vec::new();
	let mut out_labels = Vec::new();
	for class in 0..class_num as u32 {
		let candidates = (0..boxes.len())
			.filter_map(|i| (labels[i] == class).then(|| (i, boxes[i].confidence())))
			.collect();
		for (index, _) in greedy_nms(boxes, candidates, nms_threshold) {
			out_boxes.push(boxes[index]);
			out_labels.push(class);
		}
	}
	Ok((out_boxes, out_labels))
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn axis_box(x0: f32, y0: f32, w: f32, h: f32, confidence: f32) -> RBox {
		RBox::new([x0, y0, x0 + w, y0, x0 + w, y0 + h, x0, y0 + h], confidence)
	}

	fn cfg() -> DetectionConfig {
		DetectionConfig {
			score_threshold: 0.3,
			nms_threshold: 0.5,
			max_det_num: 100,
		}
	}

	#[test]
	fn overlapping_boxes_keep_the_best_scoring_one() {
		let boxes = vec![
			axis_box(0.0, 0.0, 10.0, 10.0, 0.0),
			axis_box(1.0, 0.0, 10.0, 10.0, 0.0), // heavy overlap with the first
			axis_box(100.0, 100.0, 10.0, 10.0, 0.0),
		];
		let scores = ScoreMatrix::new(vec![0.6, 0.9, 0.8], 1).unwrap();

		let (out, labels) = multiclass_nms_scored(&boxes, &scores, &cfg()).unwrap();
		assert_eq!(labels, [0, 0]);
		assert_eq!(out[0].coords(), boxes[1].coords());
		assert_eq!(out[0].confidence(), 0.9);
		assert_eq!(out[1].coords(), boxes[2].coords());
	}

	#[test]
	fn classes_are_suppressed_independently() {
		let boxes = vec![
			axis_box(0.0, 0.0, 10.0, 10.0, 0.0),
			axis_box(0.0, 0.0, 10.0, 10.0, 0.0),
		];
		// box 0 is a strong class 0, box 1 a strong class 1; identical geometry
		let scores = ScoreMatrix::new(vec![0.9, 0.1, 0.1, 0.8], 2).unwrap();

		let (out, labels) = multiclass_nms_scored(&boxes, &scores, &cfg()).unwrap();
		assert_eq!(labels, [0, 1]);
		assert_eq!(out[0].confidence(), 0.9);
		assert_eq!(out[1].confidence(), 0.8);
	}

	#[test]
	fn score_threshold_filters_before_suppression() {
		let boxes = vec![axis_box(0.0, 0.0, 10.0, 10.0, 0.0)];
		let scores = ScoreMatrix::new(vec![0.2], 1).unwrap();
		let (out, labels) = multiclass_nms_scored(&boxes, &scores, &cfg()).unwrap();
		assert!(out.is_empty());
		assert!(labels.is_empty());
	}

	#[test]
	fn max_det_num_keeps_the_top_scoring_detections() {
		let boxes: Vec<RBox> = (0..5)
			.map(|i| axis_box(i as f32 * 100.0, 0.0, 10.0, 10.0, 0.0))
			.collect();
		let scores = ScoreMatrix::new(vec![0.5, 0.9, 0.4, 0.8, 0.7], 1).unwrap();
		let cfg = DetectionConfig {
			max_det_num: 3,
			..cfg()
		};

		let (out, labels) = multiclass_nms_scored(&boxes, &scores, &cfg).unwrap();
		assert_eq!(labels.len(), 3);
		let mut confidences: Vec<f32> = out.iter().map(|b| b.confidence()).collect();
		confidences.sort_by(f32::total_cmp);
		assert_eq!(confidences, [0.7, 0.8, 0.9]);
	}

	#[test]
	fn labeled_nms_deduplicates_within_a_class_only() {
		let boxes = vec![
			axis_box(0.0, 0.0, 10.0, 10.0, 0.7),
			axis_box(0.5, 0.0, 10.0, 10.0, 0.9), // duplicate of the first, same class
			axis_box(0.5, 0.0, 10.0, 10.0, 0.6), // same geometry, other class
		];
		let labels = vec![0, 0, 1];

		let (out, out_labels) = multiclass_nms_labeled(&boxes, &labels, 2, 0.5).unwrap();
		assert_eq!(out_labels, [0, 1]);
		assert_eq!(out[0].confidence(), 0.9);
		assert_eq!(out[1].confidence(), 0.6);
	}

	#[test]
	fn labeled_nms_is_idempotent() {
		let boxes = vec![
			axis_box(0.0, 0.0, 10.0, 10.0, 0.7),
			axis_box(2.0, 0.0, 10.0, 10.0, 0.9),
			axis_box(50.0, 50.0, 10.0, 10.0, 0.6),
		];
		let labels = vec![0, 0, 0];

		let (once_boxes, once_labels) = multiclass_nms_labeled(&boxes, &labels, 1, 0.5).unwrap();
		let (twice_boxes, twice_labels) = multiclass_nms_labeled(&once_boxes, &once_labels, 1, 0.5).unwrap();
		assert_eq!(once_labels, twice_labels);
		assert_eq!(
			once_boxes.iter().map(|b| b.0).collect::<Vec<_>>(),
			twice_boxes.iter().map(|b| b.0).collect::<Vec<_>>()
		);
	}

	#[test]
	fn labeled_nms_rejects_bad_input() {
		let boxes = vec![axis_box(0.0, 0.0, 1.0, 1.0, 0.5)];
		assert!(multiclass_nms_labeled(&boxes, &[0, 1], 2, 0.5).is_err());
		assert!(multiclass_nms_labeled(&boxes, &[7], 2, 0.5).is_err());
	}

	#[test]
	fn two_level_nms_matches_global_nms_on_clustered_boxes() {
		// two clusters of duplicates, one per tile; running NMS per tile and
		// then across tiles must keep the same survivors as one global pass
		let cluster_a = [
			axis_box(100.0, 100.0, 20.0, 20.0, 0.0),
			axis_box(102.0, 100.0, 20.0, 20.0, 0.0),
		];
		let cluster_b = [
			axis_box(900.0, 100.0, 20.0, 20.0, 0.0),
			axis_box(898.0, 102.0, 20.0, 20.0, 0.0),
		];
		let scores_a = ScoreMatrix::new(vec![0.9, 0.7], 1).unwrap();
		let scores_b = ScoreMatrix::new(vec![0.6, 0.8], 1).unwrap();

		// global pass over everything at image coordinates
		let all_boxes: Vec<RBox> = cluster_a.iter().chain(&cluster_b).copied().collect();
		let all_scores = ScoreMatrix::new(vec![0.9, 0.7, 0.6, 0.8], 1).unwrap();
		let (global_boxes, global_labels) = multiclass_nms_scored(&all_boxes, &all_scores, &cfg()).unwrap();

		// two-level pass: per tile (tile 1 at offset 0, tile 2 at offset 800),
		// translate, then the cross-tile pass
		let tile_b_local: Vec<RBox> = cluster_b
			.iter()
			.map(|b| {
				let mut local = *b;
				local.translate(-800.0, 0.0);
				local
			})
			.collect();
		let (tile_a_out, labels_a) = multiclass_nms_scored(&cluster_a, &scores_a, &cfg()).unwrap();
		let (mut tile_b_out, labels_b) = multiclass_nms_scored(&tile_b_local, &scores_b, &cfg()).unwrap();
		for b in &mut tile_b_out {
			b.translate(800.0, 0.0);
		}
		let merged_boxes: Vec<RBox> = tile_a_out.iter().chain(&tile_b_out).copied().collect();
		let merged_labels: Vec<u32> = labels_a.iter().chain(&labels_b).copied().collect();
		let (stitched_boxes, stitched_labels) =
			multiclass_nms_labeled(&merged_boxes, &merged_labels, 1, cfg().nms_threshold).unwrap();

		assert_eq!(global_labels, stitched_labels);
		assert_eq!(
			global_boxes.iter().map(|b| b.0).collect::<Vec<_>>(),
			stitched_boxes.iter().map(|b| b.0).collect::<Vec<_>>()
		);
	}

	#[test]
	fn empty_input_yields_empty_output() {
		let scores = ScoreMatrix::new_empty(3);
		let (out, labels) = multiclass_nms_scored(&[], &scores, &cfg()).unwrap();
		assert!(out.is_empty() && labels.is_empty());

		let (out, labels) = multiclass_nms_labeled(&[], &[], 3, 0.5).unwrap();
		assert!(out.is_empty() && labels.is_empty());
	}
}
