use super::{Point, clip_convex, polygon_area};
use tilefan_core::RBox;

/// The four vertices of a rotated box as f64 points.
pub fn rbox_ring(rbox: &RBox) -> [Point; 4] {
	let v = rbox.vertices();
	[
		[f64::from(v[0].0), f64::from(v[0].1)],
		[f64::from(v[1].0), f64::from(v[1].1)],
		[f64::from(v[2].0), f64::from(v[2].1)],
		[f64::from(v[3].0), f64::from(v[3].1)],
	]
}

/// Intersection-over-union of two rotated boxes, measured on their polygons.
/// Degenerate (zero-area) boxes yield 0.
pub fn polygon_iou(a: &RBox, b: &RBox) -> f64 {
	let ring_a = rbox_ring(a);
	let ring_b = rbox_ring(b);
	let intersection = polygon_area(&clip_convex(&ring_a, &ring_b));
	if intersection == 0.0 {
		return 0.0;
	}
	let union = polygon_area(&ring_a) + polygon_area(&ring_b) - intersection;
	if union <= 0.0 { 0.0 } else { intersection / union }
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use rstest::rstest;

	fn axis_box(x0: f32, y0: f32, w: f32, h: f32) -> RBox {
		RBox::new([x0, y0, x0 + w, y0, x0 + w, y0 + h, x0, y0 + h], 1.0)
	}

	#[test]
	fn identical_boxes_have_iou_one() {
		let b = axis_box(3.0, 4.0, 10.0, 5.0);
		assert_abs_diff_eq!(polygon_iou(&b, &b), 1.0, epsilon = 1e-9);
	}

	#[rstest]
	#[case(axis_box(0.0, 0.0, 2.0, 2.0), axis_box(10.0, 10.0, 2.0, 2.0), 0.0)]
	#[case(axis_box(0.0, 0.0, 2.0, 2.0), axis_box(1.0, 0.0, 2.0, 2.0), 1.0 / 3.0)]
	#[case(axis_box(0.0, 0.0, 4.0, 4.0), axis_box(1.0, 1.0, 2.0, 2.0), 0.25)]
	fn iou_of_axis_aligned_pairs(#[case] a: RBox, #[case] b: RBox, #[case] expected: f64) {
		assert_abs_diff_eq!(polygon_iou(&a, &b), expected, epsilon = 1e-9);
		assert_abs_diff_eq!(polygon_iou(&b, &a), expected, epsilon = 1e-9);
	}

	#[test]
	fn rotated_box_iou() {
		// diamond inscribed in a 2x2 square: intersection 2, union 4
		let square = axis_box(0.0, 0.0, 2.0, 2.0);
		let diamond = RBox::new([1.0, 0.0, 2.0, 1.0, 1.0, 2.0, 0.0, 1.0], 1.0);
		assert_abs_diff_eq!(polygon_iou(&square, &diamond), 2.0 / 4.0, epsilon = 1e-9);
	}

	#[test]
	fn degenerate_box_has_iou_zero() {
		let line = RBox::new([0.0, 0.0, 2.0, 0.0, 2.0, 0.0, 0.0, 0.0], 1.0);
		let b = axis_box(0.0, 0.0, 2.0, 2.0);
		assert_abs_diff_eq!(polygon_iou(&line, &b), 0.0);
	}
}
