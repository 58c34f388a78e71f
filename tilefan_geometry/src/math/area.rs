use super::Point;

/// Signed shoelace sum of a closed ring (twice the signed area). Positive for
/// one winding, negative for the other.
pub fn ring_sum(ring: &[Point]) -> f64 {
	let mut sum = 0f64;
	let mut p2 = match ring.last() {
		Some(p) => p,
		None => return 0.0,
	};
	for p1 in ring.iter() {
		sum += (p2[0] - p1[0]) * (p1[1] + p2[1]);
		p2 = p1;
	}
	sum
}

/// Absolute area of a simple polygon.
pub fn polygon_area(ring: &[Point]) -> f64 {
	ring_sum(ring).abs() / 2.0
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;

	#[test]
	fn unit_square_has_area_one() {
		let ring = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
		assert_abs_diff_eq!(polygon_area(&ring), 1.0);
	}

	#[test]
	fn winding_does_not_change_the_absolute_area() {
		let cw = [[0.0, 0.0], [0.0, 2.0], [3.0, 2.0], [3.0, 0.0]];
		let ccw = [[0.0, 0.0], [3.0, 0.0], [3.0, 2.0], [0.0, 2.0]];
		assert_abs_diff_eq!(polygon_area(&cw), 6.0);
		assert_abs_diff_eq!(polygon_area(&ccw), 6.0);
		assert_abs_diff_eq!(ring_sum(&cw), -ring_sum(&ccw));
	}

	#[test]
	fn triangle_area() {
		let ring = [[0.0, 0.0], [4.0, 0.0], [0.0, 3.0]];
		assert_abs_diff_eq!(polygon_area(&ring), 6.0);
	}

	#[test]
	fn degenerate_rings_have_zero_area() {
		assert_abs_diff_eq!(polygon_area(&[]), 0.0);
		assert_abs_diff_eq!(polygon_area(&[[1.0, 1.0]]), 0.0);
		assert_abs_diff_eq!(polygon_area(&[[1.0, 1.0], [2.0, 2.0]]), 0.0);
	}
}
