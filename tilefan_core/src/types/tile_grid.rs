//! Tile rectangles and the overlapping tile-grid generator used by the
//! splitter stage.

use anyhow::{Result, ensure};
use itertools::iproduct;

/// A rectangular window into a source image, in pixel coordinates.
///
/// The window is half-open: it covers `x0..x1` horizontally and `y0..y1`
/// vertically. Tile rects never exceed the configured tile edge in either
/// direction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
	/// Left edge (inclusive).
	pub x0: u32,
	/// Top edge (inclusive).
	pub y0: u32,
	/// Right edge (exclusive).
	pub x1: u32,
	/// Bottom edge (exclusive).
	pub y1: u32,
}

impl TileRect {
	/// Creates a new `TileRect`.
	///
	/// # Errors
	///
	/// Fails if the rect is empty or inverted.
	pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Result<TileRect> {
		ensure!(x0 < x1, "x0 ({x0}) must be < x1 ({x1})");
		ensure!(y0 < y1, "y0 ({y0}) must be < y1 ({y1})");
		Ok(TileRect { x0, y0, x1, y1 })
	}

	/// Width of the rect in pixels.
	pub fn width(&self) -> u32 {
		self.x1 - self.x0
	}

	/// Height of the rect in pixels.
	pub fn height(&self) -> u32 {
		self.y1 - self.y0
	}

	/// The origin of the rect in image coordinates, as `(x0, y0)`.
	pub fn offset(&self) -> (u32, u32) {
		(self.x0, self.y0)
	}
}

impl std::fmt::Debug for TileRect {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "TileRect[{},{} - {},{}]", self.x0, self.y0, self.x1, self.y1)
	}
}

/// Splits one axis of length `extent` into overlapping intervals.
///
/// Regular intervals start at multiples of `subsize - gap` as long as a full
/// tile fits. If the last full tile does not reach the end of the axis, one
/// final interval is appended flush with the far edge; it is full-size when
/// the axis allows it, so short axes yield a single short interval.
fn axis_intervals(extent: u32, subsize: u32, gap: u32) -> Vec<(u32, u32)> {
	let step = subsize - gap;
	let mut intervals = Vec::new();
	let mut start = 0;
	while start + subsize <= extent {
		intervals.push((start, start + subsize));
		start += step;
	}
	let covered = intervals.last().map_or(0, |i| i.1);
	if covered < extent {
		// last tile hugs the far edge and overlaps its neighbour a bit more
		intervals.push((extent.saturating_sub(subsize), extent));
	}
	intervals
}

/// Computes the tile grid for an image of `width` × `height` pixels.
///
/// The grid is the cartesian product of the row and column intervals, emitted
/// row-major. Every tile is at most `subsize` wide and tall; edge tiles may be
/// shorter only when the whole axis is shorter than `subsize`.
///
/// # Errors
///
/// Fails if the image is empty or `gap >= subsize` (the grid would not
/// advance).
pub fn tile_grid(width: u32, height: u32, subsize: u32, gap: u32) -> Result<Vec<TileRect>> {
	ensure!(width > 0 && height > 0, "image must not be empty ({width}x{height})");
	ensure!(gap < subsize, "gap ({gap}) must be smaller than subsize ({subsize})");

	let rows = axis_intervals(height, subsize, gap);
	let cols = axis_intervals(width, subsize, gap);

	Ok(
		iproduct!(rows.iter(), cols.iter())
			.map(|(&(y0, y1), &(x0, x1))| TileRect { x0, y0, x1, y1 })
			.collect(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(512, vec![(0, 512)])] // shorter than one tile
	#[case(1024, vec![(0, 1024)])] // exactly one tile
	#[case(1800, vec![(0, 1024), (776, 1800)])]
	#[case(2000, vec![(0, 1024), (824, 1848), (976, 2000)])]
	#[case(1500, vec![(0, 1024), (476, 1500)])]
	fn axis_intervals_match_expected_starts(#[case] extent: u32, #[case] expected: Vec<(u32, u32)>) {
		assert_eq!(axis_intervals(extent, 1024, 200), expected);
	}

	#[test]
	fn intervals_cover_the_axis_and_respect_subsize() {
		for extent in [1u32, 500, 1024, 1025, 3000, 10_000] {
			let intervals = axis_intervals(extent, 1024, 200);
			assert_eq!(intervals.first().unwrap().0, 0);
			assert_eq!(intervals.last().unwrap().1, extent);
			for (a, b) in &intervals {
				assert!(b - a <= 1024);
			}
			for pair in intervals.windows(2) {
				assert!(pair[1].0 < pair[0].1, "consecutive intervals must overlap");
			}
		}
	}

	#[test]
	fn grid_is_the_row_major_cartesian_product() {
		let grid = tile_grid(2000, 1800, 1024, 200).unwrap();
		assert_eq!(grid.len(), 6); // 3 columns x 2 rows

		let xs: Vec<u32> = grid.iter().map(|r| r.x0).collect();
		let ys: Vec<u32> = grid.iter().map(|r| r.y0).collect();
		assert_eq!(xs, [0, 824, 976, 0, 824, 976]);
		assert_eq!(ys, [0, 0, 0, 776, 776, 776]);
	}

	#[test]
	fn single_tile_for_small_images() {
		let grid = tile_grid(512, 300, 1024, 200).unwrap();
		assert_eq!(grid.len(), 1);
		assert_eq!(grid[0], TileRect::new(0, 0, 512, 300).unwrap());
	}

	#[test]
	fn nine_tiles_for_a_2000_square() {
		assert_eq!(tile_grid(2000, 2000, 1024, 200).unwrap().len(), 9);
	}

	#[test]
	fn rejects_degenerate_parameters() {
		assert!(tile_grid(0, 100, 1024, 200).is_err());
		assert!(tile_grid(100, 100, 200, 200).is_err());
		assert!(tile_grid(100, 100, 200, 300).is_err());
	}
}
