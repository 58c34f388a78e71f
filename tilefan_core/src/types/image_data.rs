//! Owned three-channel byte image used as the raw pixel buffer of the
//! pipeline. The channel order is not encoded in the type; ingress hands the
//! splitter BGR data and the splitter converts it to RGB exactly once.

use super::TileRect;
use anyhow::{Result, ensure};

/// An owned H×W×3 byte image, row-major with interleaved channels.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
	/// The pixel data, `width * height * 3` bytes.
	pub data: Vec<u8>,
	/// The width of the image in pixels.
	pub width: u32,
	/// The height of the image in pixels.
	pub height: u32,
}

impl ImageData {
	/// Creates a black image of the given dimensions.
	pub fn new_empty(width: u32, height: u32) -> Self {
		Self {
			data: vec![0; (width as usize) * (height as usize) * 3],
			width,
			height,
		}
	}

	/// Wraps an existing interleaved byte buffer.
	///
	/// # Errors
	///
	/// Fails if the buffer length does not match `width * height * 3`.
	pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
		ensure!(
			data.len() == (width as usize) * (height as usize) * 3,
			"pixel buffer has {} bytes, but a {width}x{height}x3 image needs {}",
			data.len(),
			(width as usize) * (height as usize) * 3
		);
		Ok(Self { data, width, height })
	}

	/// Builds an image by evaluating `f(x, y)` for every pixel.
	pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Self {
		let mut image = Self::new_empty(width, height);
		for y in 0..height {
			for x in 0..width {
				let index = ((y * width + x) * 3) as usize;
				image.data[index..index + 3].copy_from_slice(&f(x, y));
			}
		}
		image
	}

	/// Returns the three channel values at `(x, y)`.
	pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
		let index = ((y * self.width + x) * 3) as usize;
		[self.data[index], self.data[index + 1], self.data[index + 2]]
	}

	/// Copies the pixels inside `rect` into a new, independently owned image.
	///
	/// # Errors
	///
	/// Fails if `rect` reaches outside the image.
	pub fn crop(&self, rect: &TileRect) -> Result<ImageData> {
		ensure!(
			rect.x1 <= self.width && rect.y1 <= self.height,
			"tile {rect:?} reaches outside a {}x{} image",
			self.width,
			self.height
		);
		let (w, h) = (rect.width(), rect.height());
		let mut data = Vec::with_capacity((w as usize) * (h as usize) * 3);
		for y in rect.y0..rect.y1 {
			let start = ((y * self.width + rect.x0) * 3) as usize;
			let end = start + (w as usize) * 3;
			data.extend_from_slice(&self.data[start..end]);
		}
		Ok(ImageData { data, width: w, height: h })
	}

	/// Swaps the first and third channel of every pixel, converting BGR to RGB
	/// (or back) in place.
	pub fn swap_channels(&mut self) {
		for pixel in self.data.chunks_exact_mut(3) {
			pixel.swap(0, 2);
		}
	}
}

impl std::fmt::Debug for ImageData {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "ImageData({}x{})", self.width, self.height)
	}
}
