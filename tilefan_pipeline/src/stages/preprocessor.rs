//! Stage 2: the preprocessors. N workers, each fed by its own pipe from the
//! splitter. Every tile rect becomes exactly one tensor on the detector-input
//! queue: crop, pad bottom/right to the full tile size, convert to f32,
//! normalize, reorder HWC→CHW.

use anyhow::Result;
use tilefan_core::{ImageData, NormalizeConfig, TileBatch, TileTensor, WorkSender};
use tokio::sync::mpsc;

/// Per-channel normalization tables; the std reciprocals are computed once at
/// stage construction so the per-pixel work is a subtract and a multiply.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Normalizer {
	enable: bool,
	mean: [f32; 3],
	std_inv: [f32; 3],
}

impl Normalizer {
	pub fn new(cfg: &NormalizeConfig) -> Self {
		Self {
			enable: cfg.enable,
			mean: cfg.mean,
			std_inv: [1.0 / cfg.std[0], 1.0 / cfg.std[1], 1.0 / cfg.std[2]],
		}
	}

	fn apply(&self, value: f32, channel: usize) -> f32 {
		if self.enable {
			(value - self.mean[channel]) * self.std_inv[channel]
		} else {
			value
		}
	}
}

/// Lays a cropped tile out as a zero-padded, normalized CHW f32 buffer.
///
/// Padding happens before normalization (the padded bytes are zeros, and they
/// pass through the same mean/std transform as real pixels), so the whole
/// plane is filled with the normalized zero first and the tile pixels are
/// written over it.
fn tensorize(tile: &ImageData, patch_size: u32, normalizer: &Normalizer) -> Vec<f32> {
	let s = patch_size as usize;
	let (w, h) = (tile.width as usize, tile.height as usize);
	let mut data = vec![0.0f32; 3 * s * s];
	for (channel, plane) in data.chunks_exact_mut(s * s).enumerate() {
		plane.fill(normalizer.apply(0.0, channel));
		for y in 0..h {
			for x in 0..w {
				plane[y * s + x] = normalizer.apply(f32::from(tile.data[(y * w + x) * 3 + channel]), channel);
			}
		}
	}
	data
}

pub(crate) async fn run_preprocessor(
	mut pipe: mpsc::Receiver<Option<TileBatch>>,
	output: WorkSender<TileTensor>,
	normalizer: Normalizer,
) -> Result<()> {
	while let Some(message) = pipe.recv().await {
		let batch = match message {
			Some(batch) => batch,
			None => break,
		};
		for rect in &batch.tiles {
			// private copy; the shared image stays untouched
			let tile = batch.image.crop(rect)?;
			let tensor = TileTensor {
				data: tensorize(&tile, batch.meta.patch_size, &normalizer),
				patch_size: batch.meta.patch_size,
				offset: rect.offset(),
				name: batch.meta.name.clone(),
				patch_num: batch.meta.patch_num,
				t_start: batch.t_start,
			};
			output.send(tensor).await?;
		}
	}
	output.finish().await
}
