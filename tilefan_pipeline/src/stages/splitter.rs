//! Stage 1: the splitter. Single worker; serializes images through the
//! ingress gate, converts BGR→RGB once, computes the tile grid and fans the
//! tiles out to the preprocessors in consecutive batches.

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use std::{sync::Arc, time::Instant};
use tilefan_core::{ImageJob, ImageMeta, SplitConfig, TileBatch, tile_grid};
use tokio::sync::{Semaphore, mpsc};

pub(crate) async fn run_splitter(
	mut ingress: mpsc::Receiver<Option<ImageJob>>,
	pipes: Vec<mpsc::Sender<Option<TileBatch>>>,
	mut log_rx: mpsc::Receiver<usize>,
	gate: Arc<Semaphore>,
	split: SplitConfig,
) -> Result<()> {
	loop {
		// one image at a time between here and the stitcher, which releases
		// the permit after its flush
		gate
			.acquire()
			.await
			.context("ingress gate closed")?
			.forget();

		let job = match ingress.recv().await {
			Some(Some(job)) => job,
			// explicit sentinel or ingress endpoint dropped
			Some(None) | None => break,
		};
		let t_start = Instant::now();

		let mut image = job.image;
		image.swap_channels(); // ingress is BGR, everything downstream is RGB
		let (width, height) = (image.width, image.height);

		let tiles = match tile_grid(width, height, split.subsize, split.gap) {
			Ok(tiles) => tiles,
			Err(e) => {
				warn!("dropping '{}': {e:#}", job.name);
				gate.add_permits(1);
				continue;
			}
		};
		let meta = ImageMeta {
			name: job.name,
			width,
			height,
			patch_size: split.subsize,
			gap: split.gap,
			patch_num: tiles.len(),
		};

		let image = Arc::new(image);
		let per_pipe = meta.patch_num.div_ceil(pipes.len());
		let mut chunks = tiles.chunks(per_pipe);
		for pipe in &pipes {
			let batch = TileBatch {
				image: Arc::clone(&image),
				tiles: chunks.next().map(<[_]>::to_vec).unwrap_or_default(),
				meta: meta.clone(),
				t_start,
			};
			pipe
				.send(Some(batch))
				.await
				.map_err(|_| anyhow!("preprocessor pipe closed"))?;
		}
		drop(image); // preprocessors now hold the only references

		let det_num = log_rx
			.recv()
			.await
			.context("log channel closed before the image completed")?;
		info!(
			"{}: {}x{} px, {} tiles ({}px, gap {}), {} detections, {:.3}s",
			meta.name,
			width,
			height,
			meta.patch_num,
			split.subsize,
			split.gap,
			det_num,
			t_start.elapsed().as_secs_f64()
		);
	}

	for pipe in pipes {
		pipe
			.send(None)
			.await
			.map_err(|_| anyhow!("preprocessor pipe closed during shutdown"))?;
	}
	Ok(())
}
