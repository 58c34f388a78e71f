//! Assembly of the dispatch engine: builds every channel, spawns one tokio
//! task per worker, and hands the host the ingress/egress endpoints.
//!
//! Topology:
//!
//! ```text
//! ingress → splitter → pipes → preprocessors ×N → detector-in queue
//!     → detector adapters ×D → detector-out queue → tile-NMS ×M
//!     → cache queue → stitcher → formatter → egress
//! ```
//!
//! The splitter and stitcher share the ingress gate (a one-permit semaphore)
//! and the per-image log channel, so at most one image's tiles are in flight
//! between them and egress order equals ingress order.

use crate::{
	stages::{
		Normalizer, run_detector_adapter, run_formatter, run_preprocessor, run_splitter, run_stitcher, run_tile_nms,
	},
	traits::Detector,
};
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tilefan_core::{ImageJob, ImageObjects, PipelineConfig, work_queue};
use tokio::{
	sync::{Semaphore, mpsc},
	task::JoinHandle,
};

const INGRESS_CAPACITY: usize = 4;
const PIPE_CAPACITY: usize = 1;
const DETECTOR_QUEUE_CAPACITY: usize = 8;
const EGRESS_CAPACITY: usize = 4;

/// A running dispatch engine. Feed it via [`Pipeline::send`], close the
/// stream with [`Pipeline::close_ingress`], drain results with
/// [`Pipeline::next_result`] until it returns `None`, then call
/// [`Pipeline::join`] to collect worker exits.
pub struct Pipeline {
	ingress: mpsc::Sender<Option<ImageJob>>,
	egress: mpsc::Receiver<Option<ImageObjects>>,
	workers: Vec<(String, JoinHandle<Result<()>>)>,
}

impl Pipeline {
	/// Validates `config`, builds all channels and spawns every worker on the
	/// current tokio runtime.
	pub fn spawn(config: &PipelineConfig, detector: Arc<dyn Detector>) -> Result<Pipeline> {
		config.validate()?;

		let gate = Arc::new(Semaphore::new(1));
		let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CAPACITY);
		let (log_tx, log_rx) = mpsc::channel(1);

		let mut pipe_txs = Vec::with_capacity(config.num_preprocessors);
		let mut pipe_rxs = Vec::with_capacity(config.num_preprocessors);
		for _ in 0..config.num_preprocessors {
			let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
			pipe_txs.push(tx);
			pipe_rxs.push(rx);
		}

		let (detector_in_tx, detector_in_rx) = work_queue(
			DETECTOR_QUEUE_CAPACITY,
			config.num_preprocessors,
			config.num_detectors,
		);
		let (detector_out_tx, detector_out_rx) =
			work_queue(DETECTOR_QUEUE_CAPACITY, config.num_detectors, config.num_tile_nms);
		let (cache_tx, cache_rx) = work_queue(config.cache_size, config.num_tile_nms, 1);

		let (result_tx, result_rx) = mpsc::channel(EGRESS_CAPACITY);
		let (egress_tx, egress_rx) = mpsc::channel(EGRESS_CAPACITY);

		let mut workers: Vec<(String, JoinHandle<Result<()>>)> = Vec::new();

		workers.push((
			"splitter".to_string(),
			tokio::spawn(run_splitter(
				ingress_rx,
				pipe_txs,
				log_rx,
				Arc::clone(&gate),
				config.split,
			)),
		));

		let normalizer = Normalizer::new(&config.normalization);
		for (i, pipe_rx) in pipe_rxs.into_iter().enumerate() {
			workers.push((
				format!("preprocessor-{i}"),
				tokio::spawn(run_preprocessor(pipe_rx, detector_in_tx.clone(), normalizer)),
			));
		}

		for i in 0..config.num_detectors {
			workers.push((
				format!("detector-{i}"),
				tokio::spawn(run_detector_adapter(
					detector_in_rx.clone(),
					detector_out_tx.clone(),
					Arc::clone(&detector),
					config.class_num(),
				)),
			));
		}

		for i in 0..config.num_tile_nms {
			workers.push((
				format!("tile-nms-{i}"),
				tokio::spawn(run_tile_nms(
					detector_out_rx.clone(),
					cache_tx.clone(),
					config.detection,
				)),
			));
		}

		workers.push((
			"stitcher".to_string(),
			tokio::spawn(run_stitcher(
				cache_rx,
				result_tx,
				log_tx,
				gate,
				config.detection.nms_threshold,
			)),
		));

		workers.push((
			"formatter".to_string(),
			tokio::spawn(run_formatter(result_rx, egress_tx, config.labels.clone())),
		));

		Ok(Pipeline {
			ingress: ingress_tx,
			egress: egress_rx,
			workers,
		})
	}

	/// A clonable ingress endpoint for feeding the pipeline from another
	/// task. Send `Some(job)` per image and `None` to close the stream.
	pub fn ingress(&self) -> mpsc::Sender<Option<ImageJob>> {
		self.ingress.clone()
	}

	/// Feeds one image, waiting while the ingress queue is at capacity.
	pub async fn send(&self, job: ImageJob) -> Result<()> {
		self
			.ingress
			.send(Some(job))
			.await
			.map_err(|_| anyhow!("pipeline ingress closed"))
	}

	/// Closes the ingress stream; the sentinel drains every stage.
	pub async fn close_ingress(&self) -> Result<()> {
		self
			.ingress
			.send(None)
			.await
			.map_err(|_| anyhow!("pipeline ingress closed"))
	}

	/// The next egress record, or `None` once the terminal sentinel arrived.
	pub async fn next_result(&mut self) -> Option<ImageObjects> {
		match self.egress.recv().await {
			Some(Some(record)) => Some(record),
			Some(None) | None => None,
		}
	}

	/// Waits for every worker and surfaces the first failure. Call after the
	/// egress stream has been drained.
	pub async fn join(self) -> Result<()> {
		let Pipeline {
			ingress,
			egress,
			workers,
		} = self;
		// a dropped ingress reads as the end-of-stream sentinel, so joining
		// without an explicit close still drains the stages
		drop(ingress);
		for (name, handle) in workers {
			let exit = handle
				.await
				.map_err(|e| anyhow!("worker '{name}' panicked: {e}"))?;
			exit.with_context(|| format!("worker '{name}' failed"))?;
		}
		drop(egress);
		Ok(())
	}

	/// Number of spawned worker tasks.
	pub fn worker_count(&self) -> usize {
		self.workers.len()
	}
}
