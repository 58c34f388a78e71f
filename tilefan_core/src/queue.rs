//! Bounded multi-producer/multi-consumer work queue with sentinel-based
//! shutdown.
//!
//! Stages that share one queue (preprocessors → detector adapters → tile-NMS
//! workers → stitcher) need an end-of-stream signal that cannot overtake data.
//! Every producer enqueues exactly one in-band sentinel via
//! [`WorkSender::finish`]; consumers drain sentinels and keep working until
//! the last producer's sentinel arrives. The consumer that drains it
//! re-enqueues a sentinel so its siblings wake up too, and the last consumer
//! to leave does not, so after a full drain no message remains in the queue.

use anyhow::{Result, anyhow};
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

struct Shared {
	producers_left: AtomicUsize,
	consumers_left: AtomicUsize,
}

/// Producer endpoint of a work queue. Each producer must call
/// [`WorkSender::finish`] exactly once when it is done.
pub struct WorkSender<T> {
	tx: flume::Sender<Option<T>>,
}

impl<T> Clone for WorkSender<T> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<T> WorkSender<T> {
	/// Enqueues one item, waiting while the queue is at capacity.
	///
	/// # Errors
	///
	/// Fails if the queue was torn down.
	pub async fn send(&self, item: T) -> Result<()> {
		self
			.tx
			.send_async(Some(item))
			.await
			.map_err(|_| anyhow!("work queue disconnected"))
	}

	/// Enqueues this producer's sentinel and consumes the endpoint.
	///
	/// # Errors
	///
	/// Fails if the queue was torn down.
	pub async fn finish(self) -> Result<()> {
		self
			.tx
			.send_async(None)
			.await
			.map_err(|_| anyhow!("work queue disconnected"))
	}
}

/// Consumer endpoint of a work queue. After [`WorkReceiver::recv`] returns
/// `None` the consumer must stop receiving.
pub struct WorkReceiver<T> {
	rx: flume::Receiver<Option<T>>,
	tx: flume::Sender<Option<T>>,
	shared: Arc<Shared>,
}

impl<T> Clone for WorkReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			rx: self.rx.clone(),
			tx: self.tx.clone(),
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> WorkReceiver<T> {
	/// Receives the next item. Returns `None` once all producers have
	/// finished and everything they sent has been drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			match self.rx.recv_async().await {
				Ok(Some(item)) => return Some(item),
				Ok(None) => {
					let prev = self
						.shared
						.producers_left
						.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1)))
						.unwrap_or(0);
					if prev > 1 {
						// other producers are still feeding the queue
						continue;
					}
					// stream exhausted; wake the next sibling unless this
					// consumer is the last one out
					let consumers_prev = self.shared.consumers_left.fetch_sub(1, Ordering::AcqRel);
					if consumers_prev > 1 {
						let _ = self.tx.send_async(None).await;
					}
					return None;
				}
				Err(_) => return None,
			}
		}
	}

	/// True if nothing (data or sentinel) is queued right now.
	pub fn is_empty(&self) -> bool {
		self.rx.is_empty()
	}

	/// Number of queued messages, sentinels included.
	pub fn len(&self) -> usize {
		self.rx.len()
	}
}

/// Creates a bounded work queue for a fixed number of producers and
/// consumers. Endpoint clones share the fixed counts; hand exactly
/// `producers` sender clones and `consumers` receiver clones to the workers.
pub fn work_queue<T>(capacity: usize, producers: usize, consumers: usize) -> (WorkSender<T>, WorkReceiver<T>) {
	assert!(capacity > 0, "work queue capacity must be > 0");
	assert!(producers > 0 && consumers > 0, "work queue needs producers and consumers");
	let (tx, rx) = flume::bounded(capacity);
	let shared = Arc::new(Shared {
		producers_left: AtomicUsize::new(producers),
		consumers_left: AtomicUsize::new(consumers),
	});
	(
		WorkSender { tx: tx.clone() },
		WorkReceiver { rx, tx, shared },
	)
}
