//! Block-range listener.
//!
//! A listener moves through two phases. During backfill it runs cycles back to
//! back until it reaches the safe block; from then on it polls, sleeping for
//! the configured interval whenever a cycle finds nothing new or fails.

use crate::{DiscoveryError, OpenEventSource, OrderHandler};
use solver_storage::ProgressStore;
use solver_types::{truncate_id, ListenerConfig, NetworkRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Resolves a start-block directive against the current tip.
///
/// Positive values are absolute, zero means the tip, and `-K` means `K`
/// blocks behind the tip (clamped at genesis).
pub fn resolve_start_block(directive: i64, tip: u64) -> u64 {
	match directive {
		n if n > 0 => n as u64,
		0 => tip,
		n => tip.saturating_sub(n.unsigned_abs()),
	}
}

/// Picks the last processed block at startup.
///
/// Persisted progress wins when it is at or past the start block, so a
/// restart never reprocesses and never regresses.
pub fn initial_last_processed(persisted: Option<u64>, start: u64) -> u64 {
	match persisted {
		Some(p) if p >= start => p,
		_ => start.saturating_sub(1),
	}
}

/// Highest block considered final given a confirmation depth.
pub fn safe_block(tip: u64, depth: u64) -> u64 {
	if depth < tip {
		tip - depth
	} else {
		tip
	}
}

/// Splits `[from, to]` into inclusive chunks of at most `size` blocks.
pub fn block_chunks(from: u64, to: u64, size: u64) -> impl Iterator<Item = (u64, u64)> {
	let size = size.max(1);
	let mut next = Some(from).filter(|f| *f <= to);
	std::iter::from_fn(move || {
		let start = next?;
		let end = start.saturating_add(size - 1).min(to);
		next = end.checked_add(1).filter(|n| *n <= to);
		Some((start, end))
	})
}

/// What a single cycle accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	/// Nothing new past the safe block.
	Idle,
	/// Progress advanced to the given block.
	Advanced(u64),
	/// Cancellation was observed mid-cycle.
	Cancelled,
}

/// Ingests `Open` events for one chain.
pub struct BlockRangeListener<S: OpenEventSource> {
	config: ListenerConfig,
	source: S,
	registry: Arc<NetworkRegistry>,
	progress: Arc<dyn ProgressStore>,
	handler: Arc<dyn OrderHandler>,
	cancel: CancellationToken,
	last_processed: Option<u64>,
}

impl<S: OpenEventSource> BlockRangeListener<S> {
	pub fn new(
		config: ListenerConfig,
		source: S,
		registry: Arc<NetworkRegistry>,
		progress: Arc<dyn ProgressStore>,
		handler: Arc<dyn OrderHandler>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			config,
			source,
			registry,
			progress,
			handler,
			cancel,
			last_processed: None,
		}
	}

	pub fn last_processed(&self) -> Option<u64> {
		self.last_processed
	}

	fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.config.poll_interval_secs)
	}

	/// Sleeps unless cancelled first. Returns `false` on cancellation.
	async fn sleep(&self, duration: Duration) -> bool {
		tokio::select! {
			_ = self.cancel.cancelled() => false,
			_ = tokio::time::sleep(duration) => true,
		}
	}

	/// Runs until the cancellation token fires.
	pub async fn run(mut self) -> Result<(), DiscoveryError> {
		let chain = self.config.chain_name.clone();

		loop {
			match self.initialize().await {
				Ok(last) => {
					tracing::info!(
						chain = %chain,
						last_processed = last,
						start_block = self.config.start_block,
						"Listener started"
					);
					break;
				},
				Err(DiscoveryError::Connection(e)) => {
					tracing::warn!(chain = %chain, error = %e, "Failed to read chain tip, retrying");
					if !self.sleep(self.poll_interval()).await {
						return Ok(());
					}
				},
				Err(DiscoveryError::Storage(e)) => {
					tracing::warn!(chain = %chain, error = %e, "Failed to load progress, retrying");
					if !self.sleep(self.poll_interval()).await {
						return Ok(());
					}
				},
				Err(e) => return Err(e),
			}
		}

		let mut backfilling = true;
		loop {
			if self.cancel.is_cancelled() {
				break;
			}
			let idle = match self.run_cycle().await {
				Ok(CycleOutcome::Cancelled) => break,
				Ok(CycleOutcome::Advanced(block)) => {
					tracing::debug!(chain = %chain, block, "Advanced");
					false
				},
				Ok(CycleOutcome::Idle) => {
					if backfilling {
						backfilling = false;
						tracing::info!(
							chain = %chain,
							last_processed = ?self.last_processed,
							"Backfill complete, polling"
						);
					}
					true
				},
				Err(e) => {
					tracing::error!(chain = %chain, error = %e, "Listener cycle failed");
					true
				},
			};

			if idle && !self.sleep(self.poll_interval()).await {
				break;
			}
		}

		tracing::info!(chain = %chain, "Listener stopped");
		Ok(())
	}

	/// Resolves the start block and loads persisted progress.
	pub async fn initialize(&mut self) -> Result<u64, DiscoveryError> {
		let tip = self.source.latest_block().await?;
		let start = resolve_start_block(self.config.start_block, tip);
		let persisted = self
			.progress
			.last_indexed_block(&self.config.chain_name)
			.await?;
		let last = initial_last_processed(persisted, start);
		self.last_processed = Some(last);
		Ok(last)
	}

	/// Processes everything between the last processed block and the current
	/// safe block.
	pub async fn run_cycle(&mut self) -> Result<CycleOutcome, DiscoveryError> {
		let last = match self.last_processed {
			Some(last) => last,
			None => self.initialize().await?,
		};

		let tip = self.source.latest_block().await?;
		let safe = safe_block(tip, self.config.confirmation_blocks);
		let from = last + 1;
		if from > safe {
			return Ok(CycleOutcome::Idle);
		}

		for (chunk_start, chunk_end) in block_chunks(from, safe, self.config.max_block_range) {
			if self.cancel.is_cancelled() {
				return Ok(CycleOutcome::Cancelled);
			}
			if !self.process_chunk(chunk_start, chunk_end).await? {
				return Ok(CycleOutcome::Cancelled);
			}
		}
		Ok(CycleOutcome::Advanced(safe))
	}

	/// Hands every event in `[from, to]` to the handler, then records `to` as
	/// processed. Returns `false` without recording anything if cancellation
	/// is observed, so the chunk is delivered again after a restart.
	async fn process_chunk(&mut self, from: u64, to: u64) -> Result<bool, DiscoveryError> {
		let chain = &self.config.chain_name;
		let events = self.source.fetch_events(from, to).await?;
		tracing::debug!(
			chain = %chain,
			from_block = from,
			to_block = to,
			events = events.len(),
			"Fetched events"
		);

		let mut by_block: BTreeMap<u64, Vec<S::Event>> = BTreeMap::new();
		for event in events {
			by_block
				.entry(event.block_number)
				.or_default()
				.push(event.event);
		}

		for (block, events) in &by_block {
			for event in events {
				let order = match self.source.decode(event, &self.registry) {
					Ok(order) => order,
					Err(e) => {
						tracing::warn!(chain = %chain, block, error = %e, "Skipping undecodable event");
						continue;
					},
				};
				if self.cancel.is_cancelled() {
					tracing::info!(chain = %chain, block, "Cancelled mid-chunk, progress not saved");
					return Ok(false);
				}
				let order_id = truncate_id(&order.order_id);
				tracing::info!(chain = %chain, block, order_id = %order_id, "Discovered order");
				if let Err(e) = self.handler.handle(order).await {
					tracing::error!(chain = %chain, order_id = %order_id, error = %e, "Order handling failed");
				}
			}
		}

		if self.cancel.is_cancelled() {
			tracing::info!(chain = %chain, to_block = to, "Cancelled mid-chunk, progress not saved");
			return Ok(false);
		}
		self.last_processed = Some(to);
		if let Err(e) = self.progress.set_last_indexed_block(chain, to).await {
			tracing::warn!(chain = %chain, block = to, error = %e, "Failed to persist progress");
		}
		Ok(true)
	}
}
