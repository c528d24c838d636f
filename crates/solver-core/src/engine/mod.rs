//! Core solver engine that supervises the listener tasks.
//!
//! Listeners call the orchestrator directly, so the engine only starts them,
//! waits for a shutdown request and then stops them together.

pub mod lifecycle;

use crate::handlers::OrderOrchestrator;
use crate::SolverError;
use solver_config::Config;
use solver_discovery::DiscoveryService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main solver engine.
pub struct SolverEngine {
	pub(crate) config: Config,
	pub(crate) discovery: DiscoveryService,
	pub(crate) orchestrator: Arc<OrderOrchestrator>,
	pub(crate) cancel: CancellationToken,
}

impl SolverEngine {
	pub fn new(
		config: Config,
		discovery: DiscoveryService,
		orchestrator: Arc<OrderOrchestrator>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			config,
			discovery,
			orchestrator,
			cancel,
		}
	}

	/// Runs every listener until Ctrl+C or until the token is cancelled.
	pub async fn run(&self) -> Result<(), SolverError> {
		let handles = self.discovery.start_all(&self.cancel)?;
		tracing::info!(
			solver_id = %self.config.solver.id,
			listeners = handles.len(),
			"Solver started"
		);

		tokio::select! {
			result = tokio::signal::ctrl_c() => {
				if let Err(e) = result {
					tracing::warn!(error = %e, "Failed to listen for shutdown signal");
				}
				tracing::info!("Shutdown signal received");
			},
			_ = self.cancel.cancelled() => {},
		}

		self.shutdown(handles).await;
		Ok(())
	}

	/// Token shared by every suspension point; cancelling it stops the solver.
	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn orchestrator(&self) -> &Arc<OrderOrchestrator> {
		&self.orchestrator
	}
}
