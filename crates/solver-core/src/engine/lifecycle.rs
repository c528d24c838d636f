//! Shutdown of the listener tasks.

use super::SolverEngine;
use solver_discovery::DiscoveryError;
use tokio::task::JoinHandle;

impl SolverEngine {
	/// Cancels every listener and waits for each to exit.
	pub async fn shutdown(&self, handles: Vec<JoinHandle<Result<(), DiscoveryError>>>) {
		tracing::info!("Shutting down solver engine");
		self.cancel.cancel();

		for handle in handles {
			match handle.await {
				Ok(Ok(())) => {},
				Ok(Err(e)) => tracing::warn!(error = %e, "Listener exited with error"),
				Err(e) => tracing::error!(error = %e, "Listener task panicked"),
			}
		}
		tracing::info!("All listeners stopped");
	}
}
