//! Main entry point for the cross-chain solver service.
//!
//! Loads the configuration, builds the solver engine from the registered
//! backends and runs it until interrupted.

use clap::Parser;
use solver_config::Config;
use std::path::{Path, PathBuf};

mod factory_registry;

use factory_registry::build_solver_from_config;

/// Command-line arguments for the solver service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "SOLVER_CONFIG", default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

fn init_tracing(log_level: &str) {
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();
}

async fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
	let path = path
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", path.display()))?;
	Ok(Config::from_file(path).await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	init_tracing(&args.log_level);

	tracing::info!("Started solver");

	let config = load_config(&args.config).await?;
	tracing::info!(
		networks = config.networks.len(),
		listeners = config.listeners.len(),
		"Loaded configuration [{}]",
		config.solver.id
	);

	let solver = build_solver_from_config(config).await?;
	solver.run().await?;

	tracing::info!("Stopped solver");
	Ok(())
}
