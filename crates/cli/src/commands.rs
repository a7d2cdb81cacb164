use anyhow::{Context, Result};
use foxden_runtime::{ChromiumConfig, ChromiumEngine};
use tracing::debug;

use crate::cli::{CheckArgs, Cli, Commands};
use crate::config::ServerConfig;
use crate::server;

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Serve(args) => {
			let config = ServerConfig::from_args(&args)?;
			debug!(target = "foxden.http", ?config, "resolved server config");
			server::serve(config).await
		}
		Commands::Check(args) => check(&args),
	}
}

/// Prints the browser that `serve` would launch.
fn check(args: &CheckArgs) -> Result<()> {
	let engine = ChromiumEngine::new(ChromiumConfig {
		executable: args.browser.clone(),
		..ChromiumConfig::default()
	});
	let path = engine.executable().context("No usable browser found")?;
	println!("{}", path.display());
	Ok(())
}
