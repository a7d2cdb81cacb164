use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "foxden")]
#[command(about = "Supervise isolated browser sessions for saved profiles")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the HTTP API
	Serve(ServeArgs),

	/// Check that a browser can be found
	Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
	/// Address to listen on
	#[arg(long, default_value = "127.0.0.1")]
	pub host: String,

	/// Port to listen on
	#[arg(long, default_value_t = 5000)]
	pub port: u16,

	/// Profile store (defaults to <config dir>/foxden/profiles.json)
	#[arg(long, value_name = "FILE")]
	pub profiles: Option<PathBuf>,

	/// Parent directory for ephemeral session directories (defaults to the OS temp dir)
	#[arg(long, value_name = "DIR")]
	pub scratch_dir: Option<PathBuf>,

	/// Browser executable to launch
	#[arg(long, value_name = "PATH")]
	pub browser: Option<PathBuf>,

	/// Run browsers without a visible window
	#[arg(long)]
	pub headless: bool,

	/// Seconds to wait for a session's browser to come up
	#[arg(long, value_name = "SECS", default_value_t = 30)]
	pub readiness_timeout: u64,

	/// Seconds to wait for a session to exit when stopping it
	#[arg(long, value_name = "SECS", default_value_t = 5)]
	pub stop_timeout: u64,

	/// How often running sessions check for a stop request
	#[arg(long, value_name = "MS", default_value_t = 500)]
	pub poll_interval_ms: u64,

	/// Serve the web UI from this directory at `/`
	#[arg(long, value_name = "DIR")]
	pub static_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
	/// Browser executable to check instead of searching
	#[arg(long, value_name = "PATH")]
	pub browser: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serve_defaults() {
		let cli = Cli::try_parse_from(["foxden", "serve"]).unwrap();
		let Commands::Serve(args) = cli.command else {
			panic!("expected serve");
		};
		assert_eq!(args.host, "127.0.0.1");
		assert_eq!(args.port, 5000);
		assert_eq!(args.readiness_timeout, 30);
		assert_eq!(args.stop_timeout, 5);
		assert_eq!(args.poll_interval_ms, 500);
		assert!(!args.headless);
		assert_eq!(args.static_dir, None);
		assert_eq!(cli.verbose, 0);
	}

	#[test]
	fn global_verbosity_after_subcommand() {
		let cli = Cli::try_parse_from(["foxden", "check", "-vv", "--browser", "/opt/chrome"]).unwrap();
		assert_eq!(cli.verbose, 2);
		let Commands::Check(args) = cli.command else {
			panic!("expected check");
		};
		assert_eq!(args.browser, Some(PathBuf::from("/opt/chrome")));
	}
}
