use clap::Parser;

/// Streams every `execve` on the host to stdout, one JSON object per line.
#[derive(Parser)]
#[command(name = "procwatch")]
pub struct Cli {
	/// Write logs to a daily-rolling file instead of stderr.
	#[arg(long)]
	pub log_file: Option<String>,
}
