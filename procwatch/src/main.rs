mod cli;
mod error;
mod runtime;
mod sensor;

pub use self::error::{Error, Result};

use std::process::ExitCode;

use aya::Ebpf;
use clap::Parser;
use procwatch_core::{
	consumer::{ConsumerLoop, Shutdown},
	sink::JsonLineSink,
	source::KernelRing,
	POLL_TIMEOUT,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
	cli::args::Cli,
	runtime::{bump_memlock_rlimit, init_tracing, install_signal_handlers},
};

const SETUP_FAILURE: u8 = 1;

fn setup(stop: &CancellationToken) -> Result<(Ebpf, KernelRing)> {
	// Before attaching, so an early SIGINT still ends in a clean detach.
	install_signal_handlers(stop.clone())?;
	bump_memlock_rlimit();

	let mut ebpf = sensor::load()?;
	sensor::attach_hook(&mut ebpf)?;
	let ring = sensor::open_channel(&mut ebpf)?;

	Ok((ebpf, ring))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	let args = Cli::parse();
	let _tracing_guard = init_tracing(args.log_file.as_deref());

	let stop = CancellationToken::new();
	let (ebpf, ring) = match setup(&stop) {
		Ok(sensor) => sensor,
		Err(err) => {
			error!("setup failed: {err}");
			return ExitCode::from(SETUP_FAILURE);
		}
	};

	info!(poll_timeout_ms = POLL_TIMEOUT.as_millis() as u64, "waiting for execve events");
	let mut consumer = ConsumerLoop::new(ring, JsonLineSink::stdout(), POLL_TIMEOUT, stop);
	let shutdown = consumer.run().await;

	match sensor::dropped_events(&ebpf) {
		Some(0) | None => {}
		Some(dropped) => warn!(dropped, "events dropped on a full ring"),
	}

	// Release the ring, then detach the hook.
	drop(consumer);
	drop(ebpf);

	match &shutdown {
		Shutdown::Clean { emitted } => info!(emitted, "stopped cleanly"),
		Shutdown::Failed { emitted, cause } => error!(emitted, "stopped on channel error: {cause}"),
	}
	ExitCode::from(shutdown.exit_code())
}
