use std::path::Path;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Logs go to stderr, or to a daily-rolling `log_path` when given; stdout
/// carries records only. Keep the guard alive until exit.
pub fn init_tracing(log_path: Option<&str>) -> Option<WorkerGuard> {
	let Some(log_path) = log_path else {
		tracing_subscriber::fmt()
			.with_writer(std::io::stderr)
			.with_target(false)
			.with_env_filter(EnvFilter::from_default_env())
			.init();
		return None;
	};

	let path = Path::new(log_path);
	let dir = path.parent().unwrap_or(Path::new("/var/log"));
	let file = path.file_name().unwrap_or_default();

	let file_appender = rolling::daily(dir, file);
	let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

	tracing_subscriber::fmt()
		.with_writer(non_blocking_writer)
		.with_target(false)
		.with_ansi(false)
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	Some(guard)
}

/// Bump the memlock rlimit. This is needed for older kernels that don't use the
/// new memcg based accounting, see https://lwn.net/Articles/837122/
pub fn bump_memlock_rlimit() {
	let rlim = libc::rlimit {
		rlim_cur: libc::RLIM_INFINITY,
		rlim_max: libc::RLIM_INFINITY,
	};
	let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
	if ret != 0 {
		debug!("remove limit on locked memory failed, ret is: {ret}");
	}
}

/// Cancels `token` on the first SIGINT or SIGTERM.
pub fn install_signal_handlers(token: CancellationToken) -> Result<()> {
	let mut sigint = signal(SignalKind::interrupt()).map_err(Error::SignalInstall)?;
	let mut sigterm = signal(SignalKind::terminate()).map_err(Error::SignalInstall)?;

	tokio::spawn(async move {
		let name = tokio::select! {
			_ = sigint.recv() => "SIGINT",
			_ = sigterm.recv() => "SIGTERM",
		};
		info!(signal = name, "stop requested");
		token.cancel();
	});

	Ok(())
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn sigterm_cancels_stop_token() -> Result<()> {
		// -- Setup & Fixtures
		let stop = CancellationToken::new();
		install_signal_handlers(stop.clone())?;

		// -- Exec
		// The handler is in place, so this must not terminate the test process.
		let ret = unsafe { libc::raise(libc::SIGTERM) };
		let cancelled = tokio::time::timeout(Duration::from_secs(5), stop.cancelled()).await;

		// -- Check
		assert_eq!(ret, 0);
		assert!(cancelled.is_ok());
		assert!(stop.is_cancelled());

		Ok(())
	}
}

// endregion: --- Tests
