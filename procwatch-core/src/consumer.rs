use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{record::ExecRecord, sink::EventSink, source::RecordSource, Error, Result};

/// How the consumer loop ended.
#[derive(Debug)]
pub enum Shutdown {
	/// Stop was requested and everything already committed was delivered.
	Clean { emitted: u64 },
	/// The channel or the output failed; the loop stopped at once.
	Failed { emitted: u64, cause: Error },
}

impl Shutdown {
	pub fn exit_code(&self) -> u8 {
		match self {
			Shutdown::Clean { .. } => 0,
			Shutdown::Failed { .. } => 2,
		}
	}

	pub fn emitted(&self) -> u64 {
		match self {
			Shutdown::Clean { emitted } | Shutdown::Failed { emitted, .. } => *emitted,
		}
	}
}

/// Single reader that moves records from a `RecordSource` to an `EventSink`,
/// verbatim and in commit order, until `stop` is cancelled.
pub struct ConsumerLoop<S, K> {
	source: S,
	sink: K,
	poll_timeout: Duration,
	stop: CancellationToken,
}

impl<S, K> ConsumerLoop<S, K>
where
	S: RecordSource,
	K: EventSink,
{
	pub fn new(source: S, sink: K, poll_timeout: Duration, stop: CancellationToken) -> Self {
		ConsumerLoop {
			source,
			sink,
			poll_timeout,
			stop,
		}
	}

	pub async fn run(&mut self) -> Shutdown {
		let Self {
			source,
			sink,
			poll_timeout,
			stop,
		} = self;
		let mut emitted = 0u64;

		while !stop.is_cancelled() {
			let polled = tokio::select! {
				biased;
				_ = stop.cancelled() => break,
				res = source.poll(*poll_timeout, |data| emit(sink, data)) => res,
			};

			match polled {
				Ok(count) => emitted += count as u64,
				Err(cause) => {
					error!(%cause, emitted, "channel poll failed, stopping");
					return Shutdown::Failed { emitted, cause };
				}
			}
		}

		debug!("stop requested, draining committed records");
		match source.drain(|data| emit(sink, data)) {
			Ok(count) => emitted += count as u64,
			Err(cause) => {
				error!(%cause, emitted, "final drain failed");
				return Shutdown::Failed { emitted, cause };
			}
		}

		info!(emitted, "consumer loop stopped");
		Shutdown::Clean { emitted }
	}

	pub fn sink(&self) -> &K {
		&self.sink
	}

	pub fn into_parts(self) -> (S, K) {
		(self.source, self.sink)
	}
}

fn emit<K: EventSink>(sink: &mut K, data: &[u8]) -> Result<()> {
	let record = ExecRecord::decode(data)?;
	sink.emit(&record)
}

// region:    --- Tests


// endregion: --- Tests
