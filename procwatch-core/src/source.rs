use std::time::Duration;

use aya::maps::{MapData, RingBuf};
use tokio::io::unix::AsyncFd;

use crate::{Error, Result};

/// Consumer side of a ring of committed records.
///
/// `on_record` sees each record exactly once, in commit order; the record is
/// acknowledged (its space handed back to producers) once the callback returns.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
	/// Waits at most `timeout` for records, then hands over everything ready.
	/// Returns the number of records handed over, 0 on timeout.
	async fn poll<F>(&mut self, timeout: Duration, on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>;

	/// Hands over everything ready without waiting.
	fn drain<F>(&mut self, on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>;
}

/// The kernel ring map, read through its epoll-able fd.
pub struct KernelRing {
	fd: AsyncFd<RingBuf<MapData>>,
}

impl KernelRing {
	pub fn new(ring_buf: RingBuf<MapData>) -> std::io::Result<Self> {
		let fd = AsyncFd::new(ring_buf)?;
		Ok(KernelRing { fd })
	}
}

impl RecordSource for KernelRing {
	async fn poll<F>(&mut self, timeout: Duration, mut on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>,
	{
		if let Ok(guard) = tokio::time::timeout(timeout, self.fd.readable_mut()).await {
			let mut guard = guard.map_err(Error::ChannelRead)?;
			let drained = drain_ring(guard.get_inner_mut(), &mut on_record);
			guard.clear_ready();
			return drained;
		}

		// No wakeup within the timeout; look anyway in case one was missed.
		drain_ring(self.fd.get_mut(), &mut on_record)
	}

	fn drain<F>(&mut self, mut on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>,
	{
		drain_ring(self.fd.get_mut(), &mut on_record)
	}
}

fn drain_ring<F>(ring_buf: &mut RingBuf<MapData>, on_record: &mut F) -> Result<usize>
where
	F: FnMut(&[u8]) -> Result<()>,
{
	let mut drained = 0;
	while let Some(item) = ring_buf.next() {
		let data: &[u8] = &item;
		on_record(data)?;
		drained += 1;
	}
	Ok(drained)
}
