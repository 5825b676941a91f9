//! In-process rendition of the kernel ring buffer.
//!
//! Same contract as `BPF_MAP_TYPE_RINGBUF`: many producers reserve and commit
//! variable-sized records, one consumer reads them in reservation order and
//! acknowledges them. No locks; the two cursors are the only shared state
//! besides the record headers.
//!
//! Layout of a record, 16-byte aligned:
//!
//! ```text
//! | stamp: u64 | len: u32, flags: u32 | payload (len bytes, padded to 16) |
//! ```
//!
//! `stamp` is `pos | COMMITTED`, stored last with `Release`. The consumer
//! zeroes every record it acknowledges, so a header it has not seen
//! published never matches the position it is waiting on.

use std::{
	cell::UnsafeCell,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

use procwatch_common::{EventChannel, EventSlot, ExecEvent};
use tokio::sync::Notify;

use crate::{source::RecordSource, Error, Result};

const HDR_LEN: usize = 16;
const ALIGN: usize = 16;
const WORD: usize = 8;

const COMMITTED: u64 = 1;
const DISCARD: u64 = 1 << 32;
const LEN_MASK: u64 = u32::MAX as u64;

/// Smallest ring that can hold one empty record plus a wrap pad.
pub const MIN_CAPACITY: usize = 2 * HDR_LEN;

pub struct RingChannel;

impl RingChannel {
	/// Creates a ring of `capacity` bytes (power of two, at least
	/// `MIN_CAPACITY`) and returns its producer and its single consumer.
	pub fn with_capacity(capacity: usize) -> Result<(RingProducer, RingConsumer)> {
		if !capacity.is_power_of_two() || capacity < MIN_CAPACITY {
			return Err(Error::InvalidRingCapacity {
				capacity,
				min: MIN_CAPACITY,
			});
		}

		let data = (0..capacity / WORD).map(|_| UnsafeCell::new(0u64)).collect();
		let shared = Arc::new(Shared {
			data,
			mask: capacity as u64 - 1,
			producer_pos: AtomicU64::new(0),
			consumer_pos: AtomicU64::new(0),
			dropped: AtomicU64::new(0),
			notify: Notify::new(),
		});

		let producer = RingProducer { shared: shared.clone() };
		let consumer = RingConsumer { shared };
		Ok((producer, consumer))
	}
}

struct Shared {
	// u64 words keep every header 8-byte aligned for atomic access.
	data: Box<[UnsafeCell<u64>]>,
	mask: u64,
	producer_pos: AtomicU64,
	consumer_pos: AtomicU64,
	dropped: AtomicU64,
	notify: Notify,
}

// SAFETY: byte ranges of `data` are owned by exactly one party at a time:
// the producer between reserve and commit, the consumer between publish and
// acknowledge. Ownership moves through Release/Acquire on the header stamp
// and on `consumer_pos`.
unsafe impl Sync for Shared {}

impl Shared {
	fn capacity(&self) -> u64 {
		self.mask + 1
	}

	fn ptr(&self, pos: u64) -> *mut u8 {
		let off = (pos & self.mask) as usize;
		// SAFETY: `off` is below the capacity, which is the byte length of `data`.
		unsafe { (self.data.as_ptr() as *mut u8).add(off) }
	}

	fn header(&self, pos: u64) -> (&AtomicU64, &AtomicU64) {
		let stamp = self.ptr(pos) as *mut u64;
		// SAFETY: record starts are 16-byte aligned inside `data`, so both
		// words are aligned and in bounds. Headers are only touched
		// atomically while another party may observe them.
		unsafe { (AtomicU64::from_ptr(stamp), AtomicU64::from_ptr(stamp.add(1))) }
	}

	fn reserve(&self, len: usize) -> Option<RingSlot<'_>> {
		let cap = self.capacity();
		// Bounded before padding so the rounding below can't overflow.
		if len as u64 > cap || len as u64 > LEN_MASK {
			return self.count_drop();
		}
		let needed = (HDR_LEN + pad_len(len)) as u64;
		if needed > cap {
			return self.count_drop();
		}

		let mut pos = self.producer_pos.load(Ordering::Relaxed);
		let pad = loop {
			let off = pos & self.mask;
			// Records never wrap: pad the tail and start over at offset 0.
			let pad = if off + needed > cap { cap - off } else { 0 };
			let used = pos.saturating_sub(self.consumer_pos.load(Ordering::Acquire));
			if used + pad + needed > cap {
				return self.count_drop();
			}
			match self
				.producer_pos
				.compare_exchange_weak(pos, pos + pad + needed, Ordering::AcqRel, Ordering::Relaxed)
			{
				Ok(_) => break pad,
				Err(actual) => pos = actual,
			}
		};

		if pad > 0 {
			self.publish(pos, pad as usize - HDR_LEN, DISCARD);
		}

		Some(RingSlot {
			shared: self,
			pos: pos + pad,
			len,
			published: false,
		})
	}

	fn count_drop<T>(&self) -> Option<T> {
		self.dropped.fetch_add(1, Ordering::Relaxed);
		None
	}

	fn publish(&self, pos: u64, len: usize, flags: u64) {
		let (stamp, meta) = self.header(pos);
		meta.store(len as u64 | flags, Ordering::Relaxed);
		stamp.store(pos | COMMITTED, Ordering::Release);
	}

	/// Hands every published record to `on_record`, in order, stopping at the
	/// first one still being written. Returns how many were handed over.
	fn drain_with<F>(&self, on_record: &mut F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>,
	{
		let mut drained = 0;
		loop {
			let pos = self.consumer_pos.load(Ordering::Relaxed);
			let (stamp, meta) = self.header(pos);
			if stamp.load(Ordering::Acquire) != pos | COMMITTED {
				return Ok(drained);
			}

			let meta = meta.load(Ordering::Relaxed);
			let len = (meta & LEN_MASK) as usize;
			let res = if meta & DISCARD == 0 {
				// SAFETY: published and not yet acknowledged, no producer writes here.
				let data = unsafe { std::slice::from_raw_parts(self.ptr(pos + HDR_LEN as u64), len) };
				on_record(data)
			} else {
				Ok(())
			};

			self.acknowledge(pos, (HDR_LEN + pad_len(len)) as u64);
			res?;
			if meta & DISCARD == 0 {
				drained += 1;
			}
		}
	}

	fn acknowledge(&self, pos: u64, total: u64) {
		// SAFETY: the record is contiguous and still owned by the consumer.
		unsafe { std::ptr::write_bytes(self.ptr(pos), 0, total as usize) };
		self.consumer_pos.store(pos + total, Ordering::Release);
	}
}

fn pad_len(len: usize) -> usize {
	(len + ALIGN - 1) & !(ALIGN - 1)
}

// region:    --- Producer

/// Producer handle. Cheap to clone; every clone writes into the same ring.
#[derive(Clone)]
pub struct RingProducer {
	shared: Arc<Shared>,
}

impl RingProducer {
	/// Claims `len` bytes, or `None` (counted as a drop) when the ring is full.
	pub fn reserve(&self, len: usize) -> Option<RingSlot<'_>> {
		self.shared.reserve(len)
	}

	/// Reservations refused since creation.
	pub fn dropped(&self) -> u64 {
		self.shared.dropped.load(Ordering::Relaxed)
	}
}

/// A reserved, not yet published region. Dropping it without `commit`
/// publishes it as discarded so the consumer can move past it.
pub struct RingSlot<'a> {
	shared: &'a Shared,
	pos: u64,
	len: usize,
	published: bool,
}

impl RingSlot<'_> {
	pub fn as_mut_bytes(&mut self) -> &mut [u8] {
		let data = self.shared.ptr(self.pos + HDR_LEN as u64);
		// SAFETY: reserved for this slot alone until published.
		unsafe { std::slice::from_raw_parts_mut(data, self.len) }
	}

	pub fn commit(mut self) {
		self.shared.publish(self.pos, self.len, 0);
		self.published = true;
		self.shared.notify.notify_one();
	}

	pub fn discard(self) {}
}

impl Drop for RingSlot<'_> {
	fn drop(&mut self) {
		if !self.published {
			self.shared.publish(self.pos, self.len, DISCARD);
		}
	}
}

/// A slot sized for exactly one `ExecEvent`.
pub struct ExecSlot<'a>(RingSlot<'a>);

impl EventChannel for RingProducer {
	type Slot<'a> = ExecSlot<'a>;

	fn reserve(&self) -> Option<ExecSlot<'_>> {
		self.shared.reserve(ExecEvent::SIZE).map(ExecSlot)
	}
}

impl EventSlot for ExecSlot<'_> {
	fn record_mut(&mut self) -> &mut ExecEvent {
		let bytes = self.0.as_mut_bytes();
		debug_assert_eq!(bytes.len(), ExecEvent::SIZE);
		// SAFETY: the slot is exactly one ExecEvent long, 8-byte aligned
		// (16-byte record starts plus a 16-byte header), and zeroed by the
		// consumer, which is a valid ExecEvent.
		unsafe { &mut *(bytes.as_mut_ptr() as *mut ExecEvent) }
	}

	fn commit(self) {
		self.0.commit();
	}
}

// endregion: --- Producer

// region:    --- Consumer

/// The single reader of a `RingChannel`.
pub struct RingConsumer {
	shared: Arc<Shared>,
}

impl RecordSource for RingConsumer {
	async fn poll<F>(&mut self, timeout: Duration, mut on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>,
	{
		let ready = self.shared.drain_with(&mut on_record)?;
		if ready > 0 {
			return Ok(ready);
		}

		// A commit racing with the drain above leaves a permit, so this
		// returns at once instead of sleeping through it.
		let _ = tokio::time::timeout(timeout, self.shared.notify.notified()).await;
		self.shared.drain_with(&mut on_record)
	}

	fn drain<F>(&mut self, mut on_record: F) -> Result<usize>
	where
		F: FnMut(&[u8]) -> Result<()>,
	{
		self.shared.drain_with(&mut on_record)
	}
}

// endregion: --- Consumer

// region:    --- Tests


// endregion: --- Tests
