use crate::event::{ExecEvent, PATH_LEN};

/// Identity and memory access for the task that entered `execve`.
///
/// Implemented with BPF helpers in the kernel program. Every method must be
/// non-blocking and must not fault, whatever the caller passed to the syscall.
pub trait CurrentTask {
	fn ktime_ns(&self) -> u64;

	/// `tgid << 32 | pid`
	fn pid_tgid(&self) -> u64;

	/// `gid << 32 | uid`
	fn uid_gid(&self) -> u64;

	/// Thread group id of `real_parent`, 0 if it can't be resolved.
	fn real_parent_tgid(&self) -> u32;

	fn comm(&self) -> [u8; crate::COMM_LEN];

	/// Copies the user-space filename argument into `dst`, at most
	/// `dst.len() - 1` bytes plus a NUL. Returns the copied length or the
	/// negative errno of the failed read.
	fn read_filename(&self, dst: &mut [u8]) -> Result<usize, i64>;
}

/// Producer side of the ring: a slot sized for exactly one `ExecEvent`.
pub trait EventChannel {
	type Slot<'a>: EventSlot
	where
		Self: 'a;

	/// `None` when the ring has no room left.
	fn reserve(&self) -> Option<Self::Slot<'_>>;
}

pub trait EventSlot {
	fn record_mut(&mut self) -> &mut ExecEvent;

	/// Publishes the record to the consumer. No writes after this.
	fn commit(self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
	Emitted,
	/// Emitted with an empty `filename`; carries the errno of the failed read.
	Degraded(i64),
	/// Ring full, nothing written.
	Dropped,
}

/// Builds one `ExecEvent` for `task` directly in a reserved ring slot.
#[inline(always)]
pub fn capture<T, C>(task: &T, channel: &C) -> Capture
where
	T: CurrentTask,
	C: EventChannel,
{
	let Some(mut slot) = channel.reserve() else {
		return Capture::Dropped;
	};

	let pid_tgid = task.pid_tgid();
	let uid_gid = task.uid_gid();

	let event = slot.record_mut();
	event.ts_ns = task.ktime_ns();
	event.pid = (pid_tgid >> 32) as u32;
	event.ppid = task.real_parent_tgid();
	event.uid = uid_gid as u32;
	event.gid = (uid_gid >> 32) as u32;
	event.syscall_ret = 0;
	event._pad0 = [0u8; 4];

	event.comm = task.comm();
	terminate(&mut event.comm);

	let outcome = match task.read_filename(&mut event.filename) {
		Ok(_) => Capture::Emitted,
		Err(errno) => {
			event.filename = [0u8; PATH_LEN];
			Capture::Degraded(errno)
		}
	};
	terminate(&mut event.filename);

	slot.commit();
	outcome
}

#[inline(always)]
fn terminate(buf: &mut [u8]) {
	if let Some(last) = buf.last_mut() {
		*last = 0;
	}
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use crate::{until_nul, COMM_LEN};
	use std::cell::RefCell;
	use zerocopy::FromZeros;

	const EFAULT: i64 = -14;

	struct SyntheticTask {
		pid: u32,
		ppid: u32,
		uid: u32,
		gid: u32,
		comm: &'static [u8],
		filename: Option<Vec<u8>>,
	}

	impl SyntheticTask {
		fn sh() -> Self {
			SyntheticTask {
				pid: 100,
				ppid: 1,
				uid: 0,
				gid: 0,
				comm: b"sh",
				filename: Some(b"/bin/sh".to_vec()),
			}
		}
	}

	impl CurrentTask for SyntheticTask {
		fn ktime_ns(&self) -> u64 {
			42
		}

		fn pid_tgid(&self) -> u64 {
			((self.pid as u64) << 32) | (self.pid as u64 + 1)
		}

		fn uid_gid(&self) -> u64 {
			((self.gid as u64) << 32) | self.uid as u64
		}

		fn real_parent_tgid(&self) -> u32 {
			self.ppid
		}

		fn comm(&self) -> [u8; COMM_LEN] {
			let mut comm = [0u8; COMM_LEN];
			let len = self.comm.len().min(COMM_LEN);
			comm[..len].copy_from_slice(&self.comm[..len]);
			comm
		}

		// Same contract as bpf_probe_read_user_str: truncate, terminate, or fail.
		fn read_filename(&self, dst: &mut [u8]) -> core::result::Result<usize, i64> {
			let Some(src) = &self.filename else {
				// Leave junk behind, as a partially faulted copy would.
				dst[..4].copy_from_slice(b"junk");
				return Err(EFAULT);
			};
			let len = src.len().min(dst.len() - 1);
			dst[..len].copy_from_slice(&src[..len]);
			dst[len] = 0;
			Ok(len + 1)
		}
	}

	/// Fills the whole buffer without a terminator.
	struct OverrunTask;

	impl CurrentTask for OverrunTask {
		fn ktime_ns(&self) -> u64 {
			1
		}
		fn pid_tgid(&self) -> u64 {
			0
		}
		fn uid_gid(&self) -> u64 {
			0
		}
		fn real_parent_tgid(&self) -> u32 {
			0
		}
		fn comm(&self) -> [u8; COMM_LEN] {
			[b'c'; COMM_LEN]
		}
		fn read_filename(&self, dst: &mut [u8]) -> core::result::Result<usize, i64> {
			dst.fill(b'A');
			Ok(dst.len())
		}
	}

	struct TestChannel {
		capacity: usize,
		committed: RefCell<Vec<ExecEvent>>,
		reserved: RefCell<usize>,
	}

	impl TestChannel {
		fn with_capacity(capacity: usize) -> Self {
			TestChannel {
				capacity,
				committed: RefCell::new(Vec::new()),
				reserved: RefCell::new(0),
			}
		}
	}

	struct TestSlot<'a> {
		channel: &'a TestChannel,
		event: ExecEvent,
	}

	impl EventChannel for TestChannel {
		type Slot<'a> = TestSlot<'a>;

		fn reserve(&self) -> Option<TestSlot<'_>> {
			let mut reserved = self.reserved.borrow_mut();
			if *reserved == self.capacity {
				return None;
			}
			*reserved += 1;
			// Stale bytes, like a recycled ring slot.
			let mut event = ExecEvent::new_zeroed();
			event.filename.fill(0xAA);
			event._pad0 = [0xAA; 4];
			Some(TestSlot { channel: self, event })
		}
	}

	impl EventSlot for TestSlot<'_> {
		fn record_mut(&mut self) -> &mut ExecEvent {
			&mut self.event
		}

		fn commit(self) {
			self.channel.committed.borrow_mut().push(self.event);
		}
	}

	#[test]
	fn capture_populates_every_field() -> Result<()> {
		// -- Setup & Fixtures
		let task = SyntheticTask::sh();
		let channel = TestChannel::with_capacity(1);

		// -- Exec
		let outcome = capture(&task, &channel);

		// -- Check
		assert_eq!(outcome, Capture::Emitted);
		let committed = channel.committed.borrow();
		let evt = committed.first().ok_or("no record committed")?;
		assert_eq!(evt.ts_ns, 42);
		assert_eq!(evt.pid, 100);
		assert_eq!(evt.ppid, 1);
		assert_eq!(evt.uid, 0);
		assert_eq!(evt.gid, 0);
		assert_eq!(evt.syscall_ret, 0);
		assert_eq!(evt._pad0, [0u8; 4]);
		assert_eq!(until_nul(&evt.comm), b"sh");
		assert_eq!(until_nul(&evt.filename), b"/bin/sh");

		Ok(())
	}

	#[test]
	fn capture_splits_uid_and_gid() -> Result<()> {
		// -- Setup & Fixtures
		let task = SyntheticTask {
			uid: 1000,
			gid: 100,
			..SyntheticTask::sh()
		};
		let channel = TestChannel::with_capacity(1);

		// -- Exec
		capture(&task, &channel);

		// -- Check
		let committed = channel.committed.borrow();
		let evt = committed.first().ok_or("no record committed")?;
		assert_eq!(evt.uid, 1000);
		assert_eq!(evt.gid, 100);

		Ok(())
	}

	#[test]
	fn capture_truncates_long_path() -> Result<()> {
		// -- Setup & Fixtures
		let long = vec![b'x'; 300];
		let task = SyntheticTask {
			filename: Some(long),
			..SyntheticTask::sh()
		};
		let channel = TestChannel::with_capacity(1);

		// -- Exec
		let outcome = capture(&task, &channel);

		// -- Check
		assert_eq!(outcome, Capture::Emitted);
		let committed = channel.committed.borrow();
		let evt = committed.first().ok_or("no record committed")?;
		assert_eq!(until_nul(&evt.filename).len(), PATH_LEN - 1);
		assert_eq!(evt.filename[PATH_LEN - 1], 0);

		Ok(())
	}

	#[test]
	fn capture_terminates_unterminated_sources() -> Result<()> {
		// -- Setup & Fixtures
		let channel = TestChannel::with_capacity(1);

		// -- Exec
		capture(&OverrunTask, &channel);

		// -- Check
		let committed = channel.committed.borrow();
		let evt = committed.first().ok_or("no record committed")?;
		assert_eq!(until_nul(&evt.comm).len(), COMM_LEN - 1);
		assert_eq!(until_nul(&evt.filename).len(), PATH_LEN - 1);

		Ok(())
	}

	#[test]
	fn capture_degrades_on_unreadable_path() -> Result<()> {
		// -- Setup & Fixtures
		let task = SyntheticTask {
			filename: None,
			..SyntheticTask::sh()
		};
		let channel = TestChannel::with_capacity(1);

		// -- Exec
		let outcome = capture(&task, &channel);

		// -- Check
		assert_eq!(outcome, Capture::Degraded(EFAULT));
		let committed = channel.committed.borrow();
		let evt = committed.first().ok_or("record must still be emitted")?;
		assert_eq!(evt.filename, [0u8; PATH_LEN]);
		assert_eq!(evt.pid, 100);
		assert_eq!(evt.ppid, 1);
		assert_eq!(until_nul(&evt.comm), b"sh");

		Ok(())
	}

	#[test]
	fn capture_drops_when_channel_full() -> Result<()> {
		// -- Setup & Fixtures
		let channel = TestChannel::with_capacity(2);
		let tasks: Vec<SyntheticTask> = (0..5)
			.map(|i| SyntheticTask {
				pid: 200 + i,
				..SyntheticTask::sh()
			})
			.collect();

		// -- Exec
		let outcomes: Vec<Capture> = tasks.iter().map(|t| capture(t, &channel)).collect();

		// -- Check
		let emitted = outcomes.iter().filter(|o| **o == Capture::Emitted).count();
		let dropped = outcomes.iter().filter(|o| **o == Capture::Dropped).count();
		assert_eq!(emitted, 2);
		assert_eq!(dropped, 3);
		let pids: Vec<u32> = channel.committed.borrow().iter().map(|e| e.pid).collect();
		assert_eq!(pids, vec![200, 201]);

		Ok(())
	}
}

// endregion: --- Tests
