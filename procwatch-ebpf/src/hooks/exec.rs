use aya_ebpf::{
	helpers::{
		bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_current_uid_gid, bpf_probe_read_user_str_bytes,
		r#gen::bpf_ktime_get_ns,
	},
	maps::ring_buf::RingBufEntry,
	programs::TracePointContext,
};
use aya_log_ebpf::debug;
use procwatch_common::{capture, Capture, CurrentTask, EventChannel, EventSlot, ExecEvent, COMM_LEN};

use crate::{utils::real_parent_tgid, DROPPED, EVT_MAP};

// sys_enter_* layout: common fields (8), __syscall_nr (4) + pad (4), args[6]
const FILENAME_ARG_OFFSET: usize = 16;

struct ExecveTask<'a> {
	ctx: &'a TracePointContext,
}

impl CurrentTask for ExecveTask<'_> {
	#[inline(always)]
	fn ktime_ns(&self) -> u64 {
		unsafe { bpf_ktime_get_ns() }
	}

	#[inline(always)]
	fn pid_tgid(&self) -> u64 {
		bpf_get_current_pid_tgid()
	}

	#[inline(always)]
	fn uid_gid(&self) -> u64 {
		bpf_get_current_uid_gid()
	}

	#[inline(always)]
	fn real_parent_tgid(&self) -> u32 {
		unsafe { real_parent_tgid() }
	}

	#[inline(always)]
	fn comm(&self) -> [u8; COMM_LEN] {
		bpf_get_current_comm().unwrap_or([0u8; COMM_LEN])
	}

	#[inline(always)]
	fn read_filename(&self, dst: &mut [u8]) -> Result<usize, i64> {
		let filename: u64 = unsafe { self.ctx.read_at(FILENAME_ARG_OFFSET)? };
		let copied = unsafe { bpf_probe_read_user_str_bytes(filename as *const u8, dst)? };
		Ok(copied.len())
	}
}

struct ExecChannel;

struct ExecSlot(RingBufEntry<ExecEvent>);

impl EventChannel for ExecChannel {
	type Slot<'a> = ExecSlot;

	#[inline(always)]
	fn reserve(&self) -> Option<ExecSlot> {
		EVT_MAP.reserve::<ExecEvent>(0).map(ExecSlot)
	}
}

impl EventSlot for ExecSlot {
	#[inline(always)]
	fn record_mut(&mut self) -> &mut ExecEvent {
		// Every field is written by `capture` before commit.
		unsafe { &mut *self.0.as_mut_ptr() }
	}

	#[inline(always)]
	fn commit(self) {
		self.0.submit(0);
	}
}

pub fn try_sys_enter_execve(ctx: TracePointContext) -> Result<u32, u32> {
	let task = ExecveTask { ctx: &ctx };

	match capture(&task, &ExecChannel) {
		Capture::Emitted => {}
		Capture::Degraded(errno) => debug!(&ctx, "execve filename unreadable ->> ERROR: {}", errno),
		Capture::Dropped => count_drop(),
	}

	Ok(0)
}

#[inline(always)]
fn count_drop() {
	if let Some(dropped) = DROPPED.get_ptr_mut(0) {
		unsafe { *dropped += 1 };
	}
}
