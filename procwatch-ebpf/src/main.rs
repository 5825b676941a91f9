#![no_std]
#![no_main]

use aya_ebpf::{
	macros::{map, tracepoint},
	maps::{PerCpuArray, RingBuf},
	programs::TracePointContext,
};
use procwatch_common::RING_BYTE_SIZE;

mod hooks;
mod utils;
mod vmlinux;

#[map]
static EVT_MAP: RingBuf = RingBuf::with_byte_size(RING_BYTE_SIZE, 0);

/// Failed ring reservations, per CPU.
#[map]
static DROPPED: PerCpuArray<u64> = PerCpuArray::with_max_entries(1, 0);

#[tracepoint]
pub fn sys_enter_execve(ctx: TracePointContext) -> u32 {
	match hooks::try_sys_enter_execve(ctx) {
		Ok(ret) => ret,
		Err(ret) => ret,
	}
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
	loop {}
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";
