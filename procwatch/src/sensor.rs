use aya::{
	maps::{MapData, PerCpuArray, RingBuf},
	programs::TracePoint,
	Ebpf,
};
use procwatch_core::source::KernelRing;
use tracing::{debug, info, warn};

use crate::{Error, Result};

const HOOK_PROGRAM: &str = "sys_enter_execve";
const HOOK_CATEGORY: &str = "syscalls";
const EVENT_MAP: &str = "EVT_MAP";
const DROP_MAP: &str = "DROPPED";

/// Loads the kernel program and forwards its log records.
pub fn load() -> Result<Ebpf> {
	let mut ebpf = Ebpf::load(aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/procwatch")))
		.map_err(Error::EbpfLoad)?;
	if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
		// This can happen if you remove all log statements from your eBPF program.
		warn!("failed to initialize eBPF logger: {e}");
	}
	Ok(ebpf)
}

/// Attaches the capture program to the `execve` entry tracepoint.
/// The link lives as long as `ebpf`.
pub fn attach_hook(ebpf: &mut Ebpf) -> Result<()> {
	let program: &mut TracePoint = ebpf
		.program_mut(HOOK_PROGRAM)
		.ok_or(Error::ProgramNotFound { program: HOOK_PROGRAM })?
		.try_into()
		.map_err(|cause| Error::HookAttach {
			program: HOOK_PROGRAM,
			cause,
		})?;
	program.load().map_err(|cause| Error::HookAttach {
		program: HOOK_PROGRAM,
		cause,
	})?;
	program
		.attach(HOOK_CATEGORY, HOOK_PROGRAM)
		.map_err(|cause| Error::HookAttach {
			program: HOOK_PROGRAM,
			cause,
		})?;

	info!(category = HOOK_CATEGORY, program = HOOK_PROGRAM, "capture program attached");
	Ok(())
}

/// Takes the event ring out of `ebpf` and registers it with the reactor.
pub fn open_channel(ebpf: &mut Ebpf) -> Result<KernelRing> {
	let channel_err = |cause: String| Error::ChannelOpen { map: EVENT_MAP, cause };

	let map = ebpf
		.take_map(EVENT_MAP)
		.ok_or_else(|| channel_err("map not found".to_string()))?;
	let ring_buf: RingBuf<MapData> = RingBuf::try_from(map).map_err(|e| channel_err(e.to_string()))?;
	let ring = KernelRing::new(ring_buf).map_err(|e| channel_err(e.to_string()))?;

	debug!(map = EVENT_MAP, "event channel open");
	Ok(ring)
}

/// Sum of failed reservations over every CPU, `None` if the map can't be read.
pub fn dropped_events(ebpf: &Ebpf) -> Option<u64> {
	let map = ebpf.map(DROP_MAP)?;
	let counters: PerCpuArray<_, u64> = match PerCpuArray::try_from(map) {
		Ok(counters) => counters,
		Err(e) => {
			debug!(map = DROP_MAP, "drop counter unavailable: {e}");
			return None;
		}
	};
	match counters.get(&0, 0) {
		Ok(per_cpu) => Some(per_cpu.iter().sum()),
		Err(e) => {
			debug!(map = DROP_MAP, "drop counter unreadable: {e}");
			None
		}
	}
}
