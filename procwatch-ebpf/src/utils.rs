use aya_ebpf::helpers::{bpf_probe_read_kernel, r#gen::bpf_get_current_task};

use crate::vmlinux::task_struct;

/// tgid of the current task's `real_parent`, which survives reparenting
/// unlike the ptrace-visible `parent`. 0 when any read fails.
pub unsafe fn real_parent_tgid() -> u32 {
	let task = bpf_get_current_task() as *const task_struct;
	if task.is_null() {
		return 0;
	}

	let parent: *const task_struct = match bpf_probe_read_kernel(&(*task).real_parent) {
		Ok(p) => p as *const task_struct,
		Err(_) => return 0,
	};
	if parent.is_null() {
		return 0;
	}

	match bpf_probe_read_kernel(&(*parent).tgid) {
		Ok(tgid) => tgid as u32,
		Err(_) => 0,
	}
}
