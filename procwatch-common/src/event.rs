use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const COMM_LEN: usize = 16;
pub const PATH_LEN: usize = 256;

/// Byte size of the kernel ring map carrying `ExecEvent`s.
pub const RING_BYTE_SIZE: u32 = 1 << 24;

/// One `execve` observed at syscall entry.
///
/// Every field is inline; `comm` and `filename` are always NUL-terminated
/// within their capacity.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct ExecEvent {
	pub ts_ns: u64,                // 0..8
	pub pid: u32,                  // 8..12
	pub ppid: u32,                 // 12..16 | tgid of real_parent
	pub uid: u32,                  // 16..20
	pub gid: u32,                  // 20..24
	pub syscall_ret: i32,          // 24..28 | 0 at entry
	pub comm: [u8; COMM_LEN],      // 28..44
	pub filename: [u8; PATH_LEN],  // 44..300
	pub _pad0: [u8; 4],            // 300..304
}

impl ExecEvent {
	pub const SIZE: usize = core::mem::size_of::<ExecEvent>();
}

/// Returns the bytes of `buf` up to (not including) the first NUL.
pub fn until_nul(buf: &[u8]) -> &[u8] {
	let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
	&buf[..len]
}
