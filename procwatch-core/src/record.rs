use procwatch_common::{until_nul, ExecEvent};
use serde::Serialize;
use zerocopy::FromBytes;

use crate::{Error, Result};

/// Event-kind tag carried by every emitted line.
pub const EVENT_KIND: &str = "execve";

/// A decoded `ExecEvent`, as handed to the output boundary.
///
/// Serialized keys are part of the wire format read by downstream tools:
/// fields may be appended, never renamed or retyped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecRecord {
	#[serde(rename = "ts_ns")]
	pub timestamp: u64,
	pub pid: u32,
	#[serde(rename = "ppid")]
	pub parent_pid: u32,
	pub uid: u32,
	pub gid: u32,
	#[serde(rename = "comm")]
	pub command_name: String,
	#[serde(rename = "filename")]
	pub path: String,
	pub syscall: &'static str,
}

impl ExecRecord {
	/// Decodes one ring record. The record must be exactly one `ExecEvent`.
	pub fn decode(data: &[u8]) -> Result<Self> {
		let evt = ExecEvent::read_from_bytes(data).map_err(|_| Error::InvalidEventSize {
			len: data.len(),
			expected: ExecEvent::SIZE,
		})?;
		Ok(Self::from(&evt))
	}
}

impl From<&ExecEvent> for ExecRecord {
	fn from(evt: &ExecEvent) -> Self {
		ExecRecord {
			timestamp: evt.ts_ns,
			pid: evt.pid,
			parent_pid: evt.ppid,
			uid: evt.uid,
			gid: evt.gid,
			command_name: String::from_utf8_lossy(until_nul(&evt.comm)).into_owned(),
			path: String::from_utf8_lossy(until_nul(&evt.filename)).into_owned(),
			syscall: EVENT_KIND,
		}
	}
}

// region:    --- Tests


// endregion: --- Tests
