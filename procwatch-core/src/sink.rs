use std::io::{self, Write};

use crate::{record::ExecRecord, Error, Result};

/// Output boundary of the consumer loop. Records arrive in commit order.
pub trait EventSink {
	fn emit(&mut self, record: &ExecRecord) -> Result<()>;
}

/// Writes each record as one JSON object per line, flushing after every line.
pub struct JsonLineSink<W: Write> {
	writer: W,
}

impl<W: Write> JsonLineSink<W> {
	pub fn new(writer: W) -> Self {
		JsonLineSink { writer }
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl JsonLineSink<io::StdoutLock<'static>> {
	pub fn stdout() -> Self {
		Self::new(io::stdout().lock())
	}
}

impl<W: Write> EventSink for JsonLineSink<W> {
	fn emit(&mut self, record: &ExecRecord) -> Result<()> {
		let line = serde_json::to_vec(record)?;
		self.writer.write_all(&line).map_err(Error::Output)?;
		self.writer.write_all(b"\n").map_err(Error::Output)?;
		self.writer.flush().map_err(Error::Output)?;
		Ok(())
	}
}

impl EventSink for Vec<ExecRecord> {
	fn emit(&mut self, record: &ExecRecord) -> Result<()> {
		self.push(record.clone());
		Ok(())
	}
}

// region:    --- Tests


// endregion: --- Tests
