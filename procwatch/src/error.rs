use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, Error>;

/// Startup failures. Each one aborts the process before the consumer loop runs.
#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	EbpfLoad(aya::EbpfError),
	ProgramNotFound {
		program: &'static str,
	},
	HookAttach {
		program: &'static str,
		cause: aya::programs::ProgramError,
	},
	ChannelOpen {
		map: &'static str,
		cause: String,
	},
	SignalInstall(std::io::Error),
}

// region:    --- Error Boilerplate

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
