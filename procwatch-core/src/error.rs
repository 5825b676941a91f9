use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Display, From)]
#[display("{self:?}")]
pub enum Error {
	InvalidEventSize {
		len: usize,
		expected: usize,
	},
	InvalidRingCapacity {
		capacity: usize,
		min: usize,
	},
	ChannelRead(std::io::Error),
	Output(std::io::Error),
	// -- Externals
	//
	#[from]
	Json(serde_json::Error),
}

// region:    --- Error Boilerplate

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
