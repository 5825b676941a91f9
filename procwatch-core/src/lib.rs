pub mod consumer;
mod error;
pub mod record;
pub mod ring;
pub mod sink;
pub mod source;

pub use self::error::{Error, Result};

use std::time::Duration;

/// Upper bound on one blocking wait of the consumer loop, and so on how long
/// a stop request can go unnoticed.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(200);
