use std::fmt;

/// Errors from the ambient edges of the crate (configuration, codec setup).
///
/// The hot packet-handling path (`Queue::add_packet` / `get_queued_packet`)
/// never returns `Result`: rejections there are silent control flow, per
/// the protocol's own error taxonomy, not exceptional conditions.
#[derive(Debug)]
pub enum Error {
	InvalidConfig(String),
	Codec(String),
	Io(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::InvalidConfig(message) => write!(f, "invalid queue configuration: {message}"),
			Error::Codec(message) => write!(f, "Reed-Solomon codec error: {message}"),
			Error::Io(message) => write!(f, "I/O error: {message}"),
		}
	}
}

impl std::error::Error for Error {}
