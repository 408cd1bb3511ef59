use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Shard ceiling of the underlying GF(2^8) Reed-Solomon codec.
const MAX_SHARD_COUNT: usize = 256;

/// The session-fixed constants that parameterize a [`crate::Queue`].
///
/// These correspond 1:1 to the negotiated values a real session would agree
/// on out of band (shard counts, payload types); this crate only consumes
/// them, it never negotiates them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Config {
	/// Data shards per FEC block.
	pub data_shards: usize,

	/// Parity shards per FEC block.
	pub parity_shards: usize,

	/// Milliseconds of audio represented by one data shard.
	pub audio_packet_duration_ms: u32,

	/// Extra grace period, in milliseconds, granted to a block past its
	/// nominal audio duration before it is declared irrecoverable.
	pub oos_wait_time_ms: u32,

	/// Maximum number of freed block containers kept for reuse.
	pub cached_block_limit: usize,

	/// RTP payload type carried by audio data packets.
	pub audio_payload_type: u8,

	/// RTP payload type carried by FEC parity packets.
	pub fec_payload_type: u8,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			data_shards: 4,
			parity_shards: 2,
			audio_packet_duration_ms: 5,
			oos_wait_time_ms: 100,
			cached_block_limit: 10,
			audio_payload_type: 97,
			fec_payload_type: 127,
		}
	}
}

impl Config {
	pub fn read_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Config, Error> {
		let contents = std::fs::read_to_string(path).map_err(|e| {
			tracing::error!("Failed to open configuration file: {e}");
			Error::Io(e.to_string())
		})?;
		let config: Config = toml::from_str(&contents).map_err(|e| {
			tracing::error!("Failed to parse configuration file: {e}");
			Error::Io(e.to_string())
		})?;

		config.validate()?;

		Ok(config)
	}

	pub fn validate(&self) -> Result<(), Error> {
		if self.data_shards == 0 {
			return Err(Error::InvalidConfig("data_shards must be greater than zero".to_string()));
		}
		if self.parity_shards == 0 {
			return Err(Error::InvalidConfig("parity_shards must be greater than zero".to_string()));
		}
		if self.data_shards + self.parity_shards > MAX_SHARD_COUNT {
			return Err(Error::InvalidConfig(format!(
				"data_shards + parity_shards ({}) exceeds the codec's maximum of {}",
				self.data_shards + self.parity_shards,
				MAX_SHARD_COUNT,
			)));
		}
		if self.audio_payload_type == self.fec_payload_type {
			return Err(Error::InvalidConfig("audio_payload_type and fec_payload_type must differ".to_string()));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_is_valid() {
		Config::default().validate().unwrap();
	}

	#[test]
	fn rejects_zero_data_shards() {
		let config = Config { data_shards: 0, ..Config::default() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn rejects_matching_payload_types() {
		let config = Config { fec_payload_type: 97, ..Config::default() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn reads_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queue.toml");
		std::fs::write(&path, toml::to_string(&Config::default()).unwrap()).unwrap();

		let config = Config::read_from_file(&path).unwrap();
		assert_eq!(config.data_shards, Config::default().data_shards);
	}

	#[test]
	fn rejects_unparseable_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("queue.toml");
		std::fs::write(&path, "not valid toml {{{").unwrap();

		assert!(Config::read_from_file(&path).is_err());
	}

	#[test]
	fn round_trips_through_toml() {
		let config = Config::default();
		let serialized = toml::to_string(&config).unwrap();
		let deserialized: Config = toml::from_str(&serialized).unwrap();

		assert_eq!(config.data_shards, deserialized.data_shards);
		assert_eq!(config.parity_shards, deserialized.parity_shards);
		assert_eq!(config.audio_packet_duration_ms, deserialized.audio_packet_duration_ms);
		assert_eq!(config.oos_wait_time_ms, deserialized.oos_wait_time_ms);
		assert_eq!(config.cached_block_limit, deserialized.cached_block_limit);
		assert_eq!(config.audio_payload_type, deserialized.audio_payload_type);
		assert_eq!(config.fec_payload_type, deserialized.fec_payload_type);
	}
}
