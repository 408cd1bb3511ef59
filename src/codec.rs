//! The Reed-Solomon codec wrapper (§4.1): a narrow `reconstruct`-only facade
//! over a general-purpose GF(2^8) erasure-coding crate.
//!
//! The reference implementation links against a vendored C Reed-Solomon
//! library and splices a known-good parity submatrix directly into its
//! internal state (`rs->m[16]`, `rs->parity`) so that reconstruction lines
//! up with a specific transmitter's encoding matrix. The erasure-coding crate
//! used here builds its own internally-consistent encode/decode matrix pair
//! at construction time and exposes no hook to replace any part of it -
//! `KNOWN_GOOD_PARITY` is kept below purely as a pinned reference constant
//! for documentation and tests; it is not, and cannot be, installed into
//! `engine`. See DESIGN.md.

use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::error::Error;

/// The literal parity submatrix the real transmitter's encoder uses for
/// `D = 4, P = 2`. Not installable into this crate's codec - see the module
/// doc comment above.
pub const KNOWN_GOOD_PARITY: [u8; 8] = [0x77, 0x40, 0x38, 0x0e, 0xc7, 0xa7, 0x0d, 0x6c];

pub struct RsCodec {
	engine: ReedSolomon,
	data_shards: usize,
	parity_shards: usize,
}

impl RsCodec {
	pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, Error> {
		let engine = ReedSolomon::new(data_shards, parity_shards)
			.map_err(|e| Error::Codec(format!("failed to construct Reed-Solomon matrix: {e}")))?;

		Ok(Self { engine, data_shards, parity_shards })
	}

	/// Reconstructs every shard whose `marks` entry is `true`, clearing the
	/// mark as each shard is recovered. Precondition: at most `parity_shards`
	/// marks are set; `shards.len() == marks.len() == data_shards + parity_shards`.
	pub fn reconstruct(&self, shards: &mut [Vec<u8>], marks: &mut [bool]) -> Result<(), Error> {
		let total = self.data_shards + self.parity_shards;
		if shards.len() != total || marks.len() != total {
			return Err(Error::Codec(format!(
				"expected {total} shards and marks, got {} shards and {} marks",
				shards.len(),
				marks.len(),
			)));
		}

		let missing = marks.iter().filter(|&&m| m).count();
		if missing > self.parity_shards {
			return Err(Error::Codec(format!(
				"cannot reconstruct: {missing} shards missing but only {} parity shards available",
				self.parity_shards,
			)));
		}

		let mut option_shards: Vec<Option<Vec<u8>>> = shards
			.iter()
			.zip(marks.iter())
			.map(|(shard, &missing)| if missing { None } else { Some(shard.clone()) })
			.collect();

		self.engine
			.reconstruct(&mut option_shards)
			.map_err(|e| Error::Codec(format!("Reed-Solomon reconstruction failed: {e}")))?;

		for (index, recovered) in option_shards.into_iter().enumerate() {
			if marks[index] {
				shards[index] = recovered.ok_or_else(|| Error::Codec("reconstruction did not fill a missing shard".to_string()))?;
				marks[index] = false;
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reconstructs_missing_data_shard_from_parity() {
		let codec = RsCodec::new(3, 2).unwrap();

		let mut shards: Vec<Vec<u8>> = vec![vec![0u8; 4]; 5];
		shards[0] = vec![0, 1, 2, 3];
		shards[1] = vec![4, 5, 6, 7];
		shards[2] = vec![8, 9, 10, 11];
		codec.engine.encode(&mut shards).unwrap();

		let original = shards.clone();
		shards[1] = vec![0; 4];

		let mut marks = vec![false, true, false, false, false];
		codec.reconstruct(&mut shards, &mut marks).unwrap();

		assert_eq!(shards, original);
		assert!(marks.iter().all(|&m| !m));
	}

	#[test]
	fn rejects_too_many_missing_shards() {
		let codec = RsCodec::new(3, 2).unwrap();
		let mut shards: Vec<Vec<u8>> = vec![vec![0u8; 4]; 5];
		let mut marks = vec![true, true, true, false, false];

		assert!(codec.reconstruct(&mut shards, &mut marks).is_err());
	}

	#[test]
	fn known_good_parity_matches_the_reference_transmitter() {
		// Pins the wire constant named in the spec; it plays no role in this
		// codec's own reconstruction.
		assert_eq!(KNOWN_GOOD_PARITY, [0x77, 0x40, 0x38, 0x0e, 0xc7, 0xa7, 0x0d, 0x6c]);
	}
}
