//! The FEC block entity (§4.3): shard storage, missing-shard marks, and
//! reassembly bookkeeping for one window of `D` data shards and `P` parity
//! shards.

use crate::rtp::RTP_HEADER_LEN;

/// Decoded, host-order FEC header identifying which block a shard belongs
/// to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockKey {
	pub payload_type: u8,
	pub base_seq_num: u16,
	pub base_timestamp: u32,
	pub ssrc: u32,
}

/// One FEC block: `D` data shards (each a full, emittable RTP packet) and
/// `P` raw parity shards, backed by one slab per shard kind rather than a
/// single arena allocation - see DESIGN.md for why this departs from the
/// reference's single-`malloc` layout.
pub struct Block {
	pub key: BlockKey,
	pub block_size: usize,

	data_shards: Vec<Vec<u8>>,
	fec_shards: Vec<Vec<u8>>,
	/// `true` = missing/unknown, `false` = present. Indices `[0, D)` are data
	/// shards, `[D, D+P)` are parity shards.
	marks: Vec<bool>,

	pub data_shards_received: usize,
	pub fec_shards_received: usize,
	pub fully_reassembled: bool,
	pub next_data_packet_index: usize,
	pub queue_time_ms: u32,
	pub allow_discontinuity: bool,
}

impl Block {
	/// Allocates a fresh block sized for `data_shards`/`parity_shards` of
	/// `block_size` payload bytes each, all marks set to missing.
	pub fn allocate(data_shards: usize, parity_shards: usize, block_size: usize) -> Self {
		Self {
			key: BlockKey { payload_type: 0, base_seq_num: 0, base_timestamp: 0, ssrc: 0 },
			block_size,
			data_shards: vec![vec![0u8; RTP_HEADER_LEN + block_size]; data_shards],
			fec_shards: vec![vec![0u8; block_size]; parity_shards],
			marks: vec![true; data_shards + parity_shards],
			data_shards_received: 0,
			fec_shards_received: 0,
			fully_reassembled: false,
			next_data_packet_index: 0,
			queue_time_ms: 0,
			allow_discontinuity: false,
		}
	}

	/// Re-initializes a pooled block for reuse, resizing its shard buffers
	/// only if `block_size` changed.
	pub fn reset(&mut self, key: BlockKey, block_size: usize, queue_time_ms: u32) {
		if self.block_size != block_size {
			for shard in &mut self.data_shards {
				shard.resize(RTP_HEADER_LEN + block_size, 0);
			}
			for shard in &mut self.fec_shards {
				shard.resize(block_size, 0);
			}
			self.block_size = block_size;
		}

		self.key = key;
		self.marks.iter_mut().for_each(|m| *m = true);
		self.data_shards_received = 0;
		self.fec_shards_received = 0;
		self.fully_reassembled = false;
		self.next_data_packet_index = 0;
		self.queue_time_ms = queue_time_ms;
		self.allow_discontinuity = false;
	}

	pub fn data_shard_count(&self) -> usize {
		self.data_shards.len()
	}

	pub fn fec_shard_count(&self) -> usize {
		self.fec_shards.len()
	}

	pub fn data_mark(&self, pos: usize) -> bool {
		self.marks[pos]
	}

	pub fn fec_mark(&self, fec_index: usize) -> bool {
		self.marks[self.data_shards.len() + fec_index]
	}

	pub fn data_packet(&self, pos: usize) -> &[u8] {
		&self.data_shards[pos]
	}

	/// Copies a full RTP data packet (header + payload) into shard `pos`.
	/// Returns `false` without copying if the shard was already present
	/// (duplicate).
	pub fn place_data(&mut self, pos: usize, packet: &[u8]) -> bool {
		if !self.marks[pos] {
			return false;
		}

		self.data_shards[pos].copy_from_slice(packet);
		self.marks[pos] = false;
		self.data_shards_received += 1;
		true
	}

	/// Copies raw parity bytes into FEC shard `fec_index`. Returns `false`
	/// without copying if the shard was already present (duplicate).
	pub fn place_fec(&mut self, fec_index: usize, payload: &[u8]) -> bool {
		let mark_index = self.data_shards.len() + fec_index;
		if !self.marks[mark_index] {
			return false;
		}

		self.fec_shards[fec_index].copy_from_slice(payload);
		self.marks[mark_index] = false;
		self.fec_shards_received += 1;
		true
	}

	/// Builds the `D + P` shard array Reed-Solomon reconstruction expects:
	/// data shard payloads (header stripped) followed by parity shards.
	pub fn shards_for_reconstruction(&self) -> Vec<Vec<u8>> {
		let mut shards = Vec::with_capacity(self.data_shards.len() + self.fec_shards.len());
		shards.extend(self.data_shards.iter().map(|packet| packet[RTP_HEADER_LEN..].to_vec()));
		shards.extend(self.fec_shards.iter().cloned());
		shards
	}

	pub fn marks(&self) -> &[bool] {
		&self.marks
	}

	/// Writes reconstructed payload bytes back into data shard `pos` and
	/// synthesizes its RTP header from the block's FEC header, clearing the
	/// shard's mark. `i` is the shard's index within the block (`pos`).
	pub fn restore_data_shard(&mut self, pos: usize, payload: &[u8], header: crate::rtp::RtpHeader) {
		header.write_into(&mut self.data_shards[pos]);
		self.data_shards[pos][RTP_HEADER_LEN..].copy_from_slice(payload);
		self.marks[pos] = false;
	}

	pub fn restore_fec_shard(&mut self, fec_index: usize, payload: &[u8]) {
		self.fec_shards[fec_index].copy_from_slice(payload);
		self.marks[self.data_shards.len() + fec_index] = false;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key() -> BlockKey {
		BlockKey { payload_type: 97, base_seq_num: 200, base_timestamp: 1000, ssrc: 42 }
	}

	#[test]
	fn fresh_block_has_all_marks_set() {
		let block = Block::allocate(4, 2, 16);
		assert!((0..4).all(|i| block.data_mark(i)));
		assert!((0..2).all(|i| block.fec_mark(i)));
		assert_eq!(block.data_shards_received, 0);
		assert_eq!(block.fec_shards_received, 0);
	}

	#[test]
	fn place_data_clears_mark_and_rejects_duplicate() {
		let mut block = Block::allocate(4, 2, 4);
		let packet = vec![0x80, 97, 0, 200, 0, 0, 3, 232, 0, 0, 0, 42, 1, 2, 3, 4];

		assert!(block.place_data(0, &packet));
		assert!(!block.data_mark(0));
		assert_eq!(block.data_shards_received, 1);

		assert!(!block.place_data(0, &packet));
		assert_eq!(block.data_shards_received, 1);
	}

	#[test]
	fn reset_reuses_buffers_of_matching_size() {
		let mut block = Block::allocate(4, 2, 16);
		block.place_data(0, &vec![0u8; 16 + crate::rtp::RTP_HEADER_LEN]);

		block.reset(key(), 16, 500);
		assert!(block.data_mark(0));
		assert_eq!(block.data_shards_received, 0);
		assert_eq!(block.queue_time_ms, 500);
		assert_eq!(block.data_packet(0).len(), 16 + crate::rtp::RTP_HEADER_LEN);
	}

	#[test]
	fn reset_resizes_buffers_on_size_change() {
		let mut block = Block::allocate(4, 2, 16);
		block.reset(key(), 32, 0);
		assert_eq!(block.data_packet(0).len(), 32 + crate::rtp::RTP_HEADER_LEN);
	}
}
