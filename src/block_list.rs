//! The sequence-sorted list of live FEC blocks (§4.4).
//!
//! The reference implementation threads raw `prev`/`next` pointers through
//! each block. Here the list is few elements at a time (a handful of
//! in-flight blocks at most) and ordered by `base_seq_num`, so a `VecDeque`
//! with a linear scan gives the same O(live blocks) behavior as the
//! original's own pointer walk, without raw pointers or an arena of slots.

use std::collections::VecDeque;

use crate::block::Block;
use crate::seq::{is_before_16, is_before_32};

/// Result of scanning the list for a block's position.
pub enum Locate {
	/// A block with this exact base sequence number already exists at this
	/// index.
	Found(usize),
	/// No match; a new block belongs at this index to keep the list sorted.
	InsertBefore(usize),
}

#[derive(Default)]
pub struct BlockList {
	blocks: VecDeque<Block>,
}

impl BlockList {
	pub fn new() -> Self {
		Self { blocks: VecDeque::new() }
	}

	pub fn is_empty(&self) -> bool {
		self.blocks.is_empty()
	}

	pub fn head(&self) -> Option<&Block> {
		self.blocks.front()
	}

	pub fn head_mut(&mut self) -> Option<&mut Block> {
		self.blocks.front_mut()
	}

	pub fn get(&self, index: usize) -> Option<&Block> {
		self.blocks.get(index)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut Block> {
		self.blocks.get_mut(index)
	}

	/// Scans from the head for a block whose base sequence number matches
	/// `base_seq_num`, or the position a new block with that base sequence
	/// number should be inserted at to keep the list ascending.
	pub fn locate(&self, base_seq_num: u16) -> Locate {
		for (index, block) in self.blocks.iter().enumerate() {
			if block.key.base_seq_num == base_seq_num {
				return Locate::Found(index);
			}
			if is_before_16(base_seq_num, block.key.base_seq_num) {
				return Locate::InsertBefore(index);
			}
		}

		Locate::InsertBefore(self.blocks.len())
	}

	pub fn insert_at(&mut self, index: usize, block: Block) {
		self.blocks.insert(index, block);
	}

	/// Detaches the head block. The caller is responsible for advancing
	/// `oldest_rtp_base_sequence_number` and returning the block to the pool.
	pub fn retire_head(&mut self) -> Option<Block> {
		self.blocks.pop_front()
	}

	/// Debug-only invariant walk over the list's own shape: sorted order and
	/// uniform per-block fields across live blocks. `Queue::validate` wraps
	/// this and adds the sequence-number bounds that need queue-level state.
	/// Production builds skip this entirely so the hot path stays O(1) per
	/// insertion.
	#[cfg(debug_assertions)]
	pub fn validate(&self) {
		let mut iter = self.blocks.iter();
		let Some(mut previous) = iter.next() else {
			return;
		};

		for block in iter {
			assert!(
				is_before_16(previous.key.base_seq_num, block.key.base_seq_num),
				"block list is not sorted by base_seq_num",
			);
			assert!(
				is_before_32(previous.key.base_timestamp, block.key.base_timestamp),
				"block list is not sorted by base_timestamp",
			);
			assert_eq!(previous.block_size, block.block_size, "live blocks must share block_size");
			assert_eq!(previous.key.payload_type, block.key.payload_type, "live blocks must share payload_type");
			assert_eq!(previous.key.ssrc, block.key.ssrc, "live blocks must share ssrc");

			previous = block;
		}
	}

	#[cfg(not(debug_assertions))]
	pub fn validate(&self) {}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::block::{Block, BlockKey};

	fn block(base_seq_num: u16, base_timestamp: u32) -> Block {
		let mut block = Block::allocate(4, 2, 16);
		block.key = BlockKey { payload_type: 97, base_seq_num, base_timestamp, ssrc: 1 };
		block
	}

	#[test]
	fn locate_finds_empty_list_position() {
		let list = BlockList::new();
		assert!(matches!(list.locate(100), Locate::InsertBefore(0)));
	}

	#[test]
	fn insert_sorted_and_locate_existing() {
		let mut list = BlockList::new();
		list.insert_at(0, block(200, 1000));
		list.insert_at(1, block(208, 1040));

		match list.locate(204) {
			Locate::InsertBefore(index) => assert_eq!(index, 1),
			Locate::Found(_) => panic!("204 should not be found"),
		}
		match list.locate(208) {
			Locate::Found(index) => assert_eq!(index, 1),
			Locate::InsertBefore(_) => panic!("208 should be found"),
		}
	}

	#[test]
	fn retire_head_detaches_front() {
		let mut list = BlockList::new();
		list.insert_at(0, block(200, 1000));
		list.insert_at(1, block(208, 1040));

		let retired = list.retire_head().unwrap();
		assert_eq!(retired.key.base_seq_num, 200);
		assert_eq!(list.head().unwrap().key.base_seq_num, 208);
	}
}
