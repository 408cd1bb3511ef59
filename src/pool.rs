//! The block pool (§4.2): a bounded LIFO free list of previously-used block
//! containers, keyed implicitly by `block_size`.

use crate::block::Block;

pub struct BlockPool {
	free: Vec<Block>,
	limit: usize,
}

impl BlockPool {
	pub fn new(limit: usize) -> Self {
		Self { free: Vec::new(), limit }
	}

	/// Returns a block container sized for `block_size`, reusing the most
	/// recently freed one if its size matches. Containers of a stale size
	/// are dropped as they're popped, matching the reference's "drain
	/// lazily on mismatch" behavior.
	pub fn acquire(&mut self, data_shards: usize, parity_shards: usize, block_size: usize) -> Block {
		while let Some(block) = self.free.pop() {
			if block.block_size == block_size {
				return block;
			}
			tracing::trace!("Dropping cached block with stale size {} while acquiring size {block_size}.", block.block_size);
		}

		Block::allocate(data_shards, parity_shards, block_size)
	}

	/// Returns a retired block to the pool, freeing it instead if the pool
	/// is already at `cached_block_limit`.
	pub fn release(&mut self, block: Block) {
		if self.free.len() >= self.limit {
			drop(block);
		} else {
			self.free.push(block);
		}
	}

	pub fn cached_count(&self) -> usize {
		self.free.len()
	}
}
