use crate::bitstream::InStream;
use crate::error::Result;
use crate::tools::options::BLOCK_OVERHEAD;

/// One precompressor block: the byte buffer, its statistics vector and the
/// filled length. The buffer carries headroom beyond the block size so a
/// preprocessor pass may grow the data before it shrinks.
pub struct Block {
    pub data: Vec<u8>,
    pub stats: Vec<u64>,
    pub filled: usize,
}

impl Block {
    /// Recount the statistics vector from the current content. Called after
    /// every in-place preprocessor pass.
    pub fn build_stats(&mut self) {
        let counts = crate::tools::freq_count::freqs(&self.data[..self.filled]);
        self.stats.copy_from_slice(&counts);
    }

    /// Number of distinct byte values in the block.
    pub fn alphabet_size(&self) -> usize {
        self.stats.iter().filter(|&&s| s > 0).count()
    }
}

/// Owns the block buffers and statistics vectors, recycling them across
/// blocks so one allocation serves the whole stream.
pub struct BlockManager {
    block_size: usize,
    free_buffers: Vec<Vec<u8>>,
    free_stats: Vec<Vec<u64>>,
}

impl BlockManager {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            free_buffers: Vec::new(),
            free_stats: Vec::new(),
        }
    }

    fn get_free_buffer(&mut self) -> Vec<u8> {
        self.free_buffers
            .pop()
            .unwrap_or_else(|| vec![0u8; self.block_size + BLOCK_OVERHEAD])
    }

    fn get_free_stats(&mut self) -> Vec<u64> {
        self.free_stats.pop().unwrap_or_else(|| vec![0u64; 256])
    }

    /// Fill a fresh block from the source. Returns `None` at end of input.
    pub fn read_block(&mut self, source: &mut InStream) -> Result<Option<Block>> {
        let mut data = self.get_free_buffer();
        let filled = source.read_block(&mut data[..self.block_size])?;
        if filled == 0 {
            self.free_buffers.push(data);
            return Ok(None);
        }
        let mut block = Block {
            data,
            stats: self.get_free_stats(),
            filled,
        };
        block.build_stats();
        Ok(Some(block))
    }

    /// Hand a finished block's storage back for the next one.
    pub fn return_block(&mut self, block: Block) {
        self.free_buffers.push(block.data);
        self.free_stats.push(block.stats);
    }
}

#[cfg(test)]
mod test {
    use super::BlockManager;
    use crate::bitstream::InStream;

    #[test]
    fn blocks_come_back_in_block_size_steps() {
        let data = vec![7u8; 25];
        let mut input = InStream::new(Box::new(std::io::Cursor::new(data)));
        let mut manager = BlockManager::new(10);
        let mut sizes = Vec::new();
        while let Some(block) = manager.read_block(&mut input).unwrap() {
            sizes.push(block.filled);
            manager.return_block(block);
        }
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn stats_follow_content() {
        let mut input = InStream::new(Box::new(&b"aab"[..]));
        let mut manager = BlockManager::new(16);
        let block = manager.read_block(&mut input).unwrap().unwrap();
        assert_eq!(block.stats[b'a' as usize], 2);
        assert_eq!(block.stats[b'b' as usize], 1);
        assert_eq!(block.alphabet_size(), 2);
    }
}
