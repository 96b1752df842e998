//! Wavelet-tree entropy coding.
//!
//! Each context section is routed through a Huffman-shaped wavelet tree;
//! the per-node bitvectors go to the output through a binary arithmetic
//! coder with a probability model that is reset at node boundaries.

pub mod coders;
pub mod tree;

pub use coders::{WaveletDecoder, WaveletEncoder};
pub use tree::WaveletTree;
