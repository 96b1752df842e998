//! Block-sorting file compressor built on the Burrows-Wheeler transform.
//!
//! The pipeline reads fixed-size blocks, shrinks them with dictionary-style
//! preprocessors (pair and run replacement), permutes each block slice with
//! the BWT and entropy codes the result with either a Huffman run-length
//! scheme or a wavelet tree driven by an arithmetic coder. Decompression
//! inverts every stage exactly.
//!
//! Compress a file:
//!
//! ```text
//! $> bwpack input.txt output.bwz
//! ```
//!
//! Decompress it again:
//!
//! ```text
//! $> bwunpack output.bwz restored.txt
//! ```
#![warn(rust_2018_idioms)]
pub mod bitstream;
pub mod bwt_algorithms;
pub mod coders;
pub mod compression;
pub mod error;
pub mod huffman_coding;
pub mod preprocessors;
pub mod tools;
pub mod wavelet_coding;
