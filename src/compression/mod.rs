//! Orchestration: block lifecycle, entropy coder dispatch, the compressed
//! file layout.

pub mod block;
pub mod compress;
pub mod decompress;
pub mod framing;

use crate::bitstream::{InStream, OutStream};
use crate::error::{BwError, Result};
use crate::huffman_coding::{HuffmanDecoder, HuffmanEncoder};
use crate::wavelet_coding::{WaveletDecoder, WaveletEncoder};

pub use block::{Block, BlockManager};
pub use compress::compress;
pub use decompress::decompress;

/// The configured entropy coder. Selectors `b` and `B` pick the Huffman
/// run-length path, the remaining selectors the wavelet path with the
/// matching probability model.
pub enum EntropyEncoder {
    Huffman(HuffmanEncoder),
    Wavelet(WaveletEncoder),
}

impl EntropyEncoder {
    pub fn from_selector(encoder: char, prob_model: char) -> Result<Self> {
        match encoder {
            'b' | 'B' => Ok(EntropyEncoder::Huffman(HuffmanEncoder::new())),
            'n' | 'u' | 'm' | 'M' => Ok(EntropyEncoder::Wavelet(WaveletEncoder::new(prob_model))),
            _ => Err(BwError::Usage(format!(
                "invalid choice '{encoder}' for entropy encoding"
            ))),
        }
    }

    pub fn encode_data(
        &mut self,
        block: &[u8],
        sections: &[u64],
        out: &mut OutStream,
    ) -> Result<()> {
        match self {
            EntropyEncoder::Huffman(encoder) => encoder.encode_data(block, sections, out),
            EntropyEncoder::Wavelet(encoder) => encoder.encode_data(block, sections, out),
        }
    }
}

/// Mirror of `EntropyEncoder`, instantiated from the global header.
pub enum EntropyDecoder {
    Huffman(HuffmanDecoder),
    Wavelet(WaveletDecoder),
}

impl EntropyDecoder {
    pub fn from_selector(encoder: char, prob_model: char) -> Result<Self> {
        match encoder {
            'b' | 'B' => Ok(EntropyDecoder::Huffman(HuffmanDecoder::new())),
            'n' | 'u' | 'm' | 'M' => Ok(EntropyDecoder::Wavelet(WaveletDecoder::new(prob_model))),
            _ => Err(BwError::MalformedStream("unknown entropy coder selector")),
        }
    }

    pub fn decode_data(&mut self, sections: &[u64], input: &mut InStream) -> Result<Vec<u8>> {
        match self {
            EntropyDecoder::Huffman(decoder) => decoder.decode_data(sections, input),
            EntropyDecoder::Wavelet(decoder) => decoder.decode_data(sections, input),
        }
    }
}
