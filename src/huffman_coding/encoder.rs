use log::trace;

use crate::bitstream::OutStream;
use crate::coders::write_integer;
use crate::error::Result;

use super::code_from_weights::{code_lengths_from_weights, compute_canonical_codes};
use super::{binary_interpolative_code, bits_to_bytes, push_bits, unary_code};

/// Factor a section into maximal runs. Returns the run symbols, the run
/// lengths and the per-symbol run counts that drive the code build.
pub fn calculate_run_frequencies(section: &[u8]) -> (Vec<u8>, Vec<u32>, [u64; 256]) {
    let mut runseq = Vec::new();
    let mut runlen = Vec::new();
    let mut freqs = [0u64; 256];
    let mut i = 0usize;
    while i < section.len() {
        let symbol = section[i];
        let mut len = 1u32;
        while i + (len as usize) < section.len() && section[i + len as usize] == symbol {
            len += 1;
        }
        runseq.push(symbol);
        runlen.push(len);
        freqs[symbol as usize] += 1;
        i += len as usize;
    }
    (runseq, runlen, freqs)
}

/// Serialize the code table: largest symbol, symbol count, packed longest
/// length, the symbol set interpolatively, then one unary length delta per
/// symbol in ascending order.
pub fn serialize_shape(clen: &[u32; 256], vec: &mut Vec<bool>) {
    let symbols: Vec<u8> = (0..256u16)
        .filter(|&i| clen[i as usize] > 0)
        .map(|i| i as u8)
        .collect();
    let max_len = symbols
        .iter()
        .map(|&s| clen[s as usize] as u64)
        .max()
        .unwrap_or(0);

    push_bits(vec, *symbols.last().unwrap() as u64, 8);
    push_bits(vec, symbols.len() as u8 as u64, 8);

    let mut bytes_in_longest = 0usize;
    let packed = crate::coders::pack_integer(max_len, &mut bytes_in_longest);
    push_bits(vec, packed, bytes_in_longest * 8);

    binary_interpolative_code(&symbols, *symbols.last().unwrap(), vec);

    for &s in &symbols {
        unary_code(vec, max_len - clen[s as usize] as u64 + 1);
    }
}

/// Stateless encoder for the Huffman run-length path.
pub struct HuffmanEncoder;

impl HuffmanEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode the permuted block section by section. `sections` must sum to
    /// `block.len()`; empty sections are skipped.
    pub fn encode_data(
        &mut self,
        block: &[u8],
        sections: &[u64],
        out: &mut OutStream,
    ) -> Result<()> {
        let mut beg = 0usize;
        for &section_size in sections {
            if section_size == 0 {
                continue;
            }
            let section = &block[beg..beg + section_size as usize];
            let (runseq, runlen, freqs) = calculate_run_frequencies(section);
            let clen = code_lengths_from_weights(&freqs);
            let code = compute_canonical_codes(&clen);

            // The number of runs.
            write_integer(runseq.len() as u64, out);

            // The code table shape.
            let mut shape = Vec::new();
            serialize_shape(&clen, &mut shape);
            out.write_block(&bits_to_bytes(&shape));
            trace!(
                "Section of {} bytes: {} runs, shape {} bits.",
                section_size,
                runseq.len(),
                shape.len()
            );

            // The run symbols through a 64-bit bit buffer.
            // Relies on no code being longer than 47 bits.
            let mut buffer = 0u64;
            let mut bits_in_buffer = 0i32;
            for &c in &runseq {
                let len = clen[c as usize] as i32;
                while bits_in_buffer + len > 64 {
                    bits_in_buffer -= 8;
                    out.write_byte((buffer >> bits_in_buffer) as u8);
                }
                buffer <<= len;
                buffer |= code[c as usize];
                bits_in_buffer += len;
            }
            while bits_in_buffer >= 8 {
                bits_in_buffer -= 8;
                out.write_byte((buffer >> bits_in_buffer) as u8);
            }
            if bits_in_buffer > 0 {
                buffer <<= 8 - bits_in_buffer;
                out.write_byte(buffer as u8);
            }

            // The run lengths as gamma codes, same buffer discipline.
            buffer = 0;
            bits_in_buffer = 0;
            for &len in &runlen {
                let gamma_len = 2 * (31 - len.leading_zeros() as i32) + 1;
                while bits_in_buffer + gamma_len > 64 {
                    bits_in_buffer -= 8;
                    out.write_byte((buffer >> bits_in_buffer) as u8);
                }
                buffer <<= gamma_len;
                buffer |= len as u64;
                bits_in_buffer += gamma_len;
            }
            while bits_in_buffer >= 8 {
                bits_in_buffer -= 8;
                out.write_byte((buffer >> bits_in_buffer) as u8);
            }
            if bits_in_buffer > 0 {
                buffer <<= 8 - bits_in_buffer;
                out.write_byte(buffer as u8);
            }

            beg += section_size as usize;
        }
        Ok(())
    }
}

impl Default for HuffmanEncoder {
    fn default() -> Self {
        Self::new()
    }
}
