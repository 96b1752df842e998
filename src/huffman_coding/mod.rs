//! Huffman run-length entropy coding.
//!
//! Each context section is factored into maximal byte runs; the run symbols
//! travel under canonical Huffman codes and the run lengths as Elias gamma
//! codes. The code table itself is shipped as a compact shape: symbol set
//! via binary interpolative coding, lengths via unary deltas off the
//! longest code.

pub mod code_from_weights;
pub mod decoder;
pub mod encoder;

use crate::bitstream::InStream;
use crate::error::{BwError, Result};

pub use decoder::HuffmanDecoder;
pub use encoder::HuffmanEncoder;

/// Append `bits` bits of `value` to the vector, most significant first.
pub fn push_bits(vec: &mut Vec<bool>, value: u64, bits: usize) {
    for j in (0..bits).rev() {
        vec.push((value >> j) & 1 == 1);
    }
}

/// Unary code: n-1 zeros followed by a one.
pub fn unary_code(vec: &mut Vec<bool>, n: u64) {
    debug_assert!(n >= 1);
    for _ in 0..n - 1 {
        vec.push(false);
    }
    vec.push(true);
}

pub fn unary_decode(input: &mut InStream) -> Result<u64> {
    let mut n = 1u64;
    while !input.read_bit()? {
        n += 1;
        if n > 64 {
            return Err(BwError::MalformedStream("unary code too long"));
        }
    }
    Ok(n)
}

/// Bits needed to name one value out of `span` choices.
fn bits_for_span(span: u32) -> usize {
    if span <= 1 {
        0
    } else {
        (32 - (span - 1).leading_zeros()) as usize
    }
}

/// Binary interpolative code of a sorted symbol set over `[0, hi]`: the
/// middle symbol is written in just enough bits for the current range, then
/// both halves recurse on their narrowed ranges.
pub fn binary_interpolative_code(symbols: &[u8], hi: u8, vec: &mut Vec<bool>) {
    fn recurse(symbols: &[u8], lo: i32, hi: i32, vec: &mut Vec<bool>) {
        if symbols.is_empty() {
            return;
        }
        let mid = symbols.len() / 2;
        let value = symbols[mid] as i32;
        debug_assert!(value >= lo && value <= hi);
        let bits = bits_for_span((hi - lo + 1) as u32);
        push_bits(vec, (value - lo) as u64, bits);
        recurse(&symbols[..mid], lo, value - 1, vec);
        recurse(&symbols[mid + 1..], value + 1, hi, vec);
    }
    recurse(symbols, 0, hi as i32, vec);
}

/// Inverse of `binary_interpolative_code`; rebuilds the set in ascending
/// order. `count` and `hi` arrive from the shape header.
pub fn binary_interpolative_decode(
    input: &mut InStream,
    count: usize,
    hi: u8,
) -> Result<Vec<u8>> {
    fn recurse(
        input: &mut InStream,
        count: usize,
        lo: i32,
        hi: i32,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if lo > hi || count as i32 > hi - lo + 1 {
            return Err(BwError::MalformedStream("interpolative range underflow"));
        }
        let bits = bits_for_span((hi - lo + 1) as u32);
        let value = lo + input.read_bits(bits)? as i32;
        if value > hi {
            return Err(BwError::MalformedStream("interpolative value out of range"));
        }
        let left = count / 2;
        recurse(input, left, lo, value - 1, out)?;
        out.push(value as u8);
        recurse(input, count - left - 1, value + 1, hi, out)
    }
    let mut out = Vec::with_capacity(count);
    recurse(input, count, 0, hi as i32, &mut out)?;
    Ok(out)
}

/// Pack a bit vector into bytes, first bit highest, zero-padded tail.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let mut b = 0u8;
        for (j, &bit) in chunk.iter().enumerate() {
            if bit {
                b |= 1 << (7 - j);
            }
        }
        bytes.push(b);
    }
    bytes
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitstream::InStream;

    fn via_stream(bits: &[bool]) -> InStream {
        InStream::new(Box::new(std::io::Cursor::new(bits_to_bytes(bits))))
    }

    #[test]
    fn unary_round_trip() {
        let mut bits = Vec::new();
        for n in 1..=20u64 {
            unary_code(&mut bits, n);
        }
        let mut input = via_stream(&bits);
        for n in 1..=20u64 {
            assert_eq!(unary_decode(&mut input).unwrap(), n);
        }
    }

    fn interpolative_round_trip(symbols: &[u8]) {
        let hi = *symbols.last().unwrap();
        let mut bits = Vec::new();
        binary_interpolative_code(symbols, hi, &mut bits);
        let mut input = via_stream(&bits);
        let decoded = binary_interpolative_decode(&mut input, symbols.len(), hi).unwrap();
        assert_eq!(decoded, symbols);
    }

    #[test]
    fn interpolative_subsets_round_trip() {
        interpolative_round_trip(&[0]);
        interpolative_round_trip(&[255]);
        interpolative_round_trip(&[0, 255]);
        interpolative_round_trip(&[3, 7, 8, 9, 200]);
        let all: Vec<u8> = (0..=255).collect();
        interpolative_round_trip(&all);
        let evens: Vec<u8> = (0..=255).filter(|b| b % 2 == 0).collect();
        interpolative_round_trip(&evens);
    }

    #[test]
    fn interpolative_random_subsets_round_trip() {
        let mut state = 0xBADC_0FFEu64;
        for _ in 0..50 {
            let mut set = std::collections::BTreeSet::new();
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let size = (state % 64) as usize + 1;
            for _ in 0..size {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                set.insert((state >> 40) as u8);
            }
            let symbols: Vec<u8> = set.into_iter().collect();
            interpolative_round_trip(&symbols);
        }
    }

    #[test]
    fn pinned_ranges_cost_no_bits() {
        // A single symbol equal to the range bound leaves nothing to name.
        let mut bits = Vec::new();
        binary_interpolative_code(&[0], 0, &mut bits);
        assert!(bits.is_empty());
    }
}
