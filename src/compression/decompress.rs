use log::{debug, info};

use crate::bitstream::{InStream, OutStream};
use crate::bwt_algorithms;
use crate::coders::read_integer;
use crate::error::{BwError, Result};
use crate::preprocessors::grammar::read_grammar;
use crate::preprocessors::postprocess_block;
use crate::tools::options::MAX_SLICE_SIZE;

use super::framing;
use super::EntropyDecoder;

/// Decompress `source` into `out`. Returns the number of decoded bytes.
///
/// Each block record is processed completely before the next is touched:
/// every slice is entropy decoded and inverse transformed, then the
/// preprocessor passes recorded in the block's grammar are undone in
/// reverse order.
pub fn decompress(source: &mut InStream, out: &mut OutStream, threads: usize) -> Result<u64> {
    if threads != 1 {
        return Err(BwError::Usage("supporting only a single thread".into()));
    }

    let encoder = source.read_byte()? as char;
    let prob_model = source.read_byte()? as char;
    let mut decoder = EntropyDecoder::from_selector(encoder, prob_model)?;

    let mut decompressed = 0u64;
    let mut pre_blocks = 0usize;
    let mut bwt_blocks = 0usize;
    loop {
        if source.compressed_data_ending()? {
            break;
        }
        let original_size = read_integer(source)?;
        if original_size == 0 {
            break;
        }
        pre_blocks += 1;

        let passes = read_grammar(source)?;

        let slice_count = match source.read_byte()? {
            0 => 256usize,
            n => n as usize,
        };
        let mut slice_sizes = Vec::with_capacity(slice_count);
        for _ in 0..slice_count {
            let size = read_integer(source)?;
            if size > MAX_SLICE_SIZE as u64 {
                return Err(BwError::MalformedStream("slice size out of range"));
            }
            slice_sizes.push(size);
        }
        bwt_blocks += slice_count;

        let mut data = Vec::with_capacity(slice_sizes.iter().sum::<u64>() as usize);
        for &slice_size in &slice_sizes {
            let (compressed_length, sections) = framing::read_block_header(source)?;
            debug!("Size of compressed block = {}", compressed_length);
            if sections.iter().sum::<u64>() != slice_size + 1 {
                return Err(BwError::MalformedStream("section length sum mismatch"));
            }

            let permuted = decoder.decode_data(&sections, source)?;
            let lf_powers = framing::read_trailer(source)?;
            let restored = bwt_algorithms::inverse(&permuted, lf_powers[0])?;
            if restored.len() as u64 != slice_size {
                return Err(BwError::MalformedStream("slice size mismatch"));
            }
            data.extend_from_slice(&restored);
        }

        let data = postprocess_block(&passes, data);
        if data.len() as u64 != original_size {
            return Err(BwError::MalformedStream("block size mismatch"));
        }
        decompressed += data.len() as u64;
        out.write_block(&data);
    }

    out.flush()?;
    info!(
        "Decoded {} block{} over {} slices, {} bytes.",
        pre_blocks,
        if pre_blocks == 1 { "" } else { "s" },
        bwt_blocks,
        decompressed
    );
    Ok(decompressed)
}
