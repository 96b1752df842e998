use log::{debug, info};

use crate::bitstream::{InStream, OutStream};
use crate::bwt_algorithms;
use crate::coders::write_integer;
use crate::error::Result;
use crate::preprocessors::{parse_pipeline, preprocess_block, Grammar};
use crate::tools::freq_count::freqs;
use crate::tools::options::{CompressOpts, MAX_SLICE_SIZE};

use super::framing;
use super::{BlockManager, EntropyEncoder};

/// Totals reported after a compression run.
pub struct CompressStats {
    pub blocks: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Compress `source` into `out` under the given options.
///
/// The stream is a two byte global header, one record per precompressor
/// block and a terminating empty block record. Each block is preprocessed,
/// carved into transform slices and every slice is transformed and entropy
/// coded independently.
pub fn compress(
    source: &mut InStream,
    out: &mut OutStream,
    opts: &CompressOpts,
) -> Result<CompressStats> {
    opts.validate()?;
    let passes = parse_pipeline(&opts.preprocessing)?;

    // Global header: the entropy coder selector doubles as the probability
    // model choice on the wavelet path.
    out.write_byte(opts.encoder as u8);
    out.write_byte(opts.encoder as u8);
    let mut encoder = EntropyEncoder::from_selector(opts.encoder, opts.encoder)?;

    let mut manager = BlockManager::new(opts.block_size);
    let mut stats = CompressStats {
        blocks: 0,
        bytes_in: 0,
        bytes_out: 0,
    };

    while let Some(mut block) = manager.read_block(source)? {
        stats.blocks += 1;
        stats.bytes_in += block.filled as u64;
        let original_size = block.filled;

        let mut grammar = Grammar::new();
        block.filled = preprocess_block(
            &passes,
            &mut block.data,
            block.filled,
            opts.escaping,
            &mut grammar,
        )?;
        block.build_stats();
        info!(
            "Block of {} bytes preprocessed to {} bytes over {} distinct values.",
            original_size,
            block.filled,
            block.alphabet_size()
        );

        write_integer(original_size as u64, out);
        grammar.write(out)?;

        // Carve the preprocessed data into transform slices.
        let slice_sizes: Vec<usize> = block.data[..block.filled]
            .chunks(MAX_SLICE_SIZE)
            .map(|c| c.len())
            .collect();
        let count = if slice_sizes.len() == 256 {
            0
        } else {
            slice_sizes.len() as u8
        };
        out.write_byte(count);
        for &size in &slice_sizes {
            write_integer(size as u64, out);
        }

        let mut beg = 0usize;
        for &size in &slice_sizes {
            let (permuted, lf_powers) = bwt_algorithms::forward(&block.data[beg..beg + size]);
            let byte_stats = freqs(&permuted);
            let sections = framing::deduce_sections(&byte_stats);

            let placeholder = framing::write_block_header(&sections, out)?;
            encoder.encode_data(&permuted, &sections, out)?;
            framing::write_trailer(&lf_powers, out)?;
            framing::finish_block(placeholder, out);
            debug!(
                "Slice of {} bytes in {} sections wrote {} compressed bytes.",
                size,
                sections.len(),
                out.get_pos() - placeholder
            );
            beg += size;
        }
        manager.return_block(block);
    }

    // Terminating block record.
    write_integer(0, out);
    stats.bytes_out = out.get_pos();
    out.flush()?;

    info!(
        "Read {} block{}, {} bytes in, {} bytes out.",
        stats.blocks,
        if stats.blocks == 1 { "" } else { "s" },
        stats.bytes_in,
        stats.bytes_out
    );
    Ok(stats)
}
