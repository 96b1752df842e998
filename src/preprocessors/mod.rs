//! Dictionary-style preprocessors shrinking a block before the transform.
//!
//! Each pass rewrites the block in place and records its replacement rules
//! in the block's grammar; inversion happens per block, in reverse pass
//! order, from the recorded headers.

pub mod freq_table;
pub mod grammar;
pub mod pairs;
pub mod runs;

use log::warn;

use crate::error::{BwError, Result};
use crate::tools::options::BLOCK_OVERHEAD;

pub use freq_table::FreqTable;
pub use grammar::{Grammar, ParsedPass, PassKind};

/// Expand a pipeline string over {c, p, r, s} into a pass list. `c` runs the
/// pair and run replacers back to back; `s` is accepted and skipped, the
/// recurring-sequence replacer never shipped.
pub fn parse_pipeline(pipeline: &str) -> Result<Vec<PassKind>> {
    let mut passes = Vec::new();
    for c in pipeline.chars() {
        match c {
            'p' => passes.push(PassKind::Pairs),
            'r' => passes.push(PassKind::Runs),
            'c' => {
                passes.push(PassKind::Pairs);
                passes.push(PassKind::Runs);
            }
            's' => warn!("Recurring-sequence replacer is unavailable; pass skipped."),
            other => {
                return Err(BwError::Usage(format!(
                    "invalid choice '{other}' for preprocessing"
                )))
            }
        }
    }
    if passes.len() > 255 {
        return Err(BwError::Usage("too many preprocessor passes".into()));
    }
    Ok(passes)
}

/// Run the configured passes over `buffer[..filled]` in place, recording
/// each applied pass in `grammar`. Returns the new filled length.
pub fn preprocess_block(
    passes: &[PassKind],
    buffer: &mut [u8],
    mut filled: usize,
    escaping: bool,
    grammar: &mut Grammar,
) -> Result<usize> {
    for &pass in passes {
        if filled + BLOCK_OVERHEAD > buffer.len() {
            return Err(BwError::InsufficientHeadroom);
        }
        let rewritten = match pass {
            PassKind::Pairs => pairs::compress_common_pairs(&buffer[..filled], escaping, grammar),
            PassKind::Runs => runs::compress_long_runs(&buffer[..filled], escaping, grammar),
        };
        if let Some(payload) = rewritten {
            if payload.len() > buffer.len() {
                return Err(BwError::InsufficientHeadroom);
            }
            buffer[..payload.len()].copy_from_slice(&payload);
            filled = payload.len();
        }
    }
    Ok(filled)
}

/// Undo every recorded pass, newest first.
pub fn postprocess_block(passes: &[ParsedPass], data: Vec<u8>) -> Vec<u8> {
    let mut data = data;
    for pass in passes.iter().rev() {
        data = pass.invert(&data);
    }
    data
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitstream::{InStream, OutStream};
    use crate::preprocessors::grammar::read_grammar;

    fn pipeline_round_trip(pipeline: &str, data: &[u8]) {
        let passes = parse_pipeline(pipeline).unwrap();
        let mut buffer = vec![0u8; data.len() + BLOCK_OVERHEAD];
        buffer[..data.len()].copy_from_slice(data);
        let mut grammar = Grammar::new();
        let filled =
            preprocess_block(&passes, &mut buffer, data.len(), true, &mut grammar).unwrap();

        let mut out = OutStream::new(Box::new(std::io::sink()));
        grammar.write(&mut out).unwrap();
        let record = out.as_slice().to_vec();
        out.flush().unwrap();

        let mut input = InStream::new(Box::new(std::io::Cursor::new(record)));
        let parsed = read_grammar(&mut input).unwrap();
        let restored = postprocess_block(&parsed, buffer[..filled].to_vec());
        assert_eq!(restored, data);
    }

    #[test]
    fn pipeline_strings_expand() {
        assert_eq!(parse_pipeline("").unwrap().len(), 0);
        assert_eq!(parse_pipeline("pr").unwrap(), vec![PassKind::Pairs, PassKind::Runs]);
        assert_eq!(
            parse_pipeline("c").unwrap(),
            vec![PassKind::Pairs, PassKind::Runs]
        );
        assert_eq!(parse_pipeline("s").unwrap().len(), 0);
        assert!(parse_pipeline("x").is_err());
    }

    #[test]
    fn chained_passes_round_trip() {
        let mut data: Vec<u8> = Vec::new();
        for i in 0..500u32 {
            data.extend_from_slice(b"the quick brown fox ");
            data.extend(std::iter::repeat((i % 3) as u8 + b'0').take((i % 40) as usize));
        }
        pipeline_round_trip("c", &data);
        pipeline_round_trip("ppr", &data);
        pipeline_round_trip("rp", &data);
    }

    #[test]
    fn empty_pipeline_leaves_data_alone() {
        pipeline_round_trip("", b"untouched bytes");
    }

    #[test]
    fn repeated_byte_sequence_with_both_passes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(65536).collect();
        pipeline_round_trip("c", &data);
    }
}
