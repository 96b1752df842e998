use log::{debug, trace};

use crate::bitstream::{InStream, OutStream};
use crate::coders::arith::{BitDecoder, BitEncoder};
use crate::coders::models::{
    give_model_for_gaps, give_model_for_integer_codes, give_probability_model, ProbabilityModel,
};
use crate::coders::{read_integer, write_integer};
use crate::error::{BwError, Result};
use crate::huffman_coding::bits_to_bytes;

use super::tree::WaveletTree;

/// Entropy encoder driving a wavelet tree per context section.
pub struct WaveletEncoder {
    destination: BitEncoder,
    prob_model: ProbabilityModel,
    integer_model: ProbabilityModel,
    gap_model: ProbabilityModel,
}

impl WaveletEncoder {
    pub fn new(prob_model: char) -> Self {
        Self {
            destination: BitEncoder::new(),
            prob_model: give_probability_model(prob_model),
            integer_model: give_model_for_integer_codes(),
            gap_model: give_model_for_gaps(),
        }
    }

    fn end_context_block(&mut self, out: &mut OutStream) {
        self.prob_model.reset();
        self.integer_model.reset();
        self.gap_model.reset();
        self.destination.finish(out);
    }

    /// Encode the permuted block section by section: packed bit count of
    /// the tree root, the serialized shape, then the arithmetic-coded node
    /// bitvectors.
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
            let wavelet = WaveletTree::new(section);
            write_integer(wavelet.bits_in_root(), out);

            let mut shape = Vec::new();
            wavelet.tree_shape(&mut shape);
            out.write_block(&bits_to_bytes(&shape));
            trace!(
                "Wavelet tree shape took {} bytes, {} bits in total.",
                shape.len().div_ceil(8),
                wavelet.total_bits()
            );

            self.destination.reset_counter();
            wavelet.encode_tree_bf(
                &mut self.destination,
                &mut self.prob_model,
                &mut self.integer_model,
                &mut self.gap_model,
                out,
            );
            self.end_context_block(out);
            debug!(
                "Section of {} bytes coded arithmetically into {} bytes.",
                section_size,
                self.destination.counter()
            );
            beg += section_size as usize;
        }
        Ok(())
    }
}

/// Mirror of `WaveletEncoder`.
pub struct WaveletDecoder {
    source: BitDecoder,
    prob_model: ProbabilityModel,
    integer_model: ProbabilityModel,
    gap_model: ProbabilityModel,
}

impl WaveletDecoder {
    pub fn new(prob_model: char) -> Self {
        Self {
            source: BitDecoder::new(),
            prob_model: give_probability_model(prob_model),
            integer_model: give_model_for_integer_codes(),
            gap_model: give_model_for_gaps(),
        }
    }

    fn end_context_block(&mut self) {
        self.prob_model.reset();
        self.integer_model.reset();
        self.gap_model.reset();
    }

    /// Decode the payload of one block, every section through its own tree.
    pub fn decode_data(&mut self, sections: &[u64], input: &mut InStream) -> Result<Vec<u8>> {
        let block_size: u64 = sections.iter().sum();
        let mut data = Vec::with_capacity(block_size as usize);
        for &section_size in sections {
            if section_size == 0 {
                continue;
            }
            let root_size = read_integer(input)?;
            if root_size != section_size {
                return Err(BwError::MalformedStream("section length sum mismatch"));
            }
            let (mut wavelet, bits) = WaveletTree::read_shape(input)?;
            input.flush_buffer();
            trace!("Wavelet tree shape took {} bytes.", bits.div_ceil(8));

            self.source.start(input)?;
            wavelet.decode_tree_bf(
                root_size,
                &mut self.source,
                &mut self.prob_model,
                &mut self.integer_model,
                &mut self.gap_model,
                input,
            )?;
            let decoded = wavelet.message(&mut data)?;
            if decoded as u64 != section_size {
                return Err(BwError::MalformedStream("section length sum mismatch"));
            }
            self.end_context_block();
        }
        Ok(data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(data: &[u8], sections: Vec<u64>) {
        let mut out = OutStream::new(Box::new(std::io::sink()));
        WaveletEncoder::new('n')
            .encode_data(data, &sections, &mut out)
            .unwrap();
        let image = out.as_slice().to_vec();
        out.flush().unwrap();

        let mut input = InStream::new(Box::new(std::io::Cursor::new(image)));
        let decoded = WaveletDecoder::new('n')
            .decode_data(&sections, &mut input)
            .unwrap();
        assert_eq!(decoded, data);
        assert!(input.compressed_data_ending().unwrap());
    }

    #[test]
    fn single_symbol_section_round_trips() {
        round_trip(b"aaaaaaaa", vec![8]);
    }

    #[test]
    fn mixed_sections_round_trip() {
        let mut data = b"abracadabra".repeat(200).to_vec();
        data.extend_from_slice(&[0u8; 512]);
        let len = data.len() as u64;
        round_trip(&data, vec![len]);
        round_trip(&data, vec![1000, len - 1000]);
    }

    #[test]
    fn bwt_like_data_round_trips() {
        // Long same-byte stretches, the shape this coder is tuned for.
        let mut data = Vec::new();
        for i in 0..30u32 {
            data.extend(std::iter::repeat((i % 6) as u8 + b'a').take(700));
        }
        let len = data.len() as u64;
        round_trip(&data, vec![len]);
    }

    #[test]
    fn random_section_round_trips() {
        let mut state = 0xFEED_FACEu64;
        let data: Vec<u8> = (0..20_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 21) as u8
            })
            .collect();
        let len = data.len() as u64;
        round_trip(&data, vec![len]);
    }
}
