//! Optimized byte frequency counting for a slice of u8 data.
//!
//! Builds the 256-entry occurrence count of each byte in a block. Counting
//! is multi-threaded once the data is large enough to amortize the fork.

use rayon::prelude::*;

/// Returns a frequency count of the input data.
pub fn freqs(data: &[u8]) -> [u64; 256] {
    if data.len() > 64_000 {
        // 16k is pretty much the sweet spot for chunk size.
        data.par_chunks(16_000)
            .fold(
                || [0u64; 256],
                |mut counts, chunk| {
                    chunk.iter().for_each(|&el| counts[el as usize] += 1);
                    counts
                },
            )
            .reduce(
                || [0u64; 256],
                |mut total, partial| {
                    for (t, p) in total.iter_mut().zip(partial.iter()) {
                        *t += p;
                    }
                    total
                },
            )
    } else {
        let mut counts = [0u64; 256];
        data.iter().for_each(|&el| counts[el as usize] += 1);
        counts
    }
}

#[cfg(test)]
mod test {
    use super::freqs;

    #[test]
    fn counts_small_input() {
        let counts = freqs(b"abbccc");
        assert_eq!(counts[b'a' as usize], 1);
        assert_eq!(counts[b'b' as usize], 2);
        assert_eq!(counts[b'c' as usize], 3);
        assert_eq!(counts.iter().sum::<u64>(), 6);
    }

    #[test]
    fn parallel_path_matches_serial() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let parallel = freqs(&data);
        let mut serial = [0u64; 256];
        data.iter().for_each(|&el| serial[el as usize] += 1);
        assert_eq!(parallel, serial);
    }
}
