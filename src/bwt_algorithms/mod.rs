//! The Burrows-Wheeler transform over one block slice.
//!
//! The forward direction appends a sentinel, orders the suffixes of the
//! extended block and reads the permuted bytes off the suffix array. With
//! the sentinel sitting at the end, plain slice comparison produces exactly
//! the sentinel-augmented suffix order: whenever a comparison runs into the
//! sentinel byte, that suffix is the shorter one and shorter sorts first,
//! which is the same verdict as treating the sentinel as the unique
//! smallest character. So no wraparound logic is needed even when the data
//! itself contains zero bytes.

use log::info;
use rayon::prelude::*;

use crate::error::{BwError, Result};

/// Slices above this use the parallel sort.
const PAR_SORT_THRESHOLD: usize = 40_000;

/// Transform `data`, returning the permuted block (one byte longer than the
/// input, the sentinel rides along as a zero) and the LF powers: the
/// rotation indices anchoring the inverse, here the single rank of the
/// sentinel row.
pub fn forward(data: &[u8]) -> (Vec<u8>, Vec<u32>) {
    let n = data.len();
    debug_assert!(n + 1 < (1 << 31));
    let mut extended = Vec::with_capacity(n + 1);
    extended.extend_from_slice(data);
    extended.push(0);

    let mut index: Vec<u32> = (0..=n as u32).collect();
    if n > PAR_SORT_THRESHOLD {
        index.par_sort_unstable_by(|&a, &b| extended[a as usize..].cmp(&extended[b as usize..]));
    } else {
        index.sort_unstable_by(|&a, &b| extended[a as usize..].cmp(&extended[b as usize..]));
    }

    let mut key = 0u32;
    let mut bwt = vec![0u8; n + 1];
    for (i, &suffix) in index.iter().enumerate() {
        if suffix == 0 {
            key = i as u32;
            bwt[i] = extended[n];
        } else {
            bwt[i] = extended[suffix as usize - 1];
        }
    }
    info!("Transformed {} bytes, sentinel row {}.", n, key);
    (bwt, vec![key])
}

/// Invert a permuted block. `bwt` carries the sentinel byte at row `key`;
/// the returned data excludes it.
pub fn inverse(bwt: &[u8], key: u32) -> Result<Vec<u8>> {
    let len = bwt.len();
    let sentinel = key as usize;
    if len == 0 || sentinel >= len {
        return Err(BwError::MalformedStream("rotation index out of range"));
    }
    let n = len - 1;

    // Cumulative counts place each byte class behind the sentinel row.
    let mut counts = [0u32; 256];
    for (i, &b) in bwt.iter().enumerate() {
        if i != sentinel {
            counts[b as usize] += 1;
        }
    }
    let mut starts = [0u32; 256];
    let mut sum = 1u32;
    for c in 0..256 {
        starts[c] = sum;
        sum += counts[c];
    }

    // The LF chain: following it from the sentinel row walks the original
    // block back to front.
    let mut lf = vec![0u32; len];
    for (i, &b) in bwt.iter().enumerate() {
        if i == sentinel {
            lf[i] = 0;
        } else {
            lf[i] = starts[b as usize];
            starts[b as usize] += 1;
        }
    }

    let mut data = vec![0u8; n];
    let mut row = sentinel;
    for slot in data.iter_mut().rev() {
        row = lf[row] as usize;
        *slot = bwt[row];
    }
    Ok(data)
}

#[cfg(test)]
mod test {
    use super::{forward, inverse};

    fn round_trip(data: &[u8]) {
        let (bwt, powers) = forward(data);
        assert_eq!(bwt.len(), data.len() + 1);
        assert_eq!(powers.len(), 1);
        let restored = inverse(&bwt, powers[0]).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn known_transform() {
        // banana: rotations of "banana$" sorted put the last column here.
        let (bwt, powers) = forward(b"banana");
        assert_eq!(powers[0], 4);
        let mut expected = b"annb".to_vec();
        expected.push(0);
        expected.extend_from_slice(b"aa");
        assert_eq!(bwt, expected);
    }

    #[test]
    fn clusters_equal_bytes() {
        let (bwt, _) = forward(b"abababab");
        // All b's end up adjacent ahead of the a block.
        let joined: Vec<u8> = bwt.into_iter().filter(|&b| b != 0).collect();
        assert_eq!(&joined[..4], b"bbbb");
    }

    #[test]
    fn round_trips_edge_shapes() {
        round_trip(b"");
        round_trip(b"x");
        round_trip(b"ab");
        round_trip(b"aaaaaaaa");
        round_trip(b"baaabaaabcb");
        round_trip(b"mississippi river banks");
    }

    #[test]
    fn round_trips_embedded_zero_bytes() {
        round_trip(&[0, 0, 0]);
        round_trip(&[5, 0, 5, 0, 0, 9]);
        round_trip(&[0, 1, 0, 0, 2, 0, 0, 0, 3]);
    }

    #[test]
    fn round_trips_random_blocks() {
        let mut state = 0xDEAD_BEEFu64;
        for size in [100usize, 1000, 50_000] {
            let data: Vec<u8> = (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 32) as u8
                })
                .collect();
            round_trip(&data);
        }
    }

    #[test]
    fn rejects_bad_rotation_index() {
        let (bwt, _) = forward(b"abc");
        assert!(inverse(&bwt, bwt.len() as u32).is_err());
    }
}
