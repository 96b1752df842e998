//! Replacing the most common pairs.
//!
//! For each pair replaced with some symbol the header grows by three bytes.
//! Symbols can also be made free by escaping their occurrences with a
//! dedicated escape byte, so the freed values become usable as replacement
//! symbols. With f() as occurrence count, a pair P replaced by symbol x must
//! satisfy
//!
//! ```text
//!     f(x) + 3 < f(P)                                  (p1)
//! ```
//!
//! and freeing symbols x_i..x_j for pairs P_i..P_j behind escape byte e pays
//! off only when
//!
//! ```text
//!     sum k: f(P_k) - f(x_k) - 3 > f(e)                (p2)
//! ```

use log::info;

use crate::bitstream::InStream;
use crate::error::Result;

use super::freq_table::FreqTable;
use super::grammar::{Grammar, PassKind};

/// Count single byte and ordered 2-gram frequencies in one scan.
fn compute_pair_frequencies(data: &[u8]) -> ([u64; 256], Vec<(u16, u64)>) {
    let mut freqs = [0u64; 256];
    let mut pair_freqs: Vec<(u16, u64)> = (0..65536).map(|p| (p as u16, 0)).collect();
    let mut index = data[0] as u16;
    freqs[data[0] as usize] += 1;
    for &b in &data[1..] {
        freqs[b as usize] += 1;
        index = (index << 8) | b as u16;
        pair_freqs[index as usize].1 += 1;
    }
    (freqs, pair_freqs)
}

/// Pick the pairs worth replacing. A selected pair must not share its first
/// symbol with an earlier pair's second or vice versa; the optimal selection
/// is NP-hard, so a greedy sweep over the pairs in frequency order is used.
/// The frequency table is debited for every kept pair.
fn find_replaceable_pairs(
    pair_freqs: &mut Vec<(u16, u64)>,
    freqs: &mut FreqTable,
) -> Vec<(u16, u64)> {
    pair_freqs.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    let mut replaceable: Vec<(u16, u64)> = Vec::new();
    let mut current_symbol = 0usize;
    for &(pair, count) in pair_freqs.iter() {
        if replaceable.len() >= 254 {
            break;
        }
        let fst = (pair >> 8) as u8;
        let snd = (pair & 0xFF) as u8;
        if fst == snd {
            continue;
        }
        if !freqs.decrease(fst, count) {
            continue;
        }
        if !freqs.decrease(snd, count) {
            freqs.increase(fst, count);
            continue;
        }
        // Condition (p1): stop once the next replacement symbol costs more
        // than the pair saves.
        if freqs.get(current_symbol) + 3 >= count {
            freqs.increase(fst, count);
            freqs.increase(snd, count);
            break;
        }
        let conflict = replaceable.iter().any(|&(earlier, _)| {
            let earlier_fst = (earlier >> 8) as u8;
            let earlier_snd = (earlier & 0xFF) as u8;
            earlier_fst == snd || earlier_snd == fst
        });
        if conflict {
            freqs.increase(fst, count);
            freqs.increase(snd, count);
            continue;
        }
        replaceable.push((pair, count));
        current_symbol += 1;
    }
    replaceable
}

/// Index of the escape byte in the frequency table, or `free_symbols` when
/// freeing more symbols is not profitable. Pairs rejected while shrinking
/// get their frequency debits paid back.
fn escape_char_index(
    freqs: &mut FreqTable,
    suitable_pairs: &[(u16, u64)],
    free_symbols: usize,
) -> usize {
    if suitable_pairs.len() <= free_symbols {
        return free_symbols;
    }
    let mut utility: i64 = 0;
    for (i, &(_, count)) in suitable_pairs.iter().enumerate().skip(free_symbols) {
        utility += count as i64 - freqs.get(i) as i64 - 3;
    }
    // Condition (p2).
    let mut i = suitable_pairs.len();
    while utility <= freqs.get(i) as i64 && i > free_symbols {
        i -= 1;
        let (pair, count) = suitable_pairs[i];
        freqs.increase((pair >> 8) as u8, count);
        freqs.increase((pair & 0xFF) as u8, count);
        utility -= count as i64 - freqs.get(i) as i64 - 3;
    }
    i
}

/// Rewrite `from` through the 65536-entry replacement map. `common_byte`
/// marks untouched pairs and `escape_byte` pairs whose first byte must be
/// emitted escaped; anything else is the replacement symbol for the pair.
fn write_replacements(
    replacements: &[u8; 65536],
    from: &[u8],
    common_byte: u8,
    escape_byte: u8,
    freed: &[bool; 256],
    escaping: bool,
) -> Vec<u8> {
    let length = from.len();
    let mut to = Vec::with_capacity(length);
    let mut pair = from[0] as u16;
    let mut i = 1usize;
    loop {
        pair = (pair << 8) | from[i] as u16;
        let replacement = replacements[pair as usize];
        if replacement == common_byte {
            to.push(from[i - 1]);
        } else if replacement == escape_byte {
            to.push(escape_byte);
            to.push(from[i - 1]);
        } else {
            // The pair is replaced, consuming both bytes.
            to.push(replacement);
            if i == length - 1 {
                break;
            }
            i += 1;
            pair = from[i] as u16;
        }
        if i >= length - 1 {
            // A trailing freed symbol must be escaped or the inverse would
            // read it as a replacement.
            if escaping && freed[from[length - 1] as usize] {
                to.push(escape_byte);
            }
            to.push(from[length - 1]);
            break;
        }
        i += 1;
    }
    to
}

/// Replace the most common byte pairs of `data` with single byte values.
/// Returns the rewritten payload and records the pass header in `grammar`,
/// or `None` when the data is too short for pairs to exist.
pub fn compress_common_pairs(
    data: &[u8],
    escaping_allowed: bool,
    grammar: &mut Grammar,
) -> Option<Vec<u8>> {
    if data.len() < 2 {
        return None;
    }
    let (freq, mut pair_freqs) = compute_pair_frequencies(data);
    let mut freqs = FreqTable::new(&freq);

    let mut free_symbols = 0usize;
    while freqs.get(free_symbols) == 0 {
        free_symbols += 1;
    }

    let replaceable_pairs = find_replaceable_pairs(&mut pair_freqs, &mut freqs);

    let escape_index = if replaceable_pairs.len() > free_symbols {
        if escaping_allowed {
            escape_char_index(&mut freqs, &replaceable_pairs, free_symbols)
        } else {
            // Escaping disabled: pay back every candidate beyond the free
            // symbols, they will not be used.
            for i in (free_symbols..replaceable_pairs.len()).rev() {
                let (pair, count) = replaceable_pairs[i];
                freqs.increase((pair >> 8) as u8, count);
                freqs.increase((pair & 0xFF) as u8, count);
            }
            free_symbols
        }
    } else {
        free_symbols
    };

    let common_byte = freqs.key(255);
    let escape_byte = if escape_index > free_symbols {
        freqs.key(escape_index)
    } else {
        common_byte
    };

    let mut replacements = [common_byte; 65536];
    let mut freed = [false; 256];
    let mut header: Vec<u8> = Vec::new();

    let candidates = replaceable_pairs.len();
    let mut k = 0usize;
    while k < free_symbols.min(candidates) {
        let (pair, _) = replaceable_pairs[k];
        replacements[pair as usize] = freqs.key(k);
        grammar.add_rule(freqs.key(k));
        header.push(freqs.key(k));
        header.push((pair >> 8) as u8);
        header.push((pair & 0xFF) as u8);
        k += 1;
    }
    let mut symbols_in_use = k;

    if free_symbols < escape_index {
        // Route every pair starting with a freed symbol through the escape
        // byte, then hand the freed symbol to the next candidate pair.
        for i in free_symbols..=escape_index {
            let first = freqs.key(i) as u16;
            freed[first as usize] = true;
            grammar.add_special(freqs.key(i));
            for second in 0..256u16 {
                let pair_value = (first << 8) | second;
                if replacements[pair_value as usize] == common_byte {
                    replacements[pair_value as usize] = escape_byte;
                }
            }
            if i < escape_index {
                let (pair, _) = replaceable_pairs[i];
                replacements[pair as usize] = freqs.key(i);
                grammar.add_rule(freqs.key(i));
                header.push(freqs.key(i));
                header.push((pair >> 8) as u8);
                header.push((pair & 0xFF) as u8);
            }
        }
        symbols_in_use += escape_index - free_symbols + 1;
    }

    let new_symbols = if free_symbols == escape_index {
        0
    } else {
        symbols_in_use - free_symbols
    };

    // The dummy byte repeats the last replacement symbol, which no real rule
    // can do, and thereby ends the rule list.
    let dummy = if new_symbols > 0 {
        freqs.key(escape_index - 1)
    } else if symbols_in_use > 0 {
        freqs.key(symbols_in_use - 1)
    } else {
        escape_byte.wrapping_add(1)
    };
    header.push(dummy);
    if free_symbols < escape_index {
        header.push(escape_byte);
    } else {
        header.push(dummy);
        if symbols_in_use == 0 {
            header.push(dummy);
        }
    }

    info!(
        "Replacing {} pairs. {}",
        if new_symbols > 0 {
            symbols_in_use - 1
        } else {
            symbols_in_use
        },
        if new_symbols > 0 {
            format!("Made {} symbols free.", new_symbols)
        } else {
            "No symbols made free.".to_string()
        }
    );

    let escaping = new_symbols > 0;
    let payload = write_replacements(
        &replacements,
        data,
        common_byte,
        escape_byte,
        &freed,
        escaping,
    );
    debug_assert!(header.len() + payload.len() <= data.len() + 3);
    grammar.record_pass(PassKind::Pairs, header);
    Some(payload)
}

/// Parsed pair-replacement header, ready to undo the rewrite.
pub struct PairInverse {
    rules: [Option<(u8, u8)>; 256],
    escaping: bool,
    escape: u8,
}

impl PairInverse {
    /// Consume one self-terminating pair header from the stream.
    pub fn parse(input: &mut InStream) -> Result<Self> {
        let mut rules: [Option<(u8, u8)>; 256] = [None; 256];
        let first = input.read_byte()?;
        let second = input.read_byte()?;
        let third = input.read_byte()?;
        if first == second && second == third {
            // No replacements: three dummies in a row. A real rule can
            // repeat its variable as the pair's first byte, but never have
            // equal pair halves on top of that.
            return Ok(Self {
                rules,
                escaping: false,
                escape: 0,
            });
        }
        rules[first as usize] = Some((second, third));
        let mut prev = first;
        loop {
            let symbol = input.read_byte()?;
            if symbol == prev {
                // Dummy byte: the rule list has ended.
                let tail = input.read_byte()?;
                if tail == symbol {
                    return Ok(Self {
                        rules,
                        escaping: false,
                        escape: 0,
                    });
                }
                return Ok(Self {
                    rules,
                    escaping: true,
                    escape: tail,
                });
            }
            let fst = input.read_byte()?;
            let snd = input.read_byte()?;
            rules[symbol as usize] = Some((fst, snd));
            prev = symbol;
        }
    }

    /// Expand the rewritten payload back to its source form.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() * 2);
        let mut i = 0usize;
        while i < data.len() {
            let b = data[i];
            if self.escaping && b == self.escape && i + 1 < data.len() {
                out.push(data[i + 1]);
                i += 2;
            } else if let Some((fst, snd)) = self.rules[b as usize] {
                out.push(fst);
                out.push(snd);
                i += 1;
            } else {
                out.push(b);
                i += 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitstream::InStream;
    use crate::preprocessors::grammar::Grammar;

    fn round_trip(data: &[u8], escaping: bool) -> usize {
        let mut grammar = Grammar::new();
        let payload = match compress_common_pairs(data, escaping, &mut grammar) {
            Some(p) => p,
            None => return data.len(),
        };
        let header = grammar.passes()[0].header.clone();
        let mut input = InStream::new(Box::new(std::io::Cursor::new(header)));
        let inverse = PairInverse::parse(&mut input).unwrap();
        assert_eq!(inverse.apply(&payload), data);
        payload.len()
    }

    #[test]
    fn repeated_pair_shrinks_and_restores() {
        let data: Vec<u8> = b"ab".repeat(512);
        let compressed = round_trip(&data, true);
        assert!(compressed < data.len() / 2 + 16);
    }

    #[test]
    fn short_and_uniform_inputs_survive() {
        round_trip(b"", true);
        round_trip(b"a", true);
        round_trip(b"ab", true);
        round_trip(&[7u8; 100], true);
    }

    #[test]
    fn all_bytes_present_forces_escaping() {
        // Every byte value occurs, so replacements require freed symbols.
        let mut data = Vec::new();
        for round in 0..64 {
            for b in 0..=255u8 {
                data.push(b);
                if round % 2 == 0 {
                    data.push(b.wrapping_add(1));
                }
            }
        }
        round_trip(&data, true);
        round_trip(&data, false);
    }

    #[test]
    fn trailing_freed_symbol_round_trips() {
        // Craft data whose last byte is rare enough to end up freed.
        let mut data: Vec<u8> = b"qw".repeat(4000);
        for b in 0..=255u8 {
            data.push(b);
        }
        data.push(3);
        round_trip(&data, true);
    }

    #[test]
    fn selected_pairs_share_no_conflicting_symbols() {
        let mut data: Vec<u8> = Vec::new();
        for _ in 0..2000 {
            data.extend_from_slice(b"abcdbcab");
        }
        let (freq, mut pair_freqs) = compute_pair_frequencies(&data);
        let mut freqs = FreqTable::new(&freq);
        let selected = find_replaceable_pairs(&mut pair_freqs, &mut freqs);
        for (i, &(a, _)) in selected.iter().enumerate() {
            for &(b, _) in &selected[i + 1..] {
                let (a_fst, a_snd) = ((a >> 8) as u8, (a & 0xFF) as u8);
                let (b_fst, b_snd) = ((b >> 8) as u8, (b & 0xFF) as u8);
                assert!(a_fst != b_snd && a_snd != b_fst);
            }
        }
    }

    #[test]
    fn random_bytes_round_trip() {
        let mut state = 0x9E37_79B9u64;
        let data: Vec<u8> = (0..50_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect();
        round_trip(&data, true);
    }
}
