//! Replacing runs of a repeated byte.
//!
//! Candidate replacements are runs whose length is a power of two between 2
//! and 2^15; longer or odd runs contribute to several power-of-two buckets.
//! Selection walks the candidates most profitable first, where the profit of
//! replacing a run of length L occurring f times is (L-1)*f, against the
//! same symbol-cost conditions the pair replacer uses.

use log::info;

use crate::bitstream::InStream;
use crate::error::Result;

use std::collections::BTreeMap;

use super::freq_table::FreqTable;
use super::grammar::{Grammar, PassKind};

/// Longest run treated as one unit; longer runs are split.
const MAX_RUN_LENGTH: u32 = 1 << 15;

#[derive(Debug, Clone, Copy)]
struct Triple {
    symbol: u8,
    length: u32,
    frequency: u64,
}

impl Triple {
    /// Bytes saved per replacement times occurrences: the selection order.
    fn profit(&self) -> u64 {
        (self.length as u64 - 1) * self.frequency
    }
}

/// Floor of the base-two logarithm.
fn log_floor(mut n: u32) -> u8 {
    debug_assert!(n > 0);
    let mut log = 0;
    while n > 1 {
        n >>= 1;
        log += 1;
    }
    log
}

fn most_significant_bit(mut n: u32) -> u32 {
    debug_assert!(n < (1 << 16));
    n |= n >> 1;
    n |= n >> 2;
    n |= n >> 4;
    n |= n >> 8;
    n & !(n >> 1)
}

/// Credit the power-of-two buckets a run of `length` contributes to.
fn update_freqs(run_freq: &mut BTreeMap<u32, u64>, mut length: u32) {
    debug_assert!(length > 1 && length <= MAX_RUN_LENGTH);
    length -= length % 2;
    let original = length;
    while length > 0 {
        let longest = most_significant_bit(length);
        *run_freq.entry(longest).or_insert(0) += (original / longest) as u64;
        length -= longest;
    }
}

/// One scan collecting byte frequencies and per-symbol run buckets.
fn compute_run_frequencies(data: &[u8]) -> ([u64; 256], Vec<BTreeMap<u32, u64>>) {
    let mut freqs = [0u64; 256];
    let mut run_freq: Vec<BTreeMap<u32, u64>> = vec![BTreeMap::new(); 256];
    let mut prev = data[0];
    let mut run_length: u32 = 1;
    freqs[prev as usize] += 1;
    for &b in &data[1..] {
        if b == prev && run_length < MAX_RUN_LENGTH {
            run_length += 1;
        } else {
            if run_length > 1 {
                update_freqs(&mut run_freq[prev as usize], run_length);
            }
            prev = b;
            run_length = 1;
        }
        freqs[b as usize] += 1;
    }
    if run_length > 1 {
        update_freqs(&mut run_freq[prev as usize], run_length);
    }
    (freqs, run_freq)
}

/// Max-heap over run triples with a per-symbol index of heap positions.
///
/// Popping the best triple consumes every same-symbol triple of greater or
/// equal length and discounts the shorter ones, whose counted occurrences
/// partly live inside the popped runs. The heap and the location maps are
/// kept in sync by every mutator.
struct SequenceHeap {
    seqs: Vec<Triple>,
    locations: Vec<BTreeMap<u32, usize>>,
    last: isize,
}

impl SequenceHeap {
    fn new(sequences: Vec<Triple>) -> Self {
        let mut heap = Self {
            last: sequences.len() as isize - 1,
            seqs: sequences,
            locations: vec![BTreeMap::new(); 256],
        };
        for (i, t) in heap.seqs.iter().enumerate() {
            heap.locations[t.symbol as usize].insert(t.length, i);
        }
        heap.build_max_heap();
        heap
    }

    fn is_empty(&self) -> bool {
        self.last < 0
    }

    fn delete_max(&mut self) -> Triple {
        let max = self.seqs[0];
        // Update or delete the sequences of the same byte. The key set of
        // the location map does not change underneath us, only the indices.
        let lengths: Vec<u32> = self.locations[max.symbol as usize].keys().copied().collect();
        for length in lengths {
            let index = self.locations[max.symbol as usize][&length];
            if length >= max.length {
                self.delete(index);
            } else {
                self.decrease(index, (max.length / length) as u64 * max.frequency);
            }
        }
        max
    }

    fn decrease(&mut self, index: usize, value: u64) {
        if index as isize > self.last {
            return;
        }
        self.seqs[index].frequency = self.seqs[index].frequency.saturating_sub(value);
        self.heapify(index as isize);
    }

    fn delete(&mut self, index: usize) {
        if index as isize > self.last {
            return;
        }
        let last = self.last as usize;
        let gone = self.seqs[index];
        let moved = self.seqs[last];
        if let Some(slot) = self.locations[gone.symbol as usize].get_mut(&gone.length) {
            *slot = last;
        }
        if let Some(slot) = self.locations[moved.symbol as usize].get_mut(&moved.length) {
            *slot = index;
        }
        self.seqs.swap(index, last);
        self.last -= 1;
        self.heapify(index as isize);
    }

    fn swap_entries(&mut self, a: usize, b: usize) {
        let ta = self.seqs[a];
        let tb = self.seqs[b];
        if let Some(slot) = self.locations[ta.symbol as usize].get_mut(&ta.length) {
            *slot = b;
        }
        if let Some(slot) = self.locations[tb.symbol as usize].get_mut(&tb.length) {
            *slot = a;
        }
        self.seqs.swap(a, b);
    }

    fn heapify(&mut self, mut i: isize) {
        let mut l = 2 * i + 1;
        let mut r = 2 * i + 2;
        while r <= self.last {
            let largest = if self.seqs[l as usize].profit() > self.seqs[r as usize].profit() {
                l
            } else {
                r
            };
            if self.seqs[i as usize].profit() < self.seqs[largest as usize].profit() {
                self.swap_entries(i as usize, largest as usize);
                i = largest;
                l = 2 * i + 1;
                r = 2 * i + 2;
            } else {
                return;
            }
        }
        if l == self.last && self.seqs[i as usize].profit() < self.seqs[l as usize].profit() {
            self.swap_entries(i as usize, l as usize);
        }
    }

    fn build_max_heap(&mut self) {
        if self.last <= 0 {
            return;
        }
        for i in (0..=((self.last - 1) / 2)).rev() {
            self.heapify(i);
        }
    }
}

fn find_replaceable_runs(runs: Vec<Triple>, freqs: &mut FreqTable) -> Vec<Triple> {
    let cap = runs.len().min(254);
    let mut heap = SequenceHeap::new(runs);
    let mut longest: Vec<Triple> = Vec::new();
    let mut current_symbol = 0usize;
    while longest.len() < cap && !heap.is_empty() {
        let best = heap.delete_max();
        let _ = freqs.decrease(best.symbol, best.length as u64 * best.frequency);
        if freqs.get(current_symbol) + 3 >= best.profit() {
            break;
        }
        longest.push(best);
        current_symbol += 1;
    }
    longest
}

fn escape_char_index(freqs: &mut FreqTable, runs: &[Triple], free_symbols: usize) -> usize {
    if runs.len() <= free_symbols {
        return free_symbols;
    }
    let mut utility: i64 = 0;
    for (i, run) in runs.iter().enumerate().skip(free_symbols) {
        utility += run.profit() as i64 - freqs.get(i) as i64 - 3;
    }
    let mut i = runs.len();
    while utility <= freqs.get(i) as i64 && i > free_symbols {
        i -= 1;
        freqs.increase(runs[i].symbol, runs[i].profit());
        utility -= runs[i].profit() as i64 - freqs.get(i) as i64 - 3;
    }
    i
}

/// Emit the replacement image of one maximal run, longest chosen length
/// first. A freed symbol's leftover singletons ride behind the escape byte.
fn write_run_replacement(
    replacements: &BTreeMap<u32, u8>,
    mut run_length: u32,
    escaping: bool,
    escape: u8,
    symbol: u8,
    to: &mut Vec<u8>,
) {
    for (&length, &value) in replacements.iter().rev() {
        if run_length == 0 {
            break;
        }
        let times = run_length / length;
        if length == 1 && escaping && value == escape {
            for _ in 0..times {
                to.push(escape);
                to.push(symbol);
            }
            break;
        }
        for _ in 0..times {
            to.push(value);
        }
        run_length -= times * length;
    }
}

fn write_replacements(
    replacements: &[BTreeMap<u32, u8>; 256],
    from: &[u8],
    escape: u8,
    escaping: bool,
) -> Vec<u8> {
    let mut to = Vec::with_capacity(from.len());
    let mut prev = from[0];
    let mut run_length: u32 = 1;
    for &b in &from[1..] {
        if prev == b && run_length < MAX_RUN_LENGTH {
            run_length += 1;
        } else {
            write_run_replacement(
                &replacements[prev as usize],
                run_length,
                escaping,
                escape,
                prev,
                &mut to,
            );
            prev = b;
            run_length = 1;
        }
    }
    write_run_replacement(
        &replacements[prev as usize],
        run_length,
        escaping,
        escape,
        prev,
        &mut to,
    );
    to
}

/// Replace long runs of equal bytes with single byte values. Returns the
/// rewritten payload and records the pass header in `grammar`.
pub fn compress_long_runs(
    data: &[u8],
    escaping_allowed: bool,
    grammar: &mut Grammar,
) -> Option<Vec<u8>> {
    if data.is_empty() {
        return None;
    }
    let (freq, run_freq) = compute_run_frequencies(data);
    let mut freqs = FreqTable::new(&freq);

    let mut free_symbols = 0usize;
    while freqs.get(free_symbols) == 0 {
        free_symbols += 1;
    }

    let mut runs: Vec<Triple> = Vec::with_capacity(256);
    for (symbol, buckets) in run_freq.iter().enumerate() {
        for (&length, &frequency) in buckets {
            debug_assert!(length > 1 && frequency > 0);
            runs.push(Triple {
                symbol: symbol as u8,
                length,
                frequency,
            });
        }
    }
    let longest_runs = find_replaceable_runs(runs, &mut freqs);

    let escape_index = if longest_runs.len() > free_symbols {
        if escaping_allowed {
            escape_char_index(&mut freqs, &longest_runs, free_symbols)
        } else {
            for run in longest_runs[free_symbols..].iter().rev() {
                freqs.increase(run.symbol, run.profit());
            }
            free_symbols
        }
    } else {
        free_symbols
    };

    let new_symbols = if escape_index == free_symbols {
        0
    } else {
        escape_index - free_symbols + 1
    };
    let symbols_in_use = if new_symbols > 0 {
        escape_index + 1
    } else {
        free_symbols.min(longest_runs.len())
    };
    let run_replacements = if new_symbols > 0 {
        symbols_in_use - 1
    } else {
        symbols_in_use
    };

    info!(
        "Replacing {} runs. {}",
        run_replacements,
        if new_symbols > 0 {
            format!("Made {} symbols free.", new_symbols)
        } else {
            "No symbols made free.".to_string()
        }
    );

    let escape_byte = freqs.key(escape_index);
    let mut header: Vec<u8> = Vec::new();

    if symbols_in_use > 0 {
        // Rules ride in pairs of five bytes; the two 4-bit length logs share
        // one byte.
        let limit = run_replacements - (run_replacements % 2);
        for i in (0..limit).step_by(2) {
            header.push(freqs.key(i));
            debug_assert!(longest_runs[i].length <= MAX_RUN_LENGTH);
            debug_assert!(longest_runs[i + 1].length <= MAX_RUN_LENGTH);
            let lengths = (log_floor(longest_runs[i].length) << 4) | log_floor(longest_runs[i + 1].length);
            header.push(lengths);
            header.push(longest_runs[i].symbol);
            header.push(freqs.key(i + 1));
            header.push(longest_runs[i + 1].symbol);
            grammar.add_rule(freqs.key(i));
            grammar.add_rule(freqs.key(i + 1));
        }
        let sentinel = if escape_index != free_symbols {
            escape_byte
        } else {
            freqs.key(symbols_in_use - 1)
        };
        if run_replacements != limit {
            header.push(freqs.key(limit));
            header.push(log_floor(longest_runs[limit].length) << 4);
            header.push(longest_runs[limit].symbol);
            header.push(sentinel);
            grammar.add_rule(freqs.key(limit));
        } else {
            header.push(sentinel);
            header.push(0);
        }
    } else {
        // No replacements being made.
        header.push(0);
        header.push(0);
    }

    // Replacement table: identity for singletons, escape for freed symbols,
    // the chosen variables for the selected run lengths.
    let mut replacements: [BTreeMap<u32, u8>; 256] = std::array::from_fn(|i| {
        let mut map = BTreeMap::new();
        map.insert(1u32, i as u8);
        map
    });
    if new_symbols > 0 {
        for i in free_symbols..=escape_index {
            replacements[freqs.key(i) as usize].insert(1, escape_byte);
            grammar.add_special(freqs.key(i));
        }
    }
    for (i, run) in longest_runs.iter().take(run_replacements).enumerate() {
        replacements[run.symbol as usize].insert(run.length, freqs.key(i));
    }

    let payload = write_replacements(&replacements, data, escape_byte, new_symbols > 0);
    debug_assert!(header.len() + payload.len() <= data.len() + 3);
    grammar.record_pass(PassKind::Runs, header);
    Some(payload)
}

/// Parsed run-replacement header, ready to undo the rewrite.
pub struct RunInverse {
    rules: [Option<(u32, u8)>; 256],
    escaping: bool,
    escape: u8,
}

impl RunInverse {
    /// Consume one self-terminating run header from the stream.
    pub fn parse(input: &mut InStream) -> Result<Self> {
        let mut rules: [Option<(u32, u8)>; 256] = [None; 256];
        let mut any_rules = false;
        let sentinel;
        loop {
            let first = input.read_byte()?;
            let lengths = input.read_byte()?;
            if lengths == 0 {
                sentinel = first;
                break;
            }
            let log1 = lengths >> 4;
            let log2 = lengths & 0x0F;
            let orig1 = input.read_byte()?;
            rules[first as usize] = Some((1u32 << log1, orig1));
            any_rules = true;
            if log2 == 0 {
                // Odd rule count: the sentinel follows immediately.
                sentinel = input.read_byte()?;
                break;
            }
            let second = input.read_byte()?;
            let orig2 = input.read_byte()?;
            rules[second as usize] = Some((1u32 << log2, orig2));
        }
        // The sentinel repeats the last variable unless it names an escape
        // byte, which is never a variable itself.
        let escaping = any_rules && rules[sentinel as usize].is_none();
        Ok(Self {
            rules,
            escaping,
            escape: sentinel,
        })
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
            } else if let Some((length, symbol)) = self.rules[b as usize] {
                out.resize(out.len() + length as usize, symbol);
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
        let payload = match compress_long_runs(data, escaping, &mut grammar) {
            Some(p) => p,
            None => return data.len(),
        };
        let header = grammar.passes()[0].header.clone();
        let mut input = InStream::new(Box::new(std::io::Cursor::new(header)));
        let inverse = RunInverse::parse(&mut input).unwrap();
        assert_eq!(inverse.apply(&payload), data);
        payload.len()
    }

    #[test]
    fn two_half_blocks_get_two_rules() {
        let mut data = vec![b'a'; 32768];
        data.extend(std::iter::repeat(b'b').take(32768));
        let mut grammar = Grammar::new();
        let payload = compress_long_runs(&data, true, &mut grammar).unwrap();
        assert_eq!(grammar.number_of_rules(), 2);
        // Two replacement bytes plus a seven byte header beats 64k easily.
        assert!(payload.len() + grammar.passes()[0].header.len() < data.len() / 100);
        let header = grammar.passes()[0].header.clone();
        let mut input = InStream::new(Box::new(std::io::Cursor::new(header)));
        let inverse = RunInverse::parse(&mut input).unwrap();
        assert_eq!(inverse.apply(&payload), data);
    }

    #[test]
    fn mixed_runs_round_trip() {
        let mut data = Vec::new();
        for i in 0..200u32 {
            let b = (i % 7) as u8 + b'a';
            data.extend(std::iter::repeat(b).take((i % 300 + 1) as usize));
        }
        round_trip(&data, true);
        round_trip(&data, false);
    }

    #[test]
    fn run_free_data_costs_two_bytes() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut grammar = Grammar::new();
        let payload = compress_long_runs(&data, true, &mut grammar).unwrap();
        assert_eq!(payload, data);
        assert_eq!(grammar.passes()[0].header, vec![0, 0]);
    }

    #[test]
    fn very_long_run_splits_and_survives() {
        let data = vec![b'x'; 100_000];
        round_trip(&data, true);
        round_trip(&data, false);
    }

    #[test]
    fn update_freqs_decomposes_msb_first() {
        let mut buckets = BTreeMap::new();
        update_freqs(&mut buckets, 6);
        // 6 -> components 4 and 2, each credited floor(6/len) times.
        assert_eq!(buckets[&4], 1);
        assert_eq!(buckets[&2], 3);
    }

    #[test]
    fn heap_pops_by_profit_and_consumes_same_symbol() {
        let runs = vec![
            Triple { symbol: b'a', length: 8, frequency: 100 },
            Triple { symbol: b'a', length: 2, frequency: 500 },
            Triple { symbol: b'b', length: 4, frequency: 50 },
        ];
        let mut heap = SequenceHeap::new(runs);
        let first = heap.delete_max();
        assert_eq!((first.symbol, first.length), (b'a', 8));
        // The shorter a-run lost floor(8/2)*100 of its counted occurrences.
        let second = heap.delete_max();
        assert_eq!((second.symbol, second.length), (b'b', 4));
        let third = heap.delete_max();
        assert_eq!((third.symbol, third.length), (b'a', 2));
        assert_eq!(third.frequency, 100);
        assert!(heap.is_empty());
    }

    #[test]
    fn random_data_round_trips() {
        let mut state = 0x1234_5678u64;
        let data: Vec<u8> = (0..40_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 16) as u8 % 4
            })
            .collect();
        round_trip(&data, true);
    }
}
