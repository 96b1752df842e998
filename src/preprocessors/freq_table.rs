/// Byte frequency table ordered by count.
///
/// Keeps 256 `(byte, count)` pairs sorted ascending by count together with a
/// reverse index giving every byte's current sorted position, so the
/// preprocessors can ask both "how common is byte x" and "which byte is the
/// k-th rarest" in constant time. Both structures are maintained atomically
/// by the three mutators.
pub struct FreqTable {
    freq: [(u8, u64); 256],
    location: [usize; 256],
}

impl FreqTable {
    pub fn new(frequencies: &[u64; 256]) -> Self {
        let mut freq = [(0u8, 0u64); 256];
        for (i, pair) in freq.iter_mut().enumerate() {
            *pair = (i as u8, frequencies[i]);
        }
        freq.sort_by_key(|&(_, count)| count);
        let mut table = Self {
            freq,
            location: [0; 256],
        };
        table.init_locations();
        table
    }

    fn init_locations(&mut self) {
        for (i, &(key, _)) in self.freq.iter().enumerate() {
            self.location[key as usize] = i;
        }
    }

    /// Count at the i-th slot; slot 0 holds the minimum.
    pub fn get(&self, i: usize) -> u64 {
        self.freq[i].1
    }

    /// Byte occupying the i-th slot.
    pub fn key(&self, i: usize) -> u8 {
        self.freq[i].0
    }

    /// Add `value` to the count of `key`, bubbling the entry up while it is
    /// out of order.
    pub fn increase(&mut self, key: u8, value: u64) {
        let mut freq_index = self.location[key as usize];
        let new_value = self.freq[freq_index].1 + value;
        let new_pair = (self.freq[freq_index].0, new_value);

        while freq_index < 255 && new_value > self.freq[freq_index + 1].1 {
            self.location[self.freq[freq_index + 1].0 as usize] -= 1;
            self.freq[freq_index] = self.freq[freq_index + 1];
            freq_index += 1;
        }
        self.freq[freq_index] = new_pair;
        self.location[new_pair.0 as usize] = freq_index;
        debug_assert_eq!(self.freq[self.location[new_pair.0 as usize]].0, new_pair.0);
    }

    /// Subtract `value` from the count of `key`. Returns false and leaves the
    /// table untouched when the count is smaller than `value`.
    pub fn decrease(&mut self, key: u8, value: u64) -> bool {
        let mut freq_index = self.location[key as usize];
        if self.freq[freq_index].1 < value {
            return false;
        }
        let new_value = self.freq[freq_index].1 - value;
        let new_pair = (self.freq[freq_index].0, new_value);

        while freq_index > 0 && new_value < self.freq[freq_index - 1].1 {
            self.location[self.freq[freq_index - 1].0 as usize] += 1;
            self.freq[freq_index] = self.freq[freq_index - 1];
            freq_index -= 1;
        }
        self.freq[freq_index] = new_pair;
        self.location[new_pair.0 as usize] = freq_index;
        debug_assert_eq!(self.freq[self.location[new_pair.0 as usize]].0, new_pair.0);
        true
    }

    #[cfg(test)]
    fn check(&self) {
        for i in 0..256 {
            assert_eq!(self.location[self.freq[i].0 as usize], i);
        }
        for i in 1..256 {
            assert!(self.freq[i - 1].1 <= self.freq[i].1);
        }
    }
}

#[cfg(test)]
mod test {
    use super::FreqTable;

    fn sample_counts() -> [u64; 256] {
        let mut counts = [0u64; 256];
        counts[b'a' as usize] = 40;
        counts[b'b' as usize] = 10;
        counts[b'c' as usize] = 25;
        counts[b'z' as usize] = 1;
        counts
    }

    #[test]
    fn sorted_with_reverse_index() {
        let table = FreqTable::new(&sample_counts());
        table.check();
        // The four non-zero bytes occupy the top four slots.
        assert_eq!(table.key(255), b'a');
        assert_eq!(table.key(254), b'c');
        assert_eq!(table.key(253), b'b');
        assert_eq!(table.key(252), b'z');
        assert_eq!(table.get(0), 0);
    }

    #[test]
    fn increase_bubbles_up() {
        let mut table = FreqTable::new(&sample_counts());
        table.increase(b'z', 100);
        table.check();
        assert_eq!(table.key(255), b'z');
    }

    #[test]
    fn decrease_bubbles_down() {
        let mut table = FreqTable::new(&sample_counts());
        assert!(table.decrease(b'a', 39));
        table.check();
        assert_eq!(table.key(255), b'c');
    }

    #[test]
    fn failed_decrease_leaves_table_untouched() {
        let mut table = FreqTable::new(&sample_counts());
        let before_freq = table.freq;
        let before_loc = table.location;
        assert!(!table.decrease(b'b', 11));
        assert_eq!(table.freq, before_freq);
        assert_eq!(table.location, before_loc);
    }

    #[test]
    fn invariants_hold_under_mixed_traffic() {
        let mut counts = [0u64; 256];
        let mut state = 0x2545_F491u64;
        for c in counts.iter_mut() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            *c = state % 1000;
        }
        let mut table = FreqTable::new(&counts);
        for round in 0..2000u64 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let key = (state % 256) as u8;
            let delta = state % 97;
            if round % 3 == 0 {
                table.decrease(key, delta);
            } else {
                table.increase(key, delta);
            }
        }
        table.check();
    }
}
