use crate::bitstream::{InStream, OutStream};
use crate::error::Result;

use super::models::Probability;

const TOP: u32 = 1 << 24;
const BOTTOM: u32 = 1 << 16;

/// Binary range coder.
///
/// State is a 32-bit `low` and a 32-bit `range`; every coded bit splits the
/// range at `(range >> 16) * p` where `p` is the scaled probability of a one
/// bit. Renormalization emits a byte whenever the top byte of the interval is
/// settled; when the range drops under 2^16 without settling, the range is
/// clamped to the distance to the next 2^16 boundary, which keeps the
/// interval carry-free. The decoder mirrors every emission, so the byte
/// streams of both sides stay in lockstep.
pub struct BitEncoder {
    low: u32,
    range: u32,
    counter: u64,
}

impl Default for BitEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BitEncoder {
    pub fn new() -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            counter: 0,
        }
    }

    /// Number of bytes emitted since the last `reset_counter`.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    /// Encode one bit with the given scaled probability of one.
    pub fn encode(&mut self, bit: bool, probability_of_one: Probability, out: &mut OutStream) {
        debug_assert!(probability_of_one >= 1);
        let bound = (self.range >> 16) * probability_of_one as u32;
        if bit {
            self.range = bound;
        } else {
            self.low = self.low.wrapping_add(bound);
            self.range -= bound;
        }
        while (self.low ^ self.low.wrapping_add(self.range)) < TOP || self.range < BOTTOM {
            if (self.low ^ self.low.wrapping_add(self.range)) >= TOP {
                // Top byte undecided but the range ran dry: clamp the range
                // up to the next 2^16 boundary so no carry can occur.
                self.range = self.low.wrapping_neg() & (BOTTOM - 1);
            }
            out.write_byte((self.low >> 24) as u8);
            self.counter += 1;
            self.low <<= 8;
            self.range <<= 8;
        }
    }

    /// Flush the remaining state (four bytes) and return to the initial
    /// state, ready for the next context block.
    pub fn finish(&mut self, out: &mut OutStream) {
        for _ in 0..4 {
            out.write_byte((self.low >> 24) as u8);
            self.counter += 1;
            self.low <<= 8;
        }
        self.low = 0;
        self.range = u32::MAX;
    }
}

/// Mirror of `BitEncoder`. `start` must be called at every point where the
/// encoder side called `finish` before producing more bits.
pub struct BitDecoder {
    low: u32,
    range: u32,
    code: u32,
    counter: u64,
}

impl Default for BitDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BitDecoder {
    pub fn new() -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            code: 0,
            counter: 0,
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    /// Prime the 32-bit code value with four bytes from the stream.
    pub fn start(&mut self, input: &mut InStream) -> Result<()> {
        self.low = 0;
        self.range = u32::MAX;
        self.code = 0;
        for _ in 0..4 {
            self.code = (self.code << 8) | input.read_byte()? as u32;
            self.counter += 1;
        }
        Ok(())
    }

    /// Decode one bit with the given scaled probability of one.
    pub fn decode(&mut self, probability_of_one: Probability, input: &mut InStream) -> Result<bool> {
        let bound = (self.range >> 16) * probability_of_one as u32;
        let bit = self.code.wrapping_sub(self.low) < bound;
        if bit {
            self.range = bound;
        } else {
            self.low = self.low.wrapping_add(bound);
            self.range -= bound;
        }
        while (self.low ^ self.low.wrapping_add(self.range)) < TOP || self.range < BOTTOM {
            if (self.low ^ self.low.wrapping_add(self.range)) >= TOP {
                self.range = self.low.wrapping_neg() & (BOTTOM - 1);
            }
            self.code = (self.code << 8) | input.read_byte()? as u32;
            self.counter += 1;
            self.low <<= 8;
            self.range <<= 8;
        }
        Ok(bit)
    }
}
