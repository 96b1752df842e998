use log::info;

use crate::bitstream::{InStream, OutStream};
use crate::error::{BwError, Result};

use super::pairs::PairInverse;
use super::runs::RunInverse;

/// Which replacement algorithm a recorded pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Pairs,
    Runs,
}

impl PassKind {
    fn tag(self) -> u8 {
        match self {
            PassKind::Pairs => b'p',
            PassKind::Runs => b'r',
        }
    }
}

/// One preprocessor pass: its kind plus the self-terminating header bytes
/// the rewrite produced (replacement rules, escape byte).
pub struct PassRecord {
    pub kind: PassKind,
    pub header: Vec<u8>,
}

/// Collects the replacement choices made while preprocessing one block.
///
/// Every rule's left side is flagged as a variable and every escape byte as
/// special, so by the time the grammar is serialized the flags describe the
/// complete transformed alphabet. The serialized record is the pass count
/// followed by each pass's kind tag and raw header.
pub struct Grammar {
    passes: Vec<PassRecord>,
    is_special: [bool; 256],
    is_variable: [bool; 256],
    rules: u32,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            is_special: [false; 256],
            is_variable: [false; 256],
            rules: 0,
        }
    }

    /// Record a replacement rule with `variable` as its left side.
    pub fn add_rule(&mut self, variable: u8) {
        self.is_variable[variable as usize] = true;
        self.rules += 1;
    }

    /// Record a symbol freed from the source alphabet during this block.
    pub fn add_special(&mut self, special: u8) {
        self.is_special[special as usize] = true;
    }

    pub fn is_special(&self, symbol: u8) -> bool {
        self.is_special[symbol as usize]
    }

    pub fn is_variable(&self, symbol: u8) -> bool {
        self.is_variable[symbol as usize]
    }

    pub fn number_of_rules(&self) -> u32 {
        self.rules
    }

    pub fn number_of_special_symbols(&self) -> u32 {
        self.is_special.iter().filter(|&&s| s).count() as u32
    }

    pub fn record_pass(&mut self, kind: PassKind, header: Vec<u8>) {
        self.passes.push(PassRecord { kind, header });
    }

    pub fn passes(&self) -> &[PassRecord] {
        &self.passes
    }

    /// Serialize the grammar record. Returns the number of bytes written.
    pub fn write(&self, out: &mut OutStream) -> Result<u64> {
        if self.passes.len() > 255 {
            return Err(BwError::InternalInvariant("too many preprocessor passes"));
        }
        let start = out.get_pos();
        out.write_byte(self.passes.len() as u8);
        for pass in &self.passes {
            out.write_byte(pass.kind.tag());
            out.write_block(&pass.header);
        }
        info!(
            "Grammar: {} passes, {} rules, {} special symbols.",
            self.passes.len(),
            self.rules,
            self.number_of_special_symbols()
        );
        Ok(out.get_pos() - start)
    }
}

/// A parsed pass ready for inversion.
pub enum ParsedPass {
    Pairs(PairInverse),
    Runs(RunInverse),
}

impl ParsedPass {
    /// Undo this pass over `data`.
    pub fn invert(&self, data: &[u8]) -> Vec<u8> {
        match self {
            ParsedPass::Pairs(inverse) => inverse.apply(data),
            ParsedPass::Runs(inverse) => inverse.apply(data),
        }
    }
}

/// Read a grammar record, parsing every pass header. The passes come back in
/// the order they ran; inversion must walk them backwards.
pub fn read_grammar(input: &mut InStream) -> Result<Vec<ParsedPass>> {
    let count = input.read_byte()? as usize;
    let mut passes = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = input.read_byte()?;
        match tag {
            b'p' => passes.push(ParsedPass::Pairs(PairInverse::parse(input)?)),
            b'r' => passes.push(ParsedPass::Runs(RunInverse::parse(input)?)),
            _ => return Err(BwError::MalformedStream("unknown preprocessor pass tag")),
        }
    }
    Ok(passes)
}
