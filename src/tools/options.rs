use log::LevelFilter;

use crate::error::{BwError, Result};

/// Largest raw slice fed to one BWT. Keeps every rotation index inside the
/// 31 bits the block trailer allots to an LF power.
pub const MAX_SLICE_SIZE: usize = (1 << 31) - 2;

/// Spare bytes a block buffer carries beyond the block size; the pair
/// replacer may grow a block by its three header bytes before it shrinks.
pub const BLOCK_OVERHEAD: usize = 3;

/// User settable options controlling compression.
#[derive(Debug)]
pub struct CompressOpts {
    /// Maximum input block size in bytes processed during each loop.
    pub block_size: usize,
    /// Preprocessor pipeline, a string over {c, p, r, s}.
    pub preprocessing: String,
    /// Whether preprocessors may free symbols via an escape byte.
    pub escaping: bool,
    /// Entropy coder selector, one of {n, b, B, u, m, M}.
    pub encoder: char,
}

impl Default for CompressOpts {
    fn default() -> Self {
        Self {
            block_size: 100_000 * 1024,
            preprocessing: String::new(),
            escaping: true,
            encoder: 'B',
        }
    }
}

impl CompressOpts {
    /// Reject selector characters the pipeline does not know.
    pub fn validate(&self) -> Result<()> {
        for c in self.preprocessing.chars() {
            if !matches!(c, 'c' | 'p' | 'r' | 's') {
                return Err(BwError::Usage(format!(
                    "invalid choice '{c}' for preprocessing"
                )));
            }
        }
        if !matches!(self.encoder, 'n' | 'b' | 'B' | 'u' | 'm' | 'M') {
            return Err(BwError::Usage(format!(
                "invalid choice '{}' for entropy encoding",
                self.encoder
            )));
        }
        if self.block_size == 0 {
            return Err(BwError::Usage("block size must be positive".into()));
        }
        // A block is carved into at most 256 slices.
        if self.block_size > 256 * MAX_SLICE_SIZE {
            return Err(BwError::Usage("block size too large".into()));
        }
        Ok(())
    }
}

/// Map the --verb level onto the log facade.
pub fn verbosity_filter(verb: u8) -> LevelFilter {
    match verb {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod test {
    use super::CompressOpts;

    #[test]
    fn default_options_validate() {
        assert!(CompressOpts::default().validate().is_ok());
    }

    #[test]
    fn bad_selectors_are_rejected() {
        let mut opts = CompressOpts {
            preprocessing: "px".into(),
            ..CompressOpts::default()
        };
        assert!(opts.validate().is_err());
        opts.preprocessing = "pr".into();
        opts.encoder = 'q';
        assert!(opts.validate().is_err());
    }
}
