use std::fs::File;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use bwpack::bitstream::{InStream, OutStream};
use bwpack::compression::compress;
use bwpack::error::Result;
use bwpack::tools::options::{verbosity_filter, CompressOpts};

/// Block-sorting file compressor.
#[derive(Parser, Debug)]
#[clap(version, about = "Compress a file with the block-sorting pipeline")]
struct Args {
    /// File to compress; defaults to standard input
    input_file: Option<String>,

    /// Target file; defaults to standard output
    output_file: Option<String>,

    /// Read input from standard in
    #[clap(short = 'i', long)]
    stdin: bool,

    /// Write output to standard out
    #[clap(short = 'c', long)]
    stdout: bool,

    /// Block size for compression (in kB)
    #[clap(short, long, default_value_t = 100_000)]
    block: u64,

    /// Verbosity level
    #[clap(short, long, default_value_t = 0)]
    verb: u8,

    /// Whether preprocessors may free symbols through escaping (0 disables)
    #[clap(long, default_value_t = 1)]
    escape: u8,

    /// Preprocessor pipeline:
    ///   p -- pair replacer
    ///   r -- run replacer
    ///   c -- pair and run replacer
    ///   s -- long recurring sequences replacer
    /// For example "ppr" runs the pair replacer twice, then the run replacer
    #[clap(long, default_value = "", verbatim_doc_comment)]
    prepr: String,

    /// Entropy coding scheme, one of n, b, B, u, m, M
    #[clap(short, long, default_value_t = 'B')]
    enc: char,
}

fn run(args: &Args) -> Result<()> {
    let mut source = if args.stdin || args.input_file.is_none() {
        InStream::new(Box::new(std::io::stdin()))
    } else {
        InStream::new(Box::new(File::open(args.input_file.as_ref().unwrap())?))
    };
    let mut out = if args.stdout || args.output_file.is_none() {
        OutStream::new(Box::new(std::io::stdout()))
    } else {
        OutStream::new(Box::new(File::create(args.output_file.as_ref().unwrap())?))
    };

    let opts = CompressOpts {
        block_size: args.block.max(1) as usize * 1024,
        preprocessing: args.prepr.clone(),
        escaping: args.escape != 0,
        encoder: args.enc,
    };
    info!("Block size = {}kB", args.block.max(1));

    let stats = compress(&mut source, &mut out, &opts)?;
    info!(
        "Compressed {} bytes into {} bytes.",
        stats.bytes_in, stats.bytes_out
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    TermLogger::init(
        verbosity_filter(args.verb),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .ok();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
