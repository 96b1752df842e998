use std::fs::File;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use bwpack::bitstream::{InStream, OutStream};
use bwpack::compression::decompress;
use bwpack::error::Result;
use bwpack::tools::options::verbosity_filter;

/// Block-sorting file decompressor.
#[derive(Parser, Debug)]
#[clap(version, about = "Decompress a block-sorted file")]
struct Args {
    /// File to decompress; defaults to standard input
    input_file: Option<String>,

    /// Target file; defaults to standard output
    output_file: Option<String>,

    /// Read input from standard in
    #[clap(short = 'i', long)]
    stdin: bool,

    /// Write output to standard out
    #[clap(short = 'c', long)]
    stdout: bool,

    /// Verbosity level
    #[clap(short, long, default_value_t = 0)]
    verb: u8,

    /// Number of worker threads; only 1 is supported
    #[clap(short, long, default_value_t = 1)]
    threads: usize,
}

fn run(args: &Args) -> Result<u64> {
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
    decompress(&mut source, &mut out, args.threads)
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
        Ok(bytes) => {
            info!("Done, {bytes} bytes written.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
