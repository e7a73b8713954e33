//! # Main — CLI Entry Point
//!
//! Routes subcommands to the sieve engine and keeps shared concerns in one
//! place: tracing setup, the global rayon pool size, and the Miller–Rabin
//! round configuration.
//!
//! ## Subcommands
//!
//! - `sieve` — enumerate primes up to a bound with a chosen algorithm.
//! - `stream` — stream the primes of an arbitrary interval to a file.
//! - `count` — count the primes of an interval, optionally multi-core.
//! - `random-prime` — generate a random probable prime of a target bit size.
//! - `next-prime` — find the next or previous probable prime from a base.
//!
//! Numeric arguments accept expressions: `10^12`, `1e9`, `1,000,000`, and
//! sums thereof. Ranges accept `L..R`, `L:R`, `L,R`, `[L,R]`, `range[L,R]`.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "izprime", about = "Prime sieving and counting in the 6x±1 index space")]
struct Cli {
    /// Miller-Rabin rounds for probabilistic primality testing
    #[arg(long, default_value_t = 25)]
    mr_rounds: u32,

    /// Number of rayon worker threads (defaults to all logical cores)
    #[arg(long)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    /// Optimized Sieve of Eratosthenes
    Soe,
    /// Segmented Sieve of Eratosthenes
    Ssoe,
    /// Euler's linear sieve
    Soeu,
    /// Sieve of Sundaram
    Sos,
    /// Sieve of Atkin
    Soa,
    /// Solid Sieve-iZ
    Siz,
    /// Segmented Sieve-iZm (horizontal)
    Sizm,
    /// Segmented Sieve-iZm (vertical, unordered)
    SizmVy,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate all primes up to a bound
    Sieve {
        /// Upper bound (numeric expression, e.g. 10^9)
        n: String,
        /// Sieve algorithm
        #[arg(long, value_enum, default_value_t = Algorithm::Sizm)]
        algorithm: Algorithm,
        /// Write the primes to this file as space-separated decimals
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Stream the primes of an interval to a file in ascending order
    Stream {
        /// Interval start (numeric expression; may exceed 64 bits)
        start: String,
        /// Interval width (numeric expression, must fit 64 bits)
        #[arg(long)]
        range: String,
        /// Output file (a timestamped file under ./output by default)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Count the primes of an interval
    Count {
        /// Inclusive range expression, e.g. 10^12..10^12+10^9
        range: String,
        /// Worker count (clamped to detected cores and segment count)
        #[arg(long, default_value_t = 1)]
        cores: usize,
    },
    /// Generate a random probable prime
    RandomPrime {
        /// Target bit size
        #[arg(long, default_value_t = 256)]
        bits: u32,
        /// Use the vertical search instead of the horizontal one
        #[arg(long)]
        vertical: bool,
        /// Racing worker count
        #[arg(long, default_value_t = 1)]
        cores: usize,
    },
    /// Find the next (or previous) probable prime from a base value
    NextPrime {
        /// Base value (numeric expression; may exceed 64 bits)
        base: String,
        /// Search backward instead of forward
        #[arg(long)]
        backward: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    cli::run(&cli)
}
