//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Parses numeric
//! expressions at the boundary, dispatches to the engine, and reports
//! results. The engine itself only ever sees parsed values.

use anyhow::{ensure, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use izprime::expr::{parse_inclusive_range, parse_numeric_expr, parse_numeric_expr_u64};
use izprime::int_array::UInt64Array;
use izprime::range::{siz_count, siz_stream, RangeInput};
use izprime::search::{iz_next_prime, vx_random_prime, vy_random_prime};
use izprime::sieve;

use super::{Algorithm, Cli, Commands};

pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Sieve { n, algorithm, out } => run_sieve(*algorithm, n, out.as_deref()),
        Commands::Stream { start, range, out } => run_stream(cli, start, range, out.clone()),
        Commands::Count { range, cores } => run_count(cli, range, *cores),
        Commands::RandomPrime { bits, vertical, cores } => run_random_prime(*bits, *vertical, *cores),
        Commands::NextPrime { base, backward } => run_next_prime(base, *backward),
    }
}

fn run_sieve(algorithm: Algorithm, n_expr: &str, out: Option<&std::path::Path>) -> Result<()> {
    let n = parse_numeric_expr_u64(n_expr)
        .with_context(|| format!("invalid sieve bound {:?}", n_expr))?;

    let primes: UInt64Array = match algorithm {
        Algorithm::Soe => sieve::soe(n)?,
        Algorithm::Ssoe => sieve::ssoe(n)?,
        Algorithm::Soeu => sieve::soeu(n)?,
        Algorithm::Sos => sieve::sos(n)?,
        Algorithm::Soa => sieve::soa(n)?,
        Algorithm::Siz => sieve::siz(n)?,
        Algorithm::Sizm => sieve::sizm(n)?,
        Algorithm::SizmVy => sieve::sizm_vy(n)?,
    };

    if primes.ordered {
        let last = primes.last().copied().unwrap_or(0);
        info!(count = primes.count(), last, "sieve complete");
    } else {
        info!(count = primes.count(), "sieve complete (unordered output)");
    }

    if let Some(path) = out {
        let mut file = std::io::BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        );
        for &p in primes.iter() {
            write!(file, "{} ", p)?;
        }
        file.flush()?;
        info!(path = %path.display(), "primes written");
    } else {
        println!("{}", primes.count());
    }

    Ok(())
}

fn run_stream(cli: &Cli, start_expr: &str, range_expr: &str, out: Option<PathBuf>) -> Result<()> {
    let start = parse_numeric_expr(start_expr)
        .with_context(|| format!("invalid interval start {:?}", start_expr))?;
    let range = parse_numeric_expr_u64(range_expr)
        .with_context(|| format!("invalid interval width {:?}", range_expr))?;

    let filepath = match out {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => default_stream_path()?,
    };

    let input = RangeInput {
        start: start.to_string(),
        range,
        mr_rounds: cli.mr_rounds,
        filepath: Some(filepath.clone()),
    };

    let count = siz_stream(&input)?;
    info!(count, path = %filepath.display(), "stream complete");
    println!("{}", count);
    Ok(())
}

/// Timestamped default sink under ./output.
fn default_stream_path() -> Result<PathBuf> {
    std::fs::create_dir_all("output").context("failed to create output directory")?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Ok(PathBuf::from(format!("output/primes_{}.txt", stamp)))
}

fn run_count(cli: &Cli, range_expr: &str, cores: usize) -> Result<()> {
    let (lower, upper) = parse_inclusive_range(range_expr)
        .with_context(|| format!("invalid range expression {:?}", range_expr))?;

    let width = rug::Integer::from(&upper - &lower) + 1u32;
    let width = width.to_u64().context("interval width exceeds 64 bits")?;
    ensure!(width > 100, "count requires an interval wider than 100");

    let input = RangeInput {
        start: lower.to_string(),
        range: width,
        mr_rounds: cli.mr_rounds,
        filepath: None,
    };

    let count = siz_count(&input, cores)?;
    info!(count, cores, "count complete");
    println!("{}", count);
    Ok(())
}

fn run_random_prime(bits: u32, vertical: bool, cores: usize) -> Result<()> {
    let prime = if vertical {
        vy_random_prime(bits, cores)?
    } else {
        vx_random_prime(bits, cores)?
    };
    println!("{}", prime);
    Ok(())
}

fn run_next_prime(base_expr: &str, backward: bool) -> Result<()> {
    let base = parse_numeric_expr(base_expr)
        .with_context(|| format!("invalid base value {:?}", base_expr))?;
    let prime = iz_next_prime(&base, !backward)?;
    println!("{}", prime);
    Ok(())
}
