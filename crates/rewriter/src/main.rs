//! CLI for the static binary rewriter
//!
//! Reads an x86-64 ELF executable, relocates its basic blocks per the chosen
//! strategy, and writes the rewritten ELF.
//!
//! # Usage
//!
//! ```bash
//! # Identity rewrite (no pass marks anything; output equals input)
//! rewriter input output
//!
//! # Relocate every block, grouping loops, reusing reclaimed holes
//! rewriter --force-all --group loop input output
//! ```

use std::{env, fs, process};

use layout::{AllocatorKind, ChunkOrder, Grouping, LayoutStrategy, TrampolineStrategy};
use rewriter::{rewrite, RewriteOptions};

fn usage() -> ! {
    eprintln!("rewriter - static binary rewriter for x86-64 ELF executables");
    eprintln!();
    eprintln!("Usage: rewriter [options] <input> <output>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --force-all            Mark every recovered block as modified");
    eprintln!("  --group <kind>         Chunking: block, loop, or function (default: block)");
    eprintln!("  --order <kind>         Chunk order: sorted or random (default: sorted)");
    eprintln!("  --seed <hex>           64 hex digits seeding --order random");
    eprintln!("  --parallel             Bump-allocate everything; reclaim nothing");
    eprintln!("  --whole-function       Redirect fully modified functions at their entry only");
    eprintln!("  --help, -h             Show this help message");
    process::exit(1);
}

fn parse_seed(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut seed = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        seed[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(seed)
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
    }

    let mut force_all = false;
    let mut grouping = Grouping::Block;
    let mut order = ChunkOrder::Sorted;
    let mut parallel = false;
    let mut trampolines = TrampolineStrategy::Always;
    let mut seed: Option<[u8; 32]> = None;
    let mut paths: Vec<&str> = Vec::new();

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--force-all" => force_all = true,
            "--parallel" => parallel = true,
            "--whole-function" => trampolines = TrampolineStrategy::WholeFunction,
            "--group" => match iter.next().map(String::as_str) {
                Some("block") => grouping = Grouping::Block,
                Some("loop") => grouping = Grouping::Loop,
                Some("function") => grouping = Grouping::Function,
                _ => usage(),
            },
            "--order" => match iter.next().map(String::as_str) {
                Some("sorted") => order = ChunkOrder::Sorted,
                Some("random") => order = ChunkOrder::Random([0; 32]),
                _ => usage(),
            },
            "--seed" => match iter.next().and_then(|s| parse_seed(s)) {
                Some(parsed) => seed = Some(parsed),
                None => usage(),
            },
            path if !path.starts_with('-') => paths.push(path),
            _ => usage(),
        }
    }
    if paths.len() != 2 {
        usage();
    }

    if let (ChunkOrder::Random(_), Some(seed)) = (order, seed) {
        order = ChunkOrder::Random(seed);
    }
    let allocator = if parallel {
        AllocatorKind::Parallel
    } else {
        AllocatorKind::Compact(order)
    };
    let options = RewriteOptions {
        strategy: LayoutStrategy {
            allocator,
            grouping,
            trampolines,
        },
        force_all,
        injected: Vec::new(),
    };

    let input = fs::read(paths[0]).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", paths[0], e);
        process::exit(1);
    });

    let outcome = rewrite(&input, &options).unwrap_or_else(|e| {
        eprintln!("Rewrite failed: {}", e);
        process::exit(1);
    });

    for diagnostic in &outcome.diagnostics {
        eprintln!("note: {}", diagnostic);
    }

    if let Err(e) = fs::write(paths[1], &outcome.bytes) {
        eprintln!("Failed to write {}: {}", paths[1], e);
        process::exit(1);
    }
}
