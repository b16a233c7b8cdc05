//! CLI latency benchmark: size-class allocator against the system malloc.

use std::process::ExitCode;
use std::ptr::NonNull;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use hpalloc::{SizeClassAllocator, DEFAULT_ARENA_SIZE_PER_CLASS};

/// Times every allocate call and reports total, average and P99 latency.
#[derive(Debug, Parser)]
#[command(name = "hpalloc-bench")]
#[command(about = "Allocation latency benchmark for hpalloc")]
struct Cli {
    /// Allocator under test.
    #[arg(long, value_enum, default_value_t = AllocatorKind::Fastalloc)]
    allocator: AllocatorKind,
    /// Bytes requested per allocation.
    #[arg(long, default_value_t = 64)]
    block_size: usize,
    /// Number of allocations.
    #[arg(long, default_value_t = 10_000_000)]
    count: usize,
    /// Arena bytes per size class (fastalloc only).
    #[arg(long, default_value_t = DEFAULT_ARENA_SIZE_PER_CLASS)]
    arena_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AllocatorKind {
    /// hpalloc's size-class allocator.
    Fastalloc,
    /// libc malloc/free.
    Malloc,
}

struct Report {
    total: Duration,
    latencies_ns: Vec<u64>,
    exhausted: usize,
}

fn run_fastalloc(cli: &Cli) -> Result<Report, hpalloc::AllocError> {
    let mut allocator = SizeClassAllocator::with_arena_size(cli.arena_size)?;
    let mut blocks: Vec<(Option<NonNull<u8>>, usize)> = Vec::with_capacity(cli.count);
    let mut latencies_ns = Vec::with_capacity(cli.count);

    let start = Instant::now();
    for _ in 0..cli.count {
        let t0 = Instant::now();
        let block = allocator.allocate(cli.block_size)?;
        latencies_ns.push(t0.elapsed().as_nanos() as u64);
        blocks.push(block);
    }

    let exhausted = blocks.iter().filter(|(ptr, _)| ptr.is_none()).count();
    for (ptr, class_size) in blocks {
        if let Some(ptr) = ptr {
            // SAFETY: every pointer came from `allocate` above with this class
            // size and is freed exactly once.
            unsafe { allocator.deallocate(ptr, class_size)? };
        }
    }

    Ok(Report {
        total: start.elapsed(),
        latencies_ns,
        exhausted,
    })
}

fn run_malloc(cli: &Cli) -> Report {
    let mut blocks = Vec::with_capacity(cli.count);
    let mut latencies_ns = Vec::with_capacity(cli.count);

    let start = Instant::now();
    for _ in 0..cli.count {
        let t0 = Instant::now();
        // SAFETY: plain libc call; the result is checked below and freed once.
        let ptr = unsafe { libc::malloc(cli.block_size) };
        latencies_ns.push(t0.elapsed().as_nanos() as u64);
        blocks.push(ptr);
    }

    let exhausted = blocks.iter().filter(|ptr| ptr.is_null()).count();
    for ptr in blocks {
        // SAFETY: each pointer came from malloc above; free(NULL) is a no-op.
        unsafe { libc::free(ptr) };
    }

    Report {
        total: start.elapsed(),
        latencies_ns,
        exhausted,
    }
}

/// Value at the `fraction` quantile of an ascending slice.
fn percentile(sorted: &[u64], fraction: f64) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let index = ((sorted.len() as f64 * fraction) as usize).min(sorted.len() - 1);
    Some(sorted[index])
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    println!(
        "[Config] Allocator: {:?}, Block Size: {}, Count: {}",
        cli.allocator, cli.block_size, cli.count
    );

    let mut report = match cli.allocator {
        AllocatorKind::Fastalloc => match run_fastalloc(&cli) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        AllocatorKind::Malloc => run_malloc(&cli),
    };

    report.latencies_ns.sort_unstable();
    let total_ns = report.total.as_nanos() as f64;
    let avg_ns = if cli.count == 0 {
        0.0
    } else {
        total_ns / cli.count as f64
    };

    println!("[Perf] Total time: {:.3} ms", total_ns / 1e6);
    println!("[Perf] Avg latency: {avg_ns:.1} ns");
    match percentile(&report.latencies_ns, 0.99) {
        Some(p99) => println!("[Perf] P99 latency: {p99} ns"),
        None => println!("[Perf] P99 latency: n/a"),
    }
    println!("[Perf] Exhausted allocations: {}", report.exhausted);
    ExitCode::SUCCESS
}
