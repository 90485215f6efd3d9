use quindex::errors::{ErrorKind, QuindexError, QuindexResult};
use quindex::{Genome, MemoryRangeFile, MemoryRangeReader, Quindex, SignalRow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Instant;
use std::{env, fs};

/// Runs a test between its setup and teardown.
///
/// Teardown runs whether the test returns an error, panics or passes; panics
/// are caught and reported with the failing phase before the test is failed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> QuindexResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> QuindexResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> QuindexResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        let ctx = match before() {
            Ok(ctx) => ctx,
            Err(e) => return Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        };

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| test(ctx.clone())));
        let teardown = after(ctx);
        match outcome {
            Ok(Ok(_)) => match teardown {
                Ok(_) => Ok(()),
                Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
            },
            Ok(Err(e)) => Err((format!("Test failed: {:?}", e), backtrace.to_string())),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    let error = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => {
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            e
        }
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic: unknown payload".to_string()
            }
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", start_time.elapsed());
    eprintln!("Error: {}", error);
    eprintln!("=====================================================\n");
    panic!("Test failed: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    path: PathBuf,
    genome: Genome,
}

impl TestContext {
    pub fn new(path: PathBuf, genome: Genome) -> Self {
        Self { path, genome }
    }

    /// Scratch directory, used as the index base path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn genome(&self) -> Genome {
        self.genome.clone()
    }

    /// A fresh registry over `reader` rooted at the context directory.
    pub fn index(&self, reader: MemoryRangeReader, max_items: usize) -> QuindexResult<Quindex<MemoryRangeReader>> {
        Quindex::builder()
            .genome(self.genome())
            .max_items(max_items)
            .base_path(&self.path)
            .build(reader)
    }

    /// Reopens the registry written to the context directory.
    pub fn reopen(&self, reader: MemoryRangeReader, eager: bool) -> QuindexResult<Quindex<MemoryRangeReader>> {
        Quindex::builder()
            .genome(self.genome())
            .base_path(&self.path)
            .open(reader, eager)
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("quindex-{}", id))
}

/// A three chromosome genome small enough for exhaustive checks.
pub fn toy_genome() -> Genome {
    Genome::new("toy")
        .with_chromosome("chr1", 1000)
        .with_chromosome("chr2", 250_000)
        .with_chromosome("chrX", 60_000)
}

pub fn create_test_context() -> QuindexResult<TestContext> {
    let path = random_path();
    if path.exists() {
        fs::remove_dir_all(&path)?;
    }
    fs::create_dir_all(&path)?;
    Ok(TestContext::new(path, toy_genome()))
}

pub fn cleanup(ctx: TestContext) -> QuindexResult<()> {
    if ctx.path().exists() {
        fs::remove_dir_all(ctx.path()).map_err(|e| {
            QuindexError::new_with_cause(
                &format!("Failed to remove {}", ctx.path().display()),
                ErrorKind::IOError,
                e.into(),
            )
        })?;
    }
    Ok(())
}

/// Random signal rows over `chrom`, sorted by start.
pub fn random_signal_file(seed: u64, chrom: &str, length: u64, rows: usize, block_size: usize) -> MemoryRangeFile {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut signal: Vec<SignalRow> = (0..rows)
        .map(|_| {
            let start = rng.random_range(0..length);
            let end = (start + rng.random_range(0..2_000)).min(length - 1);
            SignalRow::new(chrom, start, end, rng.random_range(-5.0..5.0))
        })
        .collect();
    signal.sort_by_key(|row| row.start);
    MemoryRangeFile::with_rows(block_size, signal)
}
