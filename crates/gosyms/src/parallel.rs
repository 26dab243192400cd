//! Bounded parallel processing of discovered packages.
//!
//! The syntax-only pipeline treats every discovered directory as one unit of
//! work: scan, parse, extract. Units run on a dedicated rayon pool of `W`
//! threads, so at most `W` units are ever in flight.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                ConcurrencyController::run                │
//! ├──────────────────────────────────────────────────────────┤
//! │  rayon pool (W threads): par_iter over package dirs      │
//! │    unit: scan_dir -> FileCache::parse -> extract         │
//! │    success: processed += 1, symbols -> ResultAggregator  │
//! │    failure: warn, skipped += 1, PackageError recorded    │
//! │  returns once every unit has finished                    │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::build::BuildContext;
use crate::error::{Error, PackageError, Result};
use crate::extract::{Extractor, SyntaxExtractor};
use crate::resolver::{Package, PackageCache};
use crate::scanner::PackageDir;
use crate::syntax::FileCache;
use crate::types::{Query, Symbol};

/// Outcome counts of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Units that completed successfully
    pub processed: usize,
    /// Units that failed
    pub skipped: usize,
    /// Highest number of units running at the same time
    pub peak_concurrency: usize,
    /// Failures, one per skipped unit
    pub errors: Vec<PackageError>,
}

/// Runs package units on a fixed-size worker pool.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyController {
    workers: usize,
}

impl ConcurrencyController {
    /// Controller with `workers` threads, or one per CPU when `None` or zero.
    #[must_use]
    pub fn new(workers: Option<usize>) -> Self {
        let workers = workers.filter(|&w| w > 0).unwrap_or_else(num_cpus::get);
        Self { workers }
    }

    /// Pool size.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` once per unit and wait for all of them.
    ///
    /// A failing or panicking unit is logged and counted as skipped; it never
    /// stops the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadPool`] if the worker pool cannot be created and
    /// [`Error::Internal`] if the error list lock is poisoned.
    pub fn run<F>(&self, units: &[PackageDir], work: F) -> Result<BatchOutcome>
    where
        F: Fn(&PackageDir) -> Result<()> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("gosyms-worker-{i}"))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let processed = AtomicUsize::new(0);
        let errors = Mutex::new(Vec::new());

        pool.install(|| {
            units.par_iter().for_each(|unit| {
                let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);

                let result = panic::catch_unwind(AssertUnwindSafe(|| work(unit)))
                    .unwrap_or_else(|payload| Err(Error::Internal(panic_message(&*payload))));

                match result {
                    Ok(()) => {
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(
                            import_path = %unit.import_path,
                            dir = %unit.dir.display(),
                            error = %e,
                            "Failed to process package, skipping"
                        );
                        errors
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(PackageError::from_error(&unit.dir, &unit.import_path, &e));
                    }
                }

                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        });

        let errors = errors
            .into_inner()
            .map_err(|e| Error::Internal(format!("mutex poisoned: {e}")))?;
        let outcome = BatchOutcome {
            processed: processed.into_inner(),
            skipped: errors.len(),
            peak_concurrency: peak.into_inner(),
            errors,
        };
        debug!(
            workers = self.workers,
            processed = outcome.processed,
            skipped = outcome.skipped,
            peak = outcome.peak_concurrency,
            "Batch completed"
        );
        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("worker panicked: {detail}")
}

/// Syntax-only unit of work for one directory.
///
/// Returns `None` when the directory has no applicable files.
///
/// # Errors
///
/// Returns scan, read or parse failures for the directory.
pub fn extract_package(
    unit: &PackageDir,
    context: &BuildContext,
    files: &FileCache,
    packages: &PackageCache,
    query: &Query,
) -> Result<Option<Vec<Symbol>>> {
    let info = context.scan_dir(&unit.dir)?;
    if info.is_empty() {
        return Ok(None);
    }
    packages.record_tags(&unit.dir, &info.all_tags);

    let trees = info
        .files()
        .map(|file| files.parse(file))
        .collect::<Result<Vec<_>>>()?;

    let package = Package {
        import_path: unit.import_path.clone(),
        name: info.name.unwrap_or_default(),
        dir: info.dir,
        go_files: info.go_files,
        cgo_files: info.cgo_files,
        trees,
        ..Package::default()
    };

    let mut symbols = Vec::new();
    SyntaxExtractor.extract(&package, query, &mut symbols);
    Ok(Some(symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageErrorKind;
    use std::path::PathBuf;
    use std::time::Duration;

    fn units(n: usize) -> Vec<PackageDir> {
        (0..n)
            .map(|i| PackageDir {
                dir: PathBuf::from(format!("/src/p{i}")),
                import_path: format!("p{i}"),
            })
            .collect()
    }

    #[test]
    fn zero_workers_means_one_per_cpu() {
        assert_eq!(ConcurrencyController::new(Some(0)).workers(), num_cpus::get());
        assert_eq!(ConcurrencyController::new(None).workers(), num_cpus::get());
        assert_eq!(ConcurrencyController::new(Some(3)).workers(), 3);
    }

    #[test]
    fn peak_concurrency_never_exceeds_pool_size() {
        let controller = ConcurrencyController::new(Some(4));

        let outcome = controller
            .run(&units(40), |_| {
                std::thread::sleep(Duration::from_millis(2));
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.processed, 40);
        assert!(outcome.peak_concurrency >= 1);
        assert!(outcome.peak_concurrency <= 4);
    }

    #[test]
    fn failures_are_counted_not_fatal() {
        let controller = ConcurrencyController::new(Some(2));

        let outcome = controller
            .run(&units(10), |unit| {
                if unit.import_path.ends_with('3') {
                    Err(Error::Config("boom".to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(outcome.processed, 9);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.errors[0].import_path, "p3");
    }

    #[test]
    fn panicking_unit_is_skipped_and_batch_completes() {
        let controller = ConcurrencyController::new(Some(4));

        let outcome = controller
            .run(&units(12), |unit| {
                if unit.import_path == "p7" {
                    panic!("extractor blew up on {}", unit.import_path);
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.processed, 11);
        assert_eq!(outcome.skipped, 1);
        let error = &outcome.errors[0];
        assert_eq!(error.import_path, "p7");
        assert_eq!(error.kind, PackageErrorKind::Internal);
        assert!(error.message.contains("extractor blew up on p7"), "{}", error.message);
    }
}
