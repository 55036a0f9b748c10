//! # Scan Executor
//!
//! Runs a per-page action over a list of page files with bounded fan-out.
//! Pages are processed in disjoint batches of `fanout`; each batch spawns
//! one scoped worker per page and joins the whole batch before the next
//! one starts, which bounds open file descriptors and transient memory at
//! `fanout` pages.
//!
//! Results come back as `(page file, per-page result)` pairs in the input
//! page order: workers inside a batch run in parallel, but aggregation is
//! deterministic over pages. A worker that fails (or panics) contributes
//! the empty result for its page; the rest of the scan is unaffected.

use std::thread;

use eyre::Result;
use log::debug;

use crate::config::SEARCH_THREAD_COUNT;

/// Bounded-fanout parallel executor over page files.
#[derive(Debug, Clone)]
pub struct ScanExecutor {
    fanout: usize,
}

impl Default for ScanExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanExecutor {
    pub fn new() -> Self {
        Self::with_fanout(SEARCH_THREAD_COUNT)
    }

    pub fn with_fanout(fanout: usize) -> Self {
        Self {
            fanout: fanout.max(1),
        }
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Runs `action` once per page and aggregates in input order.
    pub fn run<T, F>(&self, pages: &[String], action: F) -> Vec<(String, T)>
    where
        T: Default + Send,
        F: Fn(&str) -> Result<T> + Sync,
    {
        let mut results = Vec::with_capacity(pages.len());
        for batch in pages.chunks(self.fanout) {
            results.extend(self.run_batch(batch, &action));
        }
        results
    }

    /// Runs one batch (at most `fanout` pages) and joins every worker.
    /// Exposed so callers that need per-batch post-processing, like index
    /// cleanup after parallel deletes, can drive batching themselves.
    pub fn run_batch<T, F>(&self, batch: &[String], action: &F) -> Vec<(String, T)>
    where
        T: Default + Send,
        F: Fn(&str) -> Result<T> + Sync,
    {
        debug_assert!(batch.len() <= self.fanout);
        thread::scope(|scope| {
            let workers: Vec<_> = batch
                .iter()
                .map(|page| scope.spawn(move || action(page)))
                .collect();
            batch
                .iter()
                .zip(workers)
                .map(|(page, worker)| {
                    let result = match worker.join() {
                        Ok(Ok(result)) => result,
                        Ok(Err(err)) => {
                            debug!("scan worker failed on page {page}: {err:#}");
                            T::default()
                        }
                        Err(_) => {
                            debug!("scan worker panicked on page {page}");
                            T::default()
                        }
                    };
                    (page.clone(), result)
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pages(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("pages/p{i}.json")).collect()
    }

    #[test]
    fn results_preserve_input_order() {
        let executor = ScanExecutor::with_fanout(3);
        let input = pages(10);
        let results = executor.run(&input, |page| Ok(page.to_string()));
        let names: Vec<_> = results.iter().map(|(page, _)| page.clone()).collect();
        assert_eq!(names, input);
        for (page, result) in results {
            assert_eq!(page, result);
        }
    }

    #[test]
    fn worker_failures_become_empty_results() {
        let executor = ScanExecutor::with_fanout(2);
        let input = pages(4);
        let results = executor.run(&input, |page| {
            if page.contains("p2") {
                eyre::bail!("broken page");
            }
            Ok(vec![page.to_string()])
        });
        assert_eq!(results.len(), 4);
        assert!(results[2].1.is_empty());
        assert_eq!(results[3].1, vec!["pages/p3.json".to_string()]);
    }

    #[test]
    fn concurrency_never_exceeds_fanout() {
        let executor = ScanExecutor::with_fanout(3);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        executor.run(&pages(12), |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn empty_page_list_yields_no_results() {
        let executor = ScanExecutor::new();
        let results: Vec<(String, ())> = executor.run(&[], |_| Ok(()));
        assert!(results.is_empty());
    }

    #[test]
    fn zero_fanout_is_clamped() {
        let executor = ScanExecutor::with_fanout(0);
        assert_eq!(executor.fanout(), 1);
        let results = executor.run(&pages(2), |page| Ok(page.len()));
        assert_eq!(results.len(), 2);
    }
}
