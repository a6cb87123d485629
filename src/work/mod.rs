//! work
//!
//! Bounded-concurrency fan-out for per-submodule operations.
//!
//! One logical operation runs on a single control thread; independent
//! per-submodule work (status reads, disjoint submodule merges, submodule
//! pushes) is dispatched here. The pool is bounded, and because every
//! submodule maps to exactly one task, operations on the same submodule
//! are serialized by construction; cross-submodule work has no ordering
//! dependency and runs in parallel.
//!
//! Joins collect all failures rather than failing fast, so callers can
//! report every broken submodule together.

use std::sync::OnceLock;

use rayon::prelude::*;

/// Upper bound on worker threads for submodule fan-out.
const MAX_WORKERS: usize = 8;

static POOL: OnceLock<rayon::ThreadPool> = OnceLock::new();

fn pool() -> &'static rayon::ThreadPool {
    POOL.get_or_init(|| {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(MAX_WORKERS))
            .unwrap_or(1);
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("weld-worker-{i}"))
            .build()
            .expect("failed to build submodule worker pool")
    })
}

/// Run `f` over every item on the bounded pool, preserving input order.
///
/// Each item must represent a distinct submodule; that is what serializes
/// same-submodule work.
pub fn map_per_submodule<I, T, F>(items: Vec<I>, f: F) -> Vec<T>
where
    I: Send,
    T: Send,
    F: Fn(&I) -> T + Sync,
{
    pool().install(|| items.into_par_iter().map(|item| f(&item)).collect())
}

/// Partition fallible per-submodule results into successes and failures.
///
/// Order of successes follows input order; failures keep their label.
pub fn collect_failures<L, T, E>(results: Vec<(L, Result<T, E>)>) -> (Vec<(L, T)>, Vec<(L, E)>) {
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for (label, result) in results {
        match result {
            Ok(value) => ok.push((label, value)),
            Err(err) => failed.push((label, err)),
        }
    }
    (ok, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_only_need_send() {
        // Cell is Send but not Sync; the pool takes ownership of the
        // items, so this must compile and run.
        let items: Vec<std::cell::Cell<u32>> = (0..16).map(std::cell::Cell::new).collect();
        let out = map_per_submodule(items, |c| c.get() * 2);
        assert_eq!(out[3], 6);
    }

    #[test]
    fn preserves_order() {
        let items: Vec<u32> = (0..100).collect();
        let doubled = map_per_submodule(items, |n| n * 2);
        assert_eq!(doubled[3], 6);
        assert_eq!(doubled.len(), 100);
    }

    #[test]
    fn collects_all_failures() {
        let results: Vec<(&str, Result<u32, String>)> = vec![
            ("a", Ok(1)),
            ("b", Err("boom".into())),
            ("c", Err("bust".into())),
        ];
        let (ok, failed) = collect_failures(results);
        assert_eq!(ok, vec![("a", 1)]);
        assert_eq!(failed.len(), 2);
    }
}
