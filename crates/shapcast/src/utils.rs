//! Common utilities used across the crate.

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// When `Parallel`, batch explanation may use `rayon` parallel iterators.
/// Results never depend on this flag: every sample is explained independently
/// and written to its own output slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Apply `f` to every element of a mutable chunked buffer.
    ///
    /// `f` receives the chunk index and the chunk.
    pub fn maybe_par_chunks_mut<T, F>(self, buffer: &mut [T], chunk_size: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if chunk_size == 0 {
            return;
        }
        if self.is_parallel() {
            buffer
                .par_chunks_mut(chunk_size)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        } else {
            buffer
                .chunks_mut(chunk_size)
                .enumerate()
                .for_each(|(i, chunk)| f(i, chunk));
        }
    }
}

/// Run a closure with the requested number of threads.
///
/// `n_threads == 0` uses the global rayon pool. Falls back to sequential
/// execution if a dedicated pool cannot be created.
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel if n_threads == 0 => f(Parallelism::Parallel),
        Parallelism::Parallel => match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
            Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
            Err(err) => {
                tracing::warn!(%err, "failed to build thread pool, running sequentially");
                f(Parallelism::Sequential)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_threads_one_is_sequential() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert!(Parallelism::from_threads(4).is_parallel());
    }

    #[test]
    fn chunks_visit_every_slot_once() {
        for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
            let mut buf = vec![0usize; 12];
            parallelism.maybe_par_chunks_mut(&mut buf, 3, |i, chunk| {
                for x in chunk.iter_mut() {
                    *x += i + 1;
                }
            });
            assert_eq!(buf, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
        }
    }

    #[test]
    fn run_with_threads_passes_parallelism() {
        let p = run_with_threads(1, |p| p);
        assert_eq!(p, Parallelism::Sequential);
        let p = run_with_threads(2, |p| p);
        assert_eq!(p, Parallelism::Parallel);
    }
}
