use log::debug;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Thread error: {0}")]
    ThreadError(String),
}

/// Runs `processor` once per item and returns the results in input order.
///
/// With `threads <= 1` items are processed sequentially on the calling
/// thread. Otherwise a dedicated rayon pool of `threads` workers is used.
/// Each item is independent: a failure is part of that item's result and never
/// stops the others.
pub fn process_each<T, U, F>(items: &[T], processor: F, threads: usize) -> Result<Vec<U>, ParallelError>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Send + Sync,
{
    if threads <= 1 || items.len() <= 1 {
        return Ok(items.iter().map(processor).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ParallelError::ThreadError(format!("Failed to build thread pool: {}", e)))?;
    debug!("Processing {} items on {} threads", items.len(), threads);

    Ok(pool.install(|| items.par_iter().map(|item| processor(item)).collect()))
}
