//! Fixed-size worker pool with a completion barrier.

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{Arc, Condvar, Mutex},
};

use ftgs_common::{Result, error::Error, verify_arg};

/// A fixed-size pool of worker threads running fallible tasks.
///
/// Tasks are queued with [`enqueue`](Self::enqueue) and started in submission
/// order. [`await_completion`](Self::await_completion) blocks until every task
/// enqueued so far has finished and reports the first error recorded, in
/// completion order. A failing or panicking task never cancels the others.
///
/// The pool can be reused after `await_completion` returns.
pub struct ExecutorService {
    pool: rayon::ThreadPool,
    completion: Arc<Completion>,
}

#[derive(Default)]
struct Completion {
    state: Mutex<CompletionState>,
    all_done: Condvar,
}

#[derive(Default)]
struct CompletionState {
    pending: usize,
    first_error: Option<Error>,
}

impl ExecutorService {
    /// Creates a pool of `num_workers` threads.
    pub fn new(num_workers: usize) -> Result<ExecutorService> {
        verify_arg!(num_workers, num_workers > 0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("ftgs_worker_{i}"))
            .build()
            .map_err(|e| Error::invalid_arg("num_workers", e.to_string()))?;
        Ok(ExecutorService {
            pool,
            completion: Default::default(),
        })
    }

    pub fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Submits `task` for execution on one of the workers.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.completion
            .state
            .lock()
            .expect("completion lock")
            .pending += 1;
        let completion = self.completion.clone();
        self.pool.spawn_fifo(move || {
            completion.finish(catch_panic(task));
        });
    }

    /// Blocks until every enqueued task has finished, then returns the first
    /// recorded error, if any.
    pub fn await_completion(&self) -> Result<()> {
        let mut state = self.completion.state.lock().expect("completion lock");
        while state.pending > 0 {
            state = self
                .completion
                .all_done
                .wait(state)
                .expect("completion lock");
        }
        match state.first_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Completion {
    fn finish(&self, result: Result<()>) {
        let mut state = self.state.lock().expect("completion lock");
        if let Err(e) = result {
            log::warn!("task failed: {e}");
            if state.first_error.is_none() {
                state.first_error = Some(e);
            }
        }
        state.pending -= 1;
        if state.pending == 0 {
            self.all_done.notify_all();
        }
    }
}

/// Runs `f`, converting a panic into a `Panicked` error.
pub fn catch_panic<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    std::panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl std::fmt::Debug for ExecutorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorService")
            .field("num_workers", &self.num_workers())
            .finish_non_exhaustive()
    }
}
