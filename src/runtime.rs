//! Synchronous entry points into the async subprocess plumbing.
//!
//! A thread that already drives a runtime can neither block on nor drop
//! another one, so from async code the work moves to a scoped thread.

use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime};

/// Single-threaded runtime with I/O, process and timer drivers.
pub fn current_thread() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

fn in_async_context() -> bool {
    Handle::try_current().is_ok()
}

/// Runs `future` to completion on `runtime` from synchronous code.
pub fn block_on<F>(runtime: &Runtime, future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    if !in_async_context() {
        return runtime.block_on(future);
    }
    std::thread::scope(|scope| match scope.spawn(move || runtime.block_on(future)).join() {
        Ok(output) => output,
        Err(panic) => std::panic::resume_unwind(panic),
    })
}

/// Runs `future` on a fresh runtime that is torn down before returning, so
/// that every child process it spawned has been reaped.
pub fn run<F>(future: F) -> std::io::Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    let drive = move || {
        let runtime = current_thread()?;
        let output = runtime.block_on(future);
        drop(runtime);
        Ok(output)
    };
    if !in_async_context() {
        return drive();
    }
    std::thread::scope(|scope| match scope.spawn(drive).join() {
        Ok(output) => output,
        Err(panic) => std::panic::resume_unwind(panic),
    })
}

/// Drops a runtime from any context.
pub fn shutdown(runtime: Runtime) {
    if in_async_context() {
        runtime.shutdown_background();
    } else {
        drop(runtime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_block_on_outside_runtime() {
        let runtime = current_thread().unwrap();
        assert_eq!(block_on(&runtime, async { 7 }), 7);
        shutdown(runtime);
    }

    #[tokio::test]
    async fn test_usable_from_async_code() {
        let runtime = current_thread().unwrap();
        let value = block_on(&runtime, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            11
        });
        assert_eq!(value, 11);
        shutdown(runtime);

        let value = run(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            13
        })
        .unwrap();
        assert_eq!(value, 13);
    }
}
