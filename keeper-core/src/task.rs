//! Task spawning abstraction for single-threaded environments.

use std::future::Future;

/// Provider for spawning local tasks on the current thread.
///
/// Background work such as re-resolving the ensemble runs through this trait
/// so it interleaves with the transport's readiness loop instead of
/// blocking it.
pub trait TaskProvider: Clone {
    /// Spawn a named task that runs on the current thread.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`].
    fn spawn_task<F, T>(&self, name: &str, future: F) -> tokio::task::JoinHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static;
}

/// Tokio-based task provider using `spawn_local`.
#[derive(Clone, Debug, Default)]
pub struct TokioTaskProvider;

impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F, T>(&self, name: &str, future: F) -> tokio::task::JoinHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let task_name = name.to_string();
        tokio::task::spawn_local(async move {
            tracing::trace!("Task {} starting", task_name);
            let output = future.await;
            tracing::trace!("Task {} completed", task_name);
            output
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawned_task_returns_output() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let handle = TokioTaskProvider.spawn_task("answer", async { 42u32 });
                assert_eq!(handle.await.expect("join"), 42);
            })
            .await;
    }
}
