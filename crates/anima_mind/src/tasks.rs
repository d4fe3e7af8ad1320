//! Background task scheduler
//!
//! Named periodic callbacks (health check, old-memory cleanup, snapshot
//! saves) on one timer loop. A failing task is logged and retried next
//! interval; it never takes the scheduler down.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct TaskDef {
    name: String,
    interval: Duration,
    last_run: Instant,
    run: TaskFn,
}

pub struct BackgroundTasks {
    tasks: Vec<TaskDef>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn add_task<F, Fut>(&mut self, name: &str, interval: Duration, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.push(TaskDef {
            name: name.to_string(),
            interval,
            last_run: Instant::now(),
            run: Arc::new(move || Box::pin(f())),
        });
        tracing::debug!("background task registered: {}", name);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run the scheduler until the stop signal flips true.
    pub fn spawn(mut self, mut stop_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let now = Instant::now();
                        for task in &mut self.tasks {
                            if now.duration_since(task.last_run) < task.interval {
                                continue;
                            }
                            task.last_run = now;
                            if let Err(e) = (task.run)().await {
                                tracing::warn!("background task '{}' failed: {}", task.name, e);
                            }
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            tracing::info!("background scheduler stopping");
                            return;
                        }
                    }
                }
            }
        })
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_task_fires_on_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let mut tasks = BackgroundTasks::new();
        tasks.add_task("count", Duration::from_millis(300), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tasks.spawn(stop_rx);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stop_tx.send(true).unwrap();
        let _ = handle.await;

        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 1, "task never fired");
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_scheduler() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let mut tasks = BackgroundTasks::new();
        tasks.add_task("broken", Duration::from_millis(100), || async {
            anyhow::bail!("always fails")
        });
        tasks.add_task("healthy", Duration::from_millis(100), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tasks.spawn(stop_rx);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stop_tx.send(true).unwrap();
        let _ = handle.await;

        assert!(counter.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_stop_signal_terminates() {
        let tasks = BackgroundTasks::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tasks.spawn(stop_rx);
        stop_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok(), "scheduler did not stop");
    }
}
