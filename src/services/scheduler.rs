//! Worker scheduling: one independent tokio interval loop per worker.
//!
//! Ticks are at-least-once; every worker is written to be safely
//! repeatable, so a tick that raced or failed is simply absorbed by the
//! next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};

use super::Worker;

pub struct WorkerScheduler {
    workers: Vec<(Arc<dyn Worker>, u64)>,
    running: Arc<AtomicBool>,
}

impl WorkerScheduler {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a worker to tick every `interval_secs`
    pub fn register(&mut self, worker: Arc<dyn Worker>, interval_secs: u64) {
        self.workers.push((worker, interval_secs));
    }

    /// Run a single tick of the named worker (used by the `tick` command
    /// for externally-driven scheduling)
    pub async fn run_once(&self, name: &str) -> Result<String> {
        let worker = self
            .workers
            .iter()
            .map(|(worker, _)| worker)
            .find(|worker| worker.name() == name)
            .ok_or_else(|| EngineError::Validation(format!("unknown worker: {name}")))?;

        worker.run_tick().await
    }

    pub fn worker_names(&self) -> Vec<&'static str> {
        self.workers.iter().map(|(worker, _)| worker.name()).collect()
    }

    /// Spawn every registered worker loop
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        for (worker, interval_secs) in &self.workers {
            let worker = worker.clone();
            let interval_secs = *interval_secs;
            let running = self.running.clone();

            info!(
                "Starting {} worker (interval: {}s)",
                worker.name(),
                interval_secs
            );

            tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));

                while running.load(Ordering::SeqCst) {
                    interval.tick().await;

                    match worker.run_tick().await {
                        Ok(summary) => debug!("{} tick: {}", worker.name(), summary),
                        Err(e) => error!("{} tick failed: {}", worker.name(), e),
                    }
                }

                info!("{} worker stopped", worker.name());
            });
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Scheduler stop requested");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for WorkerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingWorker {
        ticks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Worker for CountingWorker {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_tick(&self) -> Result<String> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("tick {n}"))
        }
    }

    #[tokio::test]
    async fn run_once_dispatches_by_name() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut scheduler = WorkerScheduler::new();
        scheduler.register(
            Arc::new(CountingWorker {
                ticks: ticks.clone(),
            }),
            60,
        );

        let summary = scheduler.run_once("counting").await.unwrap();
        assert_eq!(summary, "tick 1");
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        assert!(scheduler.run_once("unknown").await.is_err());
    }

    #[tokio::test]
    async fn start_and_stop_toggle_running() {
        let scheduler = WorkerScheduler::new();
        assert!(!scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
