//! Contend command - race workers for one key.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::Args;
use tracing::info;
use warden_lock::{LockContext, LockManager};

use crate::parse_duration;

/// Arguments for the contend command.
#[derive(Debug, Args)]
pub struct ContendArgs {
    /// Key the workers race for.
    #[arg(long)]
    pub key: String,

    /// Number of competing workers.
    #[arg(long, default_value_t = 4)]
    pub workers: u32,

    /// Lease per acquisition (e.g. `5s`).
    #[arg(long, value_parser = parse_duration)]
    pub lease: Option<Duration>,

    /// Attempt budget per worker; `0` gives up after one attempt.
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Delay between attempts (e.g. `500ms`).
    #[arg(long, value_parser = parse_duration)]
    pub delay: Option<Duration>,

    /// How long each winner holds the lock.
    #[arg(long, value_parser = parse_duration, default_value = "100ms")]
    pub hold: Duration,
}

/// Result of a contention run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContendReport {
    /// Contended key
    pub key: String,
    /// Workers started
    pub workers: u32,
    /// Workers that ran their critical section
    pub acquired: u32,
    /// Workers that ran out of attempts
    pub timed_out: u32,
    /// Most critical sections observed running at once
    pub max_concurrent: u32,
}

impl fmt::Display for ContendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key={} workers={} acquired={} timed_out={} max_concurrent={}",
            self.key, self.workers, self.acquired, self.timed_out, self.max_concurrent
        )
    }
}

/// Execute the contend command.
///
/// # Errors
///
/// Returns an error if `--workers` is zero or any worker hits a store
/// failure.
pub async fn execute(args: ContendArgs, manager: &LockManager) -> Result<()> {
    let report = run(args, manager).await?;
    println!("{report}");
    let stats = manager.stats();
    println!(
        "attempts={} releases={} not_owned={}",
        stats.attempts, stats.releases, stats.not_owned
    );
    Ok(())
}

/// Race `args.workers` contexts for `args.key`.
///
/// # Errors
///
/// See [`execute`].
pub async fn run(args: ContendArgs, manager: &LockManager) -> Result<ContendReport> {
    ensure!(args.workers > 0, "--workers must be at least 1");

    let options = super::acquire_options(manager, args.lease, args.attempts, args.delay);
    let inside = Arc::new(AtomicU32::new(0));
    let max_concurrent = Arc::new(AtomicU32::new(0));
    let mut tasks = Vec::with_capacity(args.workers as usize);

    for worker in 0..args.workers {
        let manager = manager.clone();
        let key = args.key.clone();
        let inside = Arc::clone(&inside);
        let max_concurrent = Arc::clone(&max_concurrent);
        let hold = args.hold;

        tasks.push(tokio::spawn(async move {
            let ctx = LockContext::named(format!("worker-{worker}"));
            manager
                .with_lock(&ctx, &key, options, || async {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(now, Ordering::SeqCst);
                    info!(worker, "in critical section");
                    tokio::time::sleep(hold).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
                .await
        }));
    }

    let mut acquired = 0;
    let mut timed_out = 0;
    for task in tasks {
        match task.await?? {
            Some(()) => acquired += 1,
            None => timed_out += 1,
        }
    }

    Ok(ContendReport {
        key: args.key,
        workers: args.workers,
        acquired,
        timed_out,
        max_concurrent: max_concurrent.load(Ordering::SeqCst),
    })
}

#[cfg(test)]
mod tests {
    use warden_lock::MemoryStore;

    use super::*;

    fn args(workers: u32, attempts: Option<u32>) -> ContendArgs {
        ContendArgs {
            key: "job:42".into(),
            workers,
            lease: Some(Duration::from_secs(5)),
            attempts,
            delay: Some(Duration::from_millis(20)),
            hold: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_workers_yield_one_winner() {
        let manager = LockManager::new(MemoryStore::new());
        let report = run(args(5, Some(0)), &manager).await.unwrap();

        assert_eq!(report.acquired, 1);
        assert_eq!(report.timed_out, 4);
        assert_eq!(report.max_concurrent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_workers_all_take_turns() {
        let manager = LockManager::new(MemoryStore::new());
        let report = run(args(4, Some(100)), &manager).await.unwrap();

        assert_eq!(report.acquired, 4);
        assert_eq!(report.timed_out, 0);
        assert_eq!(report.max_concurrent, 1);
        assert_eq!(manager.stats().releases, 4);
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let manager = LockManager::new(MemoryStore::new());
        assert!(run(args(0, None), &manager).await.is_err());
    }

    #[test]
    fn report_format() {
        let report = ContendReport {
            key: "k".into(),
            workers: 3,
            acquired: 1,
            timed_out: 2,
            max_concurrent: 1,
        };
        assert_eq!(
            report.to_string(),
            "key=k workers=3 acquired=1 timed_out=2 max_concurrent=1"
        );
    }
}
