//! Probe command - acquire, check, and release one key.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use humantime_serde::re::humantime::format_duration;
use warden_lock::{AcquireOutcome, LockContext, LockManager};

use crate::parse_duration;

/// Arguments for the probe command.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Key to probe.
    #[arg(long)]
    pub key: String,

    /// Lease for the probe's acquisition (e.g. `5s`).
    #[arg(long, value_parser = parse_duration)]
    pub lease: Option<Duration>,
}

/// Execute the probe command.
///
/// # Errors
///
/// Returns an error on store failures.
pub async fn execute(args: ProbeArgs, manager: &LockManager) -> Result<()> {
    for line in run(args, manager).await? {
        println!("{line}");
    }
    Ok(())
}

/// Run the probe and collect one line per step.
///
/// The probe makes a single attempt so it never blocks behind a holder.
///
/// # Errors
///
/// See [`execute`].
pub async fn run(args: ProbeArgs, manager: &LockManager) -> Result<Vec<String>> {
    let ctx = LockContext::named("probe");
    let options = super::acquire_options(manager, args.lease, Some(0), None);
    let mut lines = Vec::with_capacity(3);

    let handle = match manager.acquire(&ctx, &args.key, options).await? {
        AcquireOutcome::Acquired(handle) => handle,
        AcquireOutcome::TimedOut { key, attempts } => {
            lines.push(format!("acquire: {key} is held elsewhere ({attempts} attempt)"));
            return Ok(lines);
        }
    };
    lines.push(format!(
        "acquire: acquired {} lease={} token={}",
        handle.key(),
        format_duration(handle.lease()),
        handle.token()
    ));

    let owned = manager.check_ownership(&ctx, &args.key).await?;
    lines.push(format!("ownership: {}", if owned { "held" } else { "lost" }));

    let outcome = manager.release(&handle).await?;
    lines.push(format!("release: {outcome}"));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use warden_lock::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn probe_walks_the_lifecycle() {
        let manager = LockManager::new(MemoryStore::new());
        let lines = run(
            ProbeArgs {
                key: "job:42".into(),
                lease: Some(Duration::from_secs(5)),
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("acquire: acquired job:42 lease=5s token="));
        assert_eq!(lines[1], "ownership: held");
        assert_eq!(lines[2], "release: released");
    }

    #[tokio::test]
    async fn probe_reports_a_held_key() {
        let manager = LockManager::new(MemoryStore::new());
        let holder = LockContext::new();
        let _held = manager
            .acquire(&holder, "job:42", manager.config().acquire_options().fail_fast())
            .await
            .unwrap();

        let lines = run(
            ProbeArgs {
                key: "job:42".into(),
                lease: None,
            },
            &manager,
        )
        .await
        .unwrap();
        assert_eq!(lines, vec!["acquire: job:42 is held elsewhere (1 attempt)".to_string()]);
    }
}
