//! Build activity feedback.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

const BUILD_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

const STILL_BUILDING: &[&str] = &[
    "Still building",
    "Still building",
    "Yes, still building",
    "Don't give up on me",
    "Still building",
    "This is taking a while",
];

/// Log periodic reassurance while a build runs.
///
/// The watcher runs on a child of `ctx` and stops when the returned guard is
/// dropped or `ctx` is cancelled. Verbose builds stream their own output, so
/// no watcher is started for them.
pub(crate) fn watch_build(ctx: &CancellationToken, verbose: bool) -> DropGuard {
    let done = ctx.child_token();
    if !verbose {
        tokio::spawn(report_progress(done.clone(), ctx.clone()));
    }
    done.drop_guard()
}

/// Log a message every interval until `done` fires; returns how many were
/// logged.
async fn report_progress(done: CancellationToken, parent: CancellationToken) -> usize {
    let mut ticker = interval_at(
        Instant::now() + BUILD_PROGRESS_INTERVAL,
        BUILD_PROGRESS_INTERVAL,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shown = 0usize;
    loop {
        tokio::select! {
            biased;
            _ = done.cancelled() => {
                if parent.is_cancelled() {
                    tracing::warn!("build canceled");
                }
                return shown;
            }
            _ = ticker.tick() => {
                let message = STILL_BUILDING[shown.min(STILL_BUILDING.len() - 1)];
                shown += 1;
                tracing::info!("🕐 {message} ...");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_cancels_only_the_child() {
        let ctx = CancellationToken::new();
        let guard = watch_build(&ctx, false);
        drop(guard);
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_reported_each_interval_until_cancelled() {
        let ctx = CancellationToken::new();
        let watcher = tokio::spawn(report_progress(ctx.child_token(), ctx.clone()));

        tokio::time::sleep(BUILD_PROGRESS_INTERVAL * 3 + Duration::from_secs(1)).await;
        ctx.cancel();

        assert_eq!(watcher.await.expect("watcher"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_builds_report_nothing() {
        let ctx = CancellationToken::new();
        let done = ctx.child_token();
        let watcher = tokio::spawn(report_progress(done.clone(), ctx.clone()));

        tokio::time::sleep(BUILD_PROGRESS_INTERVAL / 2).await;
        done.cancel();

        assert_eq!(watcher.await.expect("watcher"), 0);
        assert!(!ctx.is_cancelled());
    }
}
