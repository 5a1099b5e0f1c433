//! Poll scheduler.
//!
//! Drives the monitor loop: each tick runs one full cycle (fetch carbs,
//! evaluate, alert) to completion before the next tick is awaited, so cycles
//! never overlap.

use std::future::{self, Future};
use std::io;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::monitor::{AlertOutcome, BolusMonitor, CycleReport};

/// Run the monitor until `shutdown` flips to `true` (or its sender is dropped).
///
/// The first cycle runs immediately. Service errors inside a cycle are logged
/// by the monitor and never end the loop.
pub async fn run_monitor(
    monitor: BolusMonitor,
    loop_time: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(loop_time);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Bolus monitor started (interval: {}s)", loop_time.as_secs());

    loop {
        let stop = *shutdown.borrow();
        if stop {
            tracing::info!("Shutdown signal received. Stopping monitor.");
            break;
        }

        tokio::select! {
            _ = interval.tick() => {
                let report = monitor.poll_once().await;
                log_cycle(&report);
            }

            changed = shutdown.changed() => {
                if changed.is_err() {
                    tracing::info!("Shutdown sender dropped. Stopping monitor.");
                    break;
                }
            }
        }
    }

    tracing::info!("Bolus monitor stopped cleanly");
}

/// Flip `shutdown` once `signal` resolves.
///
/// If the signal handler cannot be installed the sender is held forever, so
/// the monitor keeps running instead of seeing a dropped channel.
pub async fn forward_shutdown<S>(signal: S, shutdown: watch::Sender<bool>)
where
    S: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            let _ = shutdown.send(true);
        }
        Err(err) => {
            tracing::error!("Unable to listen for shutdown signal: {}", err);
            future::pending::<()>().await;
        }
    }
}

fn log_cycle(report: &CycleReport) {
    let eval = &report.evaluation;
    match report.alert {
        Some(AlertOutcome::Sent { notified, recorded }) => tracing::info!(
            "Cycle done: alert raised (notified: {}, recorded: {})",
            notified,
            recorded
        ),
        Some(AlertOutcome::AlreadyAlerted) => {
            tracing::info!("Cycle done: missed bolus already alerted")
        }
        Some(AlertOutcome::Suppressed) => tracing::info!("Cycle done: alert suppressed (dry run)"),
        None => tracing::debug!(
            "Cycle done: {} carb entries, {} too recent, {} matched",
            report.carb_entries,
            eval.too_recent,
            eval.matched
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::MonitorSettings;
    use crate::models::CARB_EVENT;
    use crate::services::mock::{MockNotifier, MockTreatmentStore};

    fn make_monitor(store: &Arc<MockTreatmentStore>) -> BolusMonitor {
        BolusMonitor::new(
            &MonitorSettings::default(),
            "test-host",
            store.clone(),
            Arc::new(MockNotifier::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_every_tick_until_shutdown() {
        let store = Arc::new(MockTreatmentStore::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_monitor(
            make_monitor(&store),
            Duration::from_secs(240),
            rx,
        ));

        // Ticks at 0s, 240s and 480s.
        time::sleep(Duration::from_secs(500)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(store.fetches_for(CARB_EVENT), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_sender_is_dropped() {
        let store = Arc::new(MockTreatmentStore::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_monitor(
            make_monitor(&store),
            Duration::from_secs(240),
            rx,
        ));

        time::sleep(Duration::from_secs(10)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.fetches_for(CARB_EVENT), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_signal_listener_keeps_monitor_running() {
        let store = Arc::new(MockTreatmentStore::new());
        let (tx, rx) = watch::channel(false);

        let listener = tokio::spawn(forward_shutdown(
            async { Err(io::Error::new(io::ErrorKind::Other, "no signal support")) },
            tx,
        ));
        let handle = tokio::spawn(run_monitor(
            make_monitor(&store),
            Duration::from_secs(240),
            rx,
        ));

        // Ticks at 0s and 240s; a dropped sender would have stopped after the first.
        time::sleep(Duration::from_secs(300)).await;

        assert!(!handle.is_finished());
        assert_eq!(store.fetches_for(CARB_EVENT), 2);

        listener.abort();
        let _ = listener.await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn signal_flips_shutdown() {
        let (tx, rx) = watch::channel(false);

        forward_shutdown(async { Ok(()) }, tx).await;

        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn does_not_poll_when_already_shut_down() {
        let store = Arc::new(MockTreatmentStore::new());
        let (_tx, rx) = watch::channel(true);

        run_monitor(make_monitor(&store), Duration::from_secs(240), rx).await;

        assert_eq!(store.query_count(), 0);
    }
}
