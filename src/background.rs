//! Background Maintenance (component I): the crate's one `tokio::spawn`ed
//! task. Ticks on a fixed interval and, under the broker mutex (taken
//! inside `Broker::run_maintenance_pass`), refreshes runtime gauges and
//! opportunistically reclaims expired leases. Shutdown is cooperative via
//! a `tokio::sync::watch<bool>`, mirroring the teacher's cancellation
//! idiom in `client/data_plane.rs::purge_concurrent`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::broker::Broker;

/// A handle to the running maintenance task. Dropping it does not stop
/// the task — call [`MaintenanceHandle::shutdown`] for a clean stop.
pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signals the loop to stop at its next wake and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

/// Spawns the maintenance loop on the current Tokio runtime.
pub fn spawn(broker: Arc<Broker>, interval: Duration) -> MaintenanceHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_pass(&broker);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    MaintenanceHandle { shutdown_tx, join }
}

fn run_pass(broker: &Broker) {
    // A panic inside one pass must not take down the loop; the next
    // pass can still make progress on entities unaffected by it.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        broker.run_maintenance_pass();
    }));
    if result.is_err() {
        tracing::error!("maintenance pass panicked; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::model::{QueueProperties, SendRequest};

    #[tokio::test(start_paused = true)]
    async fn maintenance_loop_refreshes_gauges_and_stops_cleanly() {
        let broker = Arc::new(Broker::new(BrokerConfig::default()));
        broker.create_queue("orders", QueueProperties::default()).unwrap();
        broker
            .send("orders", SendRequest { body: b"A".to_vec(), ..Default::default() })
            .unwrap();

        let handle = spawn(Arc::clone(&broker), Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        let q = broker.get_queue("orders").unwrap();
        assert_eq!(q.runtime.active_message_count, 1);

        handle.shutdown().await;
    }
}
