//! Periodic inventory scan.
//!
//! Reads the host inventory on a fixed cadence and publishes it as an
//! `INVENTORY` envelope until the cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use relaydeck_core::{Envelope, HostCapabilities, InventoryItem, InventorySlot, Publisher};
use tokio_util::sync::CancellationToken;

/// Default scan cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

const ITEM_NAMESPACE: &str = "minecraft:";

/// Convert raw slots into wire items: namespace stripped, empty slots skipped.
pub fn snapshot(slots: Vec<InventorySlot>) -> Vec<InventoryItem> {
    slots
        .into_iter()
        .filter(|slot| slot.count > 0 && !slot.item_id.is_empty())
        .map(|slot| InventoryItem {
            name: slot
                .item_id
                .strip_prefix(ITEM_NAMESPACE)
                .unwrap_or(&slot.item_id)
                .to_string(),
            count: slot.count,
        })
        .collect()
}

/// Run the scan loop until `cancel` is triggered.
pub async fn run(
    host: Arc<dyn HostCapabilities>,
    publisher: Publisher,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!(
        interval_ms = interval.as_millis() as u64,
        "Inventory poller started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Inventory poller stopping");
                break;
            }
            _ = ticker.tick() => {
                match host.read_inventory() {
                    Ok(slots) => publisher.publish(Envelope::Inventory(snapshot(slots))),
                    Err(e) => tracing::debug!(error = %e, "Inventory read failed"),
                }
            }
        }
    }
}
