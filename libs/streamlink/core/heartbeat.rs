//! Heartbeat mechanism for feed connections
//!
//! A dedicated Tokio task sends the configured keep-alive payload at a
//! fixed interval through an unbounded crossbeam channel; the main message
//! loop forwards it onto the wire. The task exits on the shutdown signal
//! or when the channel closes, so teardown never leaks a timer.

use crate::traits::WireMessage;
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;
use tracing::debug;

/// Heartbeat task body: tick, send payload, repeat until shut down.
///
/// The first immediate interval tick is skipped so the probe starts one
/// full interval after connect.
pub async fn heartbeat_task(
    interval: Duration,
    payload: WireMessage,
    heartbeat_tx: Sender<WireMessage>,
    shutdown_rx: Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    // If we miss ticks due to slow processing, skip them rather than bursting
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("[Heartbeat] Task started with interval: {:?}", interval);

    loop {
        match shutdown_rx.try_recv() {
            Ok(_) | Err(crossbeam_channel::TryRecvError::Disconnected) => {
                debug!("[Heartbeat] Shutdown signal received");
                break;
            }
            Err(crossbeam_channel::TryRecvError::Empty) => {}
        }

        ticker.tick().await;

        if heartbeat_tx.send(payload.clone()).is_err() {
            debug!("[Heartbeat] Channel closed, exiting");
            break;
        }
    }

    debug!("[Heartbeat] Task exiting");
}

/// Spawn a heartbeat task
///
/// Returns the task handle, a shutdown sender, and the channel the
/// keep-alive payloads arrive on.
pub fn spawn_heartbeat(
    interval: Duration,
    payload: WireMessage,
) -> (
    tokio::task::JoinHandle<()>,
    Sender<()>,
    Receiver<WireMessage>,
) {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let (heartbeat_tx, heartbeat_rx) = crossbeam_channel::unbounded();

    let handle = tokio::spawn(async move {
        heartbeat_task(interval, payload, heartbeat_tx, shutdown_rx).await;
    });

    (handle, shutdown_tx, heartbeat_rx)
}
