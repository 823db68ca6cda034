// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live event fan-out for observers.
//!
//! Publication never blocks on observer backpressure: slow subscribers
//! lag and drop events (the drop count is logged on their side), and a
//! bus with no subscribers is a no-op.

use fm_core::ExecutionEvent;
use tokio::sync::broadcast;
use tracing::warn;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast fan-out of execution events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Best-effort delivery to current subscribers.
    pub fn publish(&self, event: &ExecutionEvent) {
        // Send only fails when there are no subscribers; that's fine.
        let _ = self.tx.send(event.clone());
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving side of the fan-out.
pub struct EventSubscriber {
    rx: broadcast::Receiver<ExecutionEvent>,
}

impl EventSubscriber {
    /// Next event, skipping over any dropped by lag. `None` when the bus
    /// is gone.
    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    warn!(dropped, "event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
