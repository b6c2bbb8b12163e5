//! Subscription management for receiving filtered events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mostro_core::Event;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{ClientError, Result};

/// A subscription to filtered events, fanned out across the pool.
///
/// One subscription is cloned to every relay; events funnel into a single
/// channel and each relay's end-of-stored-events marker bumps a shared
/// counter so callers know when the whole pool has drained.
#[derive(Clone)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Filters for this subscription.
    pub filters: Vec<Value>,
    eose_count: Arc<AtomicUsize>,
    event_tx: mpsc::Sender<Event>,
}

impl Subscription {
    /// Create a subscription that receives events on a bounded channel.
    pub fn with_channel(id: String, filters: Vec<Value>) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(1000);
        let subscription = Self {
            id,
            filters,
            eose_count: Arc::new(AtomicUsize::new(0)),
            event_tx: tx,
        };
        (subscription, rx)
    }

    /// Handle a received event.
    pub fn handle_event(&self, event: Event) -> Result<()> {
        self.event_tx.try_send(event).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => {
                ClientError::Subscription("event channel full - consumer too slow".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                ClientError::Subscription("event channel closed".to_string())
            }
        })
    }

    /// Record one relay reaching end-of-stored-events.
    pub fn mark_eose(&self) {
        self.eose_count.fetch_add(1, Ordering::Relaxed);
    }

    /// How many relays have reached end-of-stored-events.
    pub fn eose_count(&self) -> usize {
        self.eose_count.load(Ordering::Relaxed)
    }
}
