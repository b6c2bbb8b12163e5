//! Relay pool for multi-relay fanout.
//!
//! Publishes are disjunctive: one accepting relay is success, the rest
//! are warnings. Fetches are a union: every relay is queried, results are
//! deduplicated by event id.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use mostro_core::Event;
use rand::Rng;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::relay::{PublishConfirmation, RelayConfig, RelayConnection};
use crate::subscription::Subscription;

/// Relay pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of relays in the pool.
    pub max_relays: usize,
    /// Relay configuration template.
    pub relay_config: RelayConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_relays: 16,
            relay_config: RelayConfig::default(),
        }
    }
}

/// Multi-relay pool.
pub struct RelayPool {
    relays: Arc<RwLock<HashMap<String, Arc<RelayConnection>>>>,
    config: PoolConfig,
}

impl RelayPool {
    /// Create new relay pool.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            relays: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Add relay URL to pool (not connected until `connect_all`).
    pub async fn add_relay(&self, url: &str) -> Result<()> {
        let mut relays = self.relays.write().await;
        if relays.contains_key(url) {
            return Ok(());
        }
        if relays.len() >= self.config.max_relays {
            return Err(ClientError::Internal(format!(
                "maximum relay limit ({}) reached",
                self.config.max_relays
            )));
        }
        let relay = RelayConnection::with_config(url, self.config.relay_config.clone())?;
        relays.insert(url.to_string(), Arc::new(relay));
        Ok(())
    }

    /// Connect all relays. Succeeds when at least one connects.
    pub async fn connect_all(&self) -> Result<()> {
        let relays = self.relay_list().await;
        let mut successful = 0usize;
        for relay in relays {
            match relay.connect().await {
                Ok(()) => successful += 1,
                Err(error) => warn!("relay connect failed for {}: {}", relay.url(), error),
            }
        }
        if successful == 0 {
            return Err(ClientError::Connection(
                "failed to connect to any relay".to_string(),
            ));
        }
        Ok(())
    }

    /// Disconnect all relays. Must run on every exit path.
    pub async fn disconnect_all(&self) -> Result<()> {
        for relay in self.relay_list().await {
            if let Err(error) = relay.disconnect().await {
                debug!("relay disconnect failed for {}: {}", relay.url(), error);
            }
        }
        Ok(())
    }

    /// Publish event to all connected relays.
    ///
    /// Returns the per-relay confirmations; errors only when no relay at
    /// all took the event.
    pub async fn publish(&self, event: &Event) -> Result<Vec<PublishConfirmation>> {
        let relays = self.relay_list().await;
        if relays.is_empty() {
            return Err(ClientError::NotConnected);
        }

        let mut confirmations = Vec::new();
        for relay in relays {
            match relay.publish(event).await {
                Ok(confirmation) => confirmations.push(confirmation),
                Err(error) => {
                    warn!("publish to {} failed: {}", relay.url(), error);
                    confirmations.push(PublishConfirmation {
                        relay_url: relay.url().to_string(),
                        event_id: event.id.clone(),
                        accepted: false,
                        message: error.to_string(),
                    });
                }
            }
        }

        if confirmations.iter().any(|confirmation| confirmation.accepted) {
            Ok(confirmations)
        } else {
            Err(ClientError::PublishFailed)
        }
    }

    /// Send subscription to all connected relays.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        let relays = self.relay_list().await;
        if relays.is_empty() {
            return Err(ClientError::NotConnected);
        }
        let mut successful = 0usize;
        for relay in relays {
            match relay.subscribe(subscription.clone()).await {
                Ok(()) => successful += 1,
                Err(error) => warn!("subscribe on {} failed: {}", relay.url(), error),
            }
        }
        if successful == 0 {
            return Err(ClientError::Subscription(
                "no relay accepted the subscription".to_string(),
            ));
        }
        Ok(())
    }

    /// Close subscription on all relays.
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        for relay in self.relay_list().await {
            if let Err(error) = relay.unsubscribe(subscription_id).await {
                debug!("unsubscribe on {} failed: {}", relay.url(), error);
            }
        }
        Ok(())
    }

    /// Query all relays and collect the union of matching events.
    ///
    /// Drains until every queried relay reports end-of-stored-events or
    /// the deadline passes, whichever comes first. Duplicate events (same
    /// id from several relays) are dropped on the way in.
    pub async fn fetch_events(
        &self,
        filters: Vec<Value>,
        window: Duration,
    ) -> Result<Vec<Event>> {
        let relay_count = self.relay_list().await.len();
        let subscription_id = format!("fetch-{:012x}", rand::thread_rng().gen_range(0..u64::MAX));
        let (subscription, mut receiver) =
            Subscription::with_channel(subscription_id.clone(), filters);

        self.subscribe(subscription.clone()).await?;

        let deadline = Instant::now() + window;
        let mut seen: HashSet<String> = HashSet::new();
        let mut events = Vec::new();

        loop {
            if subscription.eose_count() >= relay_count {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("fetch window elapsed for {}", subscription_id);
                break;
            }
            // Poll in short slices so the EOSE tally is re-checked even
            // while no events arrive.
            let slice = remaining.min(Duration::from_millis(200));
            match tokio::time::timeout(slice, receiver.recv()).await {
                Ok(Some(event)) => {
                    if seen.insert(event.id.clone()) {
                        events.push(event);
                    }
                }
                Ok(None) => break,
                Err(_) => {}
            }
        }

        self.unsubscribe(&subscription_id).await?;
        Ok(events)
    }

    /// Get relay by URL.
    pub async fn relay(&self, url: &str) -> Option<Arc<RelayConnection>> {
        self.relays.read().await.get(url).cloned()
    }

    /// Number of relays in the pool.
    pub async fn len(&self) -> usize {
        self.relays.read().await.len()
    }

    /// True when the pool has no relays.
    pub async fn is_empty(&self) -> bool {
        self.relays.read().await.is_empty()
    }

    async fn relay_list(&self) -> Vec<Arc<RelayConnection>> {
        self.relays.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_relay_deduplicates_and_caps() -> Result<()> {
        let pool = RelayPool::new(PoolConfig {
            max_relays: 2,
            relay_config: RelayConfig::default(),
        });
        pool.add_relay("wss://one.example.com").await?;
        pool.add_relay("wss://one.example.com").await?;
        assert_eq!(pool.len().await, 1);

        pool.add_relay("wss://two.example.com").await?;
        assert!(matches!(
            pool.add_relay("wss://three.example.com").await,
            Err(ClientError::Internal(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn publish_without_relays_is_not_connected() {
        let pool = RelayPool::new(PoolConfig::default());
        let event = Event {
            id: "id".to_string(),
            pubkey: "pubkey".to_string(),
            created_at: 1,
            kind: 1,
            tags: vec![],
            content: String::new(),
            sig: "sig".to_string(),
        };
        assert!(matches!(
            pool.publish(&event).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn publish_to_disconnected_relays_fails_disjunctively() -> Result<()> {
        let pool = RelayPool::new(PoolConfig::default());
        pool.add_relay("wss://one.example.com").await?;
        pool.add_relay("wss://two.example.com").await?;

        let event = Event {
            id: "id".to_string(),
            pubkey: "pubkey".to_string(),
            created_at: 1,
            kind: 1,
            tags: vec![],
            content: String::new(),
            sig: "sig".to_string(),
        };
        // Neither relay is connected, so no relay accepts.
        assert!(matches!(
            pool.publish(&event).await,
            Err(ClientError::PublishFailed)
        ));
        Ok(())
    }
}
