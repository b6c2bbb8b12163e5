//! Single relay connection management.
//!
//! Only three relay frames matter to this client: EVENT (a stored event
//! for one of our subscriptions), OK (accept/reject confirmation for a
//! publish) and EOSE (end of stored events). Publishes block until the
//! relay confirms or a confirmation timeout passes; everything else a
//! relay may send (NOTICE, AUTH, count frames) is logged and dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use mostro_core::Event;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::subscription::Subscription;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type OkWaiters = Arc<Mutex<HashMap<String, oneshot::Sender<(bool, String)>>>>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A relay frame this client acts on.
#[derive(Debug, Clone)]
pub enum RelayReply {
    Event {
        subscription_id: String,
        event: Event,
    },
    Confirmation {
        event_id: String,
        accepted: bool,
        message: String,
    },
    EndOfStored {
        subscription_id: String,
    },
}

/// Publish confirmation from a relay.
#[derive(Debug, Clone)]
pub struct PublishConfirmation {
    pub relay_url: String,
    pub event_id: String,
    pub accepted: bool,
    pub message: String,
}

/// Relay connection configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub connect_timeout: Duration,
    /// How long a publish waits for the relay's OK frame.
    pub confirmation_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(5),
        }
    }
}

/// Relay connection.
pub struct RelayConnection {
    url: Url,
    config: RelayConfig,
    state: Arc<RwLock<ConnectionState>>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
    ok_waiters: OkWaiters,
    recv_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl RelayConnection {
    /// Create a new relay connection with default config.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, RelayConfig::default())
    }

    /// Create a new relay connection with custom config.
    pub fn with_config(url: &str, config: RelayConfig) -> Result<Self> {
        let parsed_url = Url::parse(url)?;
        if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                parsed_url.scheme()
            )));
        }

        Ok(Self {
            url: parsed_url,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            writer: Arc::new(Mutex::new(None)),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            ok_waiters: Arc::new(Mutex::new(HashMap::new())),
            recv_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Relay URL as string.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Connect to relay and start the background read loop.
    ///
    /// Events arriving from the network are integrity-checked (id
    /// recomputation plus Schnorr verification) before they reach any
    /// subscriber; failures are dropped with a warning.
    pub async fn connect(&self) -> Result<()> {
        let mut state_guard = self.state.write().await;
        if *state_guard == ConnectionState::Connected {
            return Err(ClientError::AlreadyConnected);
        }
        *state_guard = ConnectionState::Connecting;
        drop(state_guard);

        let connect_result = timeout(
            self.config.connect_timeout,
            connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| {
            ClientError::Timeout(format!(
                "connection timeout after {:?}",
                self.config.connect_timeout
            ))
        })?
        .map_err(|error| ClientError::WebSocket(error.to_string()))?;

        let (stream, _response) = connect_result;
        let (writer, mut reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        *self.state.write().await = ConnectionState::Connected;

        let subscriptions = Arc::clone(&self.subscriptions);
        let ok_waiters = Arc::clone(&self.ok_waiters);
        let state = Arc::clone(&self.state);
        let relay_url = self.url.to_string();

        let task = tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(error) => {
                        warn!("websocket read error on {}: {}", relay_url, error);
                        break;
                    }
                };

                let reply = match parse_relay_reply(text.as_ref()) {
                    Ok(Some(reply)) => reply,
                    Ok(None) => continue,
                    Err(error) => {
                        debug!("unparseable frame from {}: {}", relay_url, error);
                        continue;
                    }
                };

                match reply {
                    RelayReply::Event {
                        subscription_id,
                        event,
                    } => {
                        if let Err(error) = event.verify() {
                            warn!(
                                "dropping unverifiable event {} from {}: {}",
                                event.id, relay_url, error
                            );
                            continue;
                        }
                        let subscription =
                            { subscriptions.lock().await.get(&subscription_id).cloned() };
                        match subscription {
                            Some(subscription) => {
                                if let Err(error) = subscription.handle_event(event) {
                                    warn!(
                                        "subscription delivery error on {}: {}",
                                        relay_url, error
                                    );
                                }
                            }
                            None => debug!(
                                "event for unknown subscription {} from {}",
                                subscription_id, relay_url
                            ),
                        }
                    }
                    RelayReply::Confirmation {
                        event_id,
                        accepted,
                        message,
                    } => {
                        let waiter = ok_waiters.lock().await.remove(&event_id);
                        match waiter {
                            Some(waiter) => {
                                let _ = waiter.send((accepted, message));
                            }
                            None if !accepted => {
                                warn!("{} rejected event {}: {}", relay_url, event_id, message);
                            }
                            None => {}
                        }
                    }
                    RelayReply::EndOfStored { subscription_id } => {
                        if let Some(subscription) =
                            subscriptions.lock().await.get(&subscription_id).cloned()
                        {
                            subscription.mark_eose();
                        }
                    }
                }
            }

            // Wake anyone still waiting on a confirmation.
            ok_waiters.lock().await.clear();
            *state.write().await = ConnectionState::Disconnected;
        });

        *self.recv_task.lock().await = Some(task);
        Ok(())
    }

    /// Disconnect from relay and stop background tasks.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            // A failed close frame still counts as disconnected.
            if let Err(error) = writer.send(Message::Close(None)).await {
                debug!("close frame to {} failed: {}", self.url, error);
            }
        }

        if let Some(task) = self.recv_task.lock().await.take() {
            task.abort();
        }

        self.ok_waiters.lock().await.clear();
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    /// Publish an event and wait for the relay's accept/reject frame.
    ///
    /// A relay that stays silent past the confirmation timeout is treated
    /// as having queued the event; an explicit rejection is reported in
    /// the confirmation.
    pub async fn publish(&self, event: &Event) -> Result<PublishConfirmation> {
        let (tx, rx) = oneshot::channel();
        self.ok_waiters.lock().await.insert(event.id.clone(), tx);

        if let Err(error) = self.send_json(&json!(["EVENT", event])).await {
            self.ok_waiters.lock().await.remove(&event.id);
            return Err(error);
        }

        let (accepted, message) = match timeout(self.config.confirmation_timeout, rx).await {
            Ok(Ok(confirmation)) => confirmation,
            Ok(Err(_)) => (false, "connection closed before confirmation".to_string()),
            Err(_) => {
                self.ok_waiters.lock().await.remove(&event.id);
                (true, "sent, no confirmation within timeout".to_string())
            }
        };

        Ok(PublishConfirmation {
            relay_url: self.url.to_string(),
            event_id: event.id.clone(),
            accepted,
            message,
        })
    }

    /// Register and send subscription request.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        self.send_json(&json!(["REQ", subscription.id, subscription.filters]))
            .await?;
        self.subscriptions
            .lock()
            .await
            .insert(subscription.id.clone(), subscription);
        Ok(())
    }

    /// Close subscription on relay.
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        self.send_json(&json!(["CLOSE", subscription_id])).await?;
        self.subscriptions.lock().await.remove(subscription_id);
        Ok(())
    }

    async fn send_json(&self, value: &Value) -> Result<()> {
        if self.state().await != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let text = serde_json::to_string(value)?;
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|error| ClientError::WebSocket(error.to_string()))
    }
}

/// Decode one relay frame.
///
/// EVENT, OK and EOSE become typed replies. NOTICE is surfaced in the
/// debug log; AUTH and any label this client does not speak decode to
/// `None` and are dropped by the caller.
pub fn parse_relay_reply(text: &str) -> Result<Option<RelayReply>> {
    let frame: Vec<Value> = serde_json::from_str(text)?;
    let mut fields = frame.into_iter();

    let label = match fields.next() {
        Some(Value::String(label)) => label,
        _ => return Err(protocol("frame does not start with a string label")),
    };

    match label.as_str() {
        "EVENT" => {
            let subscription_id = take_string(&mut fields, "EVENT subscription id")?;
            let payload = fields
                .next()
                .ok_or_else(|| protocol("EVENT frame has no payload"))?;
            let event: Event = serde_json::from_value(payload)
                .map_err(|error| protocol(format!("EVENT payload does not decode: {error}")))?;
            Ok(Some(RelayReply::Event {
                subscription_id,
                event,
            }))
        }
        "OK" => {
            let event_id = take_string(&mut fields, "OK event id")?;
            let accepted = match fields.next() {
                Some(Value::Bool(accepted)) => accepted,
                _ => return Err(protocol("OK frame has no boolean accept flag")),
            };
            // The human-readable reason is optional in practice.
            let message = match fields.next() {
                Some(Value::String(message)) => message,
                _ => String::new(),
            };
            Ok(Some(RelayReply::Confirmation {
                event_id,
                accepted,
                message,
            }))
        }
        "EOSE" => {
            let subscription_id = take_string(&mut fields, "EOSE subscription id")?;
            Ok(Some(RelayReply::EndOfStored { subscription_id }))
        }
        "NOTICE" => {
            if let Some(Value::String(message)) = fields.next() {
                debug!("relay notice: {}", message);
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn protocol(message: impl Into<String>) -> ClientError {
    ClientError::Protocol(message.into())
}

fn take_string(fields: &mut impl Iterator<Item = Value>, what: &str) -> Result<String> {
    match fields.next() {
        Some(Value::String(value)) => Ok(value),
        _ => Err(protocol(format!("missing or invalid {what}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_json() -> Value {
        json!({
            "id": "cafe".repeat(16),
            "pubkey": "feed".repeat(16),
            "created_at": 1_700_000_000u64,
            "kind": 1059,
            "tags": [["p", "dead".repeat(16)]],
            "content": "blob",
            "sig": "beef".repeat(32),
        })
    }

    #[test]
    fn decodes_event_frames() -> Result<()> {
        let text = serde_json::to_string(&json!(["EVENT", "sub-1", event_json()]))?;
        match parse_relay_reply(&text)? {
            Some(RelayReply::Event {
                subscription_id,
                event,
            }) => {
                assert_eq!(subscription_id, "sub-1");
                assert_eq!(event.kind, 1059);
                assert_eq!(event.content, "blob");
                assert_eq!(event.tags.len(), 1);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn decodes_confirmations_with_and_without_reason() -> Result<()> {
        match parse_relay_reply(r#"["OK","abc123",false,"blocked: spam"]"#)? {
            Some(RelayReply::Confirmation {
                event_id,
                accepted,
                message,
            }) => {
                assert_eq!(event_id, "abc123");
                assert!(!accepted);
                assert_eq!(message, "blocked: spam");
            }
            other => panic!("unexpected decode: {other:?}"),
        }

        // Some relays omit the reason entirely.
        match parse_relay_reply(r#"["OK","abc123",true]"#)? {
            Some(RelayReply::Confirmation {
                accepted, message, ..
            }) => {
                assert!(accepted);
                assert!(message.is_empty());
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn decodes_end_of_stored() -> Result<()> {
        match parse_relay_reply(r#"["EOSE","sub-7"]"#)? {
            Some(RelayReply::EndOfStored { subscription_id }) => {
                assert_eq!(subscription_id, "sub-7");
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn frames_this_client_does_not_speak_are_dropped() -> Result<()> {
        assert!(parse_relay_reply(r#"["NOTICE","maintenance window"]"#)?.is_none());
        assert!(parse_relay_reply(r#"["AUTH","challenge-token"]"#)?.is_none());
        assert!(parse_relay_reply(r#"["COUNT","sub",{"count":3}]"#)?.is_none());
        Ok(())
    }

    #[test]
    fn malformed_frames_are_errors() {
        struct Case {
            name: &'static str,
            input: &'static str,
        }

        let cases = [
            Case {
                name: "not an array",
                input: r#"{"label":"EVENT"}"#,
            },
            Case {
                name: "empty frame",
                input: "[]",
            },
            Case {
                name: "numeric label",
                input: "[42]",
            },
            Case {
                name: "event without payload",
                input: r#"["EVENT","sub"]"#,
            },
            Case {
                name: "event payload not an event",
                input: r#"["EVENT","sub",{"id":"only"}]"#,
            },
            Case {
                name: "ok without accept flag",
                input: r#"["OK","abc123"]"#,
            },
            Case {
                name: "ok accept flag not boolean",
                input: r#"["OK","abc123","yes"]"#,
            },
            Case {
                name: "eose without subscription id",
                input: r#"["EOSE"]"#,
            },
        ];

        for case in cases {
            assert!(
                parse_relay_reply(case.input).is_err(),
                "{}: expected a decode error",
                case.name
            );
        }
    }

    #[test]
    fn connection_requires_websocket_scheme() {
        for bad in ["https://relay.example.com", "relay.example.com", "ftp://x"] {
            assert!(RelayConnection::new(bad).is_err(), "{bad} should be refused");
        }
        assert!(RelayConnection::new("ws://relay.example.com").is_ok());
        assert!(RelayConnection::new("wss://relay.example.com").is_ok());
    }
}
