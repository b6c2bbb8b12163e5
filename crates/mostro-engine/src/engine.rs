//! Trade orchestration.
//!
//! One action is one cooperative sequence: validate, enforce the safety
//! envelope, pick the right trade key, wrap and publish, wait a bounded
//! delay, fetch replies, correlate by request id, dispatch the outcome,
//! append the audit entry. The relay pool is released on every exit path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mostro_core::chat::{self, ChatMessage};
use mostro_core::event::{unix_now, GIFT_WRAP_KIND};
use mostro_core::giftwrap::{self, MIN_FETCH_WINDOW_SECS};
use mostro_core::keys::{seed_path, KeyRing, Keypair};
use mostro_core::message::{
    self, correlate_response, new_request_id, Action, FetchedMessage, MatchQuality, Message,
    Payload, RestoreData, SmallOrder,
};
use mostro_core::order::{OrderBookEntry, OrderFilter, OrderKind};
use mostro_client::{PoolConfig, RelayPool};

use crate::audit::{AuditEntry, AuditJournal, AuditResult};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::price::{estimate_sats, PriceOracle};
use crate::safety::{check_limits, check_price_deviation, PriceCheck};
use crate::state::TradeState;

/// Wait before fetching replies to a simple lifecycle action.
const LIFECYCLE_WAIT: Duration = Duration::from_secs(5);
/// Wait before fetching replies to order creation and takes.
const ORDER_WAIT: Duration = Duration::from_secs(8);
/// Wall-clock window for draining reply fetches.
const FETCH_WINDOW: Duration = Duration::from_secs(10);

/// The trade key index lifecycle actions fall back to when an order was
/// never recorded in the order-index map.
const FALLBACK_TRADE_INDEX: u32 = 1;

/// Arguments for creating an order.
#[derive(Debug, Clone)]
pub struct NewOrderParams {
    pub kind: OrderKind,
    pub fiat_code: String,
    pub fiat_amount: i64,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub amount_sats: i64,
    pub payment_method: String,
    pub premium: i64,
    pub buyer_invoice: Option<String>,
}

/// Structured outcome of one user-facing action.
#[derive(Debug, Clone)]
pub enum TradeOutcome {
    /// The coordinator accepted the order and assigned it an id.
    OrderConfirmed { order_id: Uuid, order: SmallOrder },
    /// A hold invoice must be paid to proceed.
    PayInvoice {
        order_id: Option<Uuid>,
        invoice: String,
        amount: Option<i64>,
    },
    /// The coordinator wants a Lightning invoice from us.
    ProvideInvoice {
        order_id: Option<Uuid>,
        order: Option<SmallOrder>,
    },
    /// The action was acknowledged and the trade advanced.
    Acknowledged {
        action: Action,
        order_id: Option<Uuid>,
    },
    /// A dispute is now open, under the coordinator-assigned id.
    DisputeOpened {
        order_id: Option<Uuid>,
        dispute_id: Option<String>,
    },
    /// The coordinator refused, with its reason.
    Rejected { reason: String },
    /// Nothing came back inside the window.
    NoResponse { action: Action },
    /// A reply we pass through without special handling.
    Informational { action: Action },
}

/// Orchestrates all trading actions against one coordinator.
pub struct TradeEngine {
    config: Config,
    keys: KeyRing,
    pool: RelayPool,
    journal: AuditJournal,
    state: TradeState,
    state_path: PathBuf,
    oracle: PriceOracle,
    privacy_mode: bool,
}

impl TradeEngine {
    /// Build an engine over the given data directory, creating the seed
    /// on first launch.
    pub fn new(config: Config, data_dir: &Path) -> Result<Self> {
        config.validate()?;
        crate::config::ensure_data_dir(data_dir)?;

        let (keys, was_new) = KeyRing::load_or_create(seed_path(data_dir))?;
        if was_new {
            info!("generated a new identity; back up the seed file now");
        }

        let state_path = data_dir.join("trade-state.json");
        let state = TradeState::load(&state_path)?;
        let journal = AuditJournal::new(data_dir.join("audit.log"));
        let oracle = PriceOracle::new(config.price_api.clone());

        Ok(Self {
            config,
            keys,
            pool: RelayPool::new(PoolConfig::default()),
            journal,
            state,
            state_path,
            oracle,
            privacy_mode: false,
        })
    }

    /// Sign seals with the trade key instead of the identity key,
    /// trading reputation for unlinkability.
    pub fn with_privacy_mode(mut self, privacy_mode: bool) -> Self {
        self.privacy_mode = privacy_mode;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn state(&self) -> &TradeState {
        &self.state
    }

    // ---- order book ----

    /// Query the public order book.
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<OrderBookEntry>> {
        self.connect().await?;
        let result = self.fetch_book(filter).await;
        let _ = self.pool.disconnect_all().await;
        result
    }

    async fn fetch_book(&self, filter: OrderFilter) -> Result<Vec<OrderBookEntry>> {
        let events = self
            .pool
            .fetch_events(
                vec![filter.to_relay_filter(&self.config.mostro_pubkey)],
                FETCH_WINDOW,
            )
            .await?;

        let mut entries: Vec<OrderBookEntry> = events
            .iter()
            .filter_map(|event| match OrderBookEntry::from_event(event) {
                Ok(entry) => Some(entry),
                Err(error) => {
                    debug!("skipping unparseable order event {}: {}", event.id, error);
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Fetch one order by id.
    pub async fn order_status(&self, order_id: &Uuid) -> Result<OrderBookEntry> {
        self.connect().await?;
        let result = self.fetch_order(order_id).await;
        let _ = self.pool.disconnect_all().await;
        result
    }

    async fn fetch_order(&self, order_id: &Uuid) -> Result<OrderBookEntry> {
        let filter = json!({
            "kinds": [mostro_core::event::ORDER_KIND],
            "authors": [self.config.mostro_pubkey],
            "#d": [order_id.to_string()],
        });
        let events = self.pool.fetch_events(vec![filter], FETCH_WINDOW).await?;
        events
            .iter()
            .filter_map(|event| OrderBookEntry::from_event(event).ok())
            .max_by_key(|entry| entry.created_at)
            .ok_or_else(|| EngineError::OrderNotFound(order_id.to_string()))
    }

    // ---- trading actions ----

    /// Create a new order.
    pub async fn submit_order(&mut self, params: NewOrderParams) -> Result<TradeOutcome> {
        let fiat_code = params.fiat_code.to_uppercase();
        let fiat_for_estimate = params.max_amount.unwrap_or(params.fiat_amount);

        let price = self.oracle.btc_price(&fiat_code).await;
        let estimated = if params.amount_sats > 0 {
            params.amount_sats as u64
        } else {
            estimate_sats(fiat_for_estimate, price)
        };

        if let Err(violation) =
            check_limits(&self.config.limits, &self.state, estimated, Utc::now())
        {
            let reason = violation.to_string();
            self.journal.append(
                &AuditEntry::new(Action::NewOrder.as_str(), AuditResult::Rejected)
                    .fiat(Some(params.fiat_amount), Some(&fiat_code))
                    .details(&reason),
            )?;
            return Err(EngineError::LimitExceeded(reason));
        }

        if let PriceCheck::Deviates {
            deviation_percent,
            max,
        } = check_price_deviation(
            Some(params.premium),
            params.amount_sats.max(0) as u64,
            params.fiat_amount as f64,
            price,
            self.config.max_premium_deviation,
        ) {
            let reason = format!("{deviation_percent:.1}% from market, max {max:.1}%");
            self.journal.append(
                &AuditEntry::new(Action::NewOrder.as_str(), AuditResult::Rejected)
                    .fiat(Some(params.fiat_amount), Some(&fiat_code))
                    .details(&reason),
            )?;
            return Err(EngineError::PriceDeviation(reason));
        }

        let trade_index = self.state.allocate_trade_index();
        self.state.save(&self.state_path)?;
        let trade = self.keys.trade_keypair(trade_index)?;

        let request_id = new_request_id();
        let message = message::new_order(
            params.kind,
            &fiat_code,
            params.fiat_amount,
            params.min_amount,
            params.max_amount,
            params.amount_sats,
            &params.payment_method,
            params.premium,
            params.buyer_invoice.clone(),
            request_id,
            trade_index,
        );

        self.connect().await?;
        let reply = self
            .submit_and_wait(
                &message,
                &trade,
                request_id,
                ORDER_WAIT,
                &[Action::NewOrder, Action::PayInvoice, Action::CantDo],
            )
            .await;
        let _ = self.pool.disconnect_all().await;

        let outcome = self.dispatch(Action::NewOrder, reply?)?;

        if let TradeOutcome::OrderConfirmed { order_id, .. } = &outcome {
            self.state.record_order_index(*order_id, trade_index);
            self.state.record_trade(estimated, Utc::now());
            self.state.save(&self.state_path)?;
        }
        self.audit(
            Action::NewOrder,
            outcome_order_id(&outcome),
            Some((params.fiat_amount, fiat_code.as_str())),
            &outcome,
        )?;
        Ok(outcome)
    }

    /// Take an existing order from the book.
    pub async fn take_order(
        &mut self,
        order_id: Uuid,
        amount: Option<i64>,
        invoice: Option<String>,
    ) -> Result<TradeOutcome> {
        self.connect().await?;
        let result = self.take_order_inner(order_id, amount, invoice).await;
        let _ = self.pool.disconnect_all().await;

        let (action, outcome) = result?;
        self.audit(action, Some(order_id), None, &outcome)?;
        Ok(outcome)
    }

    async fn take_order_inner(
        &mut self,
        order_id: Uuid,
        amount: Option<i64>,
        invoice: Option<String>,
    ) -> Result<(Action, TradeOutcome)> {
        let entry = self.fetch_order(&order_id).await?;

        let fiat_estimate = amount.unwrap_or_else(|| {
            entry
                .fiat_amount
                .split('-')
                .next()
                .and_then(|value| value.parse().ok())
                .unwrap_or_default()
        });
        let price = self.oracle.btc_price(&entry.currency).await;
        let estimated = if entry.amount_sats > 0 {
            entry.amount_sats
        } else {
            estimate_sats(fiat_estimate, price)
        };

        if let Err(violation) =
            check_limits(&self.config.limits, &self.state, estimated, Utc::now())
        {
            let reason = violation.to_string();
            self.journal.append(
                &AuditEntry::new(take_action(&entry).as_str(), AuditResult::Rejected)
                    .order_id(Some(order_id))
                    .details(&reason),
            )?;
            return Err(EngineError::LimitExceeded(reason));
        }

        if let PriceCheck::Deviates {
            deviation_percent,
            max,
        } = check_price_deviation(
            Some(entry.premium),
            entry.amount_sats,
            fiat_estimate as f64,
            price,
            self.config.max_premium_deviation,
        ) {
            let reason = format!("{deviation_percent:.1}% from market, max {max:.1}%");
            self.journal.append(
                &AuditEntry::new(take_action(&entry).as_str(), AuditResult::Rejected)
                    .order_id(Some(order_id))
                    .details(&reason),
            )?;
            return Err(EngineError::PriceDeviation(reason));
        }

        let trade_index = self.state.allocate_trade_index();
        self.state.record_order_index(order_id, trade_index);
        self.state.save(&self.state_path)?;
        let trade = self.keys.trade_keypair(trade_index)?;

        let request_id = new_request_id();
        let picked_amount = amount.filter(|_| entry.is_range());
        let (action, message) = match entry.kind {
            // Taking a sell order makes us the buyer.
            OrderKind::Sell => (
                Action::TakeSell,
                message::take_sell(order_id, invoice, picked_amount, request_id, trade_index),
            ),
            // Taking a buy order makes us the seller.
            OrderKind::Buy => (
                Action::TakeBuy,
                message::take_buy(order_id, picked_amount, request_id, trade_index),
            ),
        };

        let reply = self
            .submit_and_wait(
                &message,
                &trade,
                request_id,
                ORDER_WAIT,
                &[
                    Action::PayInvoice,
                    Action::AddInvoice,
                    Action::WaitingSellerToPay,
                    Action::WaitingBuyerInvoice,
                    Action::CantDo,
                ],
            )
            .await?;

        let outcome = self.dispatch(action, reply)?;
        if matches!(
            outcome,
            TradeOutcome::Acknowledged { .. }
                | TradeOutcome::PayInvoice { .. }
                | TradeOutcome::ProvideInvoice { .. }
        ) {
            self.state.record_trade(estimated, Utc::now());
            self.state.save(&self.state_path)?;
        }
        Ok((action, outcome))
    }

    /// Cancel an order.
    pub async fn cancel(&mut self, order_id: Uuid) -> Result<TradeOutcome> {
        self.lifecycle_action(order_id, Action::Cancel, &[
            Action::Canceled,
            Action::CooperativeCancelInitiatedByYou,
            Action::CooperativeCancelAccepted,
            Action::CantDo,
        ])
        .await
    }

    /// Tell the coordinator the fiat payment went out.
    pub async fn fiat_sent(&mut self, order_id: Uuid) -> Result<TradeOutcome> {
        self.lifecycle_action(order_id, Action::FiatSent, &[
            Action::FiatSentOk,
            Action::CantDo,
        ])
        .await
    }

    /// Release the escrowed sats to the buyer.
    pub async fn release(&mut self, order_id: Uuid) -> Result<TradeOutcome> {
        self.lifecycle_action(order_id, Action::Release, &[
            Action::Released,
            Action::PurchaseCompleted,
            Action::CantDo,
        ])
        .await
    }

    /// Open a dispute on an order.
    pub async fn dispute(&mut self, order_id: Uuid) -> Result<TradeOutcome> {
        self.lifecycle_action(order_id, Action::Dispute, &[
            Action::DisputeInitiatedByYou,
            Action::CantDo,
        ])
        .await
    }

    /// Rate the counterparty after a completed trade.
    pub async fn rate(&mut self, order_id: Uuid, rating: u8) -> Result<TradeOutcome> {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::InvalidArgument(format!(
                "rating must be 1..5, got {rating}"
            )));
        }
        let (trade, trade_index) = self.trade_keypair_for(&order_id)?;
        let request_id = new_request_id();
        let message = message::rate_user(order_id, rating, request_id, trade_index);

        self.connect().await?;
        let reply = self
            .submit_and_wait(
                &message,
                &trade,
                request_id,
                LIFECYCLE_WAIT,
                &[Action::RateReceived, Action::CantDo],
            )
            .await;
        let _ = self.pool.disconnect_all().await;

        let outcome = self.dispatch(Action::RateUser, reply?)?;
        self.audit(Action::RateUser, Some(order_id), None, &outcome)?;
        Ok(outcome)
    }

    /// Supply the invoice the coordinator asked for.
    pub async fn add_invoice(&mut self, order_id: Uuid, invoice: String) -> Result<TradeOutcome> {
        if invoice.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "invoice must not be empty".to_string(),
            ));
        }
        let (trade, trade_index) = self.trade_keypair_for(&order_id)?;
        let request_id = new_request_id();
        let message = message::add_invoice(order_id, invoice, request_id, trade_index);

        self.connect().await?;
        let reply = self
            .submit_and_wait(
                &message,
                &trade,
                request_id,
                LIFECYCLE_WAIT,
                &[
                    Action::WaitingSellerToPay,
                    Action::BuyerInvoiceAccepted,
                    Action::CantDo,
                ],
            )
            .await;
        let _ = self.pool.disconnect_all().await;

        let outcome = self.dispatch(Action::AddInvoice, reply?)?;
        self.audit(Action::AddInvoice, Some(order_id), None, &outcome)?;
        Ok(outcome)
    }

    async fn lifecycle_action(
        &mut self,
        order_id: Uuid,
        action: Action,
        expected: &[Action],
    ) -> Result<TradeOutcome> {
        let (trade, trade_index) = self.trade_keypair_for(&order_id)?;
        let request_id = new_request_id();
        let message = message::lifecycle(order_id, action, request_id, trade_index);

        self.connect().await?;
        let reply = self
            .submit_and_wait(&message, &trade, request_id, LIFECYCLE_WAIT, expected)
            .await;
        let _ = self.pool.disconnect_all().await;

        let outcome = self.dispatch(action, reply?)?;
        self.audit(action, Some(order_id), None, &outcome)?;
        Ok(outcome)
    }

    // ---- peer chat ----

    /// Send one end-to-end encrypted chat line to the counterparty.
    pub async fn send_chat(
        &mut self,
        order_id: Uuid,
        counterparty_pubkey: &str,
        text: &str,
    ) -> Result<()> {
        let (trade, _) = self.trade_keypair_for(&order_id)?;
        let shared = chat::shared_identity(&trade, counterparty_pubkey)?;
        let wrap = chat::wrap_chat_message(text, &trade, &shared)?;

        self.connect().await?;
        let result = self.pool.publish(&wrap).await;
        let _ = self.pool.disconnect_all().await;
        result?;

        self.journal.append(
            &AuditEntry::new(Action::SendDm.as_str(), AuditResult::Success)
                .order_id(Some(order_id)),
        )?;
        Ok(())
    }

    /// Fetch the chat history for a trade.
    ///
    /// Messages with invalid inner signatures are dropped without output.
    pub async fn fetch_chat(
        &self,
        order_id: Uuid,
        counterparty_pubkey: &str,
    ) -> Result<Vec<ChatMessage>> {
        let (trade, _) = self.trade_keypair_for(&order_id)?;
        let shared = chat::shared_identity(&trade, counterparty_pubkey)?;

        self.connect().await?;
        let filter = json!({
            "kinds": [GIFT_WRAP_KIND],
            "#p": [shared.public_hex()],
            "since": unix_now().saturating_sub(MIN_FETCH_WINDOW_SECS),
        });
        let result = self.pool.fetch_events(vec![filter], FETCH_WINDOW).await;
        let _ = self.pool.disconnect_all().await;

        let mut messages: Vec<ChatMessage> = result?
            .iter()
            .filter_map(|event| match chat::unwrap_chat_message(event, &shared) {
                Ok(message) => Some(message),
                Err(error) => {
                    debug!("dropping chat event {}: {}", event.id, error);
                    None
                }
            })
            .collect();
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }

    // ---- session restore ----

    /// Re-synchronise the trade-index cursor and recover open orders.
    ///
    /// Only the trade key at the requesting index participates; orders
    /// created under other indices are not returned by the coordinator.
    pub async fn restore_session(&mut self) -> Result<RestoreData> {
        self.connect().await?;
        let result = self.restore_session_inner().await;
        let _ = self.pool.disconnect_all().await;

        let audit_result = match &result {
            Ok(_) => AuditResult::Success,
            Err(_) => AuditResult::Failed,
        };
        self.journal
            .append(&AuditEntry::new(Action::RestoreSession.as_str(), audit_result))?;
        result
    }

    async fn restore_session_inner(&mut self) -> Result<RestoreData> {
        let trade = self.keys.trade_keypair(FALLBACK_TRADE_INDEX)?;

        let request_id = new_request_id();
        let reply = self
            .submit_and_wait(
                &message::last_trade_index(request_id),
                &trade,
                request_id,
                LIFECYCLE_WAIT,
                &[Action::LastTradeIndex],
            )
            .await?;

        if let Some((fetched, _)) = &reply {
            let last_index = fetched.message.inner().and_then(|kind| kind.trade_index);
            if let Some(last_index) = last_index {
                info!("coordinator last trade index: {}", last_index);
                self.state.set_trade_index(last_index + 1);
                self.state.save(&self.state_path)?;
            }
        }

        let request_id = new_request_id();
        let reply = self
            .submit_and_wait(
                &message::restore_session(request_id),
                &trade,
                request_id,
                ORDER_WAIT,
                &[Action::RestoreSession],
            )
            .await?;

        let data = match reply {
            Some((fetched, _)) => match fetched.message.payload() {
                Some(Payload::RestoreData(data)) => data.clone(),
                _ => RestoreData::default(),
            },
            None => RestoreData::default(),
        };

        for order in &data.orders {
            self.state.record_order_index(order.id, order.trade_index);
        }
        self.state.save(&self.state_path)?;
        Ok(data)
    }

    // ---- internals ----

    async fn connect(&self) -> Result<()> {
        for relay in &self.config.relays {
            self.pool.add_relay(relay).await?;
        }
        self.pool.connect_all().await?;
        Ok(())
    }

    /// Public half of the trade key tracked for an order.
    pub fn trade_pubkey_for(&self, order_id: &Uuid) -> Result<String> {
        let (keypair, _) = self.trade_keypair_for(order_id)?;
        Ok(keypair.public_hex())
    }

    /// Trade key tracked for the order, or the documented index-1 fallback.
    fn trade_keypair_for(&self, order_id: &Uuid) -> Result<(Keypair, u32)> {
        let index = match self.state.index_for_order(order_id) {
            Some(index) => index,
            None => {
                warn!(
                    "no trade index recorded for order {}, falling back to index {}",
                    order_id, FALLBACK_TRADE_INDEX
                );
                FALLBACK_TRADE_INDEX
            }
        };
        Ok((self.keys.trade_keypair(index)?, index))
    }

    /// Wrap, publish, wait, fetch, correlate.
    async fn submit_and_wait(
        &self,
        message: &Message,
        trade: &Keypair,
        request_id: u64,
        wait: Duration,
        expected: &[Action],
    ) -> Result<Option<(FetchedMessage, MatchQuality)>> {
        let identity = if self.privacy_mode {
            None
        } else {
            Some(self.keys.identity_keypair()?)
        };
        let wrap = giftwrap::wrap_message(
            message,
            trade,
            identity.as_ref(),
            &self.config.mostro_pubkey,
        )?;
        self.pool.publish(&wrap).await?;
        debug!("published {} as wrap {}", message.action(), wrap.id);

        tokio::time::sleep(wait).await;

        let replies = self.fetch_wrapped_messages(trade).await?;
        let matched = correlate_response(&replies, request_id, expected, unix_now())
            .map(|(fetched, quality)| (fetched.clone(), quality));
        Ok(matched)
    }

    /// Fetch and unwrap every gift wrap addressed to `trade`.
    ///
    /// Wraps that fail to decrypt or parse are skipped so one malformed
    /// event cannot poison the batch.
    async fn fetch_wrapped_messages(&self, trade: &Keypair) -> Result<Vec<FetchedMessage>> {
        let filter = json!({
            "kinds": [GIFT_WRAP_KIND],
            "#p": [trade.public_hex()],
            "since": unix_now().saturating_sub(MIN_FETCH_WINDOW_SECS),
        });
        let events = self.pool.fetch_events(vec![filter], FETCH_WINDOW).await?;

        Ok(events
            .iter()
            .filter_map(|event| match giftwrap::unwrap_event(event, trade) {
                Ok(unwrapped) => Some(FetchedMessage {
                    message: unwrapped.message,
                    created_at: unwrapped.rumor_created_at,
                }),
                Err(error) => {
                    debug!("skipping undecryptable wrap {}: {}", event.id, error);
                    None
                }
            })
            .collect())
    }

    /// Map a correlated reply onto a structured outcome.
    fn dispatch(
        &self,
        requested: Action,
        reply: Option<(FetchedMessage, MatchQuality)>,
    ) -> Result<TradeOutcome> {
        let Some((fetched, quality)) = reply else {
            return Ok(TradeOutcome::NoResponse { action: requested });
        };
        if quality == MatchQuality::ActionStale {
            warn!(
                "reply to {} matched only by action and is stale; verify before acting on it",
                requested
            );
        }

        let message = &fetched.message;
        let order_id = message.order_id();
        let outcome = match message.action() {
            Action::NewOrder => match message.payload() {
                Some(Payload::Order(order)) => match order.id {
                    Some(order_id) => TradeOutcome::OrderConfirmed {
                        order_id,
                        order: order.clone(),
                    },
                    None => TradeOutcome::Informational {
                        action: Action::NewOrder,
                    },
                },
                _ => TradeOutcome::Informational {
                    action: Action::NewOrder,
                },
            },
            Action::PayInvoice => match message.payload() {
                Some(Payload::PaymentRequest(order, invoice, amount)) => {
                    TradeOutcome::PayInvoice {
                        order_id: order.as_ref().and_then(|order| order.id).or(order_id),
                        invoice: invoice.clone(),
                        amount: *amount,
                    }
                }
                _ => TradeOutcome::Informational {
                    action: Action::PayInvoice,
                },
            },
            Action::AddInvoice | Action::WaitingBuyerInvoice => {
                let order = match message.payload() {
                    Some(Payload::Order(order)) => Some(order.clone()),
                    _ => None,
                };
                TradeOutcome::ProvideInvoice {
                    order_id: order.as_ref().and_then(|order| order.id).or(order_id),
                    order,
                }
            }
            Action::DisputeInitiatedByYou | Action::DisputeInitiatedByPeer => {
                let dispute_id = match message.payload() {
                    Some(Payload::Dispute(dispute_id)) => Some(dispute_id.clone()),
                    _ => None,
                };
                TradeOutcome::DisputeOpened {
                    order_id,
                    dispute_id,
                }
            }
            action @ (Action::FiatSentOk
            | Action::Released
            | Action::PurchaseCompleted
            | Action::Canceled
            | Action::CooperativeCancelInitiatedByYou
            | Action::CooperativeCancelAccepted
            | Action::BuyerInvoiceAccepted
            | Action::WaitingSellerToPay
            | Action::RateReceived) => TradeOutcome::Acknowledged { action, order_id },
            Action::CantDo => {
                let reason = match message.payload() {
                    Some(Payload::CantDo(Some(reason))) => reason.to_string(),
                    Some(Payload::CantDo(None)) | None => "unspecified reason".to_string(),
                    Some(Payload::TextMessage(text)) => text.clone(),
                    _ => "unspecified reason".to_string(),
                };
                TradeOutcome::Rejected { reason }
            }
            action => TradeOutcome::Informational { action },
        };
        Ok(outcome)
    }

    /// One audit line per attempted action, with its final outcome.
    fn audit(
        &self,
        action: Action,
        order_id: Option<Uuid>,
        fiat: Option<(i64, &str)>,
        outcome: &TradeOutcome,
    ) -> Result<()> {
        let (result, details) = match outcome {
            TradeOutcome::OrderConfirmed { order_id, .. } => {
                (AuditResult::Success, format!("order {order_id} confirmed"))
            }
            TradeOutcome::PayInvoice { .. } => {
                (AuditResult::Pending, "awaiting invoice payment".to_string())
            }
            TradeOutcome::ProvideInvoice { .. } => {
                (AuditResult::Pending, "invoice requested".to_string())
            }
            TradeOutcome::Acknowledged { action, .. } => {
                (AuditResult::Success, format!("coordinator replied {action}"))
            }
            TradeOutcome::DisputeOpened { dispute_id, .. } => (
                AuditResult::Success,
                match dispute_id {
                    Some(dispute_id) => format!("dispute {dispute_id} opened"),
                    None => "dispute opened".to_string(),
                },
            ),
            TradeOutcome::Rejected { reason } => (AuditResult::Failed, reason.clone()),
            TradeOutcome::NoResponse { .. } => {
                (AuditResult::Pending, "no response in window".to_string())
            }
            TradeOutcome::Informational { action } => {
                (AuditResult::Success, format!("reply {action}"))
            }
        };

        let mut entry = AuditEntry::new(action.as_str(), result)
            .order_id(order_id.or(outcome_order_id(outcome)))
            .details(details);
        if let Some((amount, code)) = fiat {
            entry = entry.fiat(Some(amount), Some(code));
        }
        self.journal.append(&entry)?;
        Ok(())
    }
}

fn take_action(entry: &OrderBookEntry) -> Action {
    match entry.kind {
        OrderKind::Sell => Action::TakeSell,
        OrderKind::Buy => Action::TakeBuy,
    }
}

fn outcome_order_id(outcome: &TradeOutcome) -> Option<Uuid> {
    match outcome {
        TradeOutcome::OrderConfirmed { order_id, .. } => Some(*order_id),
        TradeOutcome::PayInvoice { order_id, .. } => *order_id,
        TradeOutcome::ProvideInvoice { order_id, .. } => *order_id,
        TradeOutcome::Acknowledged { order_id, .. } => *order_id,
        TradeOutcome::DisputeOpened { order_id, .. } => *order_id,
        _ => None,
    }
}
