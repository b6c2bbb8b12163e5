//! Mostro protocol messages.
//!
//! A message is a tagged top-level variant (the category) wrapping a
//! versioned inner record: action, optional order/dispute id, optional
//! request-id correlation token, optional trade index, optional payload.
//! Unknown categories and actions are tolerated on the way in so that
//! coordinator version skew never crashes the parser.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::order::{OrderKind, Status};

/// Protocol version carried by every message.
pub const PROTOCOL_VERSION: u8 = 1;

/// Responses older than this are suspect when matched by action fallback.
pub const STALENESS_THRESHOLD_SECS: u64 = 30;

/// Errors from message encoding and decoding.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Every action the protocol speaks, both requests and replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NewOrder,
    TakeSell,
    TakeBuy,
    PayInvoice,
    AddInvoice,
    FiatSent,
    FiatSentOk,
    Release,
    Released,
    Cancel,
    Canceled,
    CooperativeCancelInitiatedByYou,
    CooperativeCancelInitiatedByPeer,
    CooperativeCancelAccepted,
    BuyerInvoiceAccepted,
    BuyerTookOrder,
    HoldInvoicePaymentAccepted,
    HoldInvoicePaymentSettled,
    HoldInvoicePaymentCanceled,
    WaitingSellerToPay,
    WaitingBuyerInvoice,
    PurchaseCompleted,
    Rate,
    RateUser,
    RateReceived,
    Dispute,
    DisputeInitiatedByYou,
    DisputeInitiatedByPeer,
    AdminSettled,
    AdminCanceled,
    PaymentFailed,
    InvoiceUpdated,
    SendDm,
    LastTradeIndex,
    RestoreSession,
    CantDo,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NewOrder => "new-order",
            Action::TakeSell => "take-sell",
            Action::TakeBuy => "take-buy",
            Action::PayInvoice => "pay-invoice",
            Action::AddInvoice => "add-invoice",
            Action::FiatSent => "fiat-sent",
            Action::FiatSentOk => "fiat-sent-ok",
            Action::Release => "release",
            Action::Released => "released",
            Action::Cancel => "cancel",
            Action::Canceled => "canceled",
            Action::CooperativeCancelInitiatedByYou => "cooperative-cancel-initiated-by-you",
            Action::CooperativeCancelInitiatedByPeer => "cooperative-cancel-initiated-by-peer",
            Action::CooperativeCancelAccepted => "cooperative-cancel-accepted",
            Action::BuyerInvoiceAccepted => "buyer-invoice-accepted",
            Action::BuyerTookOrder => "buyer-took-order",
            Action::HoldInvoicePaymentAccepted => "hold-invoice-payment-accepted",
            Action::HoldInvoicePaymentSettled => "hold-invoice-payment-settled",
            Action::HoldInvoicePaymentCanceled => "hold-invoice-payment-canceled",
            Action::WaitingSellerToPay => "waiting-seller-to-pay",
            Action::WaitingBuyerInvoice => "waiting-buyer-invoice",
            Action::PurchaseCompleted => "purchase-completed",
            Action::Rate => "rate",
            Action::RateUser => "rate-user",
            Action::RateReceived => "rate-received",
            Action::Dispute => "dispute",
            Action::DisputeInitiatedByYou => "dispute-initiated-by-you",
            Action::DisputeInitiatedByPeer => "dispute-initiated-by-peer",
            Action::AdminSettled => "admin-settled",
            Action::AdminCanceled => "admin-canceled",
            Action::PaymentFailed => "payment-failed",
            Action::InvoiceUpdated => "invoice-updated",
            Action::SendDm => "send-dm",
            Action::LastTradeIndex => "last-trade-index",
            Action::RestoreSession => "restore-session",
            Action::CantDo => "cant-do",
            Action::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons the coordinator refuses an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CantDoReason {
    InvalidSignature,
    InvalidTradeIndex,
    InvalidAmount,
    InvalidInvoice,
    InvalidOrderKind,
    InvalidOrderStatus,
    InvalidPubkey,
    InvalidParameters,
    InvalidRating,
    InvalidPeer,
    OutOfRangeFiatAmount,
    OutOfRangeSatsAmount,
    IsNotYourOrder,
    IsNotYourDispute,
    DisputeCreationError,
    NotAllowedByStatus,
    NotFound,
    PendingOrderExists,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for CantDoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(text.trim_matches('"'))
    }
}

/// An order as carried inside protocol payloads.
///
/// Optional fields serialize as explicit nulls: the coordinator
/// distinguishes a null field from an absent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SmallOrder {
    pub id: Option<Uuid>,
    pub kind: Option<OrderKind>,
    pub status: Option<Status>,
    pub amount: i64,
    pub fiat_code: String,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub fiat_amount: i64,
    pub payment_method: String,
    pub premium: i64,
    pub buyer_trade_pubkey: Option<String>,
    pub seller_trade_pubkey: Option<String>,
    pub buyer_invoice: Option<String>,
    pub created_at: Option<i64>,
    pub expires_at: Option<i64>,
}

impl SmallOrder {
    /// True when the order is a range order (taker picks the amount).
    pub fn is_range(&self) -> bool {
        self.min_amount.is_some() && self.max_amount.is_some()
    }
}

/// Identifies a trade counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub pubkey: String,
}

/// Coordinator-reported payment retry schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedInfo {
    pub attempts: u32,
    pub retry_interval: u64,
}

/// An order returned by session restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoredOrder {
    pub id: Uuid,
    pub trade_index: u32,
    pub status: String,
}

/// A dispute returned by session restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoredDispute {
    pub dispute_id: Uuid,
    pub order_id: Option<Uuid>,
    pub trade_index: u32,
    pub status: String,
}

/// Everything the coordinator knows about this key's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RestoreData {
    pub orders: Vec<RestoredOrder>,
    pub disputes: Vec<RestoredDispute>,
}

/// Recognized payload shapes.
///
/// The trailing untagged arm absorbs shapes newer coordinators may send;
/// such payloads are carried opaquely instead of failing the whole
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Order(SmallOrder),
    PaymentRequest(Option<SmallOrder>, String, Option<i64>),
    TextMessage(String),
    Peer(Peer),
    RatingUser(u8),
    Amount(i64),
    /// Dispute id assigned by the coordinator.
    Dispute(String),
    CantDo(Option<CantDoReason>),
    NextTrade(String, u32),
    PaymentFailed(PaymentFailedInfo),
    RestoreData(RestoreData),
    Ids(Vec<Uuid>),
    Orders(Vec<SmallOrder>),
    #[serde(untagged)]
    Unknown(Value),
}

/// The versioned inner record of every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageKind {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub action: Action,
    pub payload: Option<Payload>,
}

/// A protocol message, tagged by category.
///
/// A category this client does not know falls into the untagged
/// `Unknown` arm so coordinator version skew never crashes the parser;
/// such messages answer [`Action::Unknown`] and carry no inner record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Order(MessageKind),
    Dispute(MessageKind),
    CantDo(MessageKind),
    Rate(MessageKind),
    Dm(MessageKind),
    Restore(MessageKind),
    #[serde(untagged)]
    Unknown(Value),
}

impl Message {
    /// Build a message under the category that owns `action`.
    pub fn new(
        id: Option<Uuid>,
        request_id: Option<u64>,
        trade_index: Option<u32>,
        action: Action,
        payload: Option<Payload>,
    ) -> Self {
        let kind = MessageKind {
            version: PROTOCOL_VERSION,
            request_id,
            trade_index,
            id,
            action,
            payload,
        };
        match action {
            Action::Dispute
            | Action::DisputeInitiatedByYou
            | Action::DisputeInitiatedByPeer
            | Action::AdminSettled
            | Action::AdminCanceled => Message::Dispute(kind),
            Action::CantDo => Message::CantDo(kind),
            Action::Rate | Action::RateUser | Action::RateReceived => Message::Rate(kind),
            Action::SendDm => Message::Dm(kind),
            Action::LastTradeIndex | Action::RestoreSession => Message::Restore(kind),
            _ => Message::Order(kind),
        }
    }

    /// The inner record; `None` for messages of an unknown category.
    pub fn inner(&self) -> Option<&MessageKind> {
        match self {
            Message::Order(kind)
            | Message::Dispute(kind)
            | Message::CantDo(kind)
            | Message::Rate(kind)
            | Message::Dm(kind)
            | Message::Restore(kind) => Some(kind),
            Message::Unknown(_) => None,
        }
    }

    pub fn action(&self) -> Action {
        self.inner()
            .map(|kind| kind.action)
            .unwrap_or(Action::Unknown)
    }

    pub fn request_id(&self) -> Option<u64> {
        self.inner().and_then(|kind| kind.request_id)
    }

    pub fn order_id(&self) -> Option<Uuid> {
        self.inner().and_then(|kind| kind.id)
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.inner().and_then(|kind| kind.payload.as_ref())
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a message, tolerating unknown categories and actions.
    ///
    /// Categories this client does not know land in the `Unknown` arm
    /// with a debug log; only malformed JSON is an error.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        let message: Message = serde_json::from_str(text)?;
        if matches!(message, Message::Unknown(_)) {
            debug!("message of unknown category retained opaquely");
        }
        Ok(message)
    }
}

/// Random 48-bit request correlation token.
pub fn new_request_id() -> u64 {
    rand::thread_rng().gen_range(0..(1u64 << 48))
}

/// A message fetched from the network, with the rumor timestamp it rode in.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub message: Message,
    pub created_at: u64,
}

/// How a response was matched to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchQuality {
    /// The response echoed our request id.
    RequestId,
    /// Matched by action type; fresh enough to trust.
    ActionFresh,
    /// Matched by action type but older than the staleness threshold.
    ActionStale,
}

/// Select the response to `request_id` from a fetched batch.
///
/// Exact request-id matches win. Otherwise fall back to the most recent
/// message whose action is in `expected_actions`, flagging it stale when
/// older than [`STALENESS_THRESHOLD_SECS`]; stale fallbacks are warned
/// about, never silently returned.
pub fn correlate_response<'a>(
    candidates: &'a [FetchedMessage],
    request_id: u64,
    expected_actions: &[Action],
    now: u64,
) -> Option<(&'a FetchedMessage, MatchQuality)> {
    if let Some(matched) = candidates
        .iter()
        .filter(|candidate| candidate.message.request_id() == Some(request_id))
        .max_by_key(|candidate| candidate.created_at)
    {
        return Some((matched, MatchQuality::RequestId));
    }

    let fallback = candidates
        .iter()
        .filter(|candidate| {
            candidate.message.request_id().is_none()
                && expected_actions.contains(&candidate.message.action())
        })
        .max_by_key(|candidate| candidate.created_at)?;

    let age = now.saturating_sub(fallback.created_at);
    if age > STALENESS_THRESHOLD_SECS {
        warn!(
            "response matched by action {} is {}s old; treat with suspicion",
            fallback.message.action(),
            age
        );
        Some((fallback, MatchQuality::ActionStale))
    } else {
        Some((fallback, MatchQuality::ActionFresh))
    }
}

// ---- request builders ----

/// `new-order`: submit an order to the book.
///
/// Normalises the fiat code, forces `pending`, and carries the buyer's
/// invoice only on buy orders.
pub fn new_order(
    kind: OrderKind,
    fiat_code: &str,
    fiat_amount: i64,
    min_amount: Option<i64>,
    max_amount: Option<i64>,
    amount: i64,
    payment_method: &str,
    premium: i64,
    buyer_invoice: Option<String>,
    request_id: u64,
    trade_index: u32,
) -> Message {
    let order = SmallOrder {
        id: None,
        kind: Some(kind),
        status: Some(Status::Pending),
        amount,
        fiat_code: fiat_code.to_uppercase(),
        min_amount,
        max_amount,
        fiat_amount,
        payment_method: payment_method.to_string(),
        premium,
        buyer_trade_pubkey: None,
        seller_trade_pubkey: None,
        buyer_invoice: buyer_invoice.filter(|_| kind == OrderKind::Buy),
        created_at: None,
        expires_at: None,
    };
    Message::new(
        None,
        Some(request_id),
        Some(trade_index),
        Action::NewOrder,
        Some(Payload::Order(order)),
    )
}

/// `take-buy`: seller accepts a buy order.
pub fn take_buy(order_id: Uuid, amount: Option<i64>, request_id: u64, trade_index: u32) -> Message {
    Message::new(
        Some(order_id),
        Some(request_id),
        Some(trade_index),
        Action::TakeBuy,
        amount.map(Payload::Amount),
    )
}

/// `take-sell`: buyer accepts a sell order, optionally with an invoice.
pub fn take_sell(
    order_id: Uuid,
    invoice: Option<String>,
    amount: Option<i64>,
    request_id: u64,
    trade_index: u32,
) -> Message {
    let payload = match invoice {
        Some(invoice) => Some(Payload::PaymentRequest(None, invoice, amount)),
        None => amount.map(Payload::Amount),
    };
    Message::new(
        Some(order_id),
        Some(request_id),
        Some(trade_index),
        Action::TakeSell,
        payload,
    )
}

/// `add-invoice`: buyer supplies the invoice the coordinator asked for.
pub fn add_invoice(order_id: Uuid, invoice: String, request_id: u64, trade_index: u32) -> Message {
    Message::new(
        Some(order_id),
        Some(request_id),
        Some(trade_index),
        Action::AddInvoice,
        Some(Payload::PaymentRequest(None, invoice, None)),
    )
}

/// Lifecycle actions with no payload: cancel, fiat-sent, release, dispute.
pub fn lifecycle(order_id: Uuid, action: Action, request_id: u64, trade_index: u32) -> Message {
    Message::new(
        Some(order_id),
        Some(request_id),
        Some(trade_index),
        action,
        None,
    )
}

/// `rate-user`: rate the counterparty 1..5.
pub fn rate_user(order_id: Uuid, rating: u8, request_id: u64, trade_index: u32) -> Message {
    Message::new(
        Some(order_id),
        Some(request_id),
        Some(trade_index),
        Action::RateUser,
        Some(Payload::RatingUser(rating)),
    )
}

/// `last-trade-index`: ask the coordinator for its highest seen index.
pub fn last_trade_index(request_id: u64) -> Message {
    Message::new(None, Some(request_id), None, Action::LastTradeIndex, None)
}

/// `restore-session`: ask for all orders/disputes under the requesting key.
pub fn restore_session(request_id: u64) -> Message {
    Message::new(None, Some(request_id), None, Action::RestoreSession, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid() -> Uuid {
        Uuid::parse_str("ede61c96-4c13-4519-bf3a-dcf7f1e9d842").unwrap()
    }

    #[test]
    fn categories_follow_actions() {
        let cases = [
            (Action::NewOrder, "order"),
            (Action::FiatSent, "order"),
            (Action::Dispute, "dispute"),
            (Action::RateUser, "rate"),
            (Action::SendDm, "dm"),
            (Action::RestoreSession, "restore"),
            (Action::CantDo, "cant_do"),
        ];
        for (action, category) in cases {
            let message = Message::new(None, Some(1), None, action, None);
            let json = message.to_json().unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert!(
                value.get(category).is_some(),
                "action {action} should live under category {category}, got {json}"
            );
        }
    }

    #[test]
    fn wire_shape_of_new_order() {
        let message = new_order(
            OrderKind::Sell,
            "ars",
            5_555,
            None,
            None,
            0,
            "Mostro",
            1,
            None,
            77,
            4,
        );
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        let inner = &value["order"];
        assert_eq!(inner["version"], 1);
        assert_eq!(inner["request_id"], 77);
        assert_eq!(inner["trade_index"], 4);
        assert_eq!(inner["action"], "new-order");

        let order = &inner["payload"]["order"];
        assert_eq!(order["fiat_code"], "ARS");
        assert_eq!(order["status"], "pending");
        assert_eq!(order["kind"], "sell");
        // Explicit nulls, not omission.
        assert!(order["id"].is_null());
        assert!(order["min_amount"].is_null());
        assert!(order["buyer_invoice"].is_null());
    }

    #[test]
    fn buyer_invoice_only_on_buy_orders() {
        let buy = new_order(
            OrderKind::Buy,
            "usd",
            100,
            None,
            None,
            0,
            "bank",
            0,
            Some("lnbc1xyz".to_string()),
            1,
            1,
        );
        let Some(Payload::Order(order)) = buy.payload() else {
            panic!("expected order payload");
        };
        assert_eq!(order.buyer_invoice.as_deref(), Some("lnbc1xyz"));

        let sell = new_order(
            OrderKind::Sell,
            "usd",
            100,
            None,
            None,
            0,
            "bank",
            0,
            Some("lnbc1xyz".to_string()),
            1,
            1,
        );
        let Some(Payload::Order(order)) = sell.payload() else {
            panic!("expected order payload");
        };
        assert!(order.buyer_invoice.is_none());
    }

    #[test]
    fn take_sell_payload_rules() {
        // With invoice and amount: payment_request [null, invoice, amount].
        let message = take_sell(uuid(), Some("lnbc1abc".to_string()), Some(15), 9, 2);
        match message.payload() {
            Some(Payload::PaymentRequest(None, invoice, Some(15))) => {
                assert_eq!(invoice, "lnbc1abc");
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        // Range order without invoice: bare amount.
        let message = take_sell(uuid(), None, Some(15), 9, 2);
        assert_eq!(message.payload(), Some(&Payload::Amount(15)));

        // Neither: no payload at all.
        let message = take_sell(uuid(), None, None, 9, 2);
        assert!(message.payload().is_none());
    }

    #[test]
    fn payment_request_wire_shape() {
        let message = take_sell(uuid(), Some("lnbc1abc".to_string()), Some(15), 9, 2);
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value["order"]["payload"]["payment_request"],
            serde_json::json!([null, "lnbc1abc", 15])
        );
    }

    #[test]
    fn unknown_action_parses_to_unknown() {
        let text = r#"{"order":{"version":1,"action":"frobnicate","payload":null}}"#;
        let message = Message::from_json(text).unwrap();
        assert_eq!(message.action(), Action::Unknown);
    }

    #[test]
    fn unknown_category_is_retained_opaquely() {
        let text = r#"{"mystery":{"version":1,"action":"new-order","payload":null}}"#;
        let message = Message::from_json(text).unwrap();
        assert!(matches!(message, Message::Unknown(_)));
        assert_eq!(message.action(), Action::Unknown);
        assert_eq!(message.request_id(), None);
        assert!(message.payload().is_none());
    }

    #[test]
    fn unknown_payload_shape_does_not_sink_the_message() {
        let text = r#"{"order":{"version":1,"request_id":5,"action":"new-order",
            "payload":{"hologram":{"frames":3}}}}"#;
        let message = Message::from_json(text).unwrap();
        assert_eq!(message.action(), Action::NewOrder);
        assert_eq!(message.request_id(), Some(5));
        assert!(matches!(message.payload(), Some(Payload::Unknown(_))));
    }

    #[test]
    fn dispute_payload_wire_shape() {
        let message = Message::new(
            Some(uuid()),
            Some(3),
            None,
            Action::DisputeInitiatedByYou,
            Some(Payload::Dispute(
                "4616c9e0-0f4c-44d9-ba3f-768affcfc919".to_string(),
            )),
        );
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value["dispute"]["payload"]["dispute"],
            serde_json::json!("4616c9e0-0f4c-44d9-ba3f-768affcfc919")
        );

        let back = Message::from_json(&message.to_json().unwrap()).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn round_trip_preserves_message() -> Result<(), MessageError> {
        let message = rate_user(uuid(), 5, 42, 3);
        let back = Message::from_json(&message.to_json()?)?;
        assert_eq!(message, back);
        Ok(())
    }

    #[test]
    fn request_ids_fit_48_bits() {
        for _ in 0..64 {
            assert!(new_request_id() < (1 << 48));
        }
    }

    #[test]
    fn correlation_prefers_request_id() {
        let now = 1_000_000;
        let batch = vec![
            FetchedMessage {
                message: Message::new(None, Some(7), None, Action::NewOrder, None),
                created_at: now - 5,
            },
            FetchedMessage {
                message: Message::new(None, None, None, Action::NewOrder, None),
                created_at: now - 1,
            },
        ];
        let (matched, quality) =
            correlate_response(&batch, 7, &[Action::NewOrder], now).expect("match");
        assert_eq!(quality, MatchQuality::RequestId);
        assert_eq!(matched.message.request_id(), Some(7));
    }

    #[test]
    fn correlation_fallback_flags_stale_responses() {
        let now = 1_000_000;
        let batch = vec![FetchedMessage {
            message: Message::new(None, None, None, Action::PayInvoice, None),
            created_at: now - STALENESS_THRESHOLD_SECS - 10,
        }];

        let (_, quality) =
            correlate_response(&batch, 7, &[Action::PayInvoice], now).expect("fallback");
        assert_eq!(quality, MatchQuality::ActionStale);

        let fresh = vec![FetchedMessage {
            message: Message::new(None, None, None, Action::PayInvoice, None),
            created_at: now - 3,
        }];
        let (_, quality) =
            correlate_response(&fresh, 7, &[Action::PayInvoice], now).expect("fallback");
        assert_eq!(quality, MatchQuality::ActionFresh);
    }

    #[test]
    fn correlation_ignores_unexpected_actions() {
        let now = 1_000_000;
        let batch = vec![FetchedMessage {
            message: Message::new(None, None, None, Action::Canceled, None),
            created_at: now,
        }];
        assert!(correlate_response(&batch, 7, &[Action::PayInvoice], now).is_none());
    }

    #[test]
    fn restore_data_wire_shape() {
        let text = r#"{
            "orders":[{"id":"ede61c96-4c13-4519-bf3a-dcf7f1e9d842","trade_index":3,"status":"active"}],
            "disputes":[]
        }"#;
        let data: RestoreData = serde_json::from_str(text).unwrap();
        assert_eq!(data.orders.len(), 1);
        assert_eq!(data.orders[0].trade_index, 3);
        assert!(data.disputes.is_empty());
    }

    #[test]
    fn cant_do_reason_tolerates_unknown() {
        let payload: Payload =
            serde_json::from_str(r#"{"cant_do":"some-future-reason"}"#).unwrap();
        assert_eq!(payload, Payload::CantDo(Some(CantDoReason::Unknown)));

        let payload: Payload = serde_json::from_str(r#"{"cant_do":"not-found"}"#).unwrap();
        assert_eq!(payload, Payload::CantDo(Some(CantDoReason::NotFound)));
    }
}
