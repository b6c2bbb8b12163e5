//! Public order-book events.
//!
//! The coordinator publishes one addressable event per order; the order's
//! whole state lives in the tag set. This module parses those tags into a
//! structured entry and builds the matching relay filters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use thiserror::Error;

use crate::event::{find_tag_value, is_tag, parse_tag_value, Event, ORDER_KIND};

/// Document type discriminator carried in the `z` tag.
pub const ORDER_DOCUMENT: &str = "order";

/// Errors from order-book parsing.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid event kind: expected {expected}, got {actual}")]
    InvalidKind { expected: u16, actual: u16 },

    #[error("missing required tag: {0}")]
    MissingTag(String),

    #[error("invalid order kind: {0}")]
    InvalidOrderKind(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("not an order document: {0}")]
    WrongDocument(String),

    #[error("invalid {tag} value: {value}")]
    InvalidTag { tag: String, value: String },
}

/// Buy or sell, from the maker's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Buy,
    Sell,
}

impl OrderKind {
    pub fn as_str(&self) -> &str {
        match self {
            OrderKind::Buy => "buy",
            OrderKind::Sell => "sell",
        }
    }
}

impl FromStr for OrderKind {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(OrderKind::Buy),
            "sell" => Ok(OrderKind::Sell),
            _ => Err(OrderError::InvalidOrderKind(s.to_string())),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    WaitingPayment,
    WaitingBuyerInvoice,
    Active,
    FiatSent,
    SettledHoldInvoice,
    Success,
    Canceled,
    CooperativelyCanceled,
    Dispute,
    Expired,
    CompletedByAdmin,
    CanceledByAdmin,
    InProgress,
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Pending => "pending",
            Status::WaitingPayment => "waiting-payment",
            Status::WaitingBuyerInvoice => "waiting-buyer-invoice",
            Status::Active => "active",
            Status::FiatSent => "fiat-sent",
            Status::SettledHoldInvoice => "settled-hold-invoice",
            Status::Success => "success",
            Status::Canceled => "canceled",
            Status::CooperativelyCanceled => "cooperatively-canceled",
            Status::Dispute => "dispute",
            Status::Expired => "expired",
            Status::CompletedByAdmin => "completed-by-admin",
            Status::CanceledByAdmin => "canceled-by-admin",
            Status::InProgress => "in-progress",
        }
    }
}

impl FromStr for Status {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "waiting-payment" => Ok(Status::WaitingPayment),
            "waiting-buyer-invoice" => Ok(Status::WaitingBuyerInvoice),
            "active" => Ok(Status::Active),
            "fiat-sent" => Ok(Status::FiatSent),
            "settled-hold-invoice" => Ok(Status::SettledHoldInvoice),
            "success" => Ok(Status::Success),
            "canceled" => Ok(Status::Canceled),
            "cooperatively-canceled" => Ok(Status::CooperativelyCanceled),
            "dispute" => Ok(Status::Dispute),
            "expired" => Ok(Status::Expired),
            "completed-by-admin" => Ok(Status::CompletedByAdmin),
            "canceled-by-admin" => Ok(Status::CanceledByAdmin),
            "in-progress" => Ok(Status::InProgress),
            _ => Err(OrderError::InvalidStatus(s.to_string())),
        }
    }
}

/// Maker review stats, carried as opaque JSON in the `rating` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub total_reviews: u32,
    pub total_rating: f64,
    pub last_rating: u32,
    pub max_rate: u32,
    pub min_rate: u32,
}

/// A parsed order-book entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookEntry {
    pub id: String,
    pub kind: OrderKind,
    pub currency: String,
    pub status: Status,
    pub amount_sats: u64,
    /// Fiat amount as published: a single value or `"min-max"` for ranges.
    pub fiat_amount: String,
    pub payment_methods: Vec<String>,
    pub premium: i64,
    pub rating: Option<Rating>,
    pub network: String,
    pub layer: String,
    pub platform: String,
    pub expires_at: Option<u64>,
    pub maker_pubkey: String,
    pub created_at: u64,
}

impl OrderBookEntry {
    /// Parse a kind-38383 coordinator event. Pure; parsing twice yields
    /// equal records.
    pub fn from_event(event: &Event) -> Result<Self, OrderError> {
        if event.kind != ORDER_KIND {
            return Err(OrderError::InvalidKind {
                expected: ORDER_KIND,
                actual: event.kind,
            });
        }

        let document = find_tag_value(&event.tags, "z")
            .ok_or_else(|| OrderError::MissingTag("z".to_string()))?;
        if document != ORDER_DOCUMENT {
            return Err(OrderError::WrongDocument(document.to_string()));
        }

        let id = required(&event.tags, "d")?.to_string();
        let kind = OrderKind::from_str(required(&event.tags, "k")?)?;
        let currency = required(&event.tags, "f")?.to_uppercase();
        let status = Status::from_str(required(&event.tags, "s")?)?;

        let amount_sats = parse_required(&event.tags, "amt")?;
        let fiat_amount = fiat_amount_string(&event.tags)?;
        let payment_methods = multi_values(&event.tags, "pm");
        if payment_methods.is_empty() {
            return Err(OrderError::MissingTag("pm".to_string()));
        }
        let premium = parse_required(&event.tags, "premium")?;

        let rating = find_tag_value(&event.tags, "rating")
            .and_then(|raw| serde_json::from_str::<Rating>(raw).ok());

        let network = required(&event.tags, "network")?.to_string();
        let layer = required(&event.tags, "layer")?.to_string();
        let platform = required(&event.tags, "y")?.to_string();
        let expires_at = parse_tag_value::<u64>(&event.tags, "expires_at");

        Ok(Self {
            id,
            kind,
            currency,
            status,
            amount_sats,
            fiat_amount,
            payment_methods,
            premium,
            rating,
            network,
            layer,
            platform,
            expires_at,
            maker_pubkey: event.pubkey.clone(),
            created_at: event.created_at,
        })
    }

    /// True when the fiat amount is a `min-max` range.
    pub fn is_range(&self) -> bool {
        self.fiat_amount.contains('-')
    }
}

fn required<'a>(tags: &'a [Vec<String>], name: &str) -> Result<&'a str, OrderError> {
    find_tag_value(tags, name).ok_or_else(|| OrderError::MissingTag(name.to_string()))
}

fn parse_required<T: FromStr>(tags: &[Vec<String>], name: &str) -> Result<T, OrderError> {
    let raw = required(tags, name)?;
    raw.parse::<T>().map_err(|_| OrderError::InvalidTag {
        tag: name.to_string(),
        value: raw.to_string(),
    })
}

fn multi_values(tags: &[Vec<String>], name: &str) -> Vec<String> {
    tags.iter()
        .find(|tag| is_tag(tag, name) && tag.len() >= 2)
        .map(|tag| tag[1..].to_vec())
        .unwrap_or_default()
}

/// The `fa` tag carries one value, or two for a range.
fn fiat_amount_string(tags: &[Vec<String>]) -> Result<String, OrderError> {
    let tag = tags
        .iter()
        .find(|tag| is_tag(tag, "fa") && tag.len() >= 2)
        .ok_or_else(|| OrderError::MissingTag("fa".to_string()))?;
    match &tag[1..] {
        [single] => Ok(single.clone()),
        [min, max, ..] => Ok(format!("{min}-{max}")),
        [] => Err(OrderError::MissingTag("fa".to_string())),
    }
}

/// Filter arguments for order-book queries.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<Status>,
    pub kind: Option<OrderKind>,
    pub currency: Option<String>,
}

impl OrderFilter {
    /// Translate to a relay filter scoped to the coordinator's pubkey.
    pub fn to_relay_filter(&self, mostro_pubkey: &str) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("kinds".to_string(), json!([ORDER_KIND]));
        object.insert("authors".to_string(), json!([mostro_pubkey]));
        object.insert("#z".to_string(), json!([ORDER_DOCUMENT]));
        if let Some(status) = self.status {
            object.insert("#s".to_string(), json!([status.as_str()]));
        }
        if let Some(kind) = self.kind {
            object.insert("#k".to_string(), json!([kind.as_str()]));
        }
        if let Some(currency) = &self.currency {
            object.insert("#f".to_string(), json!([currency.to_uppercase()]));
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_event(tags: Vec<Vec<String>>) -> Event {
        Event {
            id: "id".to_string(),
            pubkey: "maker".to_string(),
            created_at: 1_700_000_000,
            kind: ORDER_KIND,
            tags,
            content: String::new(),
            sig: "sig".to_string(),
        }
    }

    fn base_tags() -> Vec<Vec<String>> {
        vec![
            vec!["d".into(), "ede61c96-4c13-4519-bf3a-dcf7f1e9d842".into()],
            vec!["k".into(), "sell".into()],
            vec!["f".into(), "ves".into()],
            vec!["s".into(), "pending".into()],
            vec!["amt".into(), "0".into()],
            vec!["fa".into(), "100".into()],
            vec!["pm".into(), "face to face".into(), "bank transfer".into()],
            vec!["premium".into(), "1".into()],
            vec!["network".into(), "mainnet".into()],
            vec!["layer".into(), "lightning".into()],
            vec!["y".into(), "mostro".into()],
            vec!["z".into(), "order".into()],
            vec!["expires_at".into(), "1700086400".into()],
        ]
    }

    #[test]
    fn parses_complete_order() -> Result<(), OrderError> {
        let entry = OrderBookEntry::from_event(&order_event(base_tags()))?;
        assert_eq!(entry.id, "ede61c96-4c13-4519-bf3a-dcf7f1e9d842");
        assert_eq!(entry.kind, OrderKind::Sell);
        assert_eq!(entry.currency, "VES");
        assert_eq!(entry.status, Status::Pending);
        assert_eq!(entry.amount_sats, 0);
        assert_eq!(entry.fiat_amount, "100");
        assert_eq!(
            entry.payment_methods,
            vec!["face to face".to_string(), "bank transfer".to_string()]
        );
        assert_eq!(entry.premium, 1);
        assert_eq!(entry.network, "mainnet");
        assert_eq!(entry.platform, "mostro");
        assert_eq!(entry.expires_at, Some(1_700_086_400));
        assert!(!entry.is_range());
        Ok(())
    }

    #[test]
    fn parsing_is_idempotent() -> Result<(), OrderError> {
        let event = order_event(base_tags());
        let first = OrderBookEntry::from_event(&event)?;
        let second = OrderBookEntry::from_event(&event)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn range_order_joins_min_max() -> Result<(), OrderError> {
        let mut tags = base_tags();
        tags.retain(|tag| tag[0] != "fa");
        tags.push(vec!["fa".into(), "100".into(), "500".into()]);

        let entry = OrderBookEntry::from_event(&order_event(tags))?;
        assert_eq!(entry.fiat_amount, "100-500");
        assert!(entry.is_range());
        Ok(())
    }

    #[test]
    fn rejects_foreign_documents() {
        let mut tags = base_tags();
        tags.retain(|tag| tag[0] != "z");
        tags.push(vec!["z".into(), "dispute".into()]);

        let result = OrderBookEntry::from_event(&order_event(tags));
        assert!(matches!(result, Err(OrderError::WrongDocument(_))));
    }

    #[test]
    fn rejects_wrong_kind() {
        let mut event = order_event(base_tags());
        event.kind = 1;
        assert!(matches!(
            OrderBookEntry::from_event(&event),
            Err(OrderError::InvalidKind { .. })
        ));
    }

    #[test]
    fn missing_tag_cases() {
        for missing in ["d", "k", "f", "s", "amt", "fa", "pm", "premium"] {
            let mut tags = base_tags();
            tags.retain(|tag| tag[0] != missing);
            let result = OrderBookEntry::from_event(&order_event(tags));
            assert!(result.is_err(), "expected failure without tag {missing}");
        }
    }

    #[test]
    fn opaque_rating_is_decoded_opportunistically() -> Result<(), OrderError> {
        let mut tags = base_tags();
        tags.push(vec![
            "rating".into(),
            r#"{"total_reviews":5,"total_rating":4.6,"last_rating":5,"max_rate":5,"min_rate":1}"#
                .into(),
        ]);
        let entry = OrderBookEntry::from_event(&order_event(tags))?;
        let rating = entry.rating.expect("rating decoded");
        assert_eq!(rating.total_reviews, 5);

        // Garbage ratings are dropped, not fatal.
        let mut tags = base_tags();
        tags.push(vec!["rating".into(), "not json".into()]);
        let entry = OrderBookEntry::from_event(&order_event(tags))?;
        assert!(entry.rating.is_none());
        Ok(())
    }

    #[test]
    fn filter_translation() {
        let filter = OrderFilter {
            status: Some(Status::Pending),
            kind: Some(OrderKind::Buy),
            currency: Some("usd".to_string()),
        };
        let value = filter.to_relay_filter("mostropubkey");
        assert_eq!(value["kinds"], json!([ORDER_KIND]));
        assert_eq!(value["authors"], json!(["mostropubkey"]));
        assert_eq!(value["#z"], json!(["order"]));
        assert_eq!(value["#s"], json!(["pending"]));
        assert_eq!(value["#k"], json!(["buy"]));
        assert_eq!(value["#f"], json!(["USD"]));

        let bare = OrderFilter::default().to_relay_filter("mostropubkey");
        assert!(bare.get("#s").is_none());
    }
}
