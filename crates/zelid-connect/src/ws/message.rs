/*
[INPUT]:  Raw push-channel and payment-relay text frames
[OUTPUT]: Parsed RelayMessage and RelayEvent values
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new relay events or changing push encoding
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CorrelationToken, Transaction};

const DATA_PREFIX: &str = "data[";

/// Push-channel message: URL-encoded `status` plus flattened `data[...]` group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayMessage {
    pub status: String,
    pub data: BTreeMap<String, String>,
}

impl RelayMessage {
    /// Parse `status=..&data[key]=..` pairs, flattening the bracketed group
    pub fn parse(raw: &str) -> Self {
        let mut message = RelayMessage::default();
        for (key, value) in url::form_urlencoded::parse(raw.trim().as_bytes()) {
            if key == "status" {
                message.status = value.into_owned();
            } else if let Some(inner) = key
                .strip_prefix(DATA_PREFIX)
                .and_then(|rest| rest.strip_suffix(']'))
            {
                message.data.insert(inner.to_string(), value.into_owned());
            }
        }
        message
    }

    /// Only `status == "success"` with a non-empty data group resolves a dispatch
    pub fn is_success(&self) -> bool {
        self.status == "success" && !self.data.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Whether the message explicitly names a phrase or token other than `key`
    pub fn names_other_key(&self, key: &str) -> bool {
        ["loginPhrase", "message"]
            .iter()
            .filter_map(|field| self.get(field))
            .any(|named| named != key)
    }
}

/// Outbound payment-relay frame
#[derive(Debug, Clone, Serialize)]
pub struct RelayEnvelope<T> {
    pub event: &'static str,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct InboundEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Inbound payment-relay event
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Ledger accepted a payment
    TransactionResponse {
        transaction_id: Option<CorrelationToken>,
        tx_id: String,
    },
    /// Ledger refused a payment notice, optionally naming it
    PaymentRejected {
        transaction_id: Option<CorrelationToken>,
        error: String,
    },
    /// Ledger reported a failure, optionally tied to a payment
    TransactionError {
        transaction_id: Option<CorrelationToken>,
        error: String,
    },
    /// Transaction history for the session's identity
    TransactionData(Vec<Transaction>),
    Other,
}

impl RelayEvent {
    /// Parse a relay frame; unknown or malformed frames map to `Other`
    pub fn parse(raw: &str) -> Self {
        let Ok(envelope) = serde_json::from_str::<InboundEnvelope>(raw) else {
            return RelayEvent::Other;
        };

        match envelope.event.as_str() {
            "transactionResponse" => match envelope.data {
                // A bare string is the relay's error form
                Value::String(error) => RelayEvent::PaymentRejected {
                    transaction_id: None,
                    error,
                },
                data => {
                    let transaction_id = token_field(&data);
                    match string_field(&data, &["txId", "txid"]) {
                        Some(tx_id) => RelayEvent::TransactionResponse {
                            transaction_id,
                            tx_id,
                        },
                        None => RelayEvent::PaymentRejected {
                            transaction_id,
                            error: "transaction response without txId".to_string(),
                        },
                    }
                }
            },
            "transactionError" => RelayEvent::TransactionError {
                transaction_id: token_field(&envelope.data),
                error: string_field(&envelope.data, &["error"])
                    .unwrap_or_else(|| "unknown transaction error".to_string()),
            },
            "transactionData" => serde_json::from_value::<Vec<Transaction>>(envelope.data)
                .map(RelayEvent::TransactionData)
                .unwrap_or(RelayEvent::Other),
            _ => RelayEvent::Other,
        }
    }
}

fn string_field(data: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| data.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn token_field(data: &Value) -> Option<CorrelationToken> {
    string_field(data, &["transactionId"]).map(CorrelationToken::new)
}
