/*
[INPUT]:  Challenge, identity, session and ledger schema definitions
[OUTPUT]: Core domain records passed between components
[POS]:    Data layer - type definitions shared by every channel
[UPDATE]: When a canonical record gains or loses a field
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::http::{ConnectError, Result};
use crate::types::{ChannelKind, TransactionStatus};

const EXPLORER_TX_URL: &str = "https://explorer.runonflux.io/tx/";

/// Opaque token tying a dispatch to its out-of-band response
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Server-issued login phrase to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub phrase: String,
    pub issued_at: DateTime<Utc>,
}

impl Challenge {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Canonical identity produced by any wallet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "zelid")]
    pub id: String,
    pub signature: String,
    #[serde(rename = "loginPhrase")]
    pub challenge: String,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        signature: impl Into<String>,
        challenge: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            signature: signature.into(),
            challenge: challenge.into(),
        }
    }

    /// Reject identities with any empty field before they reach a verifier
    pub fn ensure_complete(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ConnectError::IncompleteIdentity("id"));
        }
        if self.signature.trim().is_empty() {
            return Err(ConnectError::IncompleteIdentity("signature"));
        }
        if self.challenge.trim().is_empty() {
            return Err(ConnectError::IncompleteIdentity("challenge"));
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.ensure_complete().is_ok()
    }
}

/// Persisted identity plus verification status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "verifiedAt", default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn verified(identity: Identity) -> Self {
        Self {
            identity,
            verified: true,
            verified_at: Some(Utc::now()),
        }
    }
}

/// Payment awaiting its transaction id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayment {
    pub token: CorrelationToken,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PendingPayment {
    pub fn new(token: CorrelationToken, amount: Decimal) -> Result<Self> {
        if amount <= Decimal::ZERO {
            return Err(ConnectError::InvalidAmount(amount.to_string()));
        }
        Ok(Self {
            token,
            amount,
            created_at: Utc::now(),
        })
    }
}

/// Canonical payment acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAck {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
}

/// Outcome of a login verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub authenticated: bool,
    pub message: String,
}

/// Ledger history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: Decimal,
    #[serde(rename = "transactionId", alias = "txId")]
    pub transaction_id: String,
    #[serde(rename = "createdAt", alias = "created", alias = "date_", default)]
    pub created_at: String,
    #[serde(rename = "channelKind", alias = "payment_Method")]
    pub channel_kind: ChannelKind,
    #[serde(alias = "estado")]
    pub status: TransactionStatus,
}

impl Transaction {
    /// Block explorer link for the on-chain transaction
    pub fn explorer_url(&self) -> String {
        format!("{EXPLORER_TX_URL}{}", self.transaction_id)
    }
}
