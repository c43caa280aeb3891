/*
[INPUT]:  Raw wallet responses from any channel
[OUTPUT]: Canonical identity or payment acknowledgement
[POS]:    Auth layer - pure response normalization (no I/O)
[UPDATE]: When a wallet renames a response field
*/

use crate::channel::RawWalletResponse;
use crate::http::{ConnectError, Result};
use crate::types::{Flow, Identity, PaymentAck};

/// Canonical record produced from a raw wallet response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Identity(Identity),
    Payment(PaymentAck),
}

/// Normalize a raw response for the given flow
pub fn normalize(flow: Flow, raw: RawWalletResponse) -> Result<Normalized> {
    match flow {
        Flow::Login => Ok(Normalized::Identity(normalize_identity(raw))),
        Flow::Payment => normalize_payment(raw).map(Normalized::Payment),
    }
}

/// Extract `{id, signature, challenge}`; missing fields become empty strings
pub fn normalize_identity(raw: RawWalletResponse) -> Identity {
    match raw {
        RawWalletResponse::Extension(response) => Identity {
            id: response.address.unwrap_or_default(),
            signature: response.signature.unwrap_or_default(),
            challenge: response.message.unwrap_or_default(),
        },
        RawWalletResponse::Relay(mut message) => Identity {
            id: message.data.remove("zelid").unwrap_or_default(),
            signature: message.data.remove("signature").unwrap_or_default(),
            challenge: message.data.remove("loginPhrase").unwrap_or_default(),
        },
        RawWalletResponse::Provider {
            account,
            signature,
            message,
        } => Identity {
            id: account,
            signature,
            challenge: message,
        },
    }
}

/// Extract `{transactionId}`; absence is an error
pub fn normalize_payment(raw: RawWalletResponse) -> Result<PaymentAck> {
    let transaction_id = match raw {
        RawWalletResponse::Extension(response) => response.txid,
        RawWalletResponse::Relay(mut message) => message
            .data
            .remove("txid")
            .or_else(|| message.data.remove("txId")),
        RawWalletResponse::Provider { .. } => None,
    };

    transaction_id
        .filter(|id| !id.trim().is_empty())
        .map(|transaction_id| PaymentAck { transaction_id })
        .ok_or(ConnectError::MissingTransactionId)
}
