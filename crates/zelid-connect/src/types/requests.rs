/*
[INPUT]:  Canonical records and wallet dispatch parameters
[OUTPUT]: Request bodies for the verifier, extension and payment relay
[POS]:    Data layer - outbound wire types
[UPDATE]: When an outbound payload changes shape
*/

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{CorrelationToken, Identity};

/// Body for `POST /api/verifyLogin` and `POST /id/checkprivilege`
#[derive(Debug, Clone, Serialize)]
pub struct VerifyLoginRequest<'a> {
    pub zelid: &'a str,
    pub signature: &'a str,
    #[serde(rename = "loginPhrase")]
    pub login_phrase: &'a str,
}

impl<'a> From<&'a Identity> for VerifyLoginRequest<'a> {
    fn from(identity: &'a Identity) -> Self {
        Self {
            zelid: &identity.id,
            signature: &identity.signature,
            login_phrase: &identity.challenge,
        }
    }
}

/// Parameter bag passed to the extension's `request` capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

/// Outbound payment notification sent to the payment relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentNotice {
    #[serde(rename = "transactionId")]
    pub transaction_id: CorrelationToken,
    pub amount: Decimal,
    pub zelid: String,
}
