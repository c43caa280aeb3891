/*
[INPUT]:  Raw response bodies from issuer, verifier and wallet extension
[OUTPUT]: Typed response structs
[POS]:    Data layer - inbound wire types
[UPDATE]: When a remote response format changes
*/

use serde::{Deserialize, Serialize};

/// `GET /id/loginphrase` body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPhraseResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// `POST /api/verifyLogin` body
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyLoginResponse {
    #[serde(default)]
    pub data: Option<VerifyLoginData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyLoginData {
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /id/checkprivilege` body
#[derive(Debug, Clone, Deserialize)]
pub struct PrivilegeResponse {
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of the extension's `request` capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
}

impl ExtensionResponse {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}
