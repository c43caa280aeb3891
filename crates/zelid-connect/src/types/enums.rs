/*
[INPUT]:  Wallet channel and ledger schema definitions
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions shared by every channel
[UPDATE]: When adding a wallet channel or a transaction state
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::http::ConnectError;

/// Wallet transport used for a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    #[serde(rename = "extension", alias = "ssp")]
    ExtensionRequest,
    #[serde(rename = "deeplink", alias = "zelcore")]
    DeepLinkRelay,
    #[serde(rename = "provider", alias = "metamask")]
    InjectedProviderSign,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::ExtensionRequest => "extension",
            ChannelKind::DeepLinkRelay => "deeplink",
            ChannelKind::InjectedProviderSign => "provider",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ConnectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extension" | "ssp" => Ok(ChannelKind::ExtensionRequest),
            "deeplink" | "zelcore" => Ok(ChannelKind::DeepLinkRelay),
            "provider" | "metamask" => Ok(ChannelKind::InjectedProviderSign),
            other => Err(ConnectError::Config(format!("unknown wallet channel: {other}"))),
        }
    }
}

/// Which kind of record a wallet response is normalized into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Login,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "pending", alias = "Pending")]
    Pending,
    #[serde(rename = "completed", alias = "Completed")]
    Completed,
}

/// History filter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TransactionStatus),
}

impl FromStr for StatusFilter {
    type Err = ConnectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Only(TransactionStatus::Pending)),
            "completed" => Ok(StatusFilter::Only(TransactionStatus::Completed)),
            other => Err(ConnectError::Config(format!("unknown status filter: {other}"))),
        }
    }
}
