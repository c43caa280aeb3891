/*
[INPUT]:  Challenge phrase plus injected chain-provider capability
[OUTPUT]: Raw provider response (account, signature, message)
[POS]:    Channel layer - injected EVM provider signing
[UPDATE]: When provider methods or signature encoding change
*/

use std::str::FromStr;
use std::sync::Arc;

use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::channel::{DispatchParams, RawWalletResponse};
use crate::http::{ConnectError, Result};
use crate::types::Challenge;

/// Injected chain-provider capability
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// Accounts the user exposes to this application
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Personal-sign `message` with `account`
    async fn personal_sign(&self, message: &str, account: &str) -> Result<String>;
}

/// In-process provider backed by a local secp256k1 key
pub struct LocalEvmProvider {
    signer: PrivateKeySigner,
    address: String,
}

impl std::fmt::Debug for LocalEvmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEvmProvider")
            .field("address", &self.address)
            .finish()
    }
}

impl LocalEvmProvider {
    /// Accepts keys with or without the `0x` prefix
    pub fn new(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer = PrivateKeySigner::from_str(private_key_hex)
            .map_err(|e| ConnectError::Config(format!("Invalid EVM private key: {e}")))?;
        let address = signer.address().to_checksum(None);
        Ok(Self { signer, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl InjectedProvider for LocalEvmProvider {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        Ok(vec![self.address.clone()])
    }

    async fn personal_sign(&self, message: &str, account: &str) -> Result<String> {
        if !account.eq_ignore_ascii_case(&self.address) {
            return Err(ConnectError::UserRejected);
        }
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| ConnectError::WalletRejected {
                status: format!("signing failed: {e}"),
            })?;
        // r || s || v
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}

/// Injected-provider wallet channel; login only
#[derive(Clone, Default)]
pub struct InjectedProviderSign {
    provider: Option<Arc<dyn InjectedProvider>>,
}

impl std::fmt::Debug for InjectedProviderSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectedProviderSign")
            .field("installed", &self.provider.is_some())
            .finish()
    }
}

impl InjectedProviderSign {
    pub fn new(provider: Option<Arc<dyn InjectedProvider>>) -> Self {
        Self { provider }
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    pub(crate) async fn send(
        &self,
        challenge: &Challenge,
        params: &DispatchParams,
    ) -> Result<RawWalletResponse> {
        if let DispatchParams::Pay { .. } = params {
            return Err(ConnectError::UnsupportedAction {
                channel: "provider",
                action: "payment",
            });
        }

        let provider = self.provider.as_ref().ok_or(ConnectError::ProviderUnavailable)?;
        let accounts = provider.request_accounts().await?;
        let Some(account) = accounts.into_iter().next() else {
            warn!("provider exposed no accounts");
            return Err(ConnectError::ProviderUnavailable);
        };

        let signature = provider.personal_sign(&challenge.phrase, &account).await?;
        info!(account = %account, "provider signed login phrase");

        Ok(RawWalletResponse::Provider {
            account,
            signature,
            message: challenge.phrase.clone(),
        })
    }
}
