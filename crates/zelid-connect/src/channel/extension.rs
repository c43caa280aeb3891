/*
[INPUT]:  Challenge phrase or payment token plus extension capability
[OUTPUT]: Raw extension response (address/signature/message or txid)
[POS]:    Channel layer - browser-extension wallet requests
[UPDATE]: When extension method names or parameters change
*/

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::channel::{DispatchParams, PaymentTarget, RawWalletResponse};
use crate::http::{ConnectError, Result};
use crate::types::{Challenge, ExtensionParams, ExtensionResponse};

pub const SIGN_METHOD: &str = "sspwid_sign_message";
pub const PAY_METHOD: &str = "pay";

/// Capability exposed by an installed wallet extension
///
/// The trait is async to support bridges that round-trip through a browser.
#[async_trait]
pub trait ExtensionBridge: Send + Sync {
    async fn request(&self, method: &str, params: &ExtensionParams) -> Result<ExtensionResponse>;
}

/// Extension wallet channel
#[derive(Clone)]
pub struct ExtensionRequest {
    bridge: Option<Arc<dyn ExtensionBridge>>,
    target: PaymentTarget,
}

impl std::fmt::Debug for ExtensionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRequest")
            .field("installed", &self.bridge.is_some())
            .field("target", &self.target)
            .finish()
    }
}

impl ExtensionRequest {
    pub fn new(bridge: Option<Arc<dyn ExtensionBridge>>, target: PaymentTarget) -> Self {
        Self { bridge, target }
    }

    pub fn is_installed(&self) -> bool {
        self.bridge.is_some()
    }

    /// Method name and parameter bag for a dispatch
    pub fn request_for(
        &self,
        challenge: &Challenge,
        params: &DispatchParams,
    ) -> (&'static str, ExtensionParams) {
        match params {
            DispatchParams::Sign => (
                SIGN_METHOD,
                ExtensionParams {
                    message: Some(challenge.phrase.clone()),
                    ..Default::default()
                },
            ),
            DispatchParams::Pay { amount } => (
                PAY_METHOD,
                ExtensionParams {
                    message: Some(challenge.phrase.clone()),
                    amount: Some(amount.to_string()),
                    address: Some(self.target.address.clone()),
                    chain: Some(self.target.chain.clone()),
                },
            ),
        }
    }

    pub(crate) async fn send(
        &self,
        challenge: &Challenge,
        params: &DispatchParams,
    ) -> Result<RawWalletResponse> {
        let bridge = self.bridge.as_ref().ok_or(ConnectError::WalletUnavailable)?;
        let (method, request) = self.request_for(challenge, params);

        let response = bridge.request(method, &request).await?;
        if !response.is_success() {
            warn!(method, status = %response.status, "extension rejected request");
            return Err(ConnectError::WalletRejected {
                status: response.status,
            });
        }

        info!(method, "extension request succeeded");
        Ok(RawWalletResponse::Extension(response))
    }
}

/// Extension bridge returning a predetermined response, for testing
#[derive(Debug, Default)]
pub struct MockExtensionBridge {
    response: ExtensionResponse,
    calls: Mutex<Vec<(String, ExtensionParams)>>,
}

impl MockExtensionBridge {
    pub fn new(response: ExtensionResponse) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order
    pub fn calls(&self) -> Vec<(String, ExtensionParams)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ExtensionBridge for MockExtensionBridge {
    async fn request(&self, method: &str, params: &ExtensionParams) -> Result<ExtensionResponse> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((method.to_string(), params.clone()));
        Ok(self.response.clone())
    }
}
