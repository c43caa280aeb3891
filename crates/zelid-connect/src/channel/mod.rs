/*
[INPUT]:  Challenge, dispatch parameters and a cancellation token
[OUTPUT]: Raw wallet response from the selected channel
[POS]:    Channel layer - closed set of wallet transports
[UPDATE]: When adding a wallet channel or dispatch parameter
*/

pub mod deep_link;
pub mod extension;
pub mod provider;
pub mod state;

pub use deep_link::{DeepLinkConfig, DeepLinkRelay, RecordingUrlOpener, SystemUrlOpener, UrlOpener};
pub use extension::{ExtensionBridge, ExtensionRequest, MockExtensionBridge};
pub use provider::{InjectedProvider, InjectedProviderSign, LocalEvmProvider};
pub use state::DispatchState;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{ConnectError, Result};
use crate::types::{Challenge, ChannelKind, ExtensionResponse};
use crate::ws::RelayMessage;

pub(crate) const DEFAULT_PAY_ADDRESS: &str = "t3ZDschNfmy78dNzEiBNBc1xB1GdGsuwu14";
pub(crate) const DEFAULT_PAY_CHAIN: &str = "flux";
pub(crate) const DEFAULT_PAY_COIN: &str = "zelcash";

/// What the wallet is asked to do.
///
/// For payments the correlation token travels as the challenge value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchParams {
    Sign,
    Pay { amount: Decimal },
}

impl DispatchParams {
    fn action(&self) -> &'static str {
        match self {
            DispatchParams::Sign => "sign",
            DispatchParams::Pay { .. } => "pay",
        }
    }
}

/// Payment destination shared by the payment-capable channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTarget {
    pub address: String,
    pub chain: String,
    pub coin: String,
}

impl Default for PaymentTarget {
    fn default() -> Self {
        Self {
            address: DEFAULT_PAY_ADDRESS.to_string(),
            chain: DEFAULT_PAY_CHAIN.to_string(),
            coin: DEFAULT_PAY_COIN.to_string(),
        }
    }
}

/// Unnormalized wallet answer, shaped by the channel that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawWalletResponse {
    Extension(ExtensionResponse),
    Relay(RelayMessage),
    Provider {
        account: String,
        signature: String,
        message: String,
    },
}

impl RawWalletResponse {
    pub fn kind(&self) -> ChannelKind {
        match self {
            RawWalletResponse::Extension(_) => ChannelKind::ExtensionRequest,
            RawWalletResponse::Relay(_) => ChannelKind::DeepLinkRelay,
            RawWalletResponse::Provider { .. } => ChannelKind::InjectedProviderSign,
        }
    }
}

/// One of the supported wallet transports
#[derive(Debug, Clone)]
pub enum ChannelAdapter {
    Extension(ExtensionRequest),
    DeepLink(DeepLinkRelay),
    Provider(InjectedProviderSign),
}

impl ChannelAdapter {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelAdapter::Extension(_) => ChannelKind::ExtensionRequest,
            ChannelAdapter::DeepLink(_) => ChannelKind::DeepLinkRelay,
            ChannelAdapter::Provider(_) => ChannelKind::InjectedProviderSign,
        }
    }

    /// Send one request to the wallet and wait for its single answer
    pub async fn dispatch(
        &self,
        challenge: &Challenge,
        params: &DispatchParams,
        cancel: &CancellationToken,
    ) -> Result<RawWalletResponse> {
        let channel = self.kind();
        let mut state = DispatchState::Idle;

        if cancel.is_cancelled() {
            state.advance(DispatchState::Cancelled);
            debug!(%channel, %state, "dispatch cancelled before start");
            return Err(ConnectError::Cancelled);
        }

        state.advance(DispatchState::AwaitingResponse);
        info!(%channel, action = params.action(), %state, "dispatching wallet request");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ConnectError::Cancelled),
            outcome = self.send(challenge, params, cancel) => outcome,
        };

        match &outcome {
            Ok(_) => {
                state.advance(DispatchState::Resolved);
                info!(%channel, %state, "wallet responded");
            }
            Err(ConnectError::Cancelled) => {
                state.advance(DispatchState::Cancelled);
                info!(%channel, %state, "wallet request cancelled");
            }
            Err(err) => {
                state.advance(DispatchState::Failed);
                warn!(%channel, %state, error = %err, "wallet request failed");
            }
        }
        outcome
    }

    async fn send(
        &self,
        challenge: &Challenge,
        params: &DispatchParams,
        cancel: &CancellationToken,
    ) -> Result<RawWalletResponse> {
        match self {
            ChannelAdapter::Extension(channel) => channel.send(challenge, params).await,
            ChannelAdapter::DeepLink(channel) => channel.send(challenge, params, cancel).await,
            ChannelAdapter::Provider(channel) => channel.send(challenge, params).await,
        }
    }
}
