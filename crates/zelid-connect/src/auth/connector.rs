/*
[INPUT]:  Wallet channels, HTTP client, session store and payment relay
[OUTPUT]: Verified sessions, settled payments and transaction history
[POS]:    Auth layer - orchestrates login and payment attempts
[UPDATE]: When login or payment flow steps change
*/

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::{
    CorrelationRegistry, SessionStore, generate_token, normalize_identity, normalize_payment,
};
use crate::channel::{
    ChannelAdapter, DeepLinkConfig, DeepLinkRelay, DispatchParams, ExtensionBridge,
    ExtensionRequest, InjectedProvider, InjectedProviderSign, PaymentTarget, SystemUrlOpener,
    UrlOpener,
};
use crate::http::client::{ID_BASE_URL, VERIFIER_BASE_URL};
use crate::http::{ClientConfig, ConnectError, Result, ZelidClient};
use crate::types::{
    Challenge, ChannelKind, CorrelationToken, Identity, PaymentAck, PaymentNotice, PendingPayment,
    Session, StatusFilter, Transaction,
};
use crate::ws::push::PUSH_BASE_URL;
use crate::ws::relay::DEFAULT_CONNECT_TIMEOUT;
use crate::ws::{PaymentRelay, PushHub, WsPushConnector};

/// Default bound on waiting for a wallet answer
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

/// Endpoints and behaviour of a [`WalletConnector`]
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub client: ClientConfig,
    pub id_base_url: String,
    pub verifier_base_url: String,
    pub push_base_url: String,
    /// Payment relay WebSocket; history and ledger notices need it
    pub relay_url: Option<String>,
    pub relay_connect_timeout: Duration,
    pub deep_link: DeepLinkConfig,
    pub payment_target: PaymentTarget,
    /// `None` waits for the wallet indefinitely
    pub response_timeout: Option<Duration>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            id_base_url: ID_BASE_URL.to_string(),
            verifier_base_url: VERIFIER_BASE_URL.to_string(),
            push_base_url: PUSH_BASE_URL.to_string(),
            relay_url: None,
            relay_connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            deep_link: DeepLinkConfig::default(),
            payment_target: PaymentTarget::default(),
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
        }
    }
}

enum Settlement {
    Settled(Result<PaymentAck>),
    Dispatched(Result<PaymentAck>),
}

/// Runs login and payment attempts across the wallet channels
pub struct WalletConnector {
    client: ZelidClient,
    config: ConnectorConfig,
    extension: ExtensionRequest,
    deep_link: DeepLinkRelay,
    provider: InjectedProviderSign,
    sessions: Arc<dyn SessionStore>,
    logins: CorrelationRegistry<Identity>,
    payments: CorrelationRegistry<PaymentAck>,
    relay: Option<Arc<PaymentRelay>>,
}

impl std::fmt::Debug for WalletConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnector")
            .field("client", &self.client)
            .field("extension", &self.extension)
            .field("deep_link", &self.deep_link)
            .field("provider", &self.provider)
            .field("pending_payments", &self.payments.len())
            .finish()
    }
}

impl WalletConnector {
    /// Build a connector using the process-wide push hub and the system URL opener.
    ///
    /// No extension or provider is attached until one is supplied.
    pub fn new(config: ConnectorConfig, sessions: Arc<dyn SessionStore>) -> Result<Self> {
        let hub = match PushHub::global() {
            Some(hub) => hub,
            None => PushHub::init_global(Arc::new(WsPushConnector::new(&config.push_base_url)?)),
        };
        Self::with_parts(config, sessions, hub, Arc::new(SystemUrlOpener))
    }

    /// Build a connector from an explicit push hub and URL opener
    pub fn with_parts(
        config: ConnectorConfig,
        sessions: Arc<dyn SessionStore>,
        hub: PushHub,
        opener: Arc<dyn UrlOpener>,
    ) -> Result<Self> {
        let client = ZelidClient::with_config_and_base_urls(
            config.client.clone(),
            &config.id_base_url,
            &config.verifier_base_url,
        )?;
        let payments = CorrelationRegistry::new();
        let relay = config
            .relay_url
            .as_ref()
            .map(|url| {
                Arc::new(
                    PaymentRelay::new(url.clone(), payments.clone())
                        .with_connect_timeout(config.relay_connect_timeout),
                )
            });

        Ok(Self {
            client,
            extension: ExtensionRequest::new(None, config.payment_target.clone()),
            deep_link: DeepLinkRelay::new(
                opener,
                hub,
                config.deep_link.clone(),
                config.payment_target.clone(),
            ),
            provider: InjectedProviderSign::new(None),
            config,
            sessions,
            logins: CorrelationRegistry::new(),
            payments,
            relay,
        })
    }

    /// Attach an installed browser extension
    pub fn with_extension(mut self, bridge: Arc<dyn ExtensionBridge>) -> Self {
        self.extension = ExtensionRequest::new(Some(bridge), self.config.payment_target.clone());
        self
    }

    /// Attach an injected chain provider
    pub fn with_provider(mut self, provider: Arc<dyn InjectedProvider>) -> Self {
        self.provider = InjectedProviderSign::new(Some(provider));
        self
    }

    pub fn client(&self) -> &ZelidClient {
        &self.client
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Registry of in-flight payments, shared with the payment relay
    pub fn payments(&self) -> &CorrelationRegistry<PaymentAck> {
        &self.payments
    }

    pub fn relay(&self) -> Option<&PaymentRelay> {
        self.relay.as_deref()
    }

    /// Adapter for a wallet channel
    pub fn adapter(&self, kind: ChannelKind) -> ChannelAdapter {
        match kind {
            ChannelKind::ExtensionRequest => ChannelAdapter::Extension(self.extension.clone()),
            ChannelKind::DeepLinkRelay => ChannelAdapter::DeepLink(self.deep_link.clone()),
            ChannelKind::InjectedProviderSign => ChannelAdapter::Provider(self.provider.clone()),
        }
    }

    /// Currently stored session, without contacting the server
    pub fn session(&self) -> Option<Session> {
        self.sessions.load()
    }

    /// Complete login flow
    ///
    /// 1. Fetch a login phrase
    /// 2. Ask the wallet to sign it
    /// 3. Normalize the answer into an identity
    /// 4. Verify it with the verifier
    /// 5. Persist the verified session
    pub async fn login(&self, kind: ChannelKind, cancel: &CancellationToken) -> Result<Session> {
        // Step 1: Fetch login phrase
        let challenge = self.client.fetch_challenge().await?;
        info!(channel = %kind, "login phrase received");

        // Step 2: Dispatch to wallet; the phrase doubles as the correlation token
        let token = CorrelationToken::new(challenge.phrase.as_str());
        let pending = self.logins.register(token.clone())?;
        let adapter = self.adapter(kind);
        let raw = self
            .bounded(adapter.dispatch(&challenge, &DispatchParams::Sign, cancel))
            .await?;

        // Step 3: Normalize
        self.logins.resolve(&token, normalize_identity(raw));
        let identity = pending.await?;

        // Step 4: Verify
        match self.client.verify(&identity).await {
            Ok(_) => {}
            Err(err @ ConnectError::NotAuthenticated(_)) => {
                if let Err(clear_err) = self.sessions.clear() {
                    warn!(error = %clear_err, "failed to clear session after rejected login");
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        // Step 5: Persist
        let session = Session::verified(identity);
        self.sessions.save(&session)?;
        info!(channel = %kind, zelid = %session.identity.id, "login complete");
        Ok(session)
    }

    /// Complete payment flow
    ///
    /// The payment settles on whichever arrives first: the wallet's own answer
    /// or a relay confirmation for the same payment. The relay notice, the
    /// wallet prompt and the wait all run under the response timeout and stop
    /// on cancellation.
    pub async fn pay(
        &self,
        kind: ChannelKind,
        amount: Decimal,
        zelid: &str,
        cancel: &CancellationToken,
    ) -> Result<PaymentAck> {
        let payment = PendingPayment::new(generate_token(), amount)?;
        let token = payment.token.clone();
        let mut pending = self.payments.register(token.clone())?;
        info!(channel = %kind, token = %token, amount = %payment.amount, "payment registered");

        let challenge = Challenge::new(token.as_str());
        let params = DispatchParams::Pay {
            amount: payment.amount,
        };
        let adapter = self.adapter(kind);

        let settle = async {
            self.notify_relay(&payment, zelid).await;

            let first = tokio::select! {
                settled = &mut pending => Settlement::Settled(settled),
                dispatched = adapter.dispatch(&challenge, &params, cancel) => {
                    Settlement::Dispatched(dispatched.and_then(normalize_payment))
                }
            };

            match first {
                Settlement::Settled(outcome) => outcome,
                Settlement::Dispatched(Ok(ack)) => {
                    if !self.payments.resolve(&token, ack) {
                        info!(token = %token, "payment already settled by relay");
                    }
                    pending.await
                }
                Settlement::Dispatched(Err(err)) => Err(err),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnectError::Cancelled),
            outcome = self.bounded(settle) => outcome,
        };
        match &outcome {
            Ok(ack) => info!(token = %token, tx_id = %ack.transaction_id, "payment settled"),
            Err(err) => warn!(token = %token, error = %err, "payment not settled"),
        }
        outcome
    }

    /// Restore a stored session if the server still honours it.
    ///
    /// Any answer other than success clears the slot.
    pub async fn resume(&self) -> Result<Option<Session>> {
        let Some(session) = self.sessions.load() else {
            return Ok(None);
        };

        match self.client.check_privilege(&session.identity).await {
            Ok(true) => {
                info!(zelid = %session.identity.id, "session resumed");
                return Ok(Some(session));
            }
            Ok(false) => info!(zelid = %session.identity.id, "stored session no longer valid"),
            Err(err) => warn!(error = %err, "privilege check failed"),
        }

        self.sessions.clear()?;
        Ok(None)
    }

    /// Forget the stored session
    pub fn logout(&self) -> Result<()> {
        self.sessions.clear()?;
        info!("logged out");
        Ok(())
    }

    /// Transaction history for `zelid` from the payment relay
    pub async fn history(&self, zelid: &str) -> Result<Vec<Transaction>> {
        let relay = self
            .relay
            .as_ref()
            .ok_or_else(|| ConnectError::Config("payment relay is not configured".to_string()))?;
        relay.connect().await?;
        self.bounded(relay.request_history(zelid)).await
    }

    async fn notify_relay(&self, payment: &PendingPayment, zelid: &str) {
        let Some(relay) = &self.relay else {
            return;
        };

        let notice = PaymentNotice {
            transaction_id: payment.token.clone(),
            amount: payment.amount,
            zelid: zelid.to_string(),
        };
        let sent = match relay.connect().await {
            Ok(()) => relay.notify_payment(&notice).await,
            Err(err) => Err(err),
        };
        if let Err(err) = sent {
            warn!(token = %payment.token, error = %err, "payment relay notice not sent");
        }
    }

    async fn bounded<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.response_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| ConnectError::Timeout {
                    duration: limit,
                })?,
            None => work.await,
        }
    }
}

/// Keep transactions matching `search` (case-insensitive, on transaction id or
/// record id) and the status filter
pub fn filter_transactions(
    transactions: &[Transaction],
    search: &str,
    status: StatusFilter,
) -> Vec<Transaction> {
    let needle = search.trim().to_lowercase();
    transactions
        .iter()
        .filter(|tx| {
            needle.is_empty()
                || tx.transaction_id.to_lowercase().contains(&needle)
                || tx.id.to_lowercase().contains(&needle)
        })
        .filter(|tx| match status {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => tx.status == wanted,
        })
        .cloned()
        .collect()
}

/// Default directory for the session slot: `./.zelid-connect` under the
/// current working directory
pub fn default_session_dir() -> PathBuf {
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    base_dir.join(".zelid-connect")
}
