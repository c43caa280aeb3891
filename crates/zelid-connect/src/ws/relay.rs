/*
[INPUT]:  Payment relay URL, payment notices and history requests
[OUTPUT]: Settled pending payments and transaction history
[POS]:    WebSocket layer - bidirectional payment/transaction event channel
[UPDATE]: When adding relay events or changing connection logic
*/

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::auth::CorrelationRegistry;
use crate::http::{ConnectError, Result};
use crate::types::{CorrelationToken, PaymentAck, PaymentNotice, Transaction};
use crate::ws::{RelayEnvelope, RelayEvent, truncate_for_log};

pub(crate) const RELAY_URL: &str = "ws://localhost:3001";
/// Default bound on the relay WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 100;
const RAW_LOG_MAX_BYTES: usize = 1024;

type HistoryWaiter = Arc<Mutex<Option<oneshot::Sender<Result<Vec<Transaction>>>>>>;

#[derive(Debug, Serialize)]
struct HistoryQuery<'a> {
    zelid: &'a str,
}

/// State shared between the relay handle and its connection task
#[derive(Debug, Clone)]
pub(crate) struct RelayState {
    registry: CorrelationRegistry<PaymentAck>,
    history: HistoryWaiter,
    last_notice: Arc<Mutex<Option<CorrelationToken>>>,
}

impl RelayState {
    pub(crate) fn new(registry: CorrelationRegistry<PaymentAck>) -> Self {
        Self {
            registry,
            history: Arc::new(Mutex::new(None)),
            last_notice: Arc::new(Mutex::new(None)),
        }
    }

    /// Payment an inbound event refers to: the named token, or else the most
    /// recently notified payment while it is still pending
    async fn payment_for(&self, named: Option<&CorrelationToken>) -> Option<CorrelationToken> {
        if let Some(token) = named {
            return Some(token.clone());
        }
        let last = self.last_notice.lock().await.clone()?;
        self.registry.is_pending(&last).then_some(last)
    }
}

/// Client for the payment relay.
///
/// Confirmations settle pending payments by `transactionId` when the ledger
/// echoes it, otherwise the most recently notified payment. Duplicates and
/// responses for settled payments are dropped by the registry.
#[derive(Debug)]
pub struct PaymentRelay {
    url: String,
    connect_timeout: Duration,
    state: RelayState,
    outbound_tx: Arc<Mutex<Option<mpsc::Sender<WsMessage>>>>,
    history_turn: Mutex<()>,
    event_tx: broadcast::Sender<RelayEvent>,
}

impl PaymentRelay {
    pub fn new(url: impl Into<String>, registry: CorrelationRegistry<PaymentAck>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            state: RelayState::new(registry),
            outbound_tx: Arc::new(Mutex::new(None)),
            history_turn: Mutex::new(()),
            event_tx,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Receive every inbound relay event from now on.
    ///
    /// A receiver that falls behind skips the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    pub async fn is_connected(&self) -> bool {
        self.outbound_tx.lock().await.is_some()
    }

    /// Connect once; later calls reuse the live connection
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.outbound_tx.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let (ws_stream, _response) =
            tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
                .await
                .map_err(|_| {
                    ConnectError::WebSocket(format!(
                        "payment relay handshake timed out after {:?}",
                        self.connect_timeout
                    ))
                })?
                .map_err(|err| ConnectError::WebSocket(err.to_string()))?;
        info!(url = %self.url, "payment relay connected");

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<WsMessage>(EVENT_BUFFER);
        *guard = Some(outbound_tx);
        drop(guard);

        let outbound_state = Arc::clone(&self.outbound_tx);
        let state = self.state.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = outbound_rx.recv() => {
                        match outbound {
                            Some(message) => {
                                if write.send(message).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(WsMessage::Close(_))) => {
                                let _ = write.send(WsMessage::Close(None)).await;
                                break;
                            }
                            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                            Some(Ok(WsMessage::Text(text))) => {
                                let event = RelayEvent::parse(&text);
                                if matches!(event, RelayEvent::Other) {
                                    debug!(message = %truncate_for_log(&text, RAW_LOG_MAX_BYTES), "relay event unrecognized");
                                }
                                handle_event(&state, &event).await;
                                // No subscribers is fine
                                let _ = event_tx.send(event);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(error = %err, "payment relay error");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            if let Some(waiter) = state.history.lock().await.take() {
                let _ = waiter.send(Err(ConnectError::ChannelClosed(
                    "payment relay closed".to_string(),
                )));
            }
            *outbound_state.lock().await = None;
            info!("payment relay disconnected");
        });

        Ok(())
    }

    /// Tell the ledger about a dispatched payment
    pub async fn notify_payment(&self, notice: &PaymentNotice) -> Result<()> {
        *self.state.last_notice.lock().await = Some(notice.transaction_id.clone());
        self.send_event("message", notice).await?;
        info!(token = %notice.transaction_id, amount = %notice.amount, "payment notice sent");
        Ok(())
    }

    /// Request the transaction history for `zelid` and wait for the reply.
    ///
    /// Concurrent requests are answered one after another.
    pub async fn request_history(&self, zelid: &str) -> Result<Vec<Transaction>> {
        let _turn = self.history_turn.lock().await;
        let (tx, rx) = oneshot::channel();
        *self.state.history.lock().await = Some(tx);

        if let Err(err) = self.send_event("getTransactions", &HistoryQuery { zelid }).await {
            self.state.history.lock().await.take();
            return Err(err);
        }
        rx.await
            .map_err(|_| ConnectError::ChannelClosed("payment relay closed".to_string()))?
    }

    async fn send_event<T: Serialize>(&self, event: &'static str, data: T) -> Result<()> {
        let sender = {
            let guard = self.outbound_tx.lock().await;
            guard
                .clone()
                .ok_or_else(|| ConnectError::WebSocket("payment relay not connected".to_string()))?
        };

        let frame = serde_json::to_string(&RelayEnvelope { event, data })?;
        sender
            .send(WsMessage::Text(frame.into()))
            .await
            .map_err(|_| ConnectError::ChannelClosed("payment relay send channel closed".to_string()))
    }
}

/// Apply one inbound event to pending payments and the history waiter
pub(crate) async fn handle_event(state: &RelayState, event: &RelayEvent) {
    match event {
        RelayEvent::TransactionResponse {
            transaction_id,
            tx_id,
        } => {
            let Some(token) = state.payment_for(transaction_id.as_ref()).await else {
                debug!(tx_id = %tx_id, "relay confirmation with no outstanding payment");
                return;
            };
            let settled = state.registry.resolve(
                &token,
                PaymentAck {
                    transaction_id: tx_id.clone(),
                },
            );
            info!(token = %token, tx_id = %tx_id, settled, "relay confirmed payment");
        }
        RelayEvent::PaymentRejected {
            transaction_id,
            error,
        } => match state.payment_for(transaction_id.as_ref()).await {
            Some(token) => reject(state, &token, error),
            None => warn!(error = %error, "relay rejected a payment that is no longer pending"),
        },
        RelayEvent::TransactionError {
            transaction_id: Some(token),
            error,
        } => reject(state, token, error),
        RelayEvent::TransactionError {
            transaction_id: None,
            error,
        } => {
            let waiter = state.history.lock().await.take();
            if let Some(waiter) = waiter
                && !waiter.is_closed()
            {
                warn!(error = %error, "relay failed history request");
                let _ = waiter.send(Err(ConnectError::PaymentFailed(error.clone())));
                return;
            }
            match state.payment_for(None).await {
                Some(token) => reject(state, &token, error),
                None => warn!(error = %error, "relay reported uncorrelated error"),
            }
        }
        RelayEvent::TransactionData(list) => {
            debug!(count = list.len(), "relay delivered transaction history");
            if let Some(waiter) = state.history.lock().await.take() {
                let _ = waiter.send(Ok(list.clone()));
            }
        }
        RelayEvent::Other => {}
    }
}

fn reject(state: &RelayState, token: &CorrelationToken, error: &str) {
    let settled = state
        .registry
        .reject(token, ConnectError::PaymentFailed(error.to_string()));
    warn!(token = %token, error = %error, settled, "relay reported payment failure");
}
