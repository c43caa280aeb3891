/*
[INPUT]:  Push-channel base URL and per-dispatch listener keys
[OUTPUT]: Key-scoped stream of push messages for each dispatch
[POS]:    WebSocket layer - process-wide push-channel hub
[UPDATE]: When changing connection lifecycle or message routing
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{ConnectError, Result};
use crate::ws::{RelayMessage, truncate_for_log};

pub(crate) const PUSH_BASE_URL: &str = "wss://api.runonflux.io/ws/id/";
const RAW_LOG_MAX_BYTES: usize = 256;

static GLOBAL_HUB: OnceLock<PushHub> = OnceLock::new();

/// Stream of raw text frames for one key
pub type PushStream = BoxStream<'static, Result<String>>;

/// Opens the underlying push connection for a key
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, key: &str) -> Result<PushStream>;
}

/// WebSocket connector: one connection to `<base>/<key>` per active key
#[derive(Debug, Clone)]
pub struct WsPushConnector {
    base_url: Url,
}

impl WsPushConnector {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url })
    }

    pub fn endpoint(&self, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConnectError::Config(format!("push url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl PushConnector for WsPushConnector {
    async fn connect(&self, key: &str) -> Result<PushStream> {
        let url = self.endpoint(key)?;
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|err| ConnectError::WebSocket(err.to_string()))?;
        info!(url = %url, "push channel connected");

        let frames = ws_stream.filter_map(|frame| async move {
            match frame {
                Ok(WsMessage::Text(text)) => Some(Ok(text.to_string())),
                Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        debug!(len = bytes.len(), "skipping non-utf8 push frame");
                        None
                    }
                },
                Ok(WsMessage::Close(_)) => {
                    Some(Err(ConnectError::ChannelClosed("push channel closed".to_string())))
                }
                Ok(_) => None,
                Err(err) => Some(Err(ConnectError::WebSocket(err.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}

/// Event delivered to a push listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Message(String),
    Closed(String),
}

struct Route {
    generation: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<PushEvent>>,
    shutdown: CancellationToken,
}

struct HubInner {
    connector: Arc<dyn PushConnector>,
    routes: Mutex<HashMap<String, Route>>,
    next_id: AtomicU64,
}

impl HubInner {
    fn routes(&self) -> MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared push-channel resource.
///
/// Listeners are scoped per dispatch and per key: a message is only handed
/// to listeners of the key its connection was opened for.
#[derive(Clone)]
pub struct PushHub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for PushHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushHub")
            .field("active_keys", &self.active_keys())
            .finish()
    }
}

impl PushHub {
    pub fn new(connector: Arc<dyn PushConnector>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connector,
                routes: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Initialize the process-wide hub once; later calls reuse the first hub
    pub fn init_global(connector: Arc<dyn PushConnector>) -> PushHub {
        GLOBAL_HUB.get_or_init(|| PushHub::new(connector)).clone()
    }

    /// The process-wide hub, if initialized
    pub fn global() -> Option<PushHub> {
        GLOBAL_HUB.get().cloned()
    }

    /// Register a listener for `key`, opening the connection if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, key: &str) -> PushListener {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut routes = self.inner.routes();
        let route = routes.entry(key.to_string()).or_insert_with(|| {
            let generation = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let shutdown = CancellationToken::new();
            tokio::spawn(run_connection(
                Arc::downgrade(&self.inner),
                key.to_string(),
                generation,
                shutdown.clone(),
            ));
            Route {
                generation,
                listeners: HashMap::new(),
                shutdown,
            }
        });
        route.listeners.insert(listener_id, tx);
        debug!(key, listener_id, listeners = route.listeners.len(), "push listener registered");

        PushListener {
            key: key.to_string(),
            listener_id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Route a raw frame to the listeners of `key`; returns how many received it
    pub fn deliver(&self, key: &str, raw: &str) -> usize {
        deliver(&self.inner, key, raw)
    }

    /// Keys that currently have at least one listener
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.routes().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of listeners registered for `key`
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner
            .routes()
            .get(key)
            .map_or(0, |route| route.listeners.len())
    }
}

fn deliver(inner: &HubInner, key: &str, raw: &str) -> usize {
    if RelayMessage::parse(raw).names_other_key(key) {
        debug!(key, "dropping push message addressed to another key");
        return 0;
    }

    let mut routes = inner.routes();
    let Some(route) = routes.get_mut(key) else {
        debug!(key, "dropping push message without listeners");
        return 0;
    };

    route
        .listeners
        .retain(|_, tx| tx.send(PushEvent::Message(raw.to_string())).is_ok());
    route.listeners.len()
}

fn close_route(inner: &HubInner, key: &str, generation: u64, reason: &str) {
    let mut routes = inner.routes();
    if routes.get(key).is_some_and(|route| route.generation == generation)
        && let Some(route) = routes.remove(key)
    {
        for tx in route.listeners.values() {
            let _ = tx.send(PushEvent::Closed(reason.to_string()));
        }
    }
}

async fn run_connection(
    hub: Weak<HubInner>,
    key: String,
    generation: u64,
    shutdown: CancellationToken,
) {
    let Some(connector) = hub.upgrade().map(|inner| Arc::clone(&inner.connector)) else {
        return;
    };

    let connected = tokio::select! {
        _ = shutdown.cancelled() => return,
        connected = connector.connect(&key) => connected,
    };

    let mut stream = match connected {
        Ok(stream) => stream,
        Err(err) => {
            warn!(key = %key, error = %err, "push channel connect failed");
            if let Some(inner) = hub.upgrade() {
                close_route(&inner, &key, generation, &err.to_string());
            }
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(key = %key, "push channel released");
                break;
            }
            frame = stream.next() => {
                let Some(inner) = hub.upgrade() else { break };
                match frame {
                    Some(Ok(text)) => {
                        let delivered = deliver(&inner, &key, &text);
                        debug!(
                            key = %key,
                            delivered,
                            message = %truncate_for_log(&text, RAW_LOG_MAX_BYTES),
                            "push message received"
                        );
                    }
                    Some(Err(err)) => {
                        warn!(key = %key, error = %err, "push channel error");
                        close_route(&inner, &key, generation, &err.to_string());
                        break;
                    }
                    None => {
                        close_route(&inner, &key, generation, "push channel ended");
                        break;
                    }
                }
            }
        }
    }
}

/// Per-dispatch push listener; dropping it deregisters the listener
#[derive(Debug)]
pub struct PushListener {
    key: String,
    listener_id: u64,
    rx: mpsc::UnboundedReceiver<PushEvent>,
    hub: Weak<HubInner>,
}

impl PushListener {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next event for this key; `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }
}

impl Drop for PushListener {
    fn drop(&mut self) {
        let Some(inner) = self.hub.upgrade() else {
            return;
        };
        let mut routes = inner.routes();
        let Some(route) = routes.get_mut(&self.key) else {
            return;
        };
        route.listeners.remove(&self.listener_id);
        debug!(key = %self.key, listener_id = self.listener_id, "push listener deregistered");

        if route.listeners.is_empty()
            && let Some(route) = routes.remove(&self.key)
        {
            route.shutdown.cancel();
        }
    }
}
