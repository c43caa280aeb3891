/*
[INPUT]:  Challenge phrase or payment token, URL opener and push hub
[OUTPUT]: Raw push-channel message carrying the wallet's answer
[POS]:    Channel layer - deep-link open plus push-channel wait
[UPDATE]: When the deep-link scheme or push resolution rules change
*/

use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::channel::{DispatchParams, PaymentTarget, RawWalletResponse};
use crate::http::{ConnectError, Result};
use crate::types::Challenge;
use crate::ws::{PushEvent, PushHub, RelayMessage};

pub(crate) const DEFAULT_SCHEME: &str = "zel";
pub(crate) const DEFAULT_SIGN_ICON: &str =
    "https://raw.githubusercontent.com/runonflux/flux/master/zelID.svg";
pub(crate) const DEFAULT_PAY_ICON: &str =
    "https://raw.githubusercontent.com/runonflux/flux/master/flux_banner.png";
pub(crate) const DEFAULT_CALLBACK: &str = "https://api.runonflux.io/id/verifylogin";

/// Opens a custom-scheme URL through the platform handler.
///
/// The return value is a best-effort hint: `false` means the handler
/// certainly did not open, `true` does not prove the wallet received it.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> bool;
}

/// Opener using the operating system's generic URL-open command
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUrlOpener;

impl UrlOpener for SystemUrlOpener {
    fn open(&self, url: &str) -> bool {
        let mut command = if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(url);
            command
        } else if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", "", url]);
            command
        } else {
            let mut command = Command::new("xdg-open");
            command.arg(url);
            command
        };

        match spawn_reaped(&mut command) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "url handler could not be started");
                false
            }
        }
    }
}

/// Start `command` detached from stdio and wait for it on a helper thread so
/// the child never lingers as a zombie
fn spawn_reaped(
    command: &mut Command,
) -> io::Result<thread::JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(thread::spawn(move || {
        let status = child.wait();
        if let Err(err) = &status {
            debug!(error = %err, "url handler wait failed");
        }
        status
    }))
}

/// Deep-link URL settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkConfig {
    pub scheme: String,
    pub sign_icon: Option<String>,
    pub pay_icon: Option<String>,
    pub callback: Option<String>,
    pub speed: Option<String>,
}

impl Default for DeepLinkConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            sign_icon: Some(DEFAULT_SIGN_ICON.to_string()),
            pay_icon: Some(DEFAULT_PAY_ICON.to_string()),
            callback: Some(DEFAULT_CALLBACK.to_string()),
            speed: Some("fast".to_string()),
        }
    }
}

/// Mobile wallet channel: open a deep link, then wait on the push channel
#[derive(Clone)]
pub struct DeepLinkRelay {
    opener: Arc<dyn UrlOpener>,
    hub: PushHub,
    link: DeepLinkConfig,
    target: PaymentTarget,
}

impl std::fmt::Debug for DeepLinkRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLinkRelay")
            .field("hub", &self.hub)
            .field("link", &self.link)
            .field("target", &self.target)
            .finish()
    }
}

impl DeepLinkRelay {
    pub fn new(
        opener: Arc<dyn UrlOpener>,
        hub: PushHub,
        link: DeepLinkConfig,
        target: PaymentTarget,
    ) -> Self {
        Self {
            opener,
            hub,
            link,
            target,
        }
    }

    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    /// Build the custom-scheme URL for a dispatch
    pub fn build_url(&self, challenge: &Challenge, params: &DispatchParams) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        match params {
            DispatchParams::Sign => {
                query.append_pair("action", "sign");
                query.append_pair("message", &challenge.phrase);
                if let Some(icon) = &self.link.sign_icon {
                    query.append_pair("icon", icon);
                }
                if let Some(callback) = &self.link.callback {
                    query.append_pair("callback", callback);
                }
            }
            DispatchParams::Pay { amount } => {
                query.append_pair("action", "pay");
                query.append_pair("coin", &self.target.coin);
                query.append_pair("address", &self.target.address);
                query.append_pair("amount", &amount.to_string());
                query.append_pair("message", &challenge.phrase);
                if let Some(speed) = &self.link.speed {
                    query.append_pair("speed", speed);
                }
                if let Some(icon) = &self.link.pay_icon {
                    query.append_pair("icon", icon);
                }
            }
        }
        format!("{}:?{}", self.link.scheme, query.finish())
    }

    pub(crate) async fn send(
        &self,
        challenge: &Challenge,
        params: &DispatchParams,
        cancel: &CancellationToken,
    ) -> Result<RawWalletResponse> {
        // Listen before opening so a fast wallet answer is not missed.
        let mut listener = self.hub.subscribe(&challenge.phrase);

        let url = self.build_url(challenge, params);
        if !self.opener.open(&url) {
            warn!(url = %url, "deep-link handler not opened");
            return Err(ConnectError::HandlerNotInstalled { url });
        }
        info!(key = %listener.key(), "deep link opened, awaiting push message");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Err(ConnectError::Cancelled),
                event = listener.recv() => event,
            };

            match event {
                Some(PushEvent::Message(raw)) => {
                    let message = RelayMessage::parse(&raw);
                    if message.is_success() {
                        info!(key = %listener.key(), "push message resolved dispatch");
                        return Ok(RawWalletResponse::Relay(message));
                    }
                    debug!(key = %listener.key(), status = %message.status, "ignoring push message");
                }
                Some(PushEvent::Closed(reason)) => return Err(ConnectError::ChannelClosed(reason)),
                None => {
                    return Err(ConnectError::ChannelClosed("push hub dropped".to_string()));
                }
            }
        }
    }
}

/// Opener that records URLs and answers with a fixed result, for testing
#[derive(Debug, Default)]
pub struct RecordingUrlOpener {
    accept: bool,
    opened: std::sync::Mutex<Vec<String>>,
}

impl RecordingUrlOpener {
    pub fn new(accept: bool) -> Self {
        Self {
            accept,
            opened: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl UrlOpener for RecordingUrlOpener {
    fn open(&self, url: &str) -> bool {
        self.opened
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.to_string());
        self.accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{PushConnector, PushStream};
    use async_trait::async_trait;
    use futures_util::{StreamExt, stream};
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct IdleConnector;

    #[async_trait]
    impl PushConnector for IdleConnector {
        async fn connect(&self, _key: &str) -> Result<PushStream> {
            Ok(stream::pending().boxed())
        }
    }

    fn relay(accept: bool) -> (DeepLinkRelay, Arc<RecordingUrlOpener>) {
        let opener = Arc::new(RecordingUrlOpener::new(accept));
        let relay = DeepLinkRelay::new(
            opener.clone(),
            PushHub::new(Arc::new(IdleConnector)),
            DeepLinkConfig::default(),
            PaymentTarget::default(),
        );
        (relay, opener)
    }

    async fn wait_for_listener(hub: &PushHub, key: &str) {
        while hub.listener_count(key) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_sign_url() {
        let (relay, _) = relay(true);
        let url = relay.build_url(&Challenge::new("1700abc"), &DispatchParams::Sign);
        assert!(url.starts_with("zel:?action=sign&message=1700abc&icon="));
        assert!(url.contains("callback=https%3A%2F%2Fapi.runonflux.io%2Fid%2Fverifylogin"));
    }

    #[test]
    fn test_pay_url() {
        let (relay, _) = relay(true);
        let url = relay.build_url(
            &Challenge::new("tok"),
            &DispatchParams::Pay {
                amount: Decimal::new(25, 1),
            },
        );
        assert!(url.starts_with(
            "zel:?action=pay&coin=zelcash&address=t3ZDschNfmy78dNzEiBNBc1xB1GdGsuwu14&amount=2.5&message=tok&speed=fast"
        ));
    }

    #[tokio::test]
    async fn test_handler_refusal_surfaces_url_and_deregisters() {
        let (relay, opener) = relay(false);
        let cancel = CancellationToken::new();

        let err = relay
            .send(&Challenge::new("phrase"), &DispatchParams::Sign, &cancel)
            .await
            .unwrap_err();

        let opened = opener.opened();
        assert_eq!(err.fallback_url(), Some(opened[0].as_str()));
        assert_eq!(relay.hub().listener_count("phrase"), 0);
    }

    #[tokio::test]
    async fn test_pending_message_is_ignored_until_success() {
        let (relay, _) = relay(true);
        let hub = relay.hub().clone();
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let relay = relay.clone();
            let cancel = cancel.clone();
            async move {
                relay
                    .send(&Challenge::new("p1"), &DispatchParams::Sign, &cancel)
                    .await
            }
        });

        wait_for_listener(&hub, "p1").await;
        hub.deliver("p1", "status=pending&data[zelid]=abc");
        hub.deliver("p1", "status=success");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        hub.deliver(
            "p1",
            "status=success&data[zelid]=abc&data[signature]=xyz&data[loginPhrase]=p1",
        );
        let raw = task.await.unwrap().unwrap();
        match raw {
            RawWalletResponse::Relay(message) => assert_eq!(message.get("zelid"), Some("abc")),
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(hub.listener_count("p1"), 0);
    }

    #[tokio::test]
    async fn test_cancel_deregisters_listener() {
        let (relay, _) = relay(true);
        let hub = relay.hub().clone();
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let relay = relay.clone();
            let cancel = cancel.clone();
            async move {
                relay
                    .send(&Challenge::new("p1"), &DispatchParams::Sign, &cancel)
                    .await
            }
        });

        wait_for_listener(&hub, "p1").await;
        cancel.cancel();

        assert!(matches!(task.await.unwrap(), Err(ConnectError::Cancelled)));
        assert_eq!(hub.listener_count("p1"), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawned_handler_is_waited_for() {
        let waiter = spawn_reaped(&mut Command::new("true")).unwrap();
        let status = waiter.join().unwrap().unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_missing_handler_binary_is_refused() {
        assert!(spawn_reaped(&mut Command::new("zelid-no-such-opener")).is_err());
    }
}
