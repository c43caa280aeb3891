/*
[INPUT]:  Login and payment scenarios across wallet channels
[OUTPUT]: Test results for the wallet connector flows
[POS]:    Integration tests - login and payment
[UPDATE]: When login or payment flow changes
*/

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use zelid_connect::{
    ChannelKind, ConnectError, ExtensionResponse, Identity, LocalEvmProvider, MockExtensionBridge,
    SessionStore,
};

use common::*;

#[tokio::test]
async fn test_deep_link_login_resolves_from_push_message() {
    let server = setup_mock_server().await;
    mount_login_phrase(&server).await;
    mount_verifier(&server, "Successfully logged in").await;
    let Harness {
        connector,
        hub,
        opener,
        sessions,
    } = harness(&server, None);
    let connector = Arc::new(connector);
    let cancel = CancellationToken::new();

    let login = tokio::spawn({
        let connector = Arc::clone(&connector);
        let cancel = cancel.clone();
        async move { connector.login(ChannelKind::DeepLinkRelay, &cancel).await }
    });

    wait_for_listener(&hub, LOGIN_PHRASE).await;
    let opened = opener.opened();
    assert!(opened[0].starts_with(&format!("zel:?action=sign&message={LOGIN_PHRASE}")));

    // Foreign phrase and pending status are ignored.
    hub.deliver(
        LOGIN_PHRASE,
        "status=success&data[zelid]=evil&data[signature]=x&data[loginPhrase]=other",
    );
    hub.deliver(LOGIN_PHRASE, "status=pending&data[zelid]=1ZelID");
    hub.deliver(
        LOGIN_PHRASE,
        &format!("status=success&data[zelid]=1ZelID&data[signature]=H%2Bsig&data[loginPhrase]={LOGIN_PHRASE}"),
    );

    let session = login.await.unwrap().unwrap();
    assert_eq!(session.identity, Identity::new("1ZelID", "H+sig", LOGIN_PHRASE));
    assert_eq!(sessions.load().unwrap().identity.id, "1ZelID");
    assert!(hub.active_keys().is_empty());
}

#[tokio::test]
async fn test_cancelled_deep_link_login() {
    let server = setup_mock_server().await;
    mount_login_phrase(&server).await;
    let Harness { connector, hub, .. } = harness(&server, None);
    let connector = Arc::new(connector);
    let cancel = CancellationToken::new();

    let login = tokio::spawn({
        let connector = Arc::clone(&connector);
        let cancel = cancel.clone();
        async move { connector.login(ChannelKind::DeepLinkRelay, &cancel).await }
    });

    wait_for_listener(&hub, LOGIN_PHRASE).await;
    cancel.cancel();

    assert!(matches!(login.await.unwrap(), Err(ConnectError::Cancelled)));
    assert!(hub.active_keys().is_empty());
}

#[tokio::test]
async fn test_deep_link_payment_keyed_by_token() {
    let server = setup_mock_server().await;
    let Harness {
        connector,
        hub,
        opener,
        ..
    } = harness(&server, None);
    let connector = Arc::new(connector);

    let pay = tokio::spawn({
        let connector = Arc::clone(&connector);
        async move {
            connector
                .pay(
                    ChannelKind::DeepLinkRelay,
                    Decimal::new(15, 1),
                    "1ZelID",
                    &CancellationToken::new(),
                )
                .await
        }
    });

    let token = wait_for_any_key(&hub).await;
    assert_eq!(token.len(), 64);
    assert!(connector.payments().is_pending(&token.as_str().into()));
    assert!(opener.opened()[0].contains("action=pay"));
    assert!(opener.opened()[0].contains("amount=1.5"));

    hub.deliver(&token, &format!("status=success&data[txid]=tx42&data[message]={token}"));

    let ack = pay.await.unwrap().unwrap();
    assert_eq!(ack.transaction_id, "tx42");
    assert!(connector.payments().is_empty());
}

#[tokio::test]
async fn test_extension_payment_scenario() {
    let server = setup_mock_server().await;
    let bridge = Arc::new(MockExtensionBridge::new(ExtensionResponse {
        status: "SUCCESS".to_string(),
        txid: Some("tx1".to_string()),
        ..Default::default()
    }));
    let harness = harness(&server, None);
    let connector = harness.connector.with_extension(bridge.clone());

    let ack = connector
        .pay(
            ChannelKind::ExtensionRequest,
            Decimal::from(3),
            "1ZelID",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(ack.transaction_id, "tx1");
    let calls = bridge.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "pay");
    assert_eq!(calls[0].1.amount.as_deref(), Some("3"));
}

#[tokio::test]
async fn test_provider_login_end_to_end() {
    let server = setup_mock_server().await;
    mount_login_phrase(&server).await;
    mount_verifier(&server, "Successfully logged in").await;
    let provider = LocalEvmProvider::new(
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    )
    .unwrap();
    let harness = harness(&server, None);
    let connector = harness.connector.with_provider(Arc::new(provider));

    let session = connector
        .login(ChannelKind::InjectedProviderSign, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(session.identity.id, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    assert_eq!(session.identity.challenge, LOGIN_PHRASE);
    assert!(session.identity.signature.starts_with("0x"));
}

#[tokio::test]
async fn test_missing_extension_surfaces_wallet_unavailable() {
    let server = setup_mock_server().await;
    mount_login_phrase(&server).await;
    let harness = harness(&server, None);

    let err = harness
        .connector
        .login(ChannelKind::ExtensionRequest, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::WalletUnavailable));
    assert_eq!(err.user_message(), "Wallet extension is not installed");
}

#[tokio::test]
async fn test_challenge_failure_is_not_retried() {
    let server = setup_mock_server().await;
    let harness = harness(&server, None);

    let err = harness
        .connector
        .login(ChannelKind::DeepLinkRelay, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::ChallengeUnavailable(_)));
    assert!(!err.is_retryable());
    assert!(harness.opener.opened().is_empty());
}
