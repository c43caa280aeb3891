/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public wallet-connector crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod channel;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{
    ConnectorConfig,
    CorrelationRegistry,
    FileSessionStore,
    MemorySessionStore,
    SessionStore,
    WalletConnector,
    filter_transactions,
    generate_token,
    normalize,
};

// Re-export commonly used types from channel
pub use channel::{
    ChannelAdapter,
    DispatchParams,
    ExtensionBridge,
    InjectedProvider,
    LocalEvmProvider,
    MockExtensionBridge,
    PaymentTarget,
    RawWalletResponse,
    UrlOpener,
};

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    ConnectError,
    Result,
    ZelidClient,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    PaymentRelay,
    PushHub,
    RelayEvent,
    RelayMessage,
};
