/*
[INPUT]:  Wallet channels, verifier client and session storage
[OUTPUT]: Verified sessions, settled payments and correlation bookkeeping
[POS]:    Auth layer - login and payment orchestration
[UPDATE]: When login/payment flow or session handling changes
*/

pub mod connector;
pub mod id;
pub mod normalize;
pub mod registry;
pub mod session;

pub use connector::{
    ConnectorConfig, DEFAULT_RESPONSE_TIMEOUT, WalletConnector, default_session_dir,
    filter_transactions,
};
pub use id::generate_token;
pub use normalize::{Normalized, normalize, normalize_identity, normalize_payment};
pub use registry::{CorrelationRegistry, Pending};
pub use session::{FileSessionStore, MemorySessionStore, SESSION_FILE_NAME, SessionStore};
