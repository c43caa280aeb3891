/*
[INPUT]:  Error sources (HTTP, wallet channels, push channel, verifier, storage)
[OUTPUT]: Structured error taxonomy with user-facing messages
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or wallet channels
*/

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the wallet connector
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Login phrase could not be fetched
    #[error("Login phrase unavailable: {0}")]
    ChallengeUnavailable(String),

    /// Browser extension capability is not installed
    #[error("Wallet extension is not available")]
    WalletUnavailable,

    /// Injected chain provider is missing or exposes no account
    #[error("Chain provider is not available")]
    ProviderUnavailable,

    /// The deep-link handler could not be opened
    #[error("Unable to open wallet handler, open this link manually: {url}")]
    HandlerNotInstalled { url: String },

    /// Extension answered with a non-success status
    #[error("Wallet rejected the request (status {status})")]
    WalletRejected { status: String },

    /// User declined the signing prompt
    #[error("User rejected the signing request")]
    UserRejected,

    /// Payment response carried no transaction id
    #[error("Payment response is missing a transaction id")]
    MissingTransactionId,

    /// Verifier did not accept the identity
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Verifier could not be reached
    #[error("Verifier unreachable: {0}")]
    VerificationUnreachable(String),

    /// Identity is missing one of id, signature or challenge
    #[error("Incomplete identity, missing {0}")]
    IncompleteIdentity(&'static str),

    /// Token already has an outstanding registration
    #[error("Correlation token already registered: {0}")]
    DuplicateToken(String),

    /// Attempt was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Wallet response did not arrive in time
    #[error("No wallet response after {duration:?}")]
    Timeout { duration: Duration },

    /// Push or relay channel closed before a response arrived
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Channel does not support the requested action
    #[error("{channel} does not support {action}")]
    UnsupportedAction {
        channel: &'static str,
        action: &'static str,
    },

    /// Payment amount is zero or negative
    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),

    /// Payment relay reported a failure
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Local storage failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConnectError {
    /// Check if the error may be retried automatically.
    ///
    /// Wallet and verifier failures are surfaced to the user instead.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::WebSocket(_))
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ConnectError::NotAuthenticated(_)
                | ConnectError::IncompleteIdentity(_)
                | ConnectError::UserRejected
                | ConnectError::WalletRejected { .. }
        )
    }

    /// Raw deep link the user can copy when the handler did not open
    pub fn fallback_url(&self) -> Option<&str> {
        match self {
            ConnectError::HandlerNotInstalled { url } => Some(url),
            _ => None,
        }
    }

    /// Short message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            ConnectError::ChallengeUnavailable(_) => {
                "Failed to fetch login phrase, try again".to_string()
            }
            ConnectError::WalletUnavailable => {
                "Wallet extension is not installed".to_string()
            }
            ConnectError::ProviderUnavailable => "Chain provider is not installed".to_string(),
            ConnectError::HandlerNotInstalled { url } => format!(
                "Unable to open wallet. Please ensure it's installed or try copying this link: {url}"
            ),
            ConnectError::WalletRejected { .. } | ConnectError::UserRejected => {
                "Request was rejected in the wallet".to_string()
            }
            ConnectError::VerificationUnreachable(_) => {
                "Verification server is unreachable, try again later".to_string()
            }
            ConnectError::NotAuthenticated(_) | ConnectError::IncompleteIdentity(_) => {
                "Signature was not accepted".to_string()
            }
            ConnectError::Timeout { .. } => "Wallet did not respond in time".to_string(),
            other => other.to_string(),
        }
    }

    /// Build a verifier rejection from a status code and body message
    pub fn rejected_by_verifier(status: StatusCode, message: impl Into<String>) -> Self {
        ConnectError::NotAuthenticated(format!("{} ({})", message.into(), status.as_u16()))
    }
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectError>;
