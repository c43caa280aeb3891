/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed CLI configuration and connector settings
[POS]:    Configuration layer - endpoints, payment target, local keys
[UPDATE]: When adding new configuration options
*/

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zelid_connect::auth::default_session_dir;
use zelid_connect::channel::DeepLinkConfig;
use zelid_connect::{ConnectorConfig, PaymentTarget};

/// Top-level configuration for the wallet connector CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Login phrase issuer and privilege check
    #[serde(default = "default_id_base_url")]
    pub id_base_url: String,
    /// Login verifier
    #[serde(default = "default_verifier_base_url")]
    pub verifier_base_url: String,
    /// Push channel base; the listener key is appended
    #[serde(default = "default_push_base_url")]
    pub push_base_url: String,
    /// Payment relay WebSocket, required for history
    #[serde(default)]
    pub relay_url: Option<String>,
    /// Directory holding the session slot
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    /// Seconds to wait for a wallet answer; 0 waits forever
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub deep_link: DeepLinkSettings,
    /// Hex private key for the local EVM provider
    #[serde(default)]
    pub evm_private_key: Option<String>,
}

/// Payment destination configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    #[serde(default = "default_pay_address")]
    pub address: String,
    #[serde(default = "default_pay_chain")]
    pub chain: String,
    #[serde(default = "default_pay_coin")]
    pub coin: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        let target = PaymentTarget::default();
        Self {
            address: target.address,
            chain: target.chain,
            coin: target.coin,
        }
    }
}

/// Deep-link URL configuration; unset fields keep the library defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeepLinkSettings {
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub callback: Option<String>,
    #[serde(default)]
    pub sign_icon: Option<String>,
    #[serde(default)]
    pub pay_icon: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            id_base_url: default_id_base_url(),
            verifier_base_url: default_verifier_base_url(),
            push_base_url: default_push_base_url(),
            relay_url: None,
            session_dir: None,
            response_timeout_secs: default_response_timeout_secs(),
            payment: PaymentConfig::default(),
            deep_link: DeepLinkSettings::default(),
            evm_private_key: None,
        }
    }
}

fn default_id_base_url() -> String {
    ConnectorConfig::default().id_base_url
}

fn default_verifier_base_url() -> String {
    ConnectorConfig::default().verifier_base_url
}

fn default_push_base_url() -> String {
    ConnectorConfig::default().push_base_url
}

fn default_response_timeout_secs() -> u64 {
    300
}

fn default_pay_address() -> String {
    PaymentTarget::default().address
}

fn default_pay_chain() -> String {
    PaymentTarget::default().chain
}

fn default_pay_coin() -> String {
    PaymentTarget::default().coin
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        // An empty file is a valid all-defaults config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Session directory, falling back to the platform data dir
    pub fn session_dir(&self) -> PathBuf {
        if let Some(dir) = &self.session_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("zelid-connect"))
            .unwrap_or_else(default_session_dir)
    }

    pub fn connector_config(&self) -> ConnectorConfig {
        let mut deep_link = DeepLinkConfig::default();
        if let Some(scheme) = &self.deep_link.scheme {
            deep_link.scheme = scheme.clone();
        }
        if let Some(callback) = &self.deep_link.callback {
            deep_link.callback = Some(callback.clone());
        }
        if let Some(icon) = &self.deep_link.sign_icon {
            deep_link.sign_icon = Some(icon.clone());
        }
        if let Some(icon) = &self.deep_link.pay_icon {
            deep_link.pay_icon = Some(icon.clone());
        }

        ConnectorConfig {
            id_base_url: self.id_base_url.clone(),
            verifier_base_url: self.verifier_base_url.clone(),
            push_base_url: self.push_base_url.clone(),
            relay_url: self.relay_url.clone(),
            deep_link,
            payment_target: PaymentTarget {
                address: self.payment.address.clone(),
                chain: self.payment.chain.clone(),
                coin: self.payment.coin.clone(),
            },
            response_timeout: match self.response_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = assert_ok!(CliConfig::from_yaml(""));
        assert_eq!(config.id_base_url, "https://api.runonflux.io");
        assert_eq!(config.response_timeout_secs, 300);
        assert_eq!(config.payment.coin, "zelcash");
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
verifier_base_url: "http://127.0.0.1:9000"
relay_url: "ws://127.0.0.1:3001"
response_timeout_secs: 0
payment:
  address: "t1custom"
deep_link:
  scheme: "zelcore"
"#;
        let config = assert_ok!(CliConfig::from_yaml(yaml));
        let connector = config.connector_config();

        assert_eq!(connector.verifier_base_url, "http://127.0.0.1:9000");
        assert_eq!(connector.relay_url.as_deref(), Some("ws://127.0.0.1:3001"));
        assert!(connector.response_timeout.is_none());
        assert_eq!(connector.payment_target.address, "t1custom");
        assert_eq!(connector.payment_target.chain, "flux");
        assert_eq!(connector.deep_link.scheme, "zelcore");
        assert!(connector.deep_link.callback.is_some());
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert_err!(CliConfig::from_yaml("response_timeout_secs: soon"));
    }

    #[test]
    fn test_explicit_session_dir() {
        let config = assert_ok!(CliConfig::from_yaml("session_dir: /tmp/zelid-test"));
        assert_eq!(config.session_dir(), PathBuf::from("/tmp/zelid-test"));
    }
}
