/*
[INPUT]:  Identity issuer base URL
[OUTPUT]: Fresh login phrase wrapped in a Challenge
[POS]:    HTTP layer - challenge source (no auth required)
[UPDATE]: When the login phrase endpoint or body changes
*/

use reqwest::Method;
use tracing::{info, warn};

use crate::http::{ConnectError, Result, ZelidClient};
use crate::types::{Challenge, LoginPhraseResponse};

impl ZelidClient {
    /// Fetch a login phrase to be signed
    ///
    /// GET /id/loginphrase
    ///
    /// Every failure is reported as `ChallengeUnavailable`; the caller retries manually.
    pub async fn fetch_challenge(&self) -> Result<Challenge> {
        let builder = self.id_request(Method::GET, "/id/loginphrase")?;
        let (status, body) = self.send_raw(builder).await.map_err(|err| {
            warn!(error = %err, "login phrase request failed");
            ConnectError::ChallengeUnavailable(err.to_string())
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "login phrase request rejected");
            return Err(ConnectError::ChallengeUnavailable(format!(
                "issuer returned status {}",
                status.as_u16()
            )));
        }

        let response: LoginPhraseResponse = serde_json::from_slice(&body)
            .map_err(|err| ConnectError::ChallengeUnavailable(format!("invalid body: {err}")))?;

        let phrase = response
            .data
            .map(|phrase| phrase.trim().to_string())
            .filter(|phrase| !phrase.is_empty())
            .ok_or_else(|| {
                ConnectError::ChallengeUnavailable("issuer returned an empty phrase".to_string())
            })?;

        info!(phrase_len = phrase.len(), "login phrase fetched");
        Ok(Challenge::new(phrase))
    }
}
