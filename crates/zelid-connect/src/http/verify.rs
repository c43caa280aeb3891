/*
[INPUT]:  Canonical identity (zelid, signature, login phrase)
[OUTPUT]: Verification verdict and session privilege status
[POS]:    HTTP layer - verification client (credentialed)
[UPDATE]: When verifier endpoints or success markers change
*/

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::http::{ConnectError, Result, ZelidClient};
use crate::types::{
    Identity, PrivilegeResponse, VerificationResult, VerifyLoginRequest, VerifyLoginResponse,
};

/// Body message the verifier returns for an accepted signature
pub const LOGIN_SUCCESS_MESSAGE: &str = "Successfully logged in";

impl ZelidClient {
    /// Submit a signed login phrase to the verifier
    ///
    /// POST /api/verifyLogin
    ///
    /// Transport failures are `VerificationUnreachable`; every other non-success
    /// outcome is `NotAuthenticated`.
    pub async fn verify(&self, identity: &Identity) -> Result<VerificationResult> {
        identity.ensure_complete()?;

        let body = VerifyLoginRequest::from(identity);
        let builder = self
            .verifier_request(Method::POST, "/api/verifyLogin")?
            .json(&body);

        let (status, bytes) = self.send_raw(builder).await.map_err(|err| {
            warn!(error = %err, zelid = %identity.id, "verifier unreachable");
            ConnectError::VerificationUnreachable(err.to_string())
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), zelid = %identity.id, "verifier rejected login");
            return Err(ConnectError::rejected_by_verifier(
                status,
                String::from_utf8_lossy(&bytes),
            ));
        }

        let message = serde_json::from_slice::<VerifyLoginResponse>(&bytes)
            .ok()
            .and_then(|response| response.data)
            .and_then(|data| data.message)
            .unwrap_or_default();

        if message == LOGIN_SUCCESS_MESSAGE {
            info!(zelid = %identity.id, "login verified");
            Ok(VerificationResult {
                authenticated: true,
                message,
            })
        } else {
            warn!(zelid = %identity.id, message = %message, "login not accepted");
            Err(ConnectError::rejected_by_verifier(status, message))
        }
    }

    /// Check whether a stored identity still holds a valid session
    ///
    /// POST /id/checkprivilege
    pub async fn check_privilege(&self, identity: &Identity) -> Result<bool> {
        let body = serde_json::to_string(&VerifyLoginRequest::from(identity))?;
        let builder = self
            .id_request(Method::POST, "/id/checkprivilege")?
            .header(CONTENT_TYPE, "text/plain")
            .body(body);

        let (status, bytes) = self
            .send_raw(builder)
            .await
            .map_err(|err| ConnectError::VerificationUnreachable(err.to_string()))?;

        if !status.is_success() {
            return Ok(false);
        }

        let privileged = serde_json::from_slice::<PrivilegeResponse>(&bytes)
            .ok()
            .and_then(|response| response.status)
            .is_some_and(|status| status == "success");
        Ok(privileged)
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ClientConfig, ConnectError, ZelidClient};
    use crate::types::Identity;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ZelidClient {
        ZelidClient::with_config_and_base_urls(ClientConfig::default(), &server.uri(), &server.uri())
            .expect("client init")
    }

    fn identity() -> Identity {
        Identity::new("1ZelID", "H+sig==", "1700000000000abc")
    }

    #[tokio::test]
    async fn test_verify_success_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/verifyLogin"))
            .and(body_json(serde_json::json!({
                "zelid": "1ZelID",
                "signature": "H+sig==",
                "loginPhrase": "1700000000000abc",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"message": "Successfully logged in"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).await.verify(&identity()).await.unwrap();
        assert!(result.authenticated);
    }

    #[tokio::test]
    async fn test_verify_other_message_is_not_authenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/verifyLogin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"message": "Invalid signature"},
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.verify(&identity()).await.unwrap_err();
        assert!(matches!(err, ConnectError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn test_verify_non_2xx_is_not_authenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/verifyLogin"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "data": {"message": "Successfully logged in"},
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.verify(&identity()).await.unwrap_err();
        assert!(matches!(err, ConnectError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn test_verify_unreachable_is_distinct() {
        let client = ZelidClient::with_config_and_base_urls(
            ClientConfig::default(),
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
        )
        .unwrap();

        let err = client.verify(&identity()).await.unwrap_err();
        assert!(matches!(err, ConnectError::VerificationUnreachable(_)));
    }

    #[tokio::test]
    async fn test_verify_rejects_incomplete_identity_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/verifyLogin"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .verify(&Identity::new("1ZelID", "", "phrase"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::IncompleteIdentity("signature")));
    }

    #[tokio::test]
    async fn test_check_privilege() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/id/checkprivilege"))
            .and(header("content-type", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": {"message": "user"},
            })))
            .mount(&server)
            .await;

        assert!(client_for(&server).await.check_privilege(&identity()).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_privilege_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/id/checkprivilege"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
            })))
            .mount(&server)
            .await;

        assert!(!client_for(&server).await.check_privilege(&identity()).await.unwrap());
    }
}
