//! HTTP client for the Altiplano Access Controller REST API.
//!
//! One request per call, bounded timeout, no retries. Controller endpoints
//! speak yang-data JSON; the legacy IP-prefix endpoints live on a sidecar
//! FastAPI service and speak plain JSON.

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::{Authenticator, LoginResponse};
use crate::config::Config;

use super::ApiError;

/// HTTP request timeout in seconds.
/// The controller can be slow applying intents; 30s fails fast enough
/// without cutting off legitimate operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Media type for controller restconf endpoints.
const YANG_DATA_JSON: &str = "application/yang-data+json";

/// Endpoint returning the server's public IP (legacy tool).
const PUBLIC_IP_URL: &str = "https://ifconfig.me/all.json";

/// API client for the Altiplano controller and the legacy sidecar.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    legacy_base_url: String,
}

impl ApiClient {
    /// Create a new API client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            legacy_base_url: config.legacy_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a new access-network intent on the controller. The query
    /// parameter asks the controller to sync the intent to the device as
    /// soon as it is accepted.
    pub async fn create_intent(&self, token: &str, payload: &Value) -> Result<Value, ApiError> {
        let url = format!(
            "{}/rest/restconf/data/ibn:ibn?altiplano-triggerSyncUponSuccess=true",
            self.base_url
        );
        let request = self
            .controller_request(Method::POST, &url, token)
            .json(payload);
        self.send(request, &url).await
    }

    /// Delete an intent from both the network and the controller.
    pub async fn delete_intent(
        &self,
        token: &str,
        intent_type: &str,
        target: &str,
    ) -> Result<Value, ApiError> {
        let url = format!(
            "{}/rest/restconf/operations/ibn:delete-intent-from-network-and-controller",
            self.base_url
        );
        let payload = json!({
            "ibn:delete-intent-from-network-and-controller": {
                "intent-type": intent_type,
                "target": target
            }
        });
        let request = self
            .controller_request(Method::POST, &url, token)
            .json(&payload);
        self.send(request, &url).await
    }

    /// Read an intent. `intent_key` is the restconf list key, e.g.
    /// `HSI#MED-03,l2-user`.
    ///
    /// The key is interpolated verbatim, so a `#` in the target starts a
    /// URL fragment and everything after it is not sent. The controller's
    /// REST clients have always behaved this way; percent-encoding here
    /// would change the path the controller sees.
    pub async fn get_intent(&self, token: &str, intent_key: &str) -> Result<Value, ApiError> {
        let url = format!(
            "{}/rest/restconf/data/ibn:ibn/intent={}",
            self.base_url, intent_key
        );
        let request = self.controller_request(Method::GET, &url, token);
        self.send(request, &url).await
    }

    /// Trigger synchronization of an intent to the device.
    pub async fn sync_intent(&self, token: &str, intent_key: &str) -> Result<Value, ApiError> {
        let url = format!(
            "{}/rest/restconf/data/ibn:ibn/intent={}/synchronize",
            self.base_url, intent_key
        );
        let request = self.controller_request(Method::POST, &url, token);
        self.send(request, &url).await
    }

    // ===== Legacy sidecar (IP-prefix management) =====

    pub async fn add_ip_prefix(&self, prefix_name: &str, prefix: &str) -> Result<Value, ApiError> {
        let url = format!("{}/add-ip", self.legacy_base_url);
        let payload = json!({ "prefix_name": prefix_name, "prefix": prefix });
        let request = self.client.post(&url).json(&payload);
        self.send(request, &url).await
    }

    pub async fn delete_ip_prefix(
        &self,
        prefix_name: &str,
        prefix: &str,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/delete-ip", self.legacy_base_url);
        let payload = json!({ "prefix_name": prefix_name, "prefix": prefix });
        let request = self.client.delete(&url).json(&payload);
        self.send(request, &url).await
    }

    pub async fn public_ip(&self) -> Result<Value, ApiError> {
        let request = self.client.get(PUBLIC_IP_URL);
        self.send(request, PUBLIC_IP_URL).await
    }

    // ===== Internals =====

    fn controller_request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(header::ACCEPT, YANG_DATA_JSON)
            .header(header::CONTENT_TYPE, YANG_DATA_JSON)
            .bearer_auth(token)
    }

    /// Send a request and pass the JSON body through. A 2xx with an empty
    /// body becomes a small status object, matching what callers expect
    /// from the controller's no-content responses.
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(url, status = %status, "controller response received");

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        if body.is_empty() {
            return Ok(json!({ "status": "success", "status_code": status.as_u16() }));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("invalid JSON response: {}", e)))
    }
}

#[async_trait]
impl Authenticator for ApiClient {
    /// Authenticate against `rest/auth/login` with basic auth.
    ///
    /// Deliberately sends no headers beyond the basic-auth line: the login
    /// endpoint rejects requests carrying the yang-data Accept/Content-Type
    /// pair that every other controller call needs.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = format!("{}/rest/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(username, Some(password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(url = %url, status = %status, "login response received");

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("login response missing access token: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(&Config::default()).expect("client builds from default config")
    }

    #[test]
    fn base_urls_lose_trailing_slashes() {
        let config = Config {
            base_url: "https://10.0.0.1/nokia-altiplano-ac/".to_string(),
            legacy_base_url: "http://localhost:8000/".to_string(),
            ..Config::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://10.0.0.1/nokia-altiplano-ac");
        assert_eq!(client.legacy_base_url, "http://localhost:8000");
    }

    #[test]
    fn login_response_parses_with_and_without_lifetime() {
        let full: LoginResponse = serde_json::from_str(
            r#"{"access_token": "abc", "refresh_token": "def", "expires_in": 600}"#,
        )
        .unwrap();
        assert_eq!(full.access_token, "abc");
        assert_eq!(full.expires_in, Some(600));

        let minimal: LoginResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(minimal.expires_in, None);
        assert_eq!(minimal.refresh_token, None);
    }

    #[test]
    fn default_config_builds_client() {
        // TLS verification is off by default; the controller ships a
        // self-signed certificate.
        let _ = client();
    }
}
