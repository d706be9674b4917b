use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::types::ApiError;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default client version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the User-Agent string
fn build_user_agent() -> String {
    std::env::var("MEDIASHARE_USER_AGENT")
        .unwrap_or_else(|_| format!("mediashare-upload/{}", DEFAULT_VERSION))
}

/// HTTP client for the media-sharing backend.
///
/// One instance is shared by every call of a session so connections are
/// pooled across the concurrent uploads.
pub struct ApiClient {
    pub(super) client: Client,
    /// Byte transfers: connect timeout only, a video may take minutes to send.
    pub(super) transfer_client: Client,
    pub(super) base_url: Url,
    pub(super) user_agent: String,
    pub(super) session_id: String,
}

impl ApiClient {
    /// Create a new API client for the given server.
    ///
    /// `timeout` bounds every JSON call end to end. Byte transfers only use
    /// it as the connect timeout.
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(server_url).map_err(|source| ApiError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;

        // Endpoints are joined relative to the base path.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let build_error = |source| ApiError::Transport {
            url: server_url.to_string(),
            source,
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(build_error)?;
        let transfer_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(build_error)?;

        Ok(Self {
            client,
            transfer_client,
            base_url,
            user_agent: build_user_agent(),
            session_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn build_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(endpoint)
            .map_err(|source| ApiError::InvalidUrl {
                url: format!("{}{}", self.base_url, endpoint),
                source,
            })
    }

    pub(super) fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("User-Agent", &self.user_agent)
            .header("x-request-id", Uuid::new_v4().to_string())
            .header("x-request-session-id", &self.session_id)
    }

    async fn send_json<T>(&self, url: &Url, body: &T) -> Result<Response, ApiError>
    where
        T: Serialize,
    {
        debug!("=== API Request ===");
        debug!("URL: {}", url);

        self.request(reqwest::Method::POST, url.clone())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })
    }

    /// POST a JSON body and decode a JSON response. Non-2xx is an error.
    pub(crate) async fn post_json<T, R>(&self, endpoint: &str, body: &T) -> Result<R, ApiError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.build_url(endpoint)?;
        let response = self.send_json(&url, body).await?;
        Self::decode(&url, response).await
    }

    /// POST a JSON body and decode the response even when the status is
    /// not 2xx, for endpoints that report validation failures in the body
    /// (`{status: "error", reason}`).
    pub(crate) async fn post_for_outcome<T, R>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R, ApiError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.build_url(endpoint)?;
        let response = self.send_json(&url, body).await?;
        let status = response.status();
        let text = Self::read_body(&url, response).await?;

        debug!("=== API Response ===");
        debug!("Status: {}", status);

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => {
                error!("API request failed with status {}: {}", status, text);
                Err(ApiError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(source) => Err(ApiError::Decode {
                url: url.to_string(),
                source,
            }),
        }
    }

    async fn read_body(url: &Url, response: Response) -> Result<String, ApiError> {
        response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// Decode a JSON response. An empty 2xx body decodes as JSON `null`.
    pub(super) async fn decode<R>(url: &Url, response: Response) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        debug!("=== API Response ===");
        debug!("Status: {}", status);

        let text = Self::read_body(url, response).await?;

        if !status.is_success() {
            error!("API request failed with status {}: {}", status, text);
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("session_id", &self.session_id)
            .finish()
    }
}
