// src/services/watermark/baidu.rs

//! Baidu AI Cloud image-process watermark removal.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::BaiduConfig;
use crate::services::watermark::WatermarkProvider;

const NAME: &str = "baidu";

/// Tokens are refreshed this long before Baidu says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct RemoveResponse {
    error_code: Option<i64>,
    error_msg: Option<String>,
    image: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// OAuth client-credentials token plus a form-encoded base64 upload.
pub struct BaiduProvider {
    client: reqwest::Client,
    config: BaiduConfig,
    token: Mutex<Option<CachedToken>>,
}

impl BaiduProvider {
    pub fn new(client: reqwest::Client, config: BaiduConfig) -> Self {
        Self {
            client,
            config,
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .get(self.endpoint("/oauth/2.0/token"))
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.secret_key.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::watermark(
                NAME,
                format!("access token request failed: HTTP {}", response.status().as_u16()),
            ));
        }

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl WatermarkProvider for BaiduProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.config.enabled && !self.config.api_key.is_empty() && !self.config.secret_key.is_empty()
    }

    async fn remove(&self, image: &[u8]) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let encoded = STANDARD.encode(image);

        let response = self
            .client
            .post(self.endpoint("/rest/2.0/image-process/v1/remove_watermark"))
            .query(&[("access_token", token.as_str())])
            .form(&[("image", encoded.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::watermark(
                NAME,
                format!("API call failed: HTTP {}", response.status().as_u16()),
            ));
        }

        let body: RemoveResponse = serde_json::from_str(&response.text().await?)?;
        if let Some(code) = body.error_code {
            let message = body.error_msg.unwrap_or_else(|| "unknown error".into());
            return Err(AppError::watermark(NAME, format!("[{code}] {message}")));
        }

        let image = body
            .image
            .ok_or_else(|| AppError::watermark(NAME, "response carried no image"))?;
        STANDARD
            .decode(image)
            .map_err(|e| AppError::watermark(NAME, format!("invalid base64 image: {e}")))
    }
}
