// src/services/watermark/tencent.rs

//! Tencent Cloud TIIA watermark removal, signed with TC3-HMAC-SHA256.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::TencentConfig;
use crate::services::watermark::WatermarkProvider;

const NAME: &str = "tencent";
const SERVICE: &str = "tiia";
const ACTION: &str = "RemoveWatermark";
const VERSION: &str = "2019-05-29";
const ALGORITHM: &str = "TC3-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Option<ResponseBody>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(rename = "Error")]
    error: Option<ApiError>,
    #[serde(rename = "WatermarkFreeImage")]
    watermark_free_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// JSON API call authenticated with a TC3 canonical-request signature.
pub struct TencentProvider {
    client: reqwest::Client,
    config: TencentConfig,
}

impl TencentProvider {
    pub fn new(client: reqwest::Client, config: TencentConfig) -> Self {
        Self { client, config }
    }

    fn host(&self) -> Result<String> {
        let url = Url::parse(&self.config.endpoint)?;
        let host = url
            .host_str()
            .ok_or_else(|| AppError::config(format!("no host in {}", self.config.endpoint)))?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

/// Build the `Authorization` header for a JSON POST to `/`.
pub fn authorization(
    secret_id: &str,
    secret_key: &str,
    host: &str,
    payload: &str,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    let date = timestamp.format("%Y-%m-%d").to_string();
    let canonical_request = format!(
        "POST\n/\n\ncontent-type:application/json\nhost:{host}\n\n{SIGNED_HEADERS}\n{}",
        sha256_hex(payload)
    );
    let scope = format!("{date}/{SERVICE}/tc3_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        timestamp.timestamp(),
        sha256_hex(&canonical_request)
    );

    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), &date)?;
    let secret_service = hmac_sha256(&secret_date, SERVICE)?;
    let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, &string_to_sign)?);

    Ok(format!(
        "{ALGORITHM} Credential={secret_id}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}"
    ))
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn hmac_sha256(key: &[u8], message: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::watermark(NAME, format!("signing key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[async_trait]
impl WatermarkProvider for TencentProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.config.enabled
            && !self.config.secret_id.is_empty()
            && !self.config.secret_key.is_empty()
    }

    async fn remove(&self, image: &[u8]) -> Result<Vec<u8>> {
        let payload = serde_json::json!({ "Image": STANDARD.encode(image) }).to_string();
        let now = Utc::now();
        let auth = authorization(
            &self.config.secret_id,
            &self.config.secret_key,
            &self.host()?,
            &payload,
            now,
        )?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", auth)
            .header("Content-Type", "application/json")
            .header("X-TC-Action", ACTION)
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .header("X-TC-Version", VERSION)
            .header("X-TC-Region", &self.config.region)
            .body(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::watermark(
                NAME,
                format!("API call failed: HTTP {}", response.status().as_u16()),
            ));
        }

        let envelope: Envelope = serde_json::from_str(&response.text().await?)?;
        let body = envelope
            .response
            .ok_or_else(|| AppError::watermark(NAME, "malformed response"))?;
        if let Some(error) = body.error {
            return Err(AppError::watermark(
                NAME,
                format!("{} {}", error.code, error.message).trim().to_string(),
            ));
        }

        let image = body
            .watermark_free_image
            .ok_or_else(|| AppError::watermark(NAME, "response carried no image"))?;
        STANDARD
            .decode(image)
            .map_err(|e| AppError::watermark(NAME, format!("invalid base64 image: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_authorization_matches_reference_signature() {
        let timestamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let auth = authorization(
            "AKIDEXAMPLE",
            "SECRETEXAMPLE",
            "tiia.tencentcloudapi.com",
            r#"{"Image":"aGVsbG8="}"#,
            timestamp,
        )
        .unwrap();
        assert_eq!(
            auth,
            "TC3-HMAC-SHA256 Credential=AKIDEXAMPLE/2023-11-14/tiia/tc3_request, \
             SignedHeaders=content-type;host, \
             Signature=2fdf3ec2eebeb38e22372a616bd66f471a8224708304553c9558f5d0793a1fd2"
        );
    }

    #[test]
    fn test_host_keeps_explicit_port() {
        let provider = TencentProvider::new(
            reqwest::Client::new(),
            TencentConfig {
                endpoint: "http://127.0.0.1:8080".into(),
                ..TencentConfig::default()
            },
        );
        assert_eq!(provider.host().unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn test_unavailable_without_credentials() {
        let provider = TencentProvider::new(
            reqwest::Client::new(),
            TencentConfig {
                enabled: true,
                ..TencentConfig::default()
            },
        );
        assert!(!provider.is_available());
    }
}
