// src/utils/http.rs

//! HTTP client utilities.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::redirect;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Create the client used for HTML pages.
pub fn create_page_client(config: &Config) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, header_value(&config.download.accept_language)?);

    let client = reqwest::Client::builder()
        .user_agent(&config.download.user_agent)
        .default_headers(headers)
        .connect_timeout(config.download.connect_timeout())
        .timeout(config.crawl.page_timeout())
        .build()?;
    Ok(client)
}

/// Create the client used for image downloads.
///
/// Transport-level redirects are disabled; the downloader follows
/// 301/302/303 itself so each hop gets its own headers and hop accounting.
pub fn create_image_client(config: &Config) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.download.user_agent)
        .redirect(redirect::Policy::none())
        .connect_timeout(config.download.connect_timeout())
        .timeout(config.download.read_timeout())
        .build()?;
    Ok(client)
}

/// Fetch a page body as text, treating non-2xx responses as errors.
pub async fn fetch_page_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::crawl(url, format!("HTTP {}", status.as_u16())));
    }
    Ok(response.text().await?)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::config(format!("invalid header value '{value}': {e}")))
}
