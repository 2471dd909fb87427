//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;

use harvester::models::Config;
use image::{ImageBuffer, ImageFormat, Rgb};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fast configuration writing under `base`: no pacing delays, short backoff,
/// no timestamp directory.
pub fn test_config(base: &Path) -> Config {
    let mut config = Config::default();
    config.download.base_path = base.to_string_lossy().into_owned();
    config.download.request_interval_ms = 0;
    config.download.retry_base_delay_ms = 10;
    config.download.max_retry = 3;
    config.crawl.page_delay_ms = 0;
    config.output.use_timestamp = false;
    config
}

/// A small valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(4, 4, |x, y| Rgb([x as u8 * 60, y as u8 * 60, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serve a PNG at `at`.
pub async fn mount_png(server: &MockServer, at: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(png_bytes(), "image/png"))
        .mount(server)
        .await;
}

/// Serve an HTML document at `at`.
pub async fn mount_html(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

/// A gallery page body with one `<img>` per source.
pub fn gallery(sources: &[&str]) -> String {
    let images: String = sources
        .iter()
        .map(|src| format!(r#"<img src="{src}">"#))
        .collect();
    format!("<html><body><div class=\"photos\">{images}</div></body></html>")
}
