//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod url;

use std::time::Duration;

use ::url::Url;
use tokio_util::sync::CancellationToken;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// The `scheme://host[:port]/` root of a URL.
pub fn origin(base: &Url) -> Url {
    let mut root = base.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Whether a URL string uses an HTTP(S) scheme.
pub fn is_http(url_str: &str) -> bool {
    Url::parse(url_str)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Sleep unless cancelled first. Returns `false` when interrupted.
pub async fn interruptible_sleep(token: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !token.is_cancelled();
    }
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_origin_drops_path_and_query() {
        let base = Url::parse("https://img.example.com:8443/a/b?c=d#e").unwrap();
        assert_eq!(origin(&base).as_str(), "https://img.example.com:8443/");
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Sub.Example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_is_http() {
        assert!(is_http("https://a.example/x"));
        assert!(is_http("http://a.example/x"));
        assert!(!is_http("javascript:void(0)"));
        assert!(!is_http("mailto:a@b.c"));
    }

    #[tokio::test]
    async fn test_interruptible_sleep() {
        let token = CancellationToken::new();
        assert!(interruptible_sleep(&token, Duration::from_millis(5)).await);

        token.cancel();
        let started = std::time::Instant::now();
        assert!(!interruptible_sleep(&token, Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
