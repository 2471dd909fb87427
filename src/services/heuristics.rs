// src/services/heuristics.rs

//! Image URL heuristics.
//!
//! `is_candidate_image` is a cheap permissive filter; `upgrade_resolution`
//! rewrites a URL towards its highest-resolution variant. Both are pure.

use crate::utils::get_domain;

/// Path fragments that mark chrome rather than content.
const NON_CONTENT_MARKERS: &[&str] = &["icon", "logo", "avatar"];

/// Hosts owned by site-specific rules.
const DOUBAN_HOSTS: &[&str] = &["doubanio.com", "douban.com"];

/// Douban size segments mapped to the original upload.
const DOUBAN_REWRITES: &[(&str, &str)] = &[
    ("/view/photo/photo/public/", "/view/photo/raw/public/"),
    ("/s_ratio_poster/", "/raw/"),
    ("/m_ratio_poster/", "/raw/"),
    ("/l_ratio_poster/", "/raw/"),
    ("/photo/s/", "/photo/raw/"),
    ("/photo/m/", "/photo/raw/"),
    ("/photo/l/", "/photo/raw/"),
];

/// Generic size tokens and their large equivalent.
const GENERIC_REWRITES: &[(&str, &str)] = &[
    ("_thumb.", "_large."),
    ("_small.", "_large."),
    ("_medium.", "_large."),
    ("_s.", "_l."),
    ("_m.", "_l."),
    ("/thumb/", "/large/"),
    ("/small/", "/large/"),
    ("/medium/", "/large/"),
];

/// Query keys that only constrain the served size or quality.
const SIZE_QUERY_KEYS: &[&str] = &["w", "h", "width", "height", "size", "quality"];

/// Whether a URL plausibly points at photographic content.
///
/// Rejects empty URLs, paths mentioning icons/logos/avatars, and `.gif`
/// files unless the path is explicitly tagged as a photo.
pub fn is_candidate_image(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return false;
    }

    let path = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if NON_CONTENT_MARKERS.iter().any(|m| path.contains(m)) {
        return false;
    }
    if path.ends_with(".gif") && !path.contains("photo") {
        return false;
    }
    true
}

/// Rewrite a URL to the best-guess highest-resolution variant.
///
/// Total and idempotent: `upgrade_resolution(&upgrade_resolution(u)) ==
/// upgrade_resolution(u)` for every input.
pub fn upgrade_resolution(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    // One pass can expose new tokens (`/photo/s/photo/s/`), so iterate.
    let mut current = url.to_string();
    loop {
        let next = upgrade_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Site rules first, then the generic path and query rules.
fn upgrade_pass(url: &str) -> String {
    let site = if is_douban(url) {
        replace_all(url, DOUBAN_REWRITES)
    } else {
        url.to_string()
    };

    let (body, fragment) = split_once_keep(&site, '#');
    let (path, query) = split_once_keep(body, '?');

    let mut upgraded = replace_all(path, GENERIC_REWRITES);
    if let Some(query) = query {
        let kept = strip_size_params(query);
        if !kept.is_empty() {
            upgraded.push('?');
            upgraded.push_str(&kept);
        }
    }
    if let Some(fragment) = fragment {
        upgraded.push('#');
        upgraded.push_str(fragment);
    }
    upgraded
}

fn is_douban(url: &str) -> bool {
    get_domain(url)
        .map(|host| {
            DOUBAN_HOSTS
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        })
        .unwrap_or(false)
}

fn replace_all(input: &str, rules: &[(&str, &str)]) -> String {
    rules
        .iter()
        .fold(input.to_string(), |acc, (from, to)| acc.replace(from, to))
}

fn strip_size_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !SIZE_QUERY_KEYS.contains(&key.to_ascii_lowercase().as_str())
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn split_once_keep(input: &str, sep: char) -> (&str, Option<&str>) {
    match input.split_once(sep) {
        Some((head, tail)) => (head, Some(tail)),
        None => (input, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_rejects_chrome_images() {
        assert!(!is_candidate_image(""));
        assert!(!is_candidate_image("   "));
        assert!(!is_candidate_image("https://a.example/static/logo.png"));
        assert!(!is_candidate_image("https://a.example/u/Avatar_12.jpg"));
        assert!(!is_candidate_image("https://a.example/img/favicon-32.png"));
        assert!(!is_candidate_image("https://a.example/spinner.gif"));
    }

    #[test]
    fn test_candidate_accepts_photo_gif_and_regular_images() {
        assert!(is_candidate_image("https://a.example/photo/anim.gif"));
        assert!(is_candidate_image("https://a.example/p/12345.jpg"));
        // permissive on purpose; decoding rejects the rest later
        assert!(is_candidate_image("https://a.example/p/12345"));
        // query text does not count as path
        assert!(is_candidate_image("https://a.example/p/1.jpg?from=logo"));
    }

    #[test]
    fn test_douban_rewrites() {
        assert_eq!(
            upgrade_resolution(
                "https://img9.doubanio.com/view/photo/s_ratio_poster/public/p2895695254.jpg"
            ),
            "https://img9.doubanio.com/view/photo/raw/public/p2895695254.jpg"
        );
        assert_eq!(
            upgrade_resolution("https://img1.doubanio.com/view/photo/l/public/p1.webp"),
            "https://img1.doubanio.com/view/photo/raw/public/p1.webp"
        );
        assert_eq!(
            upgrade_resolution("https://img1.doubanio.com/view/photo/photo/public/p1.jpg"),
            "https://img1.doubanio.com/view/photo/raw/public/p1.jpg"
        );
    }

    #[test]
    fn test_douban_hosts_also_get_generic_rules() {
        assert_eq!(
            upgrade_resolution("https://img1.doubanio.com/pics/thumb/p1_s.jpg?w=100"),
            "https://img1.doubanio.com/pics/large/p1_l.jpg"
        );
        assert_eq!(
            upgrade_resolution("https://img1.doubanio.com/view/photo/s/photo/s/p1.jpg"),
            "https://img1.doubanio.com/view/photo/raw/photo/raw/p1.jpg"
        );
    }

    #[test]
    fn test_generic_rewrites() {
        assert_eq!(
            upgrade_resolution("https://cdn.example/a/thumb/pic_s.jpg"),
            "https://cdn.example/a/large/pic_l.jpg"
        );
        assert_eq!(
            upgrade_resolution("https://cdn.example/pic_medium.png"),
            "https://cdn.example/pic_large.png"
        );
    }

    #[test]
    fn test_query_size_params_stripped() {
        assert_eq!(
            upgrade_resolution("https://cdn.example/p.jpg?w=200&h=100"),
            "https://cdn.example/p.jpg"
        );
        assert_eq!(
            upgrade_resolution("https://cdn.example/p.jpg?id=7&quality=60&size=small"),
            "https://cdn.example/p.jpg?id=7"
        );
        assert_eq!(
            upgrade_resolution("https://cdn.example/p.jpg?width=10#top"),
            "https://cdn.example/p.jpg#top"
        );
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let inputs = [
            "",
            "https://cdn.example/a/thumb/thumb/x_thumb.jpg",
            "https://cdn.example/small/medium/p_m.jpg?w=1&h=2&keep=1",
            "https://img3.doubanio.com/view/photo/m/public/p9.jpg?w=300",
            "https://cdn.example/p.jpg?&&size=1&",
            "https://cdn.example/x_s_s.jpg#frag?w=1",
            "not a url at all _s.",
            "https://img1.doubanio.com/view/photo/s/photo/s/p1.jpg",
            "https://img1.doubanio.com/pics/thumb/thumb/p1_s.jpg?w=100",
        ];
        for input in inputs {
            let once = upgrade_resolution(input);
            assert_eq!(upgrade_resolution(&once), once, "input: {input}");
        }
    }
}
