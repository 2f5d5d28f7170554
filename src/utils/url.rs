//! URL helpers for mirror base URLs and endpoint paths

use url::Url;

/// Remove surrounding whitespace and trailing slashes from a base URL
pub fn sanitize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a mirror base URL and an absolute endpoint path
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = sanitize_base_url(base_url);
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Whether a string parses as an absolute http(s) URL
pub fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://a.example/", "/sb/public/epg/channel/1"),
            "https://a.example/sb/public/epg/channel/1"
        );
        assert_eq!(join_url("https://a.example", "image/5"), "https://a.example/image/5");
        assert_eq!(
            join_url("https://a.example", "https://cdn.example/x.png"),
            "https://cdn.example/x.png"
        );
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://ver.tele.com.ar"));
        assert!(!is_http_url("ftp://ver.tele.com.ar"));
        assert!(!is_http_url("ver.tele.com.ar"));
    }
}
