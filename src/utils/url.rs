//! Host URL helpers.
//!
//! Configured host URLs are written by hand, so they show up with and without
//! trailing slashes. Every request path goes through [`construct_api_url`] so
//! the joined endpoint never contains a double slash.

/// Strip trailing slashes from a host base URL.
///
/// # Examples
///
/// ```
/// use ollamux::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://gpu-box:11434///"), "http://gpu-box:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a host base URL and an API path.
///
/// # Examples
///
/// ```
/// use ollamux::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434", "api/chat"),
///     "http://localhost:11434/api/chat"
/// );
/// assert_eq!(
///     construct_api_url("http://localhost:11434/", "/api/ps"),
///     "http://localhost:11434/api/ps"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_any_number_of_trailing_slashes() {
        assert_eq!(
            normalize_base_url("http://10.0.0.5:11434"),
            "http://10.0.0.5:11434"
        );
        assert_eq!(
            normalize_base_url("http://10.0.0.5:11434/"),
            "http://10.0.0.5:11434"
        );
        assert_eq!(
            normalize_base_url("http://10.0.0.5:11434///"),
            "http://10.0.0.5:11434"
        );
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn construct_joins_every_backend_endpoint_cleanly() {
        for endpoint in ["api/ps", "/api/tags", "//api/generate", "api/chat"] {
            let url = construct_api_url("http://gpu-box:11434/", endpoint);
            assert!(url.starts_with("http://gpu-box:11434/api/"), "{url}");
            assert!(!url["http://".len()..].contains("//"), "{url}");
        }

        // Reverse-proxied hosts keep their path prefix.
        assert_eq!(
            construct_api_url("https://llm.example.com/ollama/", "api/show"),
            "https://llm.example.com/ollama/api/show"
        );
    }
}
