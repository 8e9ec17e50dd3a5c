use std::collections::BTreeMap;

use axum::http::{HeaderMap, header};

/// Where a downstream caller's own key came from, matching the priority
/// order every dialect's native auth convention uses: bearer token, then
/// each dialect's header, then a trailing query-string fallback (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownstreamKeySource {
    AuthorizationBearer,
    XApiKey,
    XGoogApiKey,
    QueryKey,
}

/// Extracts a caller-supplied key for BYOK (bring-your-own-key) requests.
/// Returns `None` when the caller relies entirely on this gateway's own
/// configured key pool.
pub fn extract_user_key(
    headers: &HeaderMap,
    query: Option<&str>,
) -> Option<(String, DownstreamKeySource)> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            let s = s.trim();
            let prefix = "Bearer ";
            if s.len() > prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
                let token = s[prefix.len()..].trim();
                if !token.is_empty() {
                    return Some((token.to_string(), DownstreamKeySource::AuthorizationBearer));
                }
            }
        }
    }

    if let Some(value) = headers.get("x-api-key") {
        if let Ok(s) = value.to_str() {
            let s = s.trim();
            if !s.is_empty() {
                return Some((s.to_string(), DownstreamKeySource::XApiKey));
            }
        }
    }

    if let Some(value) = headers.get("x-goog-api-key") {
        if let Ok(s) = value.to_str() {
            let s = s.trim();
            if !s.is_empty() {
                return Some((s.to_string(), DownstreamKeySource::XGoogApiKey));
            }
        }
    }

    let q = query?;
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok()?;
    pairs
        .into_iter()
        .find(|(k, _)| k == "key")
        .map(|(_, v)| v)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| (v, DownstreamKeySource::QueryKey))
}

/// Transcribes `x-bf-prom-*` request headers into context tags (SPEC_FULL.md
/// §4), stripping the prefix so `x-bf-prom-team: infra` becomes tag
/// `team=infra`. Lets callers attach arbitrary observability dimensions
/// without the gateway needing to know their names in advance.
pub fn prom_tags_from_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    const PREFIX: &str = "x-bf-prom-";
    let mut tags = BTreeMap::new();
    for (name, value) in headers {
        if let Some(rest) = name.as_str().strip_prefix(PREFIX) {
            if let Ok(v) = value.to_str() {
                tags.insert(rest.to_string(), v.to_string());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_bearer_over_everything_else() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-abc"));
        headers.insert("x-api-key", HeaderValue::from_static("key-from-header"));
        let (key, source) = extract_user_key(&headers, Some("key=key-from-query")).unwrap();
        assert_eq!(key, "sk-abc");
        assert_eq!(source, DownstreamKeySource::AuthorizationBearer);
    }

    #[test]
    fn falls_back_to_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("key-from-header"));
        let (key, source) = extract_user_key(&headers, None).unwrap();
        assert_eq!(key, "key-from-header");
        assert_eq!(source, DownstreamKeySource::XApiKey);
    }

    #[test]
    fn falls_back_to_x_goog_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_static("key-from-header"));
        let (key, source) = extract_user_key(&headers, None).unwrap();
        assert_eq!(key, "key-from-header");
        assert_eq!(source, DownstreamKeySource::XGoogApiKey);
    }

    #[test]
    fn falls_back_to_query_string_key() {
        let headers = HeaderMap::new();
        let (key, source) = extract_user_key(&headers, Some("alt=sse&key=key-from-query")).unwrap();
        assert_eq!(key, "key-from-query");
        assert_eq!(source, DownstreamKeySource::QueryKey);
    }

    #[test]
    fn no_key_anywhere_is_none() {
        let headers = HeaderMap::new();
        assert!(extract_user_key(&headers, None).is_none());
        assert!(extract_user_key(&headers, Some("alt=sse")).is_none());
    }

    #[test]
    fn blank_bearer_token_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(extract_user_key(&headers, None).is_none());
    }

    #[test]
    fn prom_tags_strip_prefix_and_ignore_others() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bf-prom-team", HeaderValue::from_static("infra"));
        headers.insert("x-bf-prom-env", HeaderValue::from_static("prod"));
        headers.insert("x-api-key", HeaderValue::from_static("sk-abc"));
        let tags = prom_tags_from_headers(&headers);
        assert_eq!(tags.get("team").map(String::as_str), Some("infra"));
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(tags.len(), 2);
    }
}
