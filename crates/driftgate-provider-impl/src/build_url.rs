/// Joins a base URL and a path, avoiding a doubled API version segment when
/// the configured base already ends in one (e.g. a base of
/// `https://host/v1` plus a path of `/v1/chat/completions`).
pub fn build_url(base_url: Option<&str>, default_base: &str, path: &str) -> String {
    let base = base_url.unwrap_or(default_base).trim_end_matches('/');
    let mut path = path.trim_start_matches('/');
    for version in ["v1beta", "v1"] {
        if base.ends_with(&format!("/{version}")) && (path == version || path.starts_with(&format!("{version}/"))) {
            path = path.trim_start_matches(version).trim_start_matches('/');
        }
    }
    format!("{base}/{path}")
}
