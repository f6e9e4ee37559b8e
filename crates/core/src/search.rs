//! Web-search fallback for requests that ran out of retries.

const SEARCH_ENDPOINT: &str = "https://www.google.com/search?q=";
const MAX_QUERY_CHARS: usize = 200;

/// Search URL for the last error line, or for the request itself when
/// nothing was written to stderr.
pub fn search_url(last_stderr: Option<&str>, request: &str) -> String {
    let query = last_stderr
        .and_then(|stderr| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_else(|| request.trim());
    let query: String = query.chars().take(MAX_QUERY_CHARS).collect();
    format!("{}{}", SEARCH_ENDPOINT, urlencoding::encode(&query))
}
