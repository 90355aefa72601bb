use crate::http::Request;
use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};

/// Headers a `304 Not Modified` response keeps from the full response
pub const HEADERS_TO_PRESERVE_FOR_304: [&str; 5] =
    ["Content-Location", "ETag", "Vary", "Cache-Control", "Expires"];

/// Latest instant an HTTP-date can express, 9999-12-31T23:59:59Z
pub const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

/// Unix seconds as an HTTP-date, `None` past [`MAX_HTTP_DATE_SECS`]
pub fn format_http_date(secs: u64) -> Option<String> {
    if secs > MAX_HTTP_DATE_SECS {
        return None;
    }
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .map(httpdate::fmt_http_date)
}

/// Entity tags listed in `If-None-Match`, trimmed, with empty members dropped
pub fn get_if_none_match_header(request: &Request) -> Vec<String> {
    request
        .get_header("If-None-Match")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Evaluate `If-None-Match` against the response ETag.
///
/// Returns `false` (the condition fails, so a 304 is due) when the list holds
/// `*` or the current tag. Tags are accepted both quoted and bare.
pub fn check_if_none_match(etag: &str, tags: &[String]) -> bool {
    let bare = etag.trim_matches('"');
    !tags
        .iter()
        .any(|tag| tag == "*" || tag == etag || tag == bare)
}

/// `If-Modified-Since` in whole unix seconds.
///
/// `None` when absent, empty or not a valid HTTP-date.
pub fn get_if_modified_since_header(request: &Request) -> Option<u64> {
    let value = request.get_header("If-Modified-Since")?.trim();
    if value.is_empty() {
        return None;
    }

    let time = httpdate::parse_http_date(value).ok()?;
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// Evaluate `If-Modified-Since`: `true` if the asset changed after `if_modified_since`
pub fn check_if_modified_since(last_modified_time: u64, if_modified_since: u64) -> bool {
    last_modified_time > if_modified_since
}

/// Copy the listed headers, when present, out of `headers`
pub fn build_headers_subset(headers: &HashMap<String, String>, keys: &[&str]) -> HashMap<String, String> {
    let mut subset = HashMap::new();
    for key in keys {
        if let Some((name, value)) = headers.iter().find(|(name, _)| name.eq_ignore_ascii_case(key)) {
            subset.insert(name.clone(), value.clone());
        }
    }
    subset
}
