use std::collections::HashMap;
use std::time::Duration;

/// Returns `true` for statuses worth retrying: rate limiting and server errors.
///
/// The classification is advisory; nothing in this crate retries on its own.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Extracts the `Retry-After` header (in seconds) if present.
///
/// Header names are matched case-insensitively. HTTP-date values are ignored
/// because providers primarily use the numeric form.
pub fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
