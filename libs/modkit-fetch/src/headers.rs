//! Header precedence resolution.

use http::HeaderMap;

/// Merge client-wide headers with per-request headers.
///
/// Only the first value of each header name is kept, from either side.
/// Request headers replace default headers of the same name; names compare
/// case-insensitively (`HeaderName` is normalised to lowercase).
#[must_use]
pub fn resolve_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut resolved = HeaderMap::with_capacity(defaults.keys_len() + overrides.keys_len());

    for source in [defaults, overrides] {
        for name in source.keys() {
            if let Some(value) = source.get(name) {
                resolved.insert(name.clone(), value.clone());
            }
        }
    }

    resolved
}
