//! Campaign parameter extraction
//!
//! Reads the query string of the landing URL with form-urlencoded semantics
//! and keeps every parameter whose key carries the recognized prefix, each
//! value passed through [`fully_decode`]. Other parameters are ignored.

use ma_common::{fully_decode, AttributionSet};
use tracing::debug;
use url::form_urlencoded;

/// Campaign parameters of `url` whose key starts with `prefix`
///
/// Accepts absolute or relative URLs; the fragment is never part of the
/// query. A repeated key keeps its last value.
pub fn extract_attribution(url: &str, prefix: &str) -> AttributionSet {
    let Some((_, rest)) = url.split_once('?') else {
        debug!("No query string in {}, no campaign parameters", url);
        return AttributionSet::new();
    };
    let query = rest.split_once('#').map_or(rest, |(query, _)| query);

    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.into_owned(), fully_decode(&value)))
        .collect()
}
