//! Request URL construction.
//!
//! The endpoint is appended to the configured API URL, then caller query
//! parameters are merged into whatever query string the result already has.

use reqwest::Url;

use crate::envelope::Fault;

/// A query parameter as supplied by the caller. `None` values are dropped.
pub type QueryParam = (String, Option<String>);

/// Joins `api_url` and `endpoint` and merges `query` into the query string.
///
/// Parameters whose value is missing, empty or whitespace-only are skipped.
/// A supplied key replaces every value that key already had. The order of
/// the resulting pairs is unspecified.
pub fn build_url(api_url: &str, endpoint: &str, query: &[QueryParam]) -> Result<Url, Fault> {
    let base = api_url.trim_end_matches(['/', '\\']);
    let joined = if endpoint.starts_with('/') || endpoint.is_empty() {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    };

    let mut url = Url::parse(&joined).map_err(|e| Fault::InvalidUrl {
        url: joined.clone(),
        message: e.to_string(),
    })?;

    if !query.is_empty() {
        merge_query(&mut url, query);
    }

    Ok(url)
}

fn merge_query(url: &mut Url, query: &[QueryParam]) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    for (key, value) in query {
        let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        pairs.retain(|(k, _)| k != key);
        pairs.push((key.clone(), value.to_string()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
