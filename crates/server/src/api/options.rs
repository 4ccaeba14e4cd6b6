//! Collecting a request's options from its query string and headers.

use axum::extract::Query;
use axum::http::{HeaderMap, Uri};

use m4k_core::{
    parse_options_json, parse_query_options, MediaKind, MediaOptions, OptionsError,
};

/// Query parameter carrying a JSON option object or array.
pub const OPTIONS_PARAM: &str = "options";

/// Header carrying a JSON option object or array.
pub const OPTIONS_HEADER: &str = "x-options";

/// Gathers every option of a request, in this order:
///
/// 1. the flattened query parameters (other than `options`), as one option;
/// 2. the JSON in the `options` query parameter;
/// 3. the JSON in the `x-options` header.
pub fn collect_options(
    kind: MediaKind,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Vec<MediaOptions>, OptionsError> {
    let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map_err(|_| OptionsError::Malformed)?;

    let mut json_param = None;
    let mut flattened = Vec::with_capacity(params.len());
    for (key, value) in params {
        if key == OPTIONS_PARAM {
            json_param = Some(value);
        } else {
            flattened.push((key, value));
        }
    }

    let mut options = Vec::new();
    if !flattened.is_empty() {
        options.push(parse_query_options(kind, flattened)?);
    }
    if let Some(json) = json_param {
        options.extend(parse_options_json(kind, &json)?);
    }
    if let Some(header) = headers.get(OPTIONS_HEADER) {
        let json = header.to_str().map_err(|_| OptionsError::Malformed)?;
        options.extend(parse_options_json(kind, json)?);
    }

    if options.is_empty() {
        return Err(OptionsError::NoOptions);
    }
    Ok(options)
}
