use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::uri::{PathAndQuery, Uri};
use std::net::IpAddr;

/// Headers that only apply to a single connection and are never forwarded.
static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Remove the first occurrence of `base_path` from the path of `uri`.
///
/// This is a plain substring removal, not a prefix strip: `/x/api/y` with a
/// base path of `/api` becomes `/x/y`. The query is left untouched.
pub(crate) fn strip_base_path(uri: &Uri, base_path: &str) -> String {
    let path = uri.path().replacen(base_path, "", 1);
    match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

/// Construct the upstream [`Uri`] from the target and the rewritten path and query.
///
/// Target and request paths are joined with a single slash; queries of both
/// are kept, target first.
pub(crate) fn build_upstream_uri(target: &Uri, path_and_query: &str) -> Result<Uri, http::Error> {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let mut joined = join_paths(target.path(), path);
    match (target.query().filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
        (Some(base), Some(extra)) => joined = format!("{joined}?{base}&{extra}"),
        (Some(only), None) | (None, Some(only)) => joined = format!("{joined}?{only}"),
        (None, None) => {}
    }

    let mut parts = target.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(joined)?);
    Ok(Uri::from_parts(parts)?)
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// `Host` value for requests to `target`: host and port, never userinfo.
pub(crate) fn host_header(target: &Uri) -> Option<HeaderValue> {
    let authority = target.authority()?;
    let host = match authority.port() {
        Some(port) => format!("{}:{port}", authority.host()),
        None => authority.host().to_string(),
    };
    HeaderValue::from_str(&host).ok()
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
pub(crate) fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {client}", prior.join(", "))
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}
