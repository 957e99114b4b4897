//! Upstream forwarding of allowed requests

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http::header::{HeaderName, CONTENT_LENGTH, HOST};
use http::{HeaderMap, Method};
use tracing::debug;

/// Connection-scoped headers that must not cross the proxy
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copy of `headers` without hop-by-hop headers, or anything the peer
/// recomputes (`host`, `content-length`)
pub fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut kept = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || *name == HOST || *name == CONTENT_LENGTH {
            continue;
        }
        kept.append(name.clone(), value.clone());
    }
    kept
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Send the buffered request to `url` and stream the answer back
pub async fn forward(
    client: &reqwest::Client,
    url: &str,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, reqwest::Error> {
    debug!(%url, %method, bytes = body.len(), "Forwarding upstream");

    let upstream = client
        .request(method, url)
        .headers(end_to_end(headers))
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let headers = end_to_end(upstream.headers());
    debug!(%url, %status, "Upstream answered");

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE, TRANSFER_ENCODING};
    use http::HeaderValue;

    #[test]
    fn test_end_to_end_drops_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(HOST, HeaderValue::from_static("proxy.local"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(
            "proxy-authorization",
            HeaderValue::from_static("Basic eDp5"),
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dTpw"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-git-receive-pack-request"),
        );

        let kept = end_to_end(&headers);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains_key(AUTHORIZATION));
        assert!(kept.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_repeated_headers_survive() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        assert_eq!(end_to_end(&headers).get_all("set-cookie").iter().count(), 2);
    }
}
