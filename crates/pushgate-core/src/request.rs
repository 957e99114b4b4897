//! The inbound request as seen by processors

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method};

/// `Content-Type` of a fetch/clone pack request
pub const UPLOAD_PACK_REQUEST: &str = "application/x-git-upload-pack-request";

/// `Content-Type` of a push pack request
pub const RECEIVE_PACK_REQUEST: &str = "application/x-git-receive-pack-request";

/// Username and password from a Basic `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password or token
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A buffered git smart-HTTP request
#[derive(Debug, Clone)]
pub struct GitRequest {
    /// HTTP method
    pub method: Method,
    /// Path and query as received, e.g. `/github.com/o/r.git/git-receive-pack`
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Full request body
    pub body: Bytes,
}

impl GitRequest {
    /// Assemble a request
    pub fn new<P: Into<String>, B: Into<Bytes>>(
        method: Method,
        path: P,
        headers: HeaderMap,
        body: B,
    ) -> Self {
        GitRequest {
            method,
            path: path.into(),
            headers,
            body: body.into(),
        }
    }

    /// `Content-Type` header value
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Decode a Basic `Authorization` header
    pub fn basic_credentials(&self) -> Option<Credentials> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn request(auth: &str) -> GitRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(RECEIVE_PACK_REQUEST));
        GitRequest::new(Method::POST, "/github.com/o/r.git/git-receive-pack", headers, Bytes::new())
    }

    #[test]
    fn test_basic_credentials() {
        // alice:s3cr:et
        let req = request("Basic YWxpY2U6czNjcjpldA==");
        let creds = req.basic_credentials().unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "s3cr:et");
        assert!(!format!("{creds:?}").contains("s3cr"));
        assert_eq!(req.content_type(), Some(RECEIVE_PACK_REQUEST));
    }

    #[test]
    fn test_non_basic_scheme() {
        assert!(request("Bearer abc").basic_credentials().is_none());
        assert!(request("Basic !!!").basic_credentials().is_none());
    }
}
