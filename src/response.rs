//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Stages build their terminal answers from here: [`Response::redirect`] for
//! an expired session, [`Response::unauthorized`] for a bad token or a
//! tampered link. A stage that lets the request through simply returns what
//! its continuation returned.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, LOCATION};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use turnstile::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// Response::redirect("/login");
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// `302 Found` pointing at `location`.
    ///
    /// A location that is not a valid header value degrades to `/`.
    pub fn redirect(location: &str) -> Self {
        let mut res = Self::status(StatusCode::FOUND);
        let value = HeaderValue::from_str(location)
            .unwrap_or_else(|_| HeaderValue::from_static("/"));
        res.headers.insert(LOCATION, value);
        res
    }

    /// `401 Unauthorized`.
    pub fn unauthorized() -> Self {
        Self::status(StatusCode::UNAUTHORIZED)
    }

    /// `403 Forbidden`.
    pub fn forbidden() -> Self {
        Self::status(StatusCode::FORBIDDEN)
    }

    pub(crate) fn service_unavailable() -> Self {
        Self::status(StatusCode::SERVICE_UNAVAILABLE)
    }

    pub(crate) fn internal_error() -> Self {
        Self::status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The `Location` header of a redirect, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            self.headers.append(name, value);
        }
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish("application/json", body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }

    fn finish(mut self, content_type: &'static str, body: Bytes) -> Response {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Response { status: self.status, headers: self.headers, body }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_sets_found_and_location() {
        let res = Response::redirect("/login");
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.location(), Some("/login"));
        assert!(res.is_redirect());
    }

    #[test]
    fn invalid_redirect_target_falls_back_to_root() {
        let res = Response::redirect("/bad\nheader");
        assert_eq!(res.location(), Some("/"));
    }

    #[test]
    fn builder_keeps_custom_headers_and_content_type() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/42")
            .json(&br#"{"id":42}"#[..]);

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()["location"], "/users/42");
        assert_eq!(res.headers()["content-type"], "application/json");
        assert_eq!(res.body(), br#"{"id":42}"#);
    }

    #[test]
    fn into_inner_preserves_status_and_headers() {
        let inner = Response::unauthorized().into_inner();
        assert_eq!(inner.status(), StatusCode::UNAUTHORIZED);
        assert!(inner.headers().is_empty());
    }
}
