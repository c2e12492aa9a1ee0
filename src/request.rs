//! Incoming HTTP request type.
//!
//! A [`Request`] is created once per inbound call and threaded through every
//! stage of a gateway by value. Stages read it and may *append* request-scoped
//! state with [`Request::attach`] for stages further down the chain; nothing
//! is ever taken out.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{AUTHORIZATION, COOKIE};
use http::{Extensions, HeaderMap, Method, Uri};

use crate::auth::session::Principal;

/// The session principal bound to a request by the authenticator stage.
#[derive(Clone)]
pub(crate) struct SessionUser(pub(crate) Arc<dyn Principal>);

/// An incoming HTTP request.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: BTreeMap<String, String>,
    pub(crate) extensions: Extensions,
}

impl Request {
    /// Wraps an `http::Request` whose body has already been read.
    ///
    /// Route parameters start empty; the router fills them in on a match.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: BTreeMap::new(),
            extensions: parts.extensions,
        }
    }

    /// Replaces the route parameters. Used by the router after a match.
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// All route parameters, sorted by name.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Decoded query pairs in the order they appear in the URI.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self.uri.query() {
            Some(q) => url::form_urlencoded::parse(q.as_bytes()).into_owned().collect(),
            None => Vec::new(),
        }
    }

    /// First decoded value of query parameter `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        self.query_pairs().into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The credential of an `Authorization: Bearer <token>` header.
    ///
    /// The scheme is matched case-insensitively; a missing header, another
    /// scheme, or an empty token all yield `None`.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Value of cookie `name` across all `Cookie` headers.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
    }

    /// The authenticated session principal, once the authenticator stage has
    /// resolved and renewed it.
    pub fn user(&self) -> Option<&Arc<dyn Principal>> {
        self.extensions.get::<SessionUser>().map(|u| &u.0)
    }

    /// Appends request-scoped state for downstream stages and the handler.
    pub fn attach<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    /// Reads state attached by an earlier stage.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}
