//! Radix-tree request router with gateway-bound routes.
//!
//! One tree per HTTP method, O(path-length) lookup. Every route belongs to a
//! gateway; the gateway decides which stages run before the handler.
//!
//! Routes are registered in groups ([`Routes`]). A group can be mounted right
//! away with [`Router::gateway`], or registered as a named *route file* with
//! [`Router::route_file`]. Route files stay unmounted until a stage asks for
//! them while booting, so a stage can declare the routes it protects before
//! those routes are wired up.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::config::{API, WEB};
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};

// ── Routes ────────────────────────────────────────────────────────────────────

/// A group of routes that share a gateway.
///
/// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
///
/// ```rust,no_run
/// # use turnstile::{Request, Response, Routes};
/// # use http::Method;
/// # async fn show(_: Request) -> Response { Response::text("") }
/// # async fn create(_: Request) -> Response { Response::text("") }
/// Routes::new()
///     .on(Method::GET,  "/invoices/{id}", show)
///     .on(Method::POST, "/invoices",      create);
/// ```
#[derive(Default)]
pub struct Routes {
    entries: Vec<(Method, String, BoxedHandler)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.entries.push((method, path.to_owned(), handler.into_boxed_handler()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// A matched route: its gateway and the handler at the end of the chain.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) gateway: Arc<str>,
    pub(crate) handler: BoxedHandler,
}

/// The application router. Build it once at startup and hand it to
/// [`App::boot`](crate::App::boot).
#[derive(Default)]
pub struct Router {
    trees: HashMap<Method, MatchitRouter<Route>>,
    files: HashMap<String, (String, Routes)>,
    mounted: BTreeSet<String>,
    gateways: BTreeSet<String>,
    error: Option<Error>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `routes` under `gateway` now.
    ///
    /// A conflicting or malformed path is remembered and reported by
    /// [`App::boot`](crate::App::boot).
    pub fn gateway(mut self, gateway: &str, routes: Routes) -> Self {
        if let Err(e) = self.mount(gateway, routes) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Shorthand for `gateway("web", routes)`.
    pub fn web(self, routes: Routes) -> Self {
        self.gateway(WEB, routes)
    }

    /// Shorthand for `gateway("api", routes)`.
    pub fn api(self, routes: Routes) -> Self {
        self.gateway(API, routes)
    }

    /// Registers a route file mounted only if a stage includes `name` at boot.
    pub fn route_file(mut self, name: &str, gateway: &str, routes: Routes) -> Self {
        if self.files.insert(name.to_owned(), (gateway.to_owned(), routes)).is_some() {
            self.error
                .get_or_insert(Error::Route(format!("route file `{name}` defined twice")));
        }
        self
    }

    /// Mounts route file `name`. Mounting the same file again is a no-op.
    pub(crate) fn include(&mut self, name: &str) -> Result<(), Error> {
        if self.mounted.contains(name) {
            return Ok(());
        }
        let (gateway, routes) = self
            .files
            .remove(name)
            .ok_or_else(|| Error::Config(format!("route file `{name}` is not defined")))?;
        self.mount(&gateway, routes)?;
        self.mounted.insert(name.to_owned());
        Ok(())
    }

    fn mount(&mut self, gateway: &str, routes: Routes) -> Result<(), Error> {
        let gateway: Arc<str> = Arc::from(gateway);
        for (method, path, handler) in routes.entries {
            let route = Route { gateway: Arc::clone(&gateway), handler };
            self.trees
                .entry(method.clone())
                .or_default()
                .insert(path.as_str(), route)
                .map_err(|e| Error::Route(format!("{method} `{path}`: {e}")))?;
        }
        self.gateways.insert(gateway.to_string());
        Ok(())
    }

    /// The startup error recorded while building, if any.
    pub(crate) fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Gateways referenced by mounted routes.
    pub(crate) fn gateways(&self) -> &BTreeSet<String> {
        &self.gateways
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(Route, BTreeMap<String, String>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value.clone(), params))
    }
}
