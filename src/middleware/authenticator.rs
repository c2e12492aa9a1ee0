//! Session gate.
//!
//! Anonymous requests pass untouched; deciding whether anonymity is
//! acceptable is left to later stages or the handler. A session whose
//! principal went offline is sent to the login page, except on the login
//! page itself, where it continues unbound. A live one is renewed and bound
//! to the request for everything downstream.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{BootContext, Next, Stage};
use crate::auth::SessionStore;
use crate::error::Error;
use crate::request::{Request, SessionUser};
use crate::response::Response;

pub struct Authenticator {
    sessions: Arc<dyn SessionStore>,
    login_path: String,
    routes: Option<String>,
}

impl Authenticator {
    pub fn new(sessions: Arc<dyn SessionStore>, login_path: &str) -> Self {
        Self { sessions, login_path: login_path.to_owned(), routes: None }
    }

    /// Route file to mount at boot (typically the login/logout routes).
    /// An empty name mounts nothing.
    pub fn with_routes(mut self, route_file: &str) -> Self {
        self.routes = (!route_file.is_empty()).then(|| route_file.to_owned());
        self
    }
}

#[async_trait]
impl Stage for Authenticator {
    fn boot(&self, ctx: &mut BootContext) -> Result<(), Error> {
        if let Some(routes) = &self.routes {
            ctx.include(routes);
        }
        Ok(())
    }

    async fn handle(&self, mut req: Request, next: Next<'_>) -> Result<Response, Error> {
        let Some(user) = self.sessions.resolve_principal(&req).await? else {
            return next.run(req).await;
        };

        if !user.is_online() {
            if req.path() == self.login_path {
                return next.run(req).await;
            }
            debug!(user = user.id(), path = req.path(), "session offline, redirecting to login");
            return Ok(Response::redirect(&self.login_path));
        }

        user.authenticate().await?;
        req.attach(SessionUser(user));
        next.run(req).await
    }
}
