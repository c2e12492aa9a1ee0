//! Bearer token gate.
//!
//! A missing credential is treated exactly like a bad one. On success the
//! verified [`Claims`] are attached to the request.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{BootContext, Next, Stage};
use crate::auth::{Claims, TrustRoot, Verdict};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

pub struct Tokenizer {
    trust_root: Arc<dyn TrustRoot>,
    routes: Option<String>,
}

impl Tokenizer {
    pub fn new(trust_root: Arc<dyn TrustRoot>) -> Self {
        Self { trust_root, routes: None }
    }

    /// Route file whose credentials this stage protects. Mounted lazily at
    /// boot so it can be declared before the routes themselves exist.
    pub fn with_routes(mut self, route_file: &str) -> Self {
        self.routes = (!route_file.is_empty()).then(|| route_file.to_owned());
        self
    }
}

#[async_trait]
impl Stage for Tokenizer {
    fn boot(&self, ctx: &mut BootContext) -> Result<(), Error> {
        if let Some(routes) = &self.routes {
            ctx.include(routes);
        }
        Ok(())
    }

    async fn handle(&self, mut req: Request, next: Next<'_>) -> Result<Response, Error> {
        let verdict = match req.bearer_token() {
            Some(token) => self.trust_root.verify(token).await?,
            None => Verdict::Invalid("missing bearer token".into()),
        };

        match verdict {
            Verdict::Valid(claims) => {
                req.attach::<Claims>(claims);
                next.run(req).await
            }
            Verdict::Invalid(reason) => {
                debug!(%reason, path = req.path(), "bearer token rejected");
                Ok(Response::unauthorized())
            }
        }
    }
}
