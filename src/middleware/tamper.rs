//! Signed-link gate.
//!
//! A route opts in by being reached through a link that carries a parameter
//! hash. When the hash is present, the parameters the request actually
//! arrived with must hash to the same value under the server secret. When it
//! is absent the check does not apply, unless the stage is built with
//! [`PreventRouteTampering::enforce`].

use async_trait::async_trait;
use tracing::debug;

use super::{Next, Stage};
use crate::auth::{ParamSigner, SignedParams};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

pub struct PreventRouteTampering {
    signer: ParamSigner,
    query_key: String,
    header: String,
    enforce: bool,
}

impl PreventRouteTampering {
    pub fn new(signer: ParamSigner) -> Self {
        Self {
            signer,
            query_key: "hash".to_owned(),
            header: "x-route-hash".to_owned(),
            enforce: false,
        }
    }

    /// Query parameter carrying the hash. Excluded from the signed set.
    pub fn query_key(mut self, key: &str) -> Self {
        self.query_key = key.to_owned();
        self
    }

    /// Header consulted when the query parameter is absent.
    pub fn header(mut self, name: &str) -> Self {
        self.header = name.to_owned();
        self
    }

    /// Reject requests that carry no hash at all.
    pub fn enforce(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    fn presented_hash(&self, req: &Request) -> Option<String> {
        let present = |h: &String| !h.is_empty();
        req.query(&self.query_key)
            .filter(present)
            .or_else(|| req.header(&self.header).map(str::to_owned).filter(present))
    }
}

#[async_trait]
impl Stage for PreventRouteTampering {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
        let Some(hash) = self.presented_hash(&req) else {
            if self.enforce {
                debug!(path = req.path(), "unsigned request on enforced gateway");
                return Ok(Response::unauthorized());
            }
            return next.run(req).await;
        };

        let params = SignedParams::from_request(&req, &self.query_key);
        if !self.signer.verify(&params, &hash) {
            debug!(path = req.path(), "route parameters do not match their hash");
            return Ok(Response::unauthorized());
        }
        next.run(req).await
    }
}
