//! Middleware layer.
//!
//! A request routed to a gateway passes through that gateway's stages in
//! configured order before it reaches the handler. Each [`Stage`] either
//! lets it through by running its [`Next`] continuation, or answers on its
//! own and the rest of the chain never runs.
//!
//! Built-in stages, by configuration identifier:
//!
//! | Identifier | Stage | Rejects with |
//! |---|---|---|
//! | `authenticator` | [`Authenticator`] | `302` to the login page when the session is offline |
//! | `tokenizer` | [`Tokenizer`] | `401` without a trusted bearer token |
//! | `prevent-route-tampering` | [`PreventRouteTampering`] | `401` when a signed link was altered |

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

mod authenticator;
mod pipeline;
mod registry;
mod tamper;
mod tokenizer;

pub use authenticator::Authenticator;
pub use pipeline::Pipeline;
pub use registry::{AUTHENTICATOR, PREVENT_ROUTE_TAMPERING, StageRegistry, TOKENIZER};
pub use tamper::PreventRouteTampering;
pub use tokenizer::Tokenizer;

// ── Stage ─────────────────────────────────────────────────────────────────────

/// One gate in a gateway's chain.
///
/// `handle` must either return `next.run(req).await` (possibly wrapped) or
/// return a terminal [`Response`] without touching `next`. [`Next`] is
/// consumed by value, so running the rest of the chain twice cannot compile.
///
/// Expected gate failures are responses. `Err` is reserved for collaborators
/// that could not answer (session store down, trust root unreachable).
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    /// Runs once per stage instance before the first request. Declare the
    /// route files this stage depends on here.
    fn boot(&self, _ctx: &mut BootContext) -> Result<(), Error> {
        Ok(())
    }

    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error>;
}

/// A stage instance together with the identifier it was configured under.
pub(crate) struct Slot {
    pub(crate) id: String,
    pub(crate) stage: std::sync::Arc<dyn Stage>,
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain after the current stage, ending in the handler.
pub struct Next<'a> {
    slots: &'a [Slot],
    endpoint: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(slots: &'a [Slot], endpoint: &'a BoxedHandler) -> Self {
        Self { slots, endpoint }
    }

    /// Hands the request to the next stage, or to the handler after the last.
    pub async fn run(self, req: Request) -> Result<Response, Error> {
        match self.slots.split_first() {
            Some((slot, rest)) => {
                trace!(stage = %slot.id, "entering stage");
                slot.stage.handle(req, Next::new(rest, self.endpoint)).await
            }
            None => Ok(self.endpoint.call(req).await),
        }
    }
}

// ── Boot ──────────────────────────────────────────────────────────────────────

/// What stages declare while booting. Collected by [`Pipeline::build`].
#[derive(Debug, Default)]
pub struct BootContext {
    gateway: String,
    stage: String,
    route_files: BTreeSet<String>,
}

impl BootContext {
    pub(crate) fn enter(&mut self, gateway: &str, stage: &str) {
        self.gateway = gateway.to_owned();
        self.stage = stage.to_owned();
    }

    /// Declares that route file `name` must be mounted. Files are mounted
    /// once however many stages ask for them.
    pub fn include(&mut self, name: &str) {
        trace!(gateway = %self.gateway, stage = %self.stage, route_file = name, "route file requested");
        self.route_files.insert(name.to_owned());
    }

    pub(crate) fn into_route_files(self) -> BTreeSet<String> {
        self.route_files
    }
}
