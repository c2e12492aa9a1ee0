//! The booted application: router plus gateway pipeline.
//!
//! [`App::boot`] is the only place configuration problems surface. Once it
//! returns `Ok`, every route resolves to a gateway that exists, every stage
//! has booted exactly once, and every route file a stage asked for is
//! mounted. After that the app is immutable and shared by all requests.

use http::StatusCode;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::error::Error;
use crate::middleware::{Pipeline, StageRegistry};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

pub struct App {
    pipeline: Pipeline,
    router: Router,
}

impl App {
    /// Builds and boots the gateway pipeline, mounts the route files its
    /// stages declared, and checks that every route's gateway exists.
    pub fn boot(gateways: &GatewayConfig, registry: &StageRegistry, mut router: Router) -> Result<Self, Error> {
        if let Some(e) = router.take_error() {
            return Err(e);
        }

        let pipeline = Pipeline::build(gateways, registry)?;
        for file in pipeline.route_files() {
            router.include(file)?;
            info!(route_file = %file, "route file mounted");
        }

        if let Some(unknown) = router.gateways().iter().find(|g| !pipeline.has_gateway(g)) {
            return Err(Error::UnknownGateway(unknown.clone()));
        }

        Ok(Self { pipeline, router })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Routes `req`, runs it through its gateway, and always produces a
    /// response.
    ///
    /// Unrouted requests get `404` without touching any stage. Collaborator
    /// failures are logged and answered with `503`.
    pub async fn dispatch(&self, req: Request) -> Response {
        let Some((route, params)) = self.router.lookup(req.method(), req.path()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };

        let method = req.method().clone();
        let path = req.path().to_owned();
        match self.pipeline.dispatch(&route.gateway, req.with_params(params), &route.handler).await {
            Ok(res) => res,
            Err(e) => {
                error!(gateway = %route.gateway, %method, %path, "request failed: {e}");
                e.into_response()
            }
        }
    }
}
