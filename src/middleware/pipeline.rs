//! Per-gateway stage chains.
//!
//! Built once at boot from the gateway table and the stage registry, then
//! shared read-only by every request. Dispatch walks the chain through
//! [`Next`]: stage *i*'s continuation runs stage *i + 1*, the last one runs
//! the handler, and the first stage that answers on its own ends the walk.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::{BootContext, Next, Slot, StageRegistry};
use crate::config::GatewayConfig;
use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

/// Booted stage chains, one per gateway.
pub struct Pipeline {
    gateways: BTreeMap<String, Vec<Slot>>,
    route_files: BTreeSet<String>,
}

impl Pipeline {
    /// Instantiates every configured stage and boots each instance once.
    ///
    /// A stage listed under several gateways gets one instance per gateway.
    /// Any unknown identifier or malformed list fails the whole build.
    pub fn build(config: &GatewayConfig, registry: &StageRegistry) -> Result<Self, Error> {
        config.validate()?;

        let mut gateways = BTreeMap::new();
        for (gateway, ids) in config.gateways() {
            let slots = ids
                .iter()
                .map(|id| {
                    Ok(Slot { id: id.clone(), stage: registry.instantiate(&gateway, id)? })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            gateways.insert(gateway, slots);
        }

        let mut ctx = BootContext::default();
        for (gateway, slots) in &gateways {
            for slot in slots {
                ctx.enter(gateway, &slot.id);
                slot.stage.boot(&mut ctx)?;
            }
            info!(
                gateway = %gateway,
                stages = ?slots.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
                "gateway ready"
            );
        }

        Ok(Self { gateways, route_files: ctx.into_route_files() })
    }

    pub fn has_gateway(&self, gateway: &str) -> bool {
        self.gateways.contains_key(gateway)
    }

    /// Names of all gateways.
    pub fn gateways(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }

    /// Stage identifiers of `gateway` in execution order.
    pub fn stages(&self, gateway: &str) -> Option<Vec<&str>> {
        self.gateways
            .get(gateway)
            .map(|slots| slots.iter().map(|s| s.id.as_str()).collect())
    }

    /// Route files declared by stages while booting.
    pub fn route_files(&self) -> &BTreeSet<String> {
        &self.route_files
    }

    /// Runs `req` through the stages of `gateway`, then `endpoint`.
    pub async fn dispatch(
        &self,
        gateway: &str,
        req: Request,
        endpoint: &BoxedHandler,
    ) -> Result<Response, Error> {
        let slots = self
            .gateways
            .get(gateway)
            .ok_or_else(|| Error::UnknownGateway(gateway.to_owned()))?;

        debug!(gateway, method = %req.method(), path = req.path(), "dispatching");
        Next::new(slots, endpoint).run(req).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::handler::boxed;
    use crate::middleware::Stage;

    struct Pass;

    #[async_trait]
    impl Stage for Pass {
        async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
            next.run(req).await
        }
    }

    struct Includes(&'static str, Arc<AtomicUsize>);

    #[async_trait]
    impl Stage for Includes {
        fn boot(&self, ctx: &mut BootContext) -> Result<(), Error> {
            self.1.fetch_add(1, Ordering::SeqCst);
            ctx.include(self.0);
            Ok(())
        }

        async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
            next.run(req).await
        }
    }

    fn request() -> Request {
        Request::from_http(http::Request::get("/").body(Bytes::new()).unwrap())
    }

    #[test]
    fn unknown_stage_fails_the_build() {
        let config = GatewayConfig::new().gateway("web", ["pass", "csrf"]);
        let registry = StageRegistry::new().register("pass", || Pass);

        match Pipeline::build(&config, &registry) {
            Err(Error::UnknownStage { gateway, stage }) => {
                assert_eq!(gateway, "web");
                assert_eq!(stage, "csrf");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build should fail"),
        }
    }

    #[test]
    fn every_instance_boots_once_and_files_are_deduplicated() {
        let boots = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&boots);
        let config = GatewayConfig::new()
            .gateway("web", ["auth"])
            .gateway("api", ["auth"]);
        let registry = StageRegistry::new().register("auth", move || Includes("auth", Arc::clone(&counter)));

        let pipeline = Pipeline::build(&config, &registry).unwrap();
        assert_eq!(boots.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.route_files().iter().collect::<Vec<_>>(), ["auth"]);
    }

    #[test]
    fn default_gateways_exist_even_when_unconfigured() {
        let pipeline = Pipeline::build(&GatewayConfig::new(), &StageRegistry::new()).unwrap();
        assert_eq!(pipeline.gateways().collect::<Vec<_>>(), ["api", "web"]);
        assert_eq!(pipeline.stages("web"), Some(vec![]));
    }

    #[tokio::test]
    async fn empty_chain_goes_straight_to_the_handler() {
        let pipeline = Pipeline::build(&GatewayConfig::new(), &StageRegistry::new()).unwrap();
        let endpoint = boxed(|_req: Request| async { "hello" });

        let res = pipeline.dispatch("web", request(), &endpoint).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"hello");
    }

    #[tokio::test]
    async fn unknown_gateway_is_an_error() {
        let pipeline = Pipeline::build(&GatewayConfig::new(), &StageRegistry::new()).unwrap();
        let endpoint = boxed(|_req: Request| async { "unreachable" });

        let err = pipeline.dispatch("admin", request(), &endpoint).await.unwrap_err();
        assert!(matches!(err, Error::UnknownGateway(g) if g == "admin"));
    }
}
