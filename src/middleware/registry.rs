//! Stage identifiers and the factories behind them.
//!
//! Gateways name their stages by identifier in configuration. The registry
//! turns each occurrence of an identifier into a fresh stage instance, so the
//! same stage listed under `web` and `api` never shares state between them.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Authenticator, PreventRouteTampering, Stage, Tokenizer};
use crate::auth::{ParamSigner, SessionStore, TrustRoot};
use crate::config::Config;
use crate::error::Error;

pub const AUTHENTICATOR: &str = "authenticator";
pub const TOKENIZER: &str = "tokenizer";
pub const PREVENT_ROUTE_TAMPERING: &str = "prevent-route-tampering";

type Factory = Arc<dyn Fn() -> Arc<dyn Stage> + Send + Sync>;

/// Maps stage identifiers to constructors.
#[derive(Clone, Default)]
pub struct StageRegistry {
    factories: HashMap<String, Factory>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three built-in stages, wired to the given collaborators.
    pub fn standard(
        config: &Config,
        sessions: Arc<dyn SessionStore>,
        trust_root: Arc<dyn TrustRoot>,
        signer: ParamSigner,
    ) -> Self {
        let session = config.session.clone();
        let jwt = config.jwt.clone();
        let route_hash = config.route_hash.clone();

        Self::new()
            .register(AUTHENTICATOR, move || {
                Authenticator::new(Arc::clone(&sessions), &session.login_path)
                    .with_routes(&session.routes)
            })
            .register(TOKENIZER, move || {
                Tokenizer::new(Arc::clone(&trust_root)).with_routes(&jwt.routes)
            })
            .register(PREVENT_ROUTE_TAMPERING, move || {
                PreventRouteTampering::new(signer.clone())
                    .query_key(&route_hash.query_key)
                    .header(&route_hash.header)
                    .enforce(route_hash.enforce)
            })
    }

    /// Registers `factory` under `id`, replacing any previous registration.
    pub fn register<S, F>(mut self, id: &str, factory: F) -> Self
    where
        S: Stage,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.factories
            .insert(id.to_owned(), Arc::new(move || Arc::new(factory()) as Arc<dyn Stage>));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub(crate) fn instantiate(&self, gateway: &str, id: &str) -> Result<Arc<dyn Stage>, Error> {
        let factory = self.factories.get(id).ok_or_else(|| Error::UnknownStage {
            gateway: gateway.to_owned(),
            stage: id.to_owned(),
        })?;
        Ok(factory())
    }
}
