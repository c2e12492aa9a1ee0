//! # turnstile
//!
//! Gatekeeping middleware for HTTP services. A request is routed to a
//! *gateway* (`web`, `api`, or one of your own), and passes that gateway's
//! stages in configured order before it reaches the handler.
//!
//! ## The gates
//!
//! - **`authenticator`**: resolves the session principal. Anonymous
//!   requests pass; an offline session is redirected to the login page; a
//!   live one is renewed and bound to the request.
//! - **`tokenizer`**: requires a trusted `Authorization: Bearer` token.
//! - **`prevent-route-tampering`**: if a link was signed, its parameters
//!   must still match the signature.
//!
//! The first stage that answers on its own ends the chain. Expected
//! failures are responses (302, 401); a session store or trust root that
//! cannot answer is an [`Error`] and becomes `503`, never a permission denial.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http::Method;
//! use turnstile::auth::{JwtVerifier, MemorySessionStore, ParamSigner};
//! use turnstile::config::{self, Config};
//! use turnstile::middleware::StageRegistry;
//! use turnstile::{App, Request, Response, Router, Routes, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), turnstile::Error> {
//!     let config = Config::load("config/app.toml")?;
//!
//!     let sessions = MemorySessionStore::new(&config.session.cookie, config.session.lifetime());
//!     let jwt_secret = config.jwt.secret(config::env)?;
//!     let trust_root = JwtVerifier::new(
//!         jwt_secret.expose().as_bytes(),
//!         &config.jwt.issuer,
//!         config.jwt.audience.as_deref(),
//!         config.jwt.leeway_secs,
//!     )?;
//!     let signer = ParamSigner::new(&config.route_hash.secret(config::env)?)?;
//!
//!     let registry = StageRegistry::standard(&config, Arc::new(sessions), Arc::new(trust_root), signer);
//!     let router = Router::new()
//!         .web(Routes::new().on(Method::GET, "/invoices/{id}", show_invoice))
//!         .api(Routes::new().on(Method::GET, "/api/invoices/{id}", show_invoice));
//!
//!     let app = App::boot(&config.gateways, &registry, router)?;
//!     Server::bind(&config.app.listen)?.serve(app).await
//! }
//!
//! async fn show_invoice(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//! ```

mod app;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod auth;
pub mod config;
pub mod middleware;

pub use app::App;
pub use error::Error;
pub use handler::{BoxedHandler, Handler, boxed};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Router, Routes};
pub use server::Server;
