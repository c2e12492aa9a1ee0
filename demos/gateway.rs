//! Both gateways behind one server.
//!
//! Run with:
//!   JWT_SECRET=dev-jwt APP_KEY=dev-key RUST_LOG=debug cargo run --example gateway
//!
//! Try:
//!   curl -i http://localhost:3000/login                      # opens a session, prints a signed link
//!   curl -i -b 'session_id=<id>' 'http://localhost:3000/invoices/42?<signed query>'
//!   curl -i -b 'session_id=<id>' 'http://localhost:3000/invoices/43?<signed query>'   # 401, tampered
//!   curl -i http://localhost:3000/api/invoices/42            # 401, no token

use std::sync::Arc;

use http::Method;
use tracing_subscriber::EnvFilter;
use turnstile::auth::{JwtVerifier, MemorySessionStore, ParamSigner, SignedParams};
use turnstile::config::{self, Config};
use turnstile::middleware::StageRegistry;
use turnstile::{App, Request, Response, Router, Routes, Server};

#[tokio::main]
async fn main() -> Result<(), turnstile::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load("config/app.toml")?;

    let sessions = MemorySessionStore::new(&config.session.cookie, config.session.lifetime());
    let jwt_secret = config.jwt.secret(config::env)?;
    let trust_root = JwtVerifier::new(
        jwt_secret.expose().as_bytes(),
        &config.jwt.issuer,
        config.jwt.audience.as_deref(),
        config.jwt.leeway_secs,
    )?;
    let signer = ParamSigner::new(&config.route_hash.secret(config::env)?)?;

    let registry = StageRegistry::standard(
        &config,
        Arc::new(sessions.clone()),
        Arc::new(trust_root),
        signer.clone(),
    );

    let login = {
        let sessions = sessions.clone();
        let signer = signer.clone();
        move |_req: Request| {
            let sid = sessions.open("alice");
            let params = SignedParams::default().route("id", "42").query("view", "full");
            let link = format!("/invoices/42?{}", signer.signed_query(&params, "hash"));
            async move {
                Response::builder()
                    .header("set-cookie", &format!("session_id={sid}; HttpOnly; Path=/"))
                    .text(format!("session {sid}\nsigned link {link}\n"))
            }
        }
    };

    let router = Router::new()
        // Mounted only because the authenticator asks for the `auth` route file.
        .route_file("auth", "web", Routes::new().on(Method::GET, "/login", login))
        .web(Routes::new().on(Method::GET, "/invoices/{id}", show_invoice))
        .api(Routes::new().on(Method::GET, "/api/invoices/{id}", show_invoice));

    let app = App::boot(&config.gateways, &registry, router)?;
    Server::bind(&config.app.listen)?.serve(app).await
}

// GET /invoices/{id} (web) and /api/invoices/{id} (api)
async fn show_invoice(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    let owner = req.user().map(|u| u.id().to_owned()).unwrap_or_else(|| "anonymous".into());
    Response::json(format!(r#"{{"id":"{id}","viewer":"{owner}"}}"#))
}
