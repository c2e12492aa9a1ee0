//! Chain order and short-circuiting, for every position of the stage that
//! answers on its own.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use turnstile::config::GatewayConfig;
use turnstile::middleware::{Next, Pipeline, Stage, StageRegistry};
use turnstile::{Error, Request, Response, boxed};

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Records its name, then either continues or answers 403.
struct Recorder {
    name: &'static str,
    terminate: bool,
    log: Log,
}

#[async_trait]
impl Stage for Recorder {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
        self.log.lock().unwrap().push(self.name);
        if self.terminate {
            return Ok(Response::forbidden());
        }
        next.run(req).await
    }
}

/// Builds gateway `web` = [a, b, c] where only `terminator` (if any) stops.
fn pipeline(terminator: Option<&'static str>, log: &Log) -> Pipeline {
    let mut registry = StageRegistry::new();
    for name in ["a", "b", "c"] {
        let log = Arc::clone(log);
        let terminate = terminator == Some(name);
        registry = registry.register(name, move || Recorder { name, terminate, log: Arc::clone(&log) });
    }
    Pipeline::build(&GatewayConfig::new().gateway("web", ["a", "b", "c"]), &registry).unwrap()
}

async fn dispatch(pipeline: &Pipeline, log: &Log) -> Response {
    let handler_log = Arc::clone(log);
    let endpoint = boxed(move |_req: Request| {
        handler_log.lock().unwrap().push("handler");
        async { "done" }
    });
    let req = Request::from_http(http::Request::get("/").body(Bytes::new()).unwrap());
    pipeline.dispatch("web", req, &endpoint).await.unwrap()
}

#[tokio::test]
async fn stages_run_in_configured_order_then_the_handler() {
    let log = Log::default();
    let res = dispatch(&pipeline(None, &log), &log).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(*log.lock().unwrap(), ["a", "b", "c", "handler"]);
}

#[tokio::test]
async fn first_terminal_response_wins_at_every_position() {
    let cases: [(&str, &[&str]); 3] = [
        ("a", &["a"]),
        ("b", &["a", "b"]),
        ("c", &["a", "b", "c"]),
    ];

    for (terminator, expected) in cases {
        let log = Log::default();
        let res = dispatch(&pipeline(Some(terminator), &log), &log).await;

        assert_eq!(res.status_code(), StatusCode::FORBIDDEN, "terminator {terminator}");
        assert_eq!(*log.lock().unwrap(), expected, "terminator {terminator}");
    }
}

#[tokio::test]
async fn order_follows_configuration_not_registration() {
    let log = Log::default();
    let mut registry = StageRegistry::new();
    for name in ["a", "b", "c"] {
        let log = Arc::clone(&log);
        registry = registry.register(name, move || Recorder { name, terminate: false, log: Arc::clone(&log) });
    }
    let pipeline =
        Pipeline::build(&GatewayConfig::new().gateway("web", ["c", "a", "b"]), &registry).unwrap();
    assert_eq!(pipeline.stages("web"), Some(vec!["c", "a", "b"]));

    dispatch(&pipeline, &log).await;
    assert_eq!(*log.lock().unwrap(), ["c", "a", "b", "handler"]);
}

#[tokio::test]
async fn concurrent_dispatches_do_not_interleave_within_a_request() {
    let log = Log::default();
    let pipeline = Arc::new(pipeline(Some("b"), &log));

    let runs: Vec<_> = (0..16)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let log = Arc::clone(&log);
            tokio::spawn(async move { dispatch(&pipeline, &log).await.status_code() })
        })
        .collect();
    for run in runs {
        assert_eq!(run.await.unwrap(), StatusCode::FORBIDDEN);
    }

    let log = log.lock().unwrap();
    assert_eq!(log.iter().filter(|s| **s == "a").count(), 16);
    assert_eq!(log.iter().filter(|s| **s == "b").count(), 16);
    assert!(!log.contains(&"c"));
    assert!(!log.contains(&"handler"));
}
