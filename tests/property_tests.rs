//! Property tests for parameter signing and the token gate.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use proptest::prelude::*;
use turnstile::auth::{ParamSigner, SignedParams, TrustRoot, Verdict};
use turnstile::config::{GatewayConfig, Secret};
use turnstile::middleware::{Pipeline, StageRegistry, Tokenizer};
use turnstile::{Error, Request, boxed};

fn signer() -> ParamSigner {
    ParamSigner::new(&Secret::new("property-secret")).unwrap()
}

// Keys drawn from a-g never collide with the `hash` parameter.
fn arb_key() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-g]{1,6}").unwrap()
}

fn arb_value() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9 ./&=+-]{0,12}").unwrap()
}

fn arb_params() -> impl Strategy<Value = SignedParams> {
    (
        prop::collection::btree_map(arb_key(), prop::collection::vec(arb_value(), 1..3), 0..4),
        prop::collection::btree_map(arb_key(), arb_value(), 0..3),
    )
        .prop_map(|(query, route)| SignedParams { query, route })
}

/// Rejects every token as invalid.
struct RejectAll;

#[async_trait]
impl TrustRoot for RejectAll {
    async fn verify(&self, _token: &str) -> Result<Verdict, Error> {
        Ok(Verdict::Invalid("rejected".into()))
    }
}

proptest! {
    /// The digest depends only on the parameters and the secret.
    #[test]
    fn proptest_hash_is_deterministic(params in arb_params()) {
        let first = signer().sign(&params);
        let second = signer().sign(&params.clone());

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), 64);
        prop_assert!(signer().verify(&params, &first));
    }

    /// Route parameters collected in any order hash the same.
    #[test]
    fn proptest_route_insertion_order_is_irrelevant(
        route in prop::collection::btree_map(arb_key(), arb_value(), 0..5)
    ) {
        let forward = route.iter().fold(SignedParams::default(), |p, (k, v)| p.route(k, v));
        let backward = route.iter().rev().fold(SignedParams::default(), |p, (k, v)| p.route(k, v));

        prop_assert_eq!(signer().sign(&forward), signer().sign(&backward));
    }

    /// Changing one route value by a single character invalidates the hash.
    #[test]
    fn proptest_route_value_mutation_changes_hash(
        params in arb_params(),
        key in arb_key(),
        value in arb_value(),
    ) {
        let original = params.route(&key, &value);
        let hash = signer().sign(&original);

        let tampered = original.clone().route(&key, format!("{value}x"));
        prop_assert!(!signer().verify(&tampered, &hash));
    }

    /// Substituting one character of a query value invalidates the hash.
    #[test]
    fn proptest_query_value_substitution_changes_hash(
        params in arb_params(),
        key in arb_key(),
        value in prop::string::string_regex("[A-Za-z0-9]{1,12}").unwrap(),
        index in any::<prop::sample::Index>(),
    ) {
        let original = params.query(&key, &value);
        let hash = signer().sign(&original);

        let mut chars: Vec<char> = value.chars().collect();
        let at = index.index(chars.len());
        chars[at] = if chars[at] == 'a' { 'b' } else { 'a' };
        let substituted: String = chars.into_iter().collect();

        let mut tampered = original.clone();
        if let Some(last) = tampered.query.get_mut(&key).and_then(|values| values.last_mut()) {
            *last = substituted;
        }
        prop_assert_ne!(&tampered, &original);
        prop_assert!(!signer().verify(&tampered, &hash));
    }

    /// Renaming a query key invalidates the hash.
    #[test]
    fn proptest_query_key_mutation_changes_hash(
        key in arb_key(),
        value in arb_value(),
    ) {
        let original = SignedParams::default().query(&key, &value);
        let renamed = SignedParams::default().query(format!("{key}z"), &value);

        prop_assert_ne!(signer().sign(&original), signer().sign(&renamed));
    }

    /// A digest produced under a different secret never verifies.
    #[test]
    fn proptest_foreign_secret_is_rejected(params in arb_params()) {
        let foreign = ParamSigner::new(&Secret::new("another-secret")).unwrap();
        prop_assert!(!signer().verify(&params, &foreign.sign(&params)));
    }

    /// A signed link survives rendering and parsing back from a request.
    #[test]
    fn proptest_signed_link_round_trips_through_a_request(params in arb_params()) {
        let uri = format!("/links?{}", signer().signed_query(&params, "hash"));
        let req = Request::from_http(http::Request::get(uri.as_str()).body(Bytes::new()).unwrap())
            .with_params(params.route.clone());

        let received = SignedParams::from_request(&req, "hash");
        let hash = req.query("hash").unwrap();

        prop_assert_eq!(&received, &params);
        prop_assert!(signer().verify(&received, &hash));
    }

    /// Without a trusted bearer token the handler is never reached.
    #[test]
    fn proptest_untrusted_bearer_never_reaches_handler(
        authorization in prop::option::of(prop::string::string_regex("(Bearer |bearer |Basic )?[A-Za-z0-9._-]{0,24}").unwrap())
    ) {
        let registry = StageRegistry::new().register("tokenizer", || Tokenizer::new(Arc::new(RejectAll)));
        let pipeline = Pipeline::build(&GatewayConfig::new().gateway("api", ["tokenizer"]), &registry).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let endpoint = boxed(move |_req: Request| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { "reached" }
        });

        let mut builder = http::Request::get("/api/ledger");
        if let Some(value) = &authorization {
            builder = builder.header("authorization", value.as_str());
        }
        let req = Request::from_http(builder.body(Bytes::new()).unwrap());

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let res = rt.block_on(pipeline.dispatch("api", req, &endpoint)).unwrap();

        prop_assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn canonical_form_keeps_repeated_query_values_in_arrival_order() {
    let ab = SignedParams::default().query("tag", "a").query("tag", "b");
    let ba = SignedParams::default().query("tag", "b").query("tag", "a");

    assert_eq!(ab.query, BTreeMap::from([("tag".to_owned(), vec!["a".to_owned(), "b".to_owned()])]));
    assert_ne!(signer().sign(&ab), signer().sign(&ba));
}
