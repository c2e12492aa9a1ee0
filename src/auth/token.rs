//! Bearer credential verification.
//!
//! [`TrustRoot`] is the contract the tokenizer stage consumes: a verdict on
//! one token. [`JwtVerifier`] is the bundled implementation for HS256 tokens
//! signed with a shared secret.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// Registered claims the verifier checks, plus the subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// Outcome of verifying one credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Valid(Claims),
    Invalid(String),
}

/// Verifies bearer credentials.
///
/// Return `Err` only when the trust root itself cannot answer (key service
/// down, revocation list unreachable). A token that fails any check is
/// `Ok(Verdict::Invalid)`.
#[async_trait]
pub trait TrustRoot: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<Verdict, Error>;
}

/// HS256 JWT verifier: signature, `exp`, `iss` and optionally `aud`.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// `leeway_secs` is the clock skew tolerated on `exp`.
    pub fn new(secret: &[u8], issuer: &str, audience: Option<&str>, leeway_secs: u64) -> Result<Self, Error> {
        if secret.is_empty() {
            return Err(Error::Config("jwt secret must not be empty".into()));
        }
        if issuer.is_empty() {
            return Err(Error::Config("jwt issuer must not be empty".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = leeway_secs;
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Ok(Self { key: DecodingKey::from_secret(secret), validation })
    }
}

#[async_trait]
impl TrustRoot for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Verdict, Error> {
        match jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(Verdict::Valid(data.claims)),
            Err(e) => {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "expired".to_owned(),
                    ErrorKind::InvalidSignature => "bad signature".to_owned(),
                    ErrorKind::InvalidIssuer    => "wrong issuer".to_owned(),
                    ErrorKind::InvalidAudience  => "wrong audience".to_owned(),
                    other                       => format!("{other:?}"),
                };
                debug!(%reason, "jwt rejected");
                Ok(Verdict::Invalid(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    const SECRET: &[u8] = b"unit-test-secret";

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn mint(secret: &[u8], iss: &str, exp: u64, aud: Option<&str>) -> String {
        let claims = Claims {
            sub: "user-1".into(),
            iss: iss.into(),
            exp,
            aud: aud.map(str::to_owned),
            iat: Some(now()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let v = JwtVerifier::new(SECRET, "turnstile", None, 0).unwrap();
        let verdict = v.verify(&mint(SECRET, "turnstile", now() + 600, None)).await.unwrap();
        match verdict {
            Verdict::Valid(claims) => assert_eq!(claims.sub, "user-1"),
            other => panic!("expected valid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let v = JwtVerifier::new(SECRET, "turnstile", None, 0).unwrap();
        let verdict = v.verify(&mint(SECRET, "turnstile", now() - 600, None)).await.unwrap();
        assert_eq!(verdict, Verdict::Invalid("expired".into()));
    }

    #[tokio::test]
    async fn rejects_foreign_signature_and_issuer() {
        let v = JwtVerifier::new(SECRET, "turnstile", None, 0).unwrap();

        let forged = mint(b"another-secret", "turnstile", now() + 600, None);
        assert_eq!(v.verify(&forged).await.unwrap(), Verdict::Invalid("bad signature".into()));

        let foreign = mint(SECRET, "elsewhere", now() + 600, None);
        assert_eq!(v.verify(&foreign).await.unwrap(), Verdict::Invalid("wrong issuer".into()));
    }

    #[tokio::test]
    async fn audience_is_checked_when_configured() {
        let v = JwtVerifier::new(SECRET, "turnstile", Some("api"), 0).unwrap();
        assert!(matches!(v.verify(&mint(SECRET, "turnstile", now() + 600, Some("api"))).await.unwrap(), Verdict::Valid(_)));
        assert_eq!(
            v.verify(&mint(SECRET, "turnstile", now() + 600, Some("web"))).await.unwrap(),
            Verdict::Invalid("wrong audience".into())
        );
    }

    #[tokio::test]
    async fn garbage_is_invalid_not_an_error() {
        let v = JwtVerifier::new(SECRET, "turnstile", None, 0).unwrap();
        assert!(matches!(v.verify("not-a-jwt").await.unwrap(), Verdict::Invalid(_)));
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(matches!(JwtVerifier::new(b"", "turnstile", None, 0), Err(Error::Config(_))));
    }
}
