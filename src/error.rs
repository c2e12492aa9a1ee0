//! Unified error type.

use thiserror::Error;

use crate::response::Response;

/// The error type returned by turnstile's fallible operations.
///
/// Gate decisions (redirect to login, 401) are expressed as
/// [`Response`] values, not as `Error`s. This type surfaces two other
/// families:
///
/// - **boot-time** failures: bad configuration, unknown stages or gateways,
///   route conflicts, binding a port. These abort startup.
/// - **collaborator** failures at request time: the session store or the
///   token trust root could not answer. These become `503` so an outage is
///   never reported to the client as a permission denial.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(String),

    #[error("unknown gateway `{0}`")]
    UnknownGateway(String),

    #[error("gateway `{gateway}` references unknown stage `{stage}`")]
    UnknownStage { gateway: String, stage: String },

    #[error("route: {0}")]
    Route(String),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("session store unavailable: {0}")]
    SessionStore(String),

    #[error("token trust root unavailable: {0}")]
    TrustRoot(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `true` for failures of an external collaborator during a request.
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::SessionStore(_) | Self::TrustRoot(_))
    }

    /// The response sent to the client when this error escapes a request.
    pub fn into_response(self) -> Response {
        if self.is_collaborator() {
            Response::service_unavailable()
        } else {
            Response::internal_error()
        }
    }
}
