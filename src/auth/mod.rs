//! Collaborator contracts consumed by the gate stages.
//!
//! - [`session`]: who is behind the session cookie, and are they still online
//! - [`token`]: is this bearer credential trusted
//! - [`signature`]: were these route parameters issued by us

pub mod session;
pub mod signature;
pub mod token;

pub use session::{MemorySessionStore, Principal, SessionStore};
pub use signature::{ParamSigner, SignedParams};
pub use token::{Claims, JwtVerifier, TrustRoot, Verdict};
