//! Request authorization for authkit.
//!
//! Every outgoing request passes through a [`RequestInterceptor`] before
//! it is sent. The interceptor:
//!
//! 1. computes the request's [`Origin`] (scheme + host + port, with the
//!    port defaulted for `http`/`https`)
//! 2. asks the [`OriginPolicy`] whether that origin may receive
//!    authorization data: the document's own origin always may, other
//!    origins only when whitelisted
//! 3. hands the request and a session snapshot to the configured
//!    [`Authorizer`], which decorates it (e.g. an `Authorization` header)
//!
//! Authorization secrets therefore never leak to third-party origins
//! unless an origin is explicitly whitelisted.
//!
//! The interception *mechanism* belongs to the host HTTP client: call
//! [`RequestInterceptor::intercept`] from whatever middleware stage it
//! offers.

mod authorizer;
mod error;
mod interceptor;
mod origin;
mod request;

pub use authorizer::{Authorizer, BaseAuthorizer, BearerAuthorizer};
pub use error::OriginError;
pub use interceptor::RequestInterceptor;
pub use origin::{Origin, OriginPolicy};
pub use request::OutgoingRequest;
