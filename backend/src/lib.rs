//! Sports-facility booking backend.
//!
//! Hexagonal layout: [`domain`] holds entities, services and ports;
//! [`outbound`] implements the ports against PostgreSQL, Redis and the
//! payment gateway; [`inbound`] exposes the REST surface.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
/// Request logging middleware.
pub use middleware::RequestLog;
