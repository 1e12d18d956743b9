//! Paystack payment gateway adapter.

pub mod dto;
mod http_gateway;
mod signature;

pub use http_gateway::{PaystackConfig, PaystackHttpGateway};
pub use signature::{sign, verify_signature};
