//! Outbound adapters implementing the domain's driven ports.

pub mod cache;
pub mod mail;
pub mod paystack;
pub mod persistence;
