//! HTTP service for the energy-estimation agent.
//!
//! Validates inbound estimate requests, refuses them with `503` when no
//! model backend is configured, and otherwise runs the estimation pipeline
//! and returns its JSON response.

pub mod handlers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;

pub use server::{router, start_gateway};
pub use state::GatewayState;
