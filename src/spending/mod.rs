//! Proxy layer for the federal spending API.
//!
//! `catalog` declares every endpoint, `params` shapes inbound requests and
//! `client` performs the outbound call.

pub mod catalog;
pub mod client;
pub mod params;

pub use catalog::{Endpoint, Method, ParamMode, Required, ENDPOINTS};
pub use client::{SpendingClient, UpstreamError};
