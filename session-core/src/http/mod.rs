//! HTTP plumbing for the `/api/v1` backend: the response envelope, the plain
//! client and the token-refreshing wrapper every authenticated call goes through.

pub mod client;
pub mod envelope;
pub mod refresh;

pub use client::{ApiClient, ApiRequest};
pub use envelope::ApiEnvelope;
pub use refresh::{RefreshGate, RefreshingClient};
