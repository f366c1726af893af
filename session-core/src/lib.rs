//! session-core: session bootstrap, token refresh and family onboarding for DearFam clients.
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod http;
#[cfg(feature = "server")]
pub mod middleware;
pub mod models;
pub mod navigation;
pub mod observability;
pub mod services;
pub mod token_store;

pub use async_trait;
pub use reqwest;
pub use secrecy;
pub use tracing;

pub use bootstrap::SessionBootstrapController;
pub use error::ApiError;
pub use models::{BootstrapErrorKind, BootstrapResult, LoginReason, RouteTarget};
pub use navigation::{Navigator, Notifier};
pub use token_store::{MemoryTokenStore, TokenKey, TokenStore};
