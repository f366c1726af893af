pub mod app;
pub mod auth;
pub mod family;
pub mod home;
pub mod metrics;
