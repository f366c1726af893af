pub mod auth;
pub mod family;
pub mod users;

pub use auth::{logout, oauth_callback, refresh};
pub use family::{create_family, join_family, members};
pub use users::{get_me, set_role};
