pub mod auth;
pub mod family;
pub mod identity;
pub mod onboarding;

pub use auth::AuthApi;
pub use family::{FamilyError, FamilyMembershipService, HttpFamilyService};
pub use identity::{HttpIdentityService, IdentityError, IdentityService};
pub use onboarding::{FamilyOnboarding, OnboardingError};
