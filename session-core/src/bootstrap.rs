//! Session bootstrap: decide where a user lands when the app starts.
//!
//! One pass runs Init → VerifyingIdentity → VerifyingFamily and resolves to a
//! [`BootstrapResult`], which is handed to the [`Navigator`] exactly once.
//!
//! - No access token: `Unauthenticated`, no network calls.
//! - Identity 401: tokens cleared, login with `token-invalid`.
//! - Identity 404: tokens cleared, login with `user-not-found`.
//! - Any other identity failure (timeouts included): tokens cleared, login with `oauth-fail`.
//! - Family members present: home. No family, or a failed family lookup: family creation.
//! - Session lost during the family lookup (refresh failed): tokens cleared, login with `token-invalid`.
//!
//! Concurrent passes for the same token share a single in-flight future, so the
//! backend sees one identity call and one family call. [`SessionBootstrapController::cancel`]
//! makes every pass already in flight drop its response instead of applying it.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::models::{
    BootstrapErrorKind, BootstrapResult, FamilyLookup, LoginReason, RouteTarget, UserIdentity,
};
use crate::navigation::{Navigator, Notifier, Toast};
use crate::services::family::{FamilyError, FamilyMembershipService};
use crate::services::identity::{IdentityError, IdentityService};
use crate::token_store::{TokenKey, TokenStore};

type PassFuture = Shared<BoxFuture<'static, Option<BootstrapResult>>>;

#[derive(Clone)]
pub struct SessionBootstrapController {
    inner: Arc<Inner>,
}

struct Inner {
    tokens: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityService>,
    family: Arc<dyn FamilyMembershipService>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    current_user: RwLock<Option<UserIdentity>>,
    generation: AtomicU64,
    in_flight: Mutex<HashMap<(u64, String), PassFuture>>,
}

impl SessionBootstrapController {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        identity: Arc<dyn IdentityService>,
        family: Arc<dyn FamilyMembershipService>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tokens,
                identity,
                family,
                navigator,
                notifier,
                current_user: RwLock::new(None),
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Run one bootstrap pass and route to its outcome.
    ///
    /// Returns `None` when the pass was cancelled before it resolved; nothing
    /// was applied in that case.
    pub async fn run(&self) -> Option<BootstrapResult> {
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let token = match self.inner.tokens.get(TokenKey::Access).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read access token, treating as absent");
                None
            }
        };

        let Some(token) = token else {
            debug!("No access token stored");
            self.inner.set_current_user(None);
            return self
                .inner
                .finish(generation, BootstrapResult::Unauthenticated { reason: None });
        };

        self.shared_pass(token, generation).await
    }

    /// Drop the outcome of every pass currently in flight.
    pub fn cancel(&self) {
        let previous = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        debug!(generation = previous + 1, "Bootstrap passes cancelled");
    }

    /// Identity confirmed by the most recent pass, if any.
    pub fn cached_identity(&self) -> Option<UserIdentity> {
        self.inner
            .current_user
            .read()
            .map(|user| user.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn shared_pass(&self, token: String, generation: u64) -> PassFuture {
        let key = (generation, token);
        let mut in_flight = self.inner.in_flight();

        if let Some(pass) = in_flight.get(&key) {
            debug!("Joining bootstrap pass already in flight");
            return pass.clone();
        }

        let inner = self.inner.clone();
        let pass_key = key.clone();
        let pass = async move {
            let result = inner.verify(&pass_key.1, generation).await;
            inner.in_flight().remove(&pass_key);
            result
        }
        .instrument(info_span!("bootstrap_pass", generation))
        .boxed()
        .shared();

        in_flight.insert(key, pass.clone());
        pass
    }
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<(u64, String), PassFuture>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn set_current_user(&self, user: Option<UserIdentity>) {
        let mut current = self
            .current_user
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = user;
    }

    async fn verify(&self, token: &str, generation: u64) -> Option<BootstrapResult> {
        let identity = self.identity.get_current_user(token).await;
        if self.is_stale(generation) {
            debug!("Discarding identity response from cancelled pass");
            return None;
        }

        let user = match identity {
            Ok(user) => user,
            Err(err) => {
                let result = self.identity_failed(err).await;
                return self.finish(generation, result);
            }
        };

        info!(user_id = user.id, "Identity verified");
        self.set_current_user(Some(user.clone()));

        let family = self.family.get_members(token).await;
        if self.is_stale(generation) {
            debug!("Discarding family response from cancelled pass");
            return None;
        }

        let result = match family {
            Ok(FamilyLookup::Members(membership)) if !membership.members.is_empty() => {
                BootstrapResult::AuthenticatedWithFamily { user, membership }
            }
            Ok(_) => BootstrapResult::AuthenticatedNoFamily { user },
            Err(FamilyError::SessionExpired) => {
                warn!(user_id = user.id, "Session expired during family lookup");
                self.end_session().await;
                BootstrapResult::Unauthenticated {
                    reason: Some(LoginReason::TokenInvalid),
                }
            }
            Err(e) => {
                // Resolve rather than leave the user on a loading screen.
                warn!(
                    user_id = user.id,
                    error = %e,
                    "Family lookup failed, continuing as user without family"
                );
                BootstrapResult::AuthenticatedNoFamily { user }
            }
        };

        self.finish(generation, result)
    }

    /// Every identity failure ends the session: no partial-auth state is kept.
    async fn identity_failed(&self, err: IdentityError) -> BootstrapResult {
        warn!(error = %err, "Identity verification failed");
        self.end_session().await;

        match err {
            IdentityError::Unauthorized => BootstrapResult::Unauthenticated {
                reason: Some(LoginReason::TokenInvalid),
            },
            IdentityError::NotFound => BootstrapResult::Error(BootstrapErrorKind::UserNotFound),
            IdentityError::Other(_) => {
                BootstrapResult::Error(BootstrapErrorKind::IdentityUnavailable)
            }
        }
    }

    async fn end_session(&self) {
        if let Err(e) = self.tokens.clear_all().await {
            tracing::error!(error = %e, "Failed to clear tokens");
        }
        self.set_current_user(None);
    }

    fn finish(&self, generation: u64, result: BootstrapResult) -> Option<BootstrapResult> {
        if self.is_stale(generation) {
            debug!(outcome = result.label(), "Discarding result of cancelled pass");
            return None;
        }

        let route = result.route();
        if let (BootstrapResult::Error(_), RouteTarget::LoginPage(Some(reason))) = (&result, route) {
            self.notifier.notify(Toast::error(reason.user_message()));
        }

        info!(outcome = result.label(), route = %route.path(), "Bootstrap pass resolved");
        self.navigator.route_to(route);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::{FamilyMembership, FamilyRole, Member};
    use crate::navigation::{RecordingNavigator, RecordingNotifier};
    use crate::token_store::MemoryTokenStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Clone)]
    enum IdentityReply {
        User(UserIdentity),
        Unauthorized,
        NotFound,
        Unavailable,
    }

    struct FakeIdentity {
        reply: IdentityReply,
        calls: AtomicUsize,
        delay: Option<Duration>,
        entered: Arc<Notify>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeIdentity {
        fn new(reply: IdentityReply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                delay: None,
                entered: Arc::new(Notify::new()),
                gate: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentity {
        async fn get_current_user(&self, _token: &str) -> Result<UserIdentity, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.reply.clone() {
                IdentityReply::User(user) => Ok(user),
                IdentityReply::Unauthorized => Err(IdentityError::Unauthorized),
                IdentityReply::NotFound => Err(IdentityError::NotFound),
                IdentityReply::Unavailable => Err(IdentityError::Other(ApiError::Timeout)),
            }
        }
    }

    #[derive(Clone)]
    enum FamilyReply {
        Members(Vec<Member>),
        NotFound,
        Fails,
        Expired,
    }

    struct FakeFamily {
        reply: FamilyReply,
        calls: AtomicUsize,
    }

    impl FakeFamily {
        fn new(reply: FamilyReply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FamilyMembershipService for FakeFamily {
        async fn get_members(&self, _token: &str) -> Result<FamilyLookup, FamilyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply.clone() {
                FamilyReply::Members(members) => Ok(FamilyLookup::Members(FamilyMembership {
                    family_id: 1,
                    members,
                })),
                FamilyReply::NotFound => Ok(FamilyLookup::NoFamilyYet),
                FamilyReply::Fails => Err(FamilyError::Other(ApiError::Server(
                    "db down".to_string(),
                ))),
                FamilyReply::Expired => Err(FamilyError::SessionExpired),
            }
        }
    }

    struct Harness {
        controller: SessionBootstrapController,
        tokens: Arc<MemoryTokenStore>,
        identity: Arc<FakeIdentity>,
        family: Arc<FakeFamily>,
        navigator: Arc<RecordingNavigator>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(tokens: MemoryTokenStore, identity: FakeIdentity, family: FamilyReply) -> Harness {
        let tokens = Arc::new(tokens);
        let identity = Arc::new(identity);
        let family = Arc::new(FakeFamily::new(family));
        let navigator = Arc::new(RecordingNavigator::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let controller = SessionBootstrapController::new(
            tokens.clone(),
            identity.clone(),
            family.clone(),
            navigator.clone(),
            notifier.clone(),
        );
        Harness {
            controller,
            tokens,
            identity,
            family,
            navigator,
            notifier,
        }
    }

    fn kim_dad() -> UserIdentity {
        UserIdentity {
            id: 7,
            nickname: "김아빠".to_string(),
            family_id: None,
            role: None,
        }
    }

    fn member(user_id: i64, nickname: &str, role: FamilyRole) -> Member {
        Member {
            user_id,
            nickname: nickname.to_string(),
            role: Some(role),
            profile_image_url: None,
        }
    }

    #[tokio::test]
    async fn test_no_token_is_unauthenticated_without_network_calls() {
        let h = harness(
            MemoryTokenStore::new(),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::NotFound,
        );

        let result = h.controller.run().await;

        assert_eq!(
            result,
            Some(BootstrapResult::Unauthenticated { reason: None })
        );
        assert_eq!(h.identity.calls(), 0);
        assert_eq!(h.family.calls(), 0);
        assert_eq!(h.navigator.routes(), vec![RouteTarget::LoginPage(None)]);
        assert!(h.controller.cached_identity().is_none());
    }

    #[tokio::test]
    async fn test_member_of_family_goes_home() {
        let members = vec![
            member(7, "김아빠", FamilyRole::Father),
            member(8, "김엄마", FamilyRole::Mother),
        ];
        let h = harness(
            MemoryTokenStore::with_pair("tok-abc", "ref-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::Members(members.clone()),
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(
            result,
            BootstrapResult::AuthenticatedWithFamily {
                user: kim_dad(),
                membership: FamilyMembership {
                    family_id: 1,
                    members
                },
            }
        );
        assert_eq!(h.navigator.routes(), vec![RouteTarget::HomePage]);
        assert_eq!(h.controller.cached_identity(), Some(kim_dad()));
        assert_eq!(h.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_empty_family_routes_to_creation_without_toast() {
        // tok-abc / 김아빠 / [] scenario
        let h = harness(
            MemoryTokenStore::with_access_token("tok-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::Members(vec![]),
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(
            result,
            BootstrapResult::AuthenticatedNoFamily { user: kim_dad() }
        );
        assert_eq!(h.navigator.routes(), vec![RouteTarget::FamilyCreationPage]);
        assert_eq!(h.notifier.count(), 0);
        assert_eq!(h.identity.calls(), 1);
        assert_eq!(h.family.calls(), 1);
    }

    #[tokio::test]
    async fn test_family_not_found_is_silent() {
        let h = harness(
            MemoryTokenStore::with_access_token("tok-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::NotFound,
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(result.route(), RouteTarget::FamilyCreationPage);
        assert!(h.notifier.toasts().is_empty());
        assert_eq!(
            h.tokens.get(TokenKey::Access).await.unwrap().as_deref(),
            Some("tok-abc")
        );
    }

    #[tokio::test]
    async fn test_family_failure_still_resolves_without_family() {
        let h = harness(
            MemoryTokenStore::with_access_token("tok-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::Fails,
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(
            result,
            BootstrapResult::AuthenticatedNoFamily { user: kim_dad() }
        );
        assert_eq!(h.notifier.count(), 0);
        assert_eq!(h.controller.cached_identity(), Some(kim_dad()));
    }

    #[tokio::test]
    async fn test_rejected_token_clears_session() {
        let h = harness(
            MemoryTokenStore::with_pair("tok-abc", "ref-abc"),
            FakeIdentity::new(IdentityReply::Unauthorized),
            FamilyReply::NotFound,
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(
            result,
            BootstrapResult::Unauthenticated {
                reason: Some(LoginReason::TokenInvalid)
            }
        );
        assert!(h.tokens.get(TokenKey::Access).await.unwrap().is_none());
        assert!(h.tokens.get(TokenKey::Refresh).await.unwrap().is_none());
        assert_eq!(
            h.navigator.routes(),
            vec![RouteTarget::LoginPage(Some(LoginReason::TokenInvalid))]
        );
        assert_eq!(h.family.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_user_shows_message_and_clears_session() {
        let h = harness(
            MemoryTokenStore::with_pair("tok-abc", "ref-abc"),
            FakeIdentity::new(IdentityReply::NotFound),
            FamilyReply::NotFound,
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(result, BootstrapResult::Error(BootstrapErrorKind::UserNotFound));
        assert_eq!(
            h.navigator.last(),
            Some(RouteTarget::LoginPage(Some(LoginReason::UserNotFound)))
        );
        let toasts = h.notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, LoginReason::UserNotFound.user_message());
        assert!(h.tokens.get(TokenKey::Access).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_outage_routes_to_oauth_fail() {
        let h = harness(
            MemoryTokenStore::with_pair("tok-abc", "ref-abc"),
            FakeIdentity::new(IdentityReply::Unavailable),
            FamilyReply::NotFound,
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(
            result,
            BootstrapResult::Error(BootstrapErrorKind::IdentityUnavailable)
        );
        assert_eq!(
            h.navigator.last(),
            Some(RouteTarget::LoginPage(Some(LoginReason::OAuthFail)))
        );
        assert_eq!(h.notifier.count(), 1);
        assert!(h.tokens.get(TokenKey::Refresh).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_passes_are_idempotent() {
        let h = harness(
            MemoryTokenStore::with_access_token("tok-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::Members(vec![member(7, "김아빠", FamilyRole::Father)]),
        );

        let first = h.controller.run().await;
        let second = h.controller.run().await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(h.identity.calls(), 2);
        assert_eq!(
            h.navigator.routes(),
            vec![RouteTarget::HomePage, RouteTarget::HomePage]
        );
    }

    #[tokio::test]
    async fn test_concurrent_passes_share_network_calls() {
        let mut identity = FakeIdentity::new(IdentityReply::User(kim_dad()));
        identity.delay = Some(Duration::from_millis(50));
        let h = harness(
            MemoryTokenStore::with_access_token("tok-abc"),
            identity,
            FamilyReply::NotFound,
        );

        let (a, b) = tokio::join!(h.controller.run(), h.controller.run());

        assert_eq!(a, b);
        assert_eq!(h.identity.calls(), 1);
        assert_eq!(h.family.calls(), 1);
        assert_eq!(h.navigator.routes(), vec![RouteTarget::FamilyCreationPage]);
    }

    #[tokio::test]
    async fn test_cancelled_pass_applies_nothing() {
        let gate = Arc::new(Notify::new());
        let mut identity = FakeIdentity::new(IdentityReply::Unauthorized);
        identity.gate = Some(gate.clone());
        let entered = identity.entered.clone();
        let h = harness(
            MemoryTokenStore::with_pair("tok-abc", "ref-abc"),
            identity,
            FamilyReply::NotFound,
        );

        let controller = h.controller.clone();
        let pass = tokio::spawn(async move { controller.run().await });

        entered.notified().await;
        h.controller.cancel();
        gate.notify_one();

        assert_eq!(pass.await.unwrap(), None);
        assert!(h.navigator.routes().is_empty());
        assert_eq!(h.notifier.count(), 0);
        // The 401 arrived late, so the tokens must still be there.
        assert_eq!(
            h.tokens.get(TokenKey::Access).await.unwrap().as_deref(),
            Some("tok-abc")
        );
    }

    #[tokio::test]
    async fn test_pass_after_cancel_runs_normally() {
        let h = harness(
            MemoryTokenStore::with_access_token("tok-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::NotFound,
        );

        h.controller.cancel();
        let result = h.controller.run().await;

        assert_eq!(
            result,
            Some(BootstrapResult::AuthenticatedNoFamily { user: kim_dad() })
        );
    }

    #[tokio::test]
    async fn test_session_lost_during_family_lookup_goes_to_login() {
        let h = harness(
            MemoryTokenStore::with_pair("tok-abc", "ref-abc"),
            FakeIdentity::new(IdentityReply::User(kim_dad())),
            FamilyReply::Expired,
        );

        let result = h.controller.run().await.unwrap();

        assert_eq!(
            result,
            BootstrapResult::Unauthenticated {
                reason: Some(LoginReason::TokenInvalid)
            }
        );
        assert_eq!(
            h.navigator.routes(),
            vec![RouteTarget::LoginPage(Some(LoginReason::TokenInvalid))]
        );
        assert!(h.tokens.get(TokenKey::Refresh).await.unwrap().is_none());
        assert!(h.controller.cached_identity().is_none());
        assert_eq!(h.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_failing_refresh_keeps_session() {
        use crate::config::ApiSettings;
        use crate::http::{ApiClient, RefreshingClient};
        use crate::services::{HttpFamilyService, HttpIdentityService};
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(ApiSettings::with_base_url(format!("{}/api/v1", server.uri())))
            .unwrap();
        let tokens = Arc::new(MemoryTokenStore::with_pair("tok-abc", "ref-abc"));
        let client = RefreshingClient::new(api, tokens.clone());
        let navigator = Arc::new(RecordingNavigator::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let controller = SessionBootstrapController::new(
            tokens.clone(),
            Arc::new(HttpIdentityService::new(client.clone())),
            Arc::new(HttpFamilyService::new(client)),
            navigator.clone(),
            notifier.clone(),
        );

        let pass = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.cancel();

        assert_eq!(pass.await.unwrap(), None);
        assert!(navigator.routes().is_empty());
        assert_eq!(notifier.count(), 0);
        assert_eq!(
            tokens.get(TokenKey::Access).await.unwrap().as_deref(),
            Some("tok-abc")
        );
        assert_eq!(
            tokens.get(TokenKey::Refresh).await.unwrap().as_deref(),
            Some("ref-abc")
        );
    }
}
