use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use session_core::models::{Family, FamilyMembership, FamilyRole, Member, UserIdentity};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

use crate::error::AppError;

/// OAuth code that logs in as the seeded family father.
pub const DEMO_CODE: &str = "demo";
/// Prefix of OAuth codes that sign up a brand-new user (`new-user-<nickname>`).
pub const NEW_USER_CODE_PREFIX: &str = "new-user-";
pub const DEMO_INVITE_CODE: &str = "KIM123";

const MAX_FAMILY_NAME_CHARS: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
struct MockUser {
    id: i64,
    nickname: String,
    family_id: Option<i64>,
    role: Option<FamilyRole>,
}

impl MockUser {
    fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            nickname: self.nickname.clone(),
            family_id: self.family_id,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone)]
struct MockFamily {
    id: i64,
    name: String,
    invite_code: String,
    member_ids: Vec<i64>,
}

impl MockFamily {
    fn family(&self) -> Family {
        Family {
            id: self.id,
            name: self.name.clone(),
            invite_code: self.invite_code.clone(),
        }
    }
}

/// In-memory users, families and tokens. Cheap to clone; clones share data.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Store>,
}

#[derive(Default)]
struct Store {
    users: DashMap<i64, MockUser>,
    families: DashMap<i64, MockFamily>,
    family_names: DashMap<String, i64>,
    invite_codes: DashMap<String, i64>,
    access_tokens: DashMap<String, i64>,
    // Refresh token to its owner and the access token issued alongside it.
    refresh_tokens: DashMap<String, (i64, String)>,
    next_id: AtomicI64,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A family "Kim" with 김아빠 (FATHER) and 김엄마 (MOTHER), reachable with [`DEMO_CODE`].
    pub fn with_demo_data() -> Self {
        let state = Self::new();
        let dad = state.create_user("김아빠");
        let mom = state.create_user("김엄마");
        if let Ok(family) = state.create_family_with_code(dad, "Kim", DEMO_INVITE_CODE) {
            let _ = state.join_family(mom, &family.invite_code);
            let _ = state.set_role(dad, FamilyRole::Father);
            let _ = state.set_role(mom, FamilyRole::Mother);
        }
        state
    }

    fn next_id(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn create_user(&self, nickname: &str) -> i64 {
        let id = self.next_id();
        self.inner.users.insert(
            id,
            MockUser {
                id,
                nickname: nickname.to_string(),
                family_id: None,
                role: None,
            },
        );
        tracing::debug!(user_id = id, nickname = %nickname, "Mock user created");
        id
    }

    pub fn user_id_by_nickname(&self, nickname: &str) -> Option<i64> {
        self.inner
            .users
            .iter()
            .find(|u| u.nickname == nickname)
            .map(|u| u.id)
    }

    pub fn issue_tokens(&self, user_id: i64) -> TokenResponse {
        let access_token = format!("acc-{}", Uuid::new_v4());
        let refresh_token = format!("ref-{}", Uuid::new_v4());
        self.inner
            .access_tokens
            .insert(access_token.clone(), user_id);
        self.inner
            .refresh_tokens
            .insert(refresh_token.clone(), (user_id, access_token.clone()));
        TokenResponse {
            access_token,
            refresh_token,
        }
    }

    /// Resolve an OAuth authorization code to a user and issue tokens.
    pub fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let user_id = if code == DEMO_CODE {
            self.user_id_by_nickname("김아빠")
                .ok_or_else(|| AppError::Unauthorized("Demo user not seeded".to_string()))?
        } else if let Some(nickname) = code.strip_prefix(NEW_USER_CODE_PREFIX) {
            if nickname.is_empty() {
                return Err(AppError::BadRequest("Nickname is required".to_string()));
            }
            self.create_user(nickname)
        } else {
            return Err(AppError::Unauthorized(
                "Invalid authorization code".to_string(),
            ));
        };

        Ok(self.issue_tokens(user_id))
    }

    /// Rotate a token pair. The old refresh and access tokens both stop working.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let (_, (user_id, access_token)) = self
            .inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;
        self.inner.access_tokens.remove(&access_token);
        Ok(self.issue_tokens(user_id))
    }

    pub fn user_for_access_token(&self, access_token: &str) -> Result<i64, AppError> {
        self.inner
            .access_tokens
            .get(access_token)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
    }

    pub fn logout(&self, access_token: &str) {
        if let Some((_, user_id)) = self.inner.access_tokens.remove(access_token) {
            self.inner
                .refresh_tokens
                .retain(|_, (owner, _)| *owner != user_id);
        }
    }

    /// Invalidate every access token while keeping refresh tokens usable.
    pub fn expire_access_tokens(&self) {
        self.inner.access_tokens.clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.inner.refresh_tokens.clear();
    }

    /// Delete a user while leaving their tokens valid, as if the account vanished server-side.
    pub fn remove_user(&self, user_id: i64) {
        if let Some((_, user)) = self.inner.users.remove(&user_id)
            && let Some(family_id) = user.family_id
            && let Some(mut family) = self.inner.families.get_mut(&family_id)
        {
            family.member_ids.retain(|id| *id != user_id);
        }
    }

    pub fn current_user(&self, user_id: i64) -> Result<UserIdentity, AppError> {
        self.inner
            .users
            .get(&user_id)
            .map(|u| u.identity())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub fn members(&self, user_id: i64) -> Result<FamilyMembership, AppError> {
        let user = self.current_user(user_id)?;
        let family_id = user
            .family_id
            .ok_or_else(|| AppError::NotFound("User has no family".to_string()))?;
        let family = self
            .inner
            .families
            .get(&family_id)
            .map(|f| f.clone())
            .ok_or_else(|| AppError::NotFound("Family not found".to_string()))?;

        let members = family
            .member_ids
            .iter()
            .filter_map(|id| self.inner.users.get(id).map(|u| u.clone()))
            .map(|u| Member {
                user_id: u.id,
                nickname: u.nickname,
                role: u.role,
                profile_image_url: None,
            })
            .collect();

        Ok(FamilyMembership { family_id, members })
    }

    pub fn create_family(&self, user_id: i64, name: &str) -> Result<Family, AppError> {
        let code = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        self.create_family_with_code(user_id, name, &code)
    }

    fn create_family_with_code(
        &self,
        user_id: i64,
        name: &str,
        invite_code: &str,
    ) -> Result<Family, AppError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_FAMILY_NAME_CHARS {
            return Err(AppError::BadRequest(
                "Family name must be 1 to 20 characters".to_string(),
            ));
        }

        let user = self.current_user(user_id)?;
        if user.family_id.is_some() {
            return Err(AppError::BadRequest(
                "User already belongs to a family".to_string(),
            ));
        }

        let id = match self.inner.family_names.entry(name.to_lowercase()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict("Family name already exists".to_string()));
            }
            Entry::Vacant(slot) => {
                let id = self.next_id();
                slot.insert(id);
                id
            }
        };

        let family = MockFamily {
            id,
            name: name.to_string(),
            invite_code: invite_code.to_string(),
            member_ids: vec![user_id],
        };
        self.inner
            .invite_codes
            .insert(invite_code.to_string(), id);
        self.inner.families.insert(id, family.clone());
        if let Some(mut user) = self.inner.users.get_mut(&user_id) {
            user.family_id = Some(id);
        }

        tracing::info!(family_id = id, user_id, "Mock family created");
        Ok(family.family())
    }

    pub fn join_family(&self, user_id: i64, invite_code: &str) -> Result<Family, AppError> {
        let user = self.current_user(user_id)?;
        if user.family_id.is_some() {
            return Err(AppError::Conflict(
                "User already belongs to a family".to_string(),
            ));
        }

        let family_id = self
            .inner
            .invite_codes
            .get(&invite_code.to_uppercase())
            .map(|id| *id)
            .ok_or_else(|| AppError::NotFound("Invite code not found".to_string()))?;

        let family = {
            let mut family = self
                .inner
                .families
                .get_mut(&family_id)
                .ok_or_else(|| AppError::NotFound("Family not found".to_string()))?;
            family.member_ids.push(user_id);
            family.family()
        };
        if let Some(mut user) = self.inner.users.get_mut(&user_id) {
            user.family_id = Some(family_id);
        }

        Ok(family)
    }

    /// Parents are unique within a family; other roles may repeat.
    pub fn set_role(&self, user_id: i64, role: FamilyRole) -> Result<UserIdentity, AppError> {
        let user = self.current_user(user_id)?;
        let family_id = user
            .family_id
            .ok_or_else(|| AppError::BadRequest("Join a family before picking a role".to_string()))?;

        if matches!(role, FamilyRole::Father | FamilyRole::Mother) {
            let taken = self.members(user_id)?.members.iter().any(|m| {
                m.user_id != user_id && m.role == Some(role)
            });
            if taken {
                return Err(AppError::Conflict(format!("{} is already taken", role)));
            }
        }

        let mut entry = self
            .inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        entry.role = Some(role);
        tracing::debug!(user_id, family_id, role = %role, "Mock role set");
        Ok(entry.identity())
    }
}
