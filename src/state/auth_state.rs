use crate::storage::{StorageTier, StorageTiers};
use crate::types::{AuthState, UserInfo};
use std::sync::{PoisonError, RwLock};

pub const TOKEN_STORAGE_KEY: &str = "rag_access_token";
pub const USER_STORAGE_KEY: &str = "rag_user_info";

/// Current bearer token and user profile.
///
/// `login` writes the pair to the tier chosen by the remember flag and clears
/// the other tier, so at most one tier ever holds a credential. Storage
/// failures never surface: reads degrade to logged-out, writes are logged.
pub struct AuthStateHolder {
    tiers: StorageTiers,
    state: RwLock<AuthState>,
}

impl AuthStateHolder {
    pub fn new(tiers: StorageTiers) -> Self {
        let state = Self::load_on_startup(&tiers);
        Self {
            tiers,
            state: RwLock::new(state),
        }
    }

    /// The token is looked up in the local tier first, then the session tier.
    /// The user profile is read from whichever tier supplied the token.
    pub fn load_on_startup(tiers: &StorageTiers) -> AuthState {
        let Some((tier, token)) = tiers.find(TOKEN_STORAGE_KEY) else {
            return AuthState::default();
        };
        let token = token.trim().to_string();
        if token.is_empty() {
            return AuthState::default();
        }

        let user = tiers
            .read(tier, USER_STORAGE_KEY)
            .and_then(|raw| match serde_json::from_str::<UserInfo>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    tracing::debug!(error = %err, "stored user profile is unreadable");
                    None
                }
            });

        AuthState {
            token: Some(token),
            user,
        }
    }

    pub fn login(&self, token: &str, user: Option<UserInfo>, remember: bool) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.token = Some(token.to_string());
            state.user = user.clone();
        }

        let tier = StorageTier::for_remember(remember);
        self.tiers.write_exclusive(tier, TOKEN_STORAGE_KEY, token);
        match user.as_ref().map(serde_json::to_string) {
            Some(Ok(raw)) => self.tiers.write_exclusive(tier, USER_STORAGE_KEY, &raw),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "failed to serialize user profile");
                self.tiers.clear_everywhere(USER_STORAGE_KEY);
            }
            None => self.tiers.clear_everywhere(USER_STORAGE_KEY),
        }
        tracing::debug!(?tier, "stored credentials");
    }

    pub fn logout(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = AuthState::default();
        }
        self.tiers.clear_everywhere(TOKEN_STORAGE_KEY);
        self.tiers.clear_everywhere(USER_STORAGE_KEY);
    }

    pub fn token(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::BrokenStorage;
    use crate::storage::{KeyValueStorage, MemoryStorage};
    use std::sync::Arc;

    fn user() -> UserInfo {
        UserInfo {
            user_id: 7,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            created_at: "2026-01-01T00:00:00".to_string(),
        }
    }

    fn holder() -> (Arc<MemoryStorage>, Arc<MemoryStorage>, AuthStateHolder) {
        let local = Arc::new(MemoryStorage::new());
        let session = Arc::new(MemoryStorage::new());
        let holder = AuthStateHolder::new(StorageTiers::new(local.clone(), session.clone()));
        (local, session, holder)
    }

    fn has_credentials(storage: &MemoryStorage) -> bool {
        storage.get(TOKEN_STORAGE_KEY).unwrap().is_some()
            || storage.get(USER_STORAGE_KEY).unwrap().is_some()
    }

    #[test]
    fn remembered_login_uses_local_tier_only() {
        let (local, session, holder) = holder();
        holder.login("tok", Some(user()), true);

        assert_eq!(local.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("tok"));
        assert!(local.get(USER_STORAGE_KEY).unwrap().is_some());
        assert!(!has_credentials(&session));
        assert!(holder.is_authenticated());
    }

    #[test]
    fn session_login_uses_session_tier_only() {
        let (local, session, holder) = holder();
        holder.login("tok", Some(user()), false);

        assert_eq!(session.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("tok"));
        assert!(session.get(USER_STORAGE_KEY).unwrap().is_some());
        assert!(!has_credentials(&local));
    }

    #[test]
    fn switching_remember_flag_clears_stale_tier() {
        let (local, session, holder) = holder();
        holder.login("first", Some(user()), true);
        holder.login("second", Some(user()), false);

        assert!(!has_credentials(&local));
        assert_eq!(session.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("second"));
        assert_eq!(holder.token().as_deref(), Some("second"));
    }

    #[test]
    fn logout_clears_both_tiers() {
        for remember in [true, false] {
            let (local, session, holder) = holder();
            holder.login("tok", Some(user()), remember);
            holder.logout();

            assert!(!has_credentials(&local));
            assert!(!has_credentials(&session));
            assert!(!holder.is_authenticated());
            assert!(holder.user().is_none());
        }
    }

    #[test]
    fn login_without_user_clears_previous_profile() {
        let (local, _session, holder) = holder();
        holder.login("tok", Some(user()), true);
        holder.login("tok2", None, true);

        assert!(holder.user().is_none());
        assert!(local.get(USER_STORAGE_KEY).unwrap().is_none());
        assert!(holder.is_authenticated());
    }

    #[test]
    fn startup_restores_from_either_tier() {
        let (local, session, holder) = holder();
        holder.login("tok", Some(user()), true);
        let restored = AuthStateHolder::new(StorageTiers::new(local, session));
        assert_eq!(restored.token().as_deref(), Some("tok"));
        assert_eq!(restored.user(), Some(user()));

        let (local, session, holder) = self::holder();
        holder.login("tok", Some(user()), false);
        let restored = AuthStateHolder::new(StorageTiers::new(local, session));
        assert_eq!(restored.token().as_deref(), Some("tok"));
        assert_eq!(restored.user(), Some(user()));
    }

    #[test]
    fn startup_reads_user_from_the_token_tier() {
        let local = Arc::new(MemoryStorage::new());
        let session = Arc::new(MemoryStorage::new());
        session.set(TOKEN_STORAGE_KEY, "tok").unwrap();
        local
            .set(USER_STORAGE_KEY, &serde_json::to_string(&user()).unwrap())
            .unwrap();

        let state = AuthStateHolder::load_on_startup(&StorageTiers::new(local, session));
        assert_eq!(state.token.as_deref(), Some("tok"));
        assert!(state.user.is_none());
    }

    #[test]
    fn blank_local_token_falls_back_to_session_tier() {
        let local = Arc::new(MemoryStorage::new());
        let session = Arc::new(MemoryStorage::new());
        local.set(TOKEN_STORAGE_KEY, "").unwrap();
        session.set(TOKEN_STORAGE_KEY, "tok").unwrap();

        let state = AuthStateHolder::load_on_startup(&StorageTiers::new(local, session));
        assert_eq!(state.token.as_deref(), Some("tok"));
    }

    #[test]
    fn unreadable_storage_starts_logged_out() {
        let holder = AuthStateHolder::new(StorageTiers::new(
            Arc::new(BrokenStorage),
            Arc::new(BrokenStorage),
        ));
        assert!(!holder.is_authenticated());

        holder.login("tok", None, true);
        assert_eq!(holder.token().as_deref(), Some("tok"));
        holder.logout();
        assert!(!holder.is_authenticated());
    }

    #[test]
    fn corrupt_user_profile_is_ignored() {
        let local = Arc::new(MemoryStorage::new());
        local.set(TOKEN_STORAGE_KEY, "tok").unwrap();
        local.set(USER_STORAGE_KEY, "{oops").unwrap();

        let state = AuthStateHolder::load_on_startup(&StorageTiers::new(
            local,
            Arc::new(MemoryStorage::new()),
        ));
        assert!(state.is_authenticated());
        assert!(state.user.is_none());
    }
}
