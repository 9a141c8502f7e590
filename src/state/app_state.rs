use super::{AuthStateHolder, NavigationBus, SessionStore};
use crate::api::RagApiClient;
use crate::http::{AuthInterceptor, HttpGateway, LoggingInterceptor, ReqwestTransport, Transport};
use crate::preferences::Preferences;
use crate::routes::Route;
use crate::settings::{CredentialStore, SettingsStore};
use crate::storage::{FileStorage, KeyValueStorage, KeyringStorage, MemoryStorage, StorageTiers};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const LOCAL_STORAGE_FILE: &str = "local_storage.json";

/// Everything the front ends share. Built once at start-up and passed by
/// reference; only the stores' own methods mutate their state.
#[derive(Clone)]
pub struct AppState {
    pub settings: SettingsStore,
    pub sessions: Arc<SessionStore>,
    pub auth: Arc<AuthStateHolder>,
    pub preferences: Preferences,
    pub api: Arc<RagApiClient>,
    pub navigation: NavigationBus,
}

impl AppState {
    pub fn open(
        settings: SettingsStore,
        data_dir: &Path,
        base_url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Route>), reqwest::Error> {
        let timeout = Duration::from_secs(settings.request_timeout_seconds());
        let transport = Arc::new(ReqwestTransport::new(base_url, timeout)?);

        let local: Arc<dyn KeyValueStorage> =
            Arc::new(FileStorage::new(data_dir.join(LOCAL_STORAGE_FILE)));
        let credentials = credential_storage(settings.credential_store(), &local);

        Ok(Self::from_parts(
            settings,
            local,
            credentials,
            Arc::new(MemoryStorage::new()),
            transport,
        ))
    }

    pub fn from_parts(
        settings: SettingsStore,
        local: Arc<dyn KeyValueStorage>,
        credentials: Arc<dyn KeyValueStorage>,
        session: Arc<dyn KeyValueStorage>,
        transport: Arc<dyn Transport>,
    ) -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (navigation, routes) = NavigationBus::new();
        let auth = Arc::new(AuthStateHolder::new(StorageTiers::new(credentials, session)));

        let gateway = HttpGateway::new(transport)
            .with_stage(Arc::new(AuthInterceptor::new(
                auth.clone(),
                navigation.clone(),
            )))
            .with_stage(Arc::new(LoggingInterceptor));

        let state = Self {
            settings,
            sessions: Arc::new(SessionStore::new(local.clone())),
            auth,
            preferences: Preferences::new(local),
            api: Arc::new(RagApiClient::new(gateway)),
            navigation,
        };
        (state, routes)
    }

    pub fn remember_me(&self) -> bool {
        self.settings.remember_me()
    }

    pub fn documents_page_size(&self) -> u32 {
        self.settings.documents_page_size()
    }
}

fn credential_storage(
    store: CredentialStore,
    local: &Arc<dyn KeyValueStorage>,
) -> Arc<dyn KeyValueStorage> {
    match store {
        CredentialStore::Keyring => {
            let keyring = KeyringStorage::new();
            if keyring.is_available() {
                return Arc::new(keyring);
            }
            tracing::warn!("OS keyring unavailable; storing credentials in the data directory");
            local.clone()
        }
        CredentialStore::File => local.clone(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::tests::ScriptedTransport;
    use crate::settings::SETTINGS_STORE_FILE;
    use crate::types::SessionUpsert;
    use tempfile::TempDir;

    pub(crate) struct TestApp {
        pub state: AppState,
        pub routes: mpsc::UnboundedReceiver<Route>,
        pub transport: Arc<ScriptedTransport>,
        pub local: Arc<MemoryStorage>,
        pub session: Arc<MemoryStorage>,
        _dir: TempDir,
    }

    pub(crate) fn test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let settings = SettingsStore::open(dir.path().join(SETTINGS_STORE_FILE));
        let local = Arc::new(MemoryStorage::new());
        let session = Arc::new(MemoryStorage::new());
        let transport = Arc::new(ScriptedTransport::new());
        let (state, routes) = AppState::from_parts(
            settings,
            local.clone(),
            local.clone(),
            session.clone(),
            transport.clone(),
        );
        TestApp {
            state,
            routes,
            transport,
            local,
            session,
            _dir: dir,
        }
    }

    #[test]
    fn instances_are_isolated() {
        let a = test_app();
        let b = test_app();
        a.state.sessions.upsert_session(SessionUpsert::new("s1"));
        a.state.auth.login("tok", None, true);
        assert!(b.state.sessions.is_empty());
        assert!(!b.state.auth.is_authenticated());
    }

    #[test]
    fn open_uses_file_tier_under_data_dir() {
        let dir = TempDir::new().unwrap();
        let settings = SettingsStore::open(dir.path().join(SETTINGS_STORE_FILE));
        let (state, _routes) =
            AppState::open(settings, dir.path(), "http://localhost:8000").unwrap();
        state.auth.login("tok", None, true);
        state.sessions.upsert_session(SessionUpsert::new("s1").title("Hi"));

        let raw = std::fs::read_to_string(dir.path().join(LOCAL_STORAGE_FILE)).unwrap();
        assert!(raw.contains("rag_access_token"));
        assert!(raw.contains("rag_sessions_v1"));

        let settings = SettingsStore::open(dir.path().join(SETTINGS_STORE_FILE));
        let (reopened, _routes) =
            AppState::open(settings, dir.path(), "http://localhost:8000").unwrap();
        assert_eq!(reopened.auth.token().as_deref(), Some("tok"));
        assert_eq!(reopened.sessions.len(), 1);
    }
}
