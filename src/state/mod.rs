mod app_state;
mod auth_state;
mod navigation_bus;
mod session_store;

pub use app_state::{AppState, LOCAL_STORAGE_FILE};
pub use auth_state::{AuthStateHolder, TOKEN_STORAGE_KEY, USER_STORAGE_KEY};
pub use navigation_bus::NavigationBus;
pub use session_store::{SessionStore, SESSIONS_STORAGE_KEY};

#[cfg(test)]
pub(crate) use app_state::tests::{test_app, TestApp};
