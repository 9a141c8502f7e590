use crate::formatters::relative_time;
use crate::state::AppState;
use crate::types::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated: String,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: session.display_title().to_string(),
            message_count: session.messages.len(),
            updated: session
                .updated_at
                .as_deref()
                .map(relative_time)
                .unwrap_or_else(|| "--".to_string()),
        }
    }
}

pub fn list(state: &AppState) -> Vec<SessionSummary> {
    state
        .sessions
        .sessions()
        .iter()
        .map(SessionSummary::from)
        .collect()
}

pub fn show(state: &AppState, id: &str) -> Option<Session> {
    state.sessions.get_session(id.trim())
}

pub fn remove(state: &AppState, id: &str) -> bool {
    state.sessions.remove_session(id.trim())
}
