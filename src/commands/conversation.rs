use crate::api::{rejected, ApiError};
use crate::state::AppState;
use crate::types::{ChatMessage, Role, SessionUpsert, DEFAULT_SESSION_TITLE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

const TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("a question is already being answered")]
    Busy,
    #[error("please enter a question")]
    EmptyQuestion,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Default)]
struct ConversationView {
    session_id: Option<String>,
    messages: Vec<ChatMessage>,
}

pub struct ConversationController {
    state: AppState,
    view: Mutex<ConversationView>,
    loading: AtomicBool,
}

impl ConversationController {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            view: Mutex::new(ConversationView::default()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.view().session_id.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.view().messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    fn view(&self) -> std::sync::MutexGuard<'_, ConversationView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shows a stored session. Returns false when the id is unknown; the view
    /// then starts empty under that id.
    pub fn open(&self, session_id: &str) -> bool {
        let stored = self.state.sessions.get_session(session_id);
        let found = stored.is_some();
        let mut view = self.view();
        view.session_id = Some(session_id.to_string());
        view.messages = stored.map(|s| s.messages).unwrap_or_default();
        found
    }

    pub fn start_new(&self) {
        *self.view() = ConversationView::default();
    }

    pub async fn send(&self, question: &str) -> Result<ChatMessage, ConversationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ConversationError::EmptyQuestion);
        }
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConversationError::Busy);
        }
        let _loading = scopeguard::guard(&self.loading, |flag| {
            flag.store(false, Ordering::Release)
        });

        let (asked_in, mut transcript) = {
            let mut view = self.view();
            view.messages
                .push(ChatMessage::user(question, crate::formatters::now_iso()));
            (view.session_id.clone(), view.messages.clone())
        };

        let res = self.state.api.ask(asked_in.as_deref(), question).await?;
        if !res.success {
            return Err(rejected(&res.message, "No answer was returned.").into());
        }

        let answer = ChatMessage::ai(res.answer, res.sources, res.response_timestamp);
        transcript.push(answer.clone());

        {
            let mut view = self.view();
            if view.session_id == asked_in {
                view.session_id = Some(res.session_id.clone());
                view.messages = transcript.clone();
            }
        }

        let title = derive_title(&transcript);
        self.state.sessions.upsert_session(
            SessionUpsert::new(res.session_id)
                .title(title)
                .messages(transcript),
        );
        Ok(answer)
    }
}

pub fn derive_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ApiRequest, ApiResponse, HttpError, Transport};
    use crate::settings::{SettingsStore, SETTINGS_STORE_FILE};
    use crate::state::test_app;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn answer(session_id: &str) -> serde_json::Value {
        json!({
            "success": true,
            "message": "ok",
            "session_id": session_id,
            "question": "q",
            "answer": "The answer.",
            "sources": ["guide.pdf"],
            "response_timestamp": "2026-03-01T10:00:00"
        })
    }

    #[tokio::test]
    async fn send_adopts_session_and_persists_turn() {
        let app = test_app();
        app.transport.push_ok(answer("srv-1"));
        let controller = ConversationController::new(app.state.clone());

        let reply = controller.send("  What does the guide say about setup?  ").await.unwrap();
        assert_eq!(reply.role, Role::Ai);
        assert_eq!(reply.sources.as_deref(), Some(&["guide.pdf".to_string()][..]));
        assert_eq!(reply.timestamp, "2026-03-01T10:00:00");
        assert_eq!(controller.session_id().as_deref(), Some("srv-1"));
        assert_eq!(controller.messages().len(), 2);

        let stored = app.state.sessions.get_session("srv-1").unwrap();
        assert_eq!(stored.title, "What does the guide say about setup?");
        assert_eq!(stored.messages.len(), 2);
        assert!(stored.created_at.is_some());
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn follow_up_reuses_session_id() {
        let app = test_app();
        app.transport.push_ok(answer("srv-1"));
        app.transport.push_ok(answer("srv-1"));
        let controller = ConversationController::new(app.state.clone());

        controller.send("first").await.unwrap();
        controller.send("second").await.unwrap();

        let requests = app.transport.requests();
        assert!(matches!(
            &requests[1].body,
            crate::http::RequestBody::Json(body) if body["session_id"] == "srv-1"
        ));
        let stored = app.state.sessions.get_session("srv-1").unwrap();
        assert_eq!(stored.messages.len(), 4);
        assert_eq!(stored.title, "first");
        assert_eq!(app.state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_user_message_and_skips_persistence() {
        let app = test_app();
        app.transport.push_status(500, r#"{"detail":"boom"}"#);
        let controller = ConversationController::new(app.state.clone());

        let err = controller.send("hello").await.unwrap_err();
        assert!(matches!(err, ConversationError::Api(_)));
        let messages = controller.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(app.state.sessions.is_empty());
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn empty_question_is_rejected_locally() {
        let app = test_app();
        let controller = ConversationController::new(app.state.clone());
        assert!(matches!(
            controller.send("   ").await,
            Err(ConversationError::EmptyQuestion)
        ));
        assert!(app.transport.requests().is_empty());
        assert!(controller.messages().is_empty());
    }

    #[tokio::test]
    async fn open_loads_stored_messages() {
        let app = test_app();
        app.transport.push_ok(answer("srv-9"));
        let first = ConversationController::new(app.state.clone());
        first.send("hi").await.unwrap();

        let second = ConversationController::new(app.state.clone());
        assert!(second.open("srv-9"));
        assert_eq!(second.messages().len(), 2);
        assert!(!second.open("missing"));
        assert!(second.messages().is_empty());

        second.start_new();
        assert_eq!(second.session_id(), None);
    }

    #[test]
    fn title_is_first_user_message_truncated() {
        let long = "x".repeat(60);
        let messages = vec![
            ChatMessage::ai("greeting", vec![], "t"),
            ChatMessage::user(long, "t"),
        ];
        assert_eq!(derive_title(&messages).chars().count(), 40);
        assert_eq!(derive_title(&[]), DEFAULT_SESSION_TITLE);
    }

    struct HeldTransport {
        release: Notify,
    }

    #[async_trait]
    impl Transport for HeldTransport {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, HttpError> {
            self.release.notified().await;
            Ok(ApiResponse {
                status: 200,
                body: answer("held").to_string(),
            })
        }
    }

    #[tokio::test]
    async fn overlapping_send_is_busy() {
        let dir = tempfile::TempDir::new().unwrap();
        let transport = Arc::new(HeldTransport {
            release: Notify::new(),
        });
        let local = Arc::new(MemoryStorage::new());
        let (state, _routes) = AppState::from_parts(
            SettingsStore::open(dir.path().join(SETTINGS_STORE_FILE)),
            local.clone(),
            local,
            Arc::new(MemoryStorage::new()),
            transport.clone(),
        );
        let controller = Arc::new(ConversationController::new(state));

        let pending = tokio::spawn({
            let controller = controller.clone();
            async move { controller.send("first").await }
        });
        while !controller.is_loading() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            controller.send("second").await,
            Err(ConversationError::Busy)
        ));

        transport.release.notify_one();
        pending.await.unwrap().unwrap();
        assert!(!controller.is_loading());
        assert_eq!(controller.messages().len(), 2);
    }
}
