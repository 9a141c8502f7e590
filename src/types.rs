use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const DEFAULT_SESSION_TITLE: &str = "New Session";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub sources: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            timestamp: timestamp.into(),
            sources: None,
        }
    }

    pub fn ai(
        content: impl Into<String>,
        sources: Vec<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Ai,
            content: content.into(),
            timestamp: timestamp.into(),
            sources: Some(sources),
        }
    }
}

/// A persisted conversation thread. Serialized with the same camelCase layout
/// the web client writes under `rag_sessions_v1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub updated_at: Option<String>,
}

impl Session {
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            "Untitled"
        } else {
            title
        }
    }
}

/// Incoming record for `SessionStore::upsert_session`. Fields left as `None`
/// are not written over the stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpsert {
    pub id: String,
    pub title: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub created_at: Option<String>,
}

impl SessionUpsert {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export)]
pub struct UserInfo {
    #[ts(type = "number")]
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub token: Option<String>,
    pub user: Option<UserInfo>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export)]
pub struct DocumentInfo {
    pub document_id: String,
    pub filename: String,
    pub file_type: String,
    pub upload_timestamp: String,
    pub chunk_count: u32,
}

// Wire payloads for the backend API.

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationRequest<'a> {
    pub session_id: Option<&'a str>,
    pub question: &'a str,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct ConversationResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub response_timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListRequest {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export)]
pub struct DocumentListResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub documents: Vec<DocumentInfo>,
    #[serde(default)]
    pub total_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddDocumentResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub document_info: Option<DocumentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteDocumentRequest<'a> {
    pub document_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDocumentResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub deleted_document_id: Option<String>,
}
