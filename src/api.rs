use crate::http::{ApiRequest, FilePart, HttpError, HttpGateway};
use crate::types::{
  AddDocumentResponse, ConversationRequest, ConversationResponse, DeleteDocumentRequest,
  DeleteDocumentResponse, DocumentListRequest, DocumentListResponse, ForgotPasswordRequest,
  LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, ResetPasswordRequest,
  StatusResponse,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_REGISTER: &str = "/api/auth/register";
pub const PATH_FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const PATH_RESET_PASSWORD: &str = "/api/auth/reset-password";
pub const PATH_CONVERSATION: &str = "/api/conversation";
pub const PATH_DOCUMENTS_LIST: &str = "/api/documents/list";
pub const PATH_DOCUMENTS_ADD: &str = "/api/documents/add";
pub const PATH_DOCUMENTS_DELETE: &str = "/api/documents/delete";

#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Http(#[from] HttpError),
  #[error("unexpected response body: {0}")]
  Decode(#[from] serde_json::Error),
  #[error("{0}")]
  Rejected(String),
}

impl ApiError {
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, ApiError::Http(err) if err.is_unauthorized())
  }

  /// Message suitable for showing to the user: the backend's `detail` when it
  /// sent one, otherwise the error itself.
  pub fn user_message(&self) -> String {
    match self {
      ApiError::Http(err) => err.detail().unwrap_or_else(|| err.to_string()),
      other => other.to_string(),
    }
  }
}

pub(crate) fn rejected(message: &str, fallback: &str) -> ApiError {
  let message = message.trim();
  ApiError::Rejected(if message.is_empty() {
    fallback.to_string()
  } else {
    message.to_string()
  })
}

pub struct RagApiClient {
  gateway: HttpGateway,
}

impl RagApiClient {
  pub fn new(gateway: HttpGateway) -> Self {
    Self { gateway }
  }

  async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
    let res = self.gateway.execute(&request).await?;
    Ok(res.json()?)
  }

  pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let body = LoginRequest { username, password };
    self
      .call(ApiRequest::json(Method::POST, PATH_LOGIN, &body)?)
      .await
  }

  pub async fn register(
    &self,
    username: &str,
    email: &str,
    password: &str,
  ) -> Result<RegisterResponse, ApiError> {
    let body = RegisterRequest {
      username,
      email,
      password,
    };
    self
      .call(ApiRequest::json(Method::POST, PATH_REGISTER, &body)?)
      .await
  }

  pub async fn forgot_password(&self, email: &str) -> Result<StatusResponse, ApiError> {
    let body = ForgotPasswordRequest { email };
    self
      .call(ApiRequest::json(Method::POST, PATH_FORGOT_PASSWORD, &body)?)
      .await
  }

  pub async fn reset_password(
    &self,
    token: &str,
    new_password: &str,
  ) -> Result<StatusResponse, ApiError> {
    let body = ResetPasswordRequest {
      token,
      new_password,
    };
    self
      .call(ApiRequest::json(Method::POST, PATH_RESET_PASSWORD, &body)?)
      .await
  }

  pub async fn ask(
    &self,
    session_id: Option<&str>,
    question: &str,
  ) -> Result<ConversationResponse, ApiError> {
    let body = ConversationRequest {
      session_id,
      question,
    };
    self
      .call(ApiRequest::json(Method::POST, PATH_CONVERSATION, &body)?)
      .await
  }

  pub async fn list_documents(
    &self,
    limit: u32,
    offset: u32,
  ) -> Result<DocumentListResponse, ApiError> {
    let body = DocumentListRequest { limit, offset };
    self
      .call(ApiRequest::json(Method::POST, PATH_DOCUMENTS_LIST, &body)?)
      .await
  }

  pub async fn add_document(&self, file: FilePart) -> Result<AddDocumentResponse, ApiError> {
    self
      .call(ApiRequest::multipart(PATH_DOCUMENTS_ADD, file))
      .await
  }

  pub async fn delete_document(
    &self,
    document_id: &str,
  ) -> Result<DeleteDocumentResponse, ApiError> {
    let body = DeleteDocumentRequest { document_id };
    self
      .call(ApiRequest::json(Method::DELETE, PATH_DOCUMENTS_DELETE, &body)?)
      .await
  }

  pub async fn health(&self) -> Result<serde_json::Value, ApiError> {
    self.call(ApiRequest::get("/")).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::tests::ScriptedTransport;
  use crate::http::RequestBody;
  use serde_json::json;
  use std::sync::Arc;

  fn client() -> (Arc<ScriptedTransport>, RagApiClient) {
    let transport = Arc::new(ScriptedTransport::new());
    let client = RagApiClient::new(HttpGateway::new(transport.clone()));
    (transport, client)
  }

  #[tokio::test]
  async fn ask_posts_session_and_question() {
    let (transport, client) = client();
    transport.push_ok(json!({
      "success": true,
      "message": "ok",
      "session_id": "s-1",
      "question": "What?",
      "answer": "That.",
      "sources": ["a.pdf"],
      "response_timestamp": "2026-01-01T00:00:00"
    }));

    let res = client.ask(None, "What?").await.unwrap();
    assert_eq!(res.session_id, "s-1");
    assert_eq!(res.sources, vec!["a.pdf"]);

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::POST);
    assert_eq!(sent.path, PATH_CONVERSATION);
    match &sent.body {
      RequestBody::Json(body) => {
        assert_eq!(body["question"], "What?");
        assert!(body["session_id"].is_null());
      }
      other => panic!("unexpected body {other:?}"),
    }
  }

  #[tokio::test]
  async fn delete_uses_delete_method_with_body() {
    let (transport, client) = client();
    transport.push_ok(json!({"success": true, "message": "gone", "deleted_document_id": "d1"}));

    let res = client.delete_document("d1").await.unwrap();
    assert_eq!(res.deleted_document_id.as_deref(), Some("d1"));

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::DELETE);
    assert!(matches!(&sent.body, RequestBody::Json(body) if body["document_id"] == "d1"));
  }

  #[tokio::test]
  async fn malformed_body_is_a_decode_error() {
    let (transport, client) = client();
    transport.push_ok(json!({"unexpected": true}));
    let err = client.list_documents(10, 0).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
  }

  #[tokio::test]
  async fn http_errors_keep_backend_detail() {
    let (transport, client) = client();
    transport.push_status(400, r#"{"detail":"Username already registered"}"#);
    let err = client
      .register("ada", "ada@example.com", "password123")
      .await
      .unwrap_err();
    assert_eq!(err.user_message(), "Username already registered");
    assert!(!err.is_unauthorized());
  }
}
