//! Request pipeline between the API client and the network.
//!
//! A request passes through each `Interceptor` stage in order before reaching
//! the `Transport`. Stages borrow the request and forward either it or a
//! modified clone, so a caller's request is never altered in place.

mod interceptors;
mod transport;

pub use interceptors::{AuthInterceptor, LoggingInterceptor};
pub use transport::{ReqwestTransport, Transport};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("request failed with HTTP {status}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// The `detail` message from an error body, when the backend sent one.
    pub fn detail(&self) -> Option<String> {
        let HttpError::Status { body, .. } = self else {
            return None;
        };
        let json: serde_json::Value = serde_json::from_str(body).ok()?;
        let detail = json.get("detail")?.as_str()?.trim();
        (!detail.is_empty()).then(|| detail.to_string())
    }
}

#[derive(Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(FilePart),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn json<T: Serialize>(
        method: Method,
        path: impl Into<String>,
        body: &T,
    ) -> Result<Self, HttpError> {
        let value =
            serde_json::to_value(body).map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        let mut request = Self::new(method, path);
        request.body = RequestBody::Json(value);
        Ok(request)
    }

    pub fn multipart(path: impl Into<String>, file: FilePart) -> Self {
        let mut request = Self::new(Method::POST, path);
        request.body = RequestBody::Multipart(file);
        request
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_bearer(&self, token: &str) -> Result<Self, HttpError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HttpError::InvalidRequest("token is not a valid header value".into()))?;
        Ok(self.clone().with_header(AUTHORIZATION, value))
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        request: &ApiRequest,
        next: Next<'_>,
    ) -> Result<ApiResponse, HttpError>;
}

pub struct Next<'a> {
    stages: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    pub async fn run(self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    transport: self.transport,
                };
                stage.intercept(request, next).await
            }
            None => self.transport.send(request).await,
        }
    }
}

pub struct HttpGateway {
    transport: Arc<dyn Transport>,
    stages: Vec<Arc<dyn Interceptor>>,
}

impl HttpGateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            stages: vec![],
        }
    }

    pub fn with_stage(mut self, stage: Arc<dyn Interceptor>) -> Self {
        self.stages.push(stage);
        self
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        Next {
            stages: &self.stages,
            transport: self.transport.as_ref(),
        }
        .run(request)
        .await
    }
}
