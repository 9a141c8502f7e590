use super::{ApiRequest, ApiResponse, HttpError, RequestBody};
use crate::redact::redact_secrets;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::multipart::{Form, Part};
use std::time::Duration;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. Non-2xx responses come back as
    /// `HttpError::Status` carrying the raw body.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn network_error(err: reqwest::Error) -> HttpError {
    HttpError::Network(redact_secrets(&err.to_string()).into_owned())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(
                USER_AGENT,
                HeaderValue::from_static(concat!("ragdesk/", env!("CARGO_PKG_VERSION"))),
            )
            .headers(request.headers.clone());

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime)
                    .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
                builder.multipart(Form::new().part(file.field.clone(), part))
            }
        };

        let res = builder.send().await.map_err(network_error)?;
        let status = res.status();
        let body = res.text().await.map_err(network_error)?;

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}
