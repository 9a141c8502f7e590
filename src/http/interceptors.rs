use super::{ApiRequest, ApiResponse, HttpError, Interceptor, Next};
use crate::redact::redact_secrets;
use crate::routes::Route;
use crate::state::{AuthStateHolder, NavigationBus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Attaches the current bearer token and reacts to 401 responses by logging
/// out and sending the front end to the login route. The error itself is
/// always returned to the caller.
pub struct AuthInterceptor {
    auth: Arc<AuthStateHolder>,
    navigation: NavigationBus,
}

impl AuthInterceptor {
    pub fn new(auth: Arc<AuthStateHolder>, navigation: NavigationBus) -> Self {
        Self { auth, navigation }
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn intercept(
        &self,
        request: &ApiRequest,
        next: Next<'_>,
    ) -> Result<ApiResponse, HttpError> {
        let result = match self.auth.token() {
            Some(token) => match request.with_bearer(&token) {
                Ok(authed) => next.run(&authed).await,
                Err(err) => {
                    tracing::warn!(path = %request.path, "stored token is unusable; logging out");
                    self.auth.logout();
                    self.navigation.navigate(Route::Login);
                    return Err(err);
                }
            },
            None => next.run(request).await,
        };

        if let Err(err) = &result {
            if err.is_unauthorized() {
                tracing::info!(path = %request.path, "credential rejected; logging out");
                self.auth.logout();
                self.navigation.navigate(Route::Login);
            }
        }
        result
    }
}

#[derive(Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        request: &ApiRequest,
        next: Next<'_>,
    ) -> Result<ApiResponse, HttpError> {
        let started = Instant::now();
        let result = next.run(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(res) => tracing::info!(
                method = %request.method,
                path = %request.path,
                status = res.status,
                elapsed_ms,
                "[HTTP] {} {} ({}) {}ms",
                request.method,
                request.path,
                res.status,
                elapsed_ms
            ),
            Err(err) => {
                let body = match err {
                    HttpError::Status { body, .. } => redact_secrets(body).into_owned(),
                    _ => String::new(),
                };
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    elapsed_ms,
                    error = %err,
                    body = %body,
                    "[HTTP ERROR] {} {} {}ms",
                    request.method,
                    request.path,
                    elapsed_ms
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::ScriptedTransport;
    use crate::http::HttpGateway;
    use crate::storage::{KeyValueStorage, MemoryStorage, StorageTiers};
    use crate::types::UserInfo;

    struct Fixture {
        local: Arc<MemoryStorage>,
        session: Arc<MemoryStorage>,
        auth: Arc<AuthStateHolder>,
        transport: Arc<ScriptedTransport>,
        gateway: HttpGateway,
        routes: tokio::sync::mpsc::UnboundedReceiver<Route>,
    }

    fn fixture() -> Fixture {
        let local = Arc::new(MemoryStorage::new());
        let session = Arc::new(MemoryStorage::new());
        let auth = Arc::new(AuthStateHolder::new(StorageTiers::new(
            local.clone(),
            session.clone(),
        )));
        let (navigation, routes) = NavigationBus::new();
        let transport = Arc::new(ScriptedTransport::new());
        let gateway = HttpGateway::new(transport.clone())
            .with_stage(Arc::new(AuthInterceptor::new(auth.clone(), navigation)))
            .with_stage(Arc::new(LoggingInterceptor));
        Fixture {
            local,
            session,
            auth,
            transport,
            gateway,
            routes,
        }
    }

    fn user() -> UserInfo {
        UserInfo {
            user_id: 1,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            created_at: "2026-01-01T00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn attaches_bearer_to_a_copy() {
        let f = fixture();
        f.auth.login("tok-1", Some(user()), true);
        f.transport.push_ok(serde_json::json!({"success": true}));

        let request = ApiRequest::get("/api/documents/list");
        f.gateway.execute(&request).await.unwrap();

        assert!(request.bearer_token().is_none());
        assert_eq!(f.transport.requests()[0].bearer_token(), Some("tok-1"));
    }

    #[tokio::test]
    async fn anonymous_requests_carry_no_header() {
        let f = fixture();
        f.transport.push_ok(serde_json::json!({"success": true}));
        f.gateway
            .execute(&ApiRequest::get("/api/auth/login"))
            .await
            .unwrap();
        assert!(f.transport.requests()[0].bearer_token().is_none());
    }

    #[tokio::test]
    async fn unauthorized_logs_out_navigates_and_returns_error() {
        let mut f = fixture();
        f.auth.login("expired", Some(user()), false);
        f.transport.push_status(401, r#"{"detail":"Could not validate credentials"}"#);

        let err = f
            .gateway
            .execute(&ApiRequest::get("/api/documents/list"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            HttpError::Status {
                status: 401,
                body: r#"{"detail":"Could not validate credentials"}"#.to_string(),
            }
        );
        assert!(!f.auth.is_authenticated());
        assert!(f.session.get("rag_access_token").unwrap().is_none());
        assert!(f.local.get("rag_access_token").unwrap().is_none());
        assert_eq!(f.routes.try_recv().unwrap(), Route::Login);
    }

    #[tokio::test]
    async fn server_errors_pass_through_untouched() {
        let mut f = fixture();
        f.auth.login("tok", Some(user()), true);
        f.transport.push_status(500, "Internal Server Error");

        let err = f
            .gateway
            .execute(&ApiRequest::get("/api/conversation"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(
            err,
            HttpError::Status {
                status: 500,
                body: "Internal Server Error".to_string(),
            }
        );
        assert_eq!(f.auth.token().as_deref(), Some("tok"));
        assert_eq!(f.local.get("rag_access_token").unwrap().as_deref(), Some("tok"));
        assert!(f.routes.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_token_logs_out_instead_of_sticking() {
        let mut f = fixture();
        f.auth.login("tok\nbroken", Some(user()), true);

        let err = f
            .gateway
            .execute(&ApiRequest::get("/api/documents/list"))
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::InvalidRequest(_)));
        assert!(!f.auth.is_authenticated());
        assert!(f.local.get("rag_access_token").unwrap().is_none());
        assert_eq!(f.routes.try_recv().unwrap(), Route::Login);
        assert!(f.transport.requests().is_empty());

        f.transport.push_ok(serde_json::json!({"success": true}));
        f.gateway
            .execute(&ApiRequest::get("/api/documents/list"))
            .await
            .unwrap();
        assert!(f.transport.requests()[0].bearer_token().is_none());
    }

    #[tokio::test]
    async fn unauthorized_without_listener_still_logs_out() {
        let f = fixture();
        let Fixture {
            auth,
            transport,
            gateway,
            routes,
            ..
        } = f;
        drop(routes);
        auth.login("tok", None, true);
        transport.push_status(401, "");

        assert!(gateway.execute(&ApiRequest::get("/")).await.is_err());
        assert!(!auth.is_authenticated());
    }
}
