use super::{CommandError, CommandResult};
use crate::api::rejected;
use crate::state::AppState;
use crate::types::UserInfo;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Signs in and stores the credential pair in the tier picked by `remember`.
/// The pair is only kept when the backend reports success and returns a token.
pub async fn login(
    state: &AppState,
    username: &str,
    password: &str,
    remember: bool,
) -> CommandResult<Option<UserInfo>> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(CommandError::Validation(
            "Please enter both username and password.",
        ));
    }

    let res = state.api.login(username, password).await?;
    let token = res
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match token {
        Some(token) if res.success => {
            state.auth.login(token, res.user_info.clone(), remember);
            tracing::info!(username, remember, "signed in");
            Ok(res.user_info)
        }
        _ => Err(rejected(&res.message, "Login failed.").into()),
    }
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> CommandResult<()> {
    if username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(CommandError::Validation(
            "Username must be at least 3 characters.",
        ));
    }
    if !email.contains('@') {
        return Err(CommandError::Validation("Please enter a valid email."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CommandError::Validation(
            "Password must be at least 8 characters.",
        ));
    }
    Ok(())
}

pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> CommandResult<String> {
    validate_registration(username, email, password)?;
    let res = state
        .api
        .register(username.trim(), email.trim(), password)
        .await?;
    if !res.success {
        return Err(rejected(&res.message, "Registration failed.").into());
    }
    Ok(res.message)
}

pub async fn forgot_password(state: &AppState, email: &str) -> CommandResult<String> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(CommandError::Validation("Please enter a valid email."));
    }
    let res = state.api.forgot_password(email).await?;
    if !res.success {
        return Err(rejected(&res.message, "Request failed.").into());
    }
    Ok(res.message)
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> CommandResult<String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CommandError::Validation("Reset token is required."));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CommandError::Validation(
            "Password must be at least 8 characters.",
        ));
    }
    let res = state.api.reset_password(token, new_password).await?;
    if !res.success {
        return Err(rejected(&res.message, "Password reset failed.").into());
    }
    Ok(res.message)
}

pub fn logout(state: &AppState) {
    state.auth.logout();
}

/// The signed-in profile, if any. `Some(None)` means a token without a
/// stored profile.
pub fn whoami(state: &AppState) -> Option<Option<UserInfo>> {
    let snapshot = state.auth.snapshot();
    snapshot.is_authenticated().then_some(snapshot.user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::state::{test_app, TOKEN_STORAGE_KEY};
    use crate::storage::KeyValueStorage;
    use serde_json::json;

    fn user_json() -> serde_json::Value {
        json!({
            "user_id": 7,
            "username": "ada",
            "email": "ada@example.com",
            "created_at": "2026-01-01T00:00:00"
        })
    }

    #[tokio::test]
    async fn login_stores_pair_in_selected_tier() {
        let app = test_app();
        app.transport.push_ok(json!({
            "success": true,
            "message": "ok",
            "user_info": user_json(),
            "access_token": "tok",
            "token_type": "bearer"
        }));

        let user = login(&app.state, " ada ", "secret", false).await.unwrap();
        assert_eq!(user.unwrap().username, "ada");
        assert_eq!(app.state.auth.token().as_deref(), Some("tok"));
        assert_eq!(app.session.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("tok"));
        assert_eq!(app.local.get(TOKEN_STORAGE_KEY).unwrap(), None);

        let sent = &app.transport.requests()[0];
        assert!(matches!(
            &sent.body,
            crate::http::RequestBody::Json(body) if body["username"] == "ada"
        ));
    }

    #[tokio::test]
    async fn login_without_token_is_rejected() {
        let app = test_app();
        app.transport
            .push_ok(json!({"success": false, "message": "Invalid username or password"}));

        let err = login(&app.state, "ada", "wrong", true).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Api(ApiError::Rejected(ref m)) if m == "Invalid username or password"
        ));
        assert!(!app.state.auth.is_authenticated());
    }

    #[tokio::test]
    async fn success_without_token_is_not_a_login() {
        let app = test_app();
        app.transport.push_ok(json!({"success": true, "message": ""}));
        let err = login(&app.state, "ada", "pw", true).await.unwrap_err();
        assert_eq!(err.user_message(), "Login failed.");
        assert!(!app.state.auth.is_authenticated());
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_backend() {
        let app = test_app();
        assert!(login(&app.state, "  ", "pw", true).await.is_err());
        assert!(register(&app.state, "ab", "a@b.c", "password1").await.is_err());
        assert!(register(&app.state, "abc", "nope", "password1").await.is_err());
        assert!(register(&app.state, "abc", "a@b.c", "short").await.is_err());
        assert!(forgot_password(&app.state, "nope").await.is_err());
        assert!(reset_password(&app.state, "", "password1").await.is_err());
        assert!(app.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn register_does_not_sign_in() {
        let app = test_app();
        app.transport.push_ok(json!({
            "success": true,
            "message": "User registered successfully",
            "user_info": user_json()
        }));
        let message = register(&app.state, "ada", "ada@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(message, "User registered successfully");
        assert!(!app.state.auth.is_authenticated());
    }

    #[tokio::test]
    async fn reset_password_sends_token_and_new_password() {
        let app = test_app();
        app.transport
            .push_ok(json!({"success": true, "message": "Password updated"}));
        reset_password(&app.state, "reset-tok", "password123")
            .await
            .unwrap();
        let sent = &app.transport.requests()[0];
        assert!(matches!(
            &sent.body,
            crate::http::RequestBody::Json(body)
                if body["token"] == "reset-tok" && body["new_password"] == "password123"
        ));
    }

    #[test]
    fn whoami_reflects_auth_state() {
        let app = test_app();
        assert_eq!(whoami(&app.state), None);
        app.state.auth.login("tok", None, true);
        assert_eq!(whoami(&app.state), Some(None));
        logout(&app.state);
        assert_eq!(whoami(&app.state), None);
    }
}
