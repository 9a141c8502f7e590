use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    ForgotPassword,
    Conversation { session_id: Option<String> },
    Documents,
}

impl Route {
    pub fn conversation() -> Self {
        Route::Conversation { session_id: None }
    }

    pub fn parse(path: &str) -> Self {
        let segments: Vec<&str> = path
            .trim()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["forgot-password"] => Route::ForgotPassword,
            ["documents"] => Route::Documents,
            ["conversation", id] => Route::Conversation {
                session_id: Some(id.to_string()),
            },
            _ => Route::conversation(),
        }
    }

    pub fn is_guest_only(&self) -> bool {
        matches!(self, Route::Login | Route::Register | Route::ForgotPassword)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "/login"),
            Route::Register => write!(f, "/register"),
            Route::ForgotPassword => write!(f, "/forgot-password"),
            Route::Conversation { session_id: None } => write!(f, "/conversation"),
            Route::Conversation {
                session_id: Some(id),
            } => write!(f, "/conversation/{id}"),
            Route::Documents => write!(f, "/documents"),
        }
    }
}

pub fn auth_guard(route: Route, authenticated: bool) -> Route {
    if route.is_guest_only() || authenticated {
        route
    } else {
        Route::Login
    }
}

pub fn guest_guard(route: Route, authenticated: bool) -> Route {
    if route.is_guest_only() && authenticated {
        Route::conversation()
    } else {
        route
    }
}

pub fn resolve(path: &str, authenticated: bool) -> Route {
    guard(Route::parse(path), authenticated)
}

pub fn guard(route: Route, authenticated: bool) -> Route {
    if route.is_guest_only() {
        guest_guard(route, authenticated)
    } else {
        auth_guard(route, authenticated)
    }
}
