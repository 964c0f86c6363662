//! Navigation guard.
//!
//! Routes are tagged `RequiresAuth`, `Guest` or `Public`. Before a guarded
//! route is decided the guard waits for the session bootstrap, so a page
//! load never bounces to the login screen just because `init` had not
//! finished yet.

use std::sync::Arc;

use tracing::debug;

use crate::auth::SessionController;

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/";

/// Query parameter carrying the originally requested path to the login page.
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Only for signed-in users.
    RequiresAuth,
    /// Only for signed-out users (login, register).
    Guest,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub access: Access,
}

impl Route {
    pub fn new(path: &str, name: &str, access: Access) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            access,
        }
    }

    /// Exact match, or a nested path below this route.
    fn matches(&self, path: &str) -> bool {
        if self.path == path {
            return true;
        }
        self.path != "/"
            && path
                .strip_prefix(self.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// The client's screens.
pub fn default_routes() -> Vec<Route> {
    vec![
        Route::new("/", "home", Access::RequiresAuth),
        Route::new("/chat", "chat", Access::RequiresAuth),
        Route::new("/server-manager", "server-manager", Access::RequiresAuth),
        Route::new("/login", "login", Access::Guest),
        Route::new("/register", "register", Access::Guest),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(String),
}

pub struct RouteGuard {
    controller: Arc<SessionController>,
    routes: Vec<Route>,
    login_path: String,
    landing_path: String,
}

impl RouteGuard {
    pub fn new(controller: Arc<SessionController>, routes: Vec<Route>) -> Self {
        Self {
            controller,
            routes,
            login_path: LOGIN_PATH.to_string(),
            landing_path: LANDING_PATH.to_string(),
        }
    }

    /// Access level of `target`. Query and fragment are ignored; unknown
    /// paths are public. The longest matching route wins.
    pub fn access(&self, target: &str) -> Access {
        let path = strip_query(target);
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        self.routes
            .iter()
            .filter(|r| r.matches(path))
            .max_by_key(|r| r.path.len())
            .map(|r| r.access)
            .unwrap_or(Access::Public)
    }

    /// Decide whether navigation to `target` may proceed.
    pub async fn check(&self, target: &str) -> Navigation {
        let access = self.access(target);
        if access != Access::Public && !self.controller.session().is_initialized() {
            debug!(path = target, "Waiting for session init before navigation");
            self.controller.init().await;
        }

        let authenticated = self.controller.session().is_authenticated();
        let decision = self.decide(access, authenticated, target);
        debug!(path = target, ?access, authenticated, ?decision, "Navigation decided");
        decision
    }

    fn decide(&self, access: Access, authenticated: bool, target: &str) -> Navigation {
        match (access, authenticated) {
            (Access::RequiresAuth, false) => Navigation::Redirect(format!(
                "{}?{}={}",
                self.login_path,
                REDIRECT_PARAM,
                urlencoding::encode(target)
            )),
            (Access::Guest, true) => Navigation::Redirect(self.landing_path.clone()),
            _ => Navigation::Proceed,
        }
    }

    /// Where to go after a successful login, given the `redirect` parameter.
    ///
    /// Only same-origin paths that are not guest pages are honored.
    pub fn post_login_target(&self, redirect: Option<&str>) -> String {
        let decoded = redirect.and_then(|r| urlencoding::decode(r).ok());
        match decoded {
            Some(path) if is_local_path(&path) && self.access(&path) != Access::Guest => {
                path.into_owned()
            }
            _ => self.landing_path.clone(),
        }
    }
}

/// Absolute path on this origin. Browsers read `/\host` like `//host`.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

fn strip_query(target: &str) -> &str {
    let end = target.find(&['?', '#'][..]).unwrap_or(target.len());
    &target[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, AuthBackend};
    use crate::auth::MemoryStore;
    use crate::models::{Credentials, Registration, TokenResponse, UserProfile};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Offline;

    #[async_trait]
    impl AuthBackend for Offline {
        async fn register(&self, _: &Registration) -> Result<Value, ApiError> {
            Err(ApiError::InvalidResponse("offline".into()))
        }
        async fn login(&self, _: &Credentials) -> Result<TokenResponse, ApiError> {
            Err(ApiError::InvalidResponse("offline".into()))
        }
        async fn me(&self, _: &str) -> Result<UserProfile, ApiError> {
            Err(ApiError::InvalidResponse("offline".into()))
        }
        async fn logout(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        async fn refresh(&self, _: &str) -> Result<TokenResponse, ApiError> {
            Err(ApiError::InvalidResponse("offline".into()))
        }
    }

    fn guard() -> RouteGuard {
        let controller = SessionController::new(Arc::new(Offline), Arc::new(MemoryStore::new()));
        RouteGuard::new(Arc::new(controller), default_routes())
    }

    #[test]
    fn test_access_lookup() {
        let guard = guard();
        assert_eq!(guard.access("/"), Access::RequiresAuth);
        assert_eq!(guard.access("/chat"), Access::RequiresAuth);
        assert_eq!(guard.access("/chat/42"), Access::RequiresAuth);
        assert_eq!(guard.access("/chat/?tab=1"), Access::RequiresAuth);
        assert_eq!(guard.access("/login"), Access::Guest);
        assert_eq!(guard.access("/login?redirect=%2Fchat"), Access::Guest);
        assert_eq!(guard.access("/about"), Access::Public);
        assert_eq!(guard.access("/chatter"), Access::Public);
    }

    #[test]
    fn test_decide_table() {
        let guard = guard();
        assert_eq!(
            guard.decide(Access::RequiresAuth, false, "/chat"),
            Navigation::Redirect("/login?redirect=%2Fchat".into())
        );
        assert_eq!(guard.decide(Access::RequiresAuth, true, "/chat"), Navigation::Proceed);
        assert_eq!(
            guard.decide(Access::Guest, true, "/login"),
            Navigation::Redirect("/".into())
        );
        assert_eq!(guard.decide(Access::Guest, false, "/login"), Navigation::Proceed);
        assert_eq!(guard.decide(Access::Public, false, "/about"), Navigation::Proceed);
        assert_eq!(guard.decide(Access::Public, true, "/about"), Navigation::Proceed);
    }

    #[test]
    fn test_post_login_target() {
        let guard = guard();
        assert_eq!(guard.post_login_target(Some("%2Fchat%2F42")), "/chat/42");
        assert_eq!(guard.post_login_target(Some("/server-manager")), "/server-manager");
        assert_eq!(guard.post_login_target(None), "/");
        assert_eq!(guard.post_login_target(Some("https://evil.example")), "/");
        assert_eq!(guard.post_login_target(Some("//evil.example")), "/");
        assert_eq!(guard.post_login_target(Some("/login")), "/");
        assert_eq!(guard.post_login_target(Some("/\\evil.example")), "/");
        assert_eq!(guard.post_login_target(Some("%2F%5Cevil.example")), "/");
        assert_eq!(guard.post_login_target(Some("/chat\\..\\x")), "/");
        assert_eq!(guard.post_login_target(Some("/%09/evil.example")), "/");
    }

    #[tokio::test]
    async fn test_public_route_does_not_wait_for_init() {
        let guard = guard();
        assert_eq!(guard.check("/about").await, Navigation::Proceed);
        assert!(!guard.controller.session().is_initialized());
    }

    #[tokio::test]
    async fn test_guarded_route_runs_init_first() {
        let guard = guard();
        assert_eq!(
            guard.check("/").await,
            Navigation::Redirect("/login?redirect=%2F".into())
        );
        assert!(guard.controller.session().is_initialized());
    }
}
