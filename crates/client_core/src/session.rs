use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

/// Fixed key the opaque session token is stored under, mirroring the
/// single well-known slot in durable local storage.
pub const SESSION_TOKEN_KEY: &str = "access_token";

/// Injected capability for reading and writing the session token.
/// Guards only ever check presence; nothing here decodes or validates
/// the token.
pub trait SessionStore {
    fn token(&self) -> Option<String>;
    fn set_token(&mut self, token: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Option<String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }

    fn set_token(&mut self, token: &str) -> Result<()> {
        self.token = Some(token.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.token = None;
        Ok(())
    }
}

/// Durable store: one token file named [`SESSION_TOKEN_KEY`] inside a
/// data directory. An unreadable or empty file counts as "no session".
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: data_dir.into().join(SESSION_TOKEN_KEY),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn token(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    fn set_token(&mut self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create session dir {}", parent.display()))?;
        }
        fs::write(&self.path, token)
            .with_context(|| format!("failed to write session token to {}", self.path.display()))
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove session token at {}", self.path.display())
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    Dashboard,
    Users,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::SignIn => "/signin",
            Route::SignUp => "/signup",
            Route::Dashboard => "/dashboard",
            Route::Users => "/users",
        }
    }

    pub fn is_protected(self) -> bool {
        matches!(self, Route::Dashboard | Route::Users)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(Route),
}

/// Guard for protected views: no token means a redirect to sign-in.
pub fn require_session(store: &dyn SessionStore) -> RouteDecision {
    match store.token() {
        Some(_) => RouteDecision::Allow,
        None => RouteDecision::Redirect(Route::SignIn),
    }
}

/// Guard for guest views: an existing token redirects to the default
/// protected view.
pub fn require_no_session(store: &dyn SessionStore) -> RouteDecision {
    match store.token() {
        Some(_) => RouteDecision::Redirect(Route::Dashboard),
        None => RouteDecision::Allow,
    }
}

/// Apply the guard matching the route's class. Evaluated fresh on every
/// navigation; the token can change between two calls.
pub fn resolve(route: Route, store: &dyn SessionStore) -> RouteDecision {
    if route.is_protected() {
        require_session(store)
    } else {
        require_no_session(store)
    }
}

/// Erase the session token and hand back the route to land on.
pub fn logout(store: &mut dyn SessionStore) -> Result<Route> {
    store.clear()?;
    info!("session token cleared");
    Ok(Route::SignIn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_route_without_a_token_redirects_to_sign_in() {
        let store = MemorySessionStore::new();
        assert_eq!(
            resolve(Route::Users, &store),
            RouteDecision::Redirect(Route::SignIn)
        );
        assert_eq!(
            resolve(Route::Dashboard, &store),
            RouteDecision::Redirect(Route::SignIn)
        );
    }

    #[test]
    fn guest_route_with_a_token_redirects_to_the_dashboard() {
        let store = MemorySessionStore::with_token("opaque");
        assert_eq!(
            resolve(Route::SignIn, &store),
            RouteDecision::Redirect(Route::Dashboard)
        );
        assert_eq!(
            resolve(Route::SignUp, &store),
            RouteDecision::Redirect(Route::Dashboard)
        );
        assert_eq!(resolve(Route::Users, &store), RouteDecision::Allow);
    }

    #[test]
    fn guards_are_reevaluated_after_logout() {
        let mut store = MemorySessionStore::with_token("opaque");
        assert_eq!(require_session(&store), RouteDecision::Allow);

        let landing = logout(&mut store).expect("logout");
        assert_eq!(landing, Route::SignIn);
        assert_eq!(
            require_session(&store),
            RouteDecision::Redirect(Route::SignIn)
        );
        assert_eq!(require_no_session(&store), RouteDecision::Allow);
    }

    #[test]
    fn file_store_roundtrips_and_clears_the_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileSessionStore::new(dir.path().join("nested"));

        assert_eq!(store.token(), None);
        store.set_token("tok-123").expect("write");
        assert_eq!(store.token(), Some("tok-123".to_string()));

        store.clear().expect("clear");
        assert_eq!(store.token(), None);
        // Clearing an absent token is fine.
        store.clear().expect("clear again");
    }

    #[test]
    fn whitespace_only_token_file_counts_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileSessionStore::new(dir.path());
        store.set_token("  \n").expect("write");
        assert_eq!(store.token(), None);
        assert_eq!(
            require_session(&store),
            RouteDecision::Redirect(Route::SignIn)
        );
    }
}
