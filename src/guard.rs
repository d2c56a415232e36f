//! Route guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Navigation targets either proceed or redirect to `/login`. The decision is
//! a pure function of the target route and whether the session currently
//! holds an access token; the guard never touches session state.

use crate::session::SessionStore;

pub const LOGIN_PATH: &str = "/login";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
}

impl Route {
    #[must_use]
    pub fn public(path: &str, name: &str) -> Self {
        Self { path: path.to_owned(), name: name.to_owned(), requires_auth: false }
    }

    #[must_use]
    pub fn protected(path: &str, name: &str) -> Self {
        Self { path: path.to_owned(), name: name.to_owned(), requires_auth: true }
    }
}

/// Outcome of a guarded navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Proceed(String),
    Redirect(String),
}

impl Navigation {
    /// Path the navigation ends up at.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Proceed(path) | Self::Redirect(path) => path,
        }
    }
}

/// Decide a navigation to `route`.
#[must_use]
pub fn guard(route: &Route, is_authenticated: bool) -> Navigation {
    if route.requires_auth && !is_authenticated {
        Navigation::Redirect(LOGIN_PATH.to_owned())
    } else {
        Navigation::Proceed(route.path.clone())
    }
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            Route::public("/", "main"),
            Route::public(LOGIN_PATH, "login"),
            Route::public("/register", "register"),
            Route::public("/rooms", "rooms"),
            Route::protected("/bookings", "bookings"),
            Route::protected("/profile", "profile"),
        ])
    }
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Look up the route for `path`. Query strings and a trailing slash are
    /// ignored.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let path = normalize_path(path);
        self.routes.iter().find(|route| route.path == path)
    }

    /// Guard a navigation to `path` against the live session. Unknown paths
    /// proceed unchanged.
    #[must_use]
    pub fn before_each(&self, path: &str, session: &SessionStore) -> Navigation {
        let authenticated = session.is_authenticated();
        let decision = match self.resolve(path) {
            Some(route) => guard(route, authenticated),
            None => Navigation::Proceed(path.to_owned()),
        };
        if let Navigation::Redirect(ref to) = decision {
            tracing::info!(from = %path, to = %to, "navigation requires login");
        }
        decision
    }
}

fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
