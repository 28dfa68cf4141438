use crate::models::user::UserRole;
use crate::notify::routes;
use crate::session::SessionStore;
use crate::token_store::TokenStore;

/// Outcome of a route guard check. `Redirect` carries the full target
/// path, query string included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Access requirements attached to a route. Checked by [`check_route`];
/// routes that declare nothing are denied outright rather than silently
/// opened up.
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    pub allowed_roles: Option<Vec<UserRole>>,
    pub required_permission: Option<String>,
}

fn signed_in(tokens: &TokenStore, session: &SessionStore) -> bool {
    tokens.is_token_valid() && session.is_authenticated()
}

/// Requires a live session; otherwise redirects to login carrying the
/// attempted path so the host can return the user after sign-in.
pub fn require_auth(
    tokens: &TokenStore,
    session: &SessionStore,
    attempted_path: &str,
) -> GuardDecision {
    if signed_in(tokens, session) {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(format!(
            "{}?returnUrl={}",
            routes::LOGIN,
            urlencoding::encode(attempted_path)
        ))
    }
}

/// Inverse of [`require_auth`] for login/register pages: a signed-in user
/// is sent home.
pub fn require_guest(tokens: &TokenStore, session: &SessionStore) -> GuardDecision {
    if signed_in(tokens, session) {
        GuardDecision::Redirect(routes::HOME.to_string())
    } else {
        GuardDecision::Allow
    }
}

pub fn require_any_role(
    tokens: &TokenStore,
    session: &SessionStore,
    roles: &[UserRole],
    attempted_path: &str,
) -> GuardDecision {
    match require_auth(tokens, session, attempted_path) {
        GuardDecision::Allow if session.has_any_role(roles) => GuardDecision::Allow,
        GuardDecision::Allow => GuardDecision::Redirect(routes::ACCESS_DENIED.to_string()),
        redirect => redirect,
    }
}

pub fn require_all_roles(
    tokens: &TokenStore,
    session: &SessionStore,
    roles: &[UserRole],
    attempted_path: &str,
) -> GuardDecision {
    match require_auth(tokens, session, attempted_path) {
        GuardDecision::Allow if session.has_all_roles(roles) => GuardDecision::Allow,
        GuardDecision::Allow => GuardDecision::Redirect(routes::ACCESS_DENIED.to_string()),
        redirect => redirect,
    }
}

pub fn require_permission(
    tokens: &TokenStore,
    session: &SessionStore,
    permission: &str,
    attempted_path: &str,
) -> GuardDecision {
    match require_auth(tokens, session, attempted_path) {
        GuardDecision::Allow if session.has_permission(permission) => GuardDecision::Allow,
        GuardDecision::Allow => GuardDecision::Redirect(routes::ACCESS_DENIED.to_string()),
        redirect => redirect,
    }
}

/// Data-driven guard for routes carrying a [`RouteMeta`]. A route with no
/// `allowed_roles` list is denied: access has to be granted explicitly.
pub fn check_route(
    tokens: &TokenStore,
    session: &SessionStore,
    meta: &RouteMeta,
    attempted_path: &str,
) -> GuardDecision {
    match require_auth(tokens, session, attempted_path) {
        GuardDecision::Allow => {}
        redirect => return redirect,
    }

    let allowed = match &meta.allowed_roles {
        Some(roles) => session.has_any_role(roles),
        None => false,
    };
    if !allowed {
        return GuardDecision::Redirect(routes::ACCESS_DENIED.to_string());
    }

    if let Some(permission) = &meta.required_permission {
        if !session.has_permission(permission) {
            return GuardDecision::Redirect(routes::ACCESS_DENIED.to_string());
        }
    }

    GuardDecision::Allow
}
