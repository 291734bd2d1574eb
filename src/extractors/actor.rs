//! Build the request principal from headers set by the upstream authenticator.

use crate::permission::Actor;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Reference id of the authenticated user. Absent means guest.
pub const USER_ID_HEADER: &str = "X-User-ID";
/// Comma-separated group reference ids of the user.
pub const USER_GROUPS_HEADER: &str = "X-User-Groups";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Actor for a request; `is_admin` decides which user ids bypass permission checks.
pub fn actor_from_headers(headers: &HeaderMap, is_admin: impl Fn(&str) -> bool) -> Actor {
    let Some(user_id) = header_str(headers, USER_ID_HEADER) else {
        return Actor::guest();
    };
    let mut actor = Actor::user(user_id);
    actor.group_ids = header_str(headers, USER_GROUPS_HEADER)
        .map(|groups| {
            groups
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    actor.is_admin = is_admin(user_id);
    actor
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(actor_from_headers(&parts.headers, |id| state.config.is_admin(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_user_header_is_a_guest() {
        let actor = actor_from_headers(&HeaderMap::new(), |_| true);
        assert!(actor.is_guest());
        assert!(!actor.is_admin);
    }

    #[test]
    fn groups_are_split_and_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" u1 "));
        headers.insert(USER_GROUPS_HEADER, HeaderValue::from_static("g1, ,g2"));
        let actor = actor_from_headers(&headers, |id| id == "admin");
        assert_eq!(actor.reference_id.as_deref(), Some("u1"));
        assert_eq!(actor.group_ids, vec!["g1".to_string(), "g2".to_string()]);
        assert!(!actor.is_admin);
    }

    #[test]
    fn configured_admins_are_flagged() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("admin"));
        let actor = actor_from_headers(&headers, |id| id == "admin");
        assert!(actor.is_admin);
    }
}
