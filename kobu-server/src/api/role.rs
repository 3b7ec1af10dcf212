//! Caller identity
//!
//! Authentication happens upstream. The gateway forwards the signed-in user
//! as two headers which this middleware turns into a [`Caller`]:
//!
//! - `X-Kobu-Role`: `admin`, `management` or `collector`
//! - `X-Kobu-User`: the user's UUID (for collectors, their collector id)

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use kobu_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};

pub const ROLE_HEADER: &str = "x-kobu-role";
pub const USER_HEADER: &str = "x-kobu-user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Management,
    Collector,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Management => "management",
            Role::Collector => "collector",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "management" => Ok(Role::Management),
            "collector" => Ok(Role::Collector),
            other => Err(ApiError::Unauthorized(format!("Unknown role: {}", other))),
        }
    }
}

/// The authenticated user behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub role: Role,
    pub user_id: Uuid,
}

impl Caller {
    /// Parse the identity headers
    pub fn from_headers(headers: &HeaderMap) -> ApiResult<Self> {
        let role = header_text(headers, ROLE_HEADER)?.parse::<Role>()?;
        let user = header_text(headers, USER_HEADER)?;
        let user_id = Uuid::parse_str(user.trim())
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", USER_HEADER)))?;
        Ok(Self { role, user_id })
    }

    /// Fail with 403 unless the caller holds one of `allowed`
    pub fn require(&self, allowed: &[Role]) -> ApiResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("Role {} may not perform this action", self.role)).into())
        }
    }

    pub fn is_collector(&self) -> bool {
        self.role == Role::Collector
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", name)))
}

/// Identity middleware for the protected routes
///
/// Requests without a valid identity are refused with 401 before reaching a
/// handler; handlers read the [`Caller`] from request extensions.
pub async fn identify_caller(mut request: Request, next: Next) -> ApiResult<Response> {
    let caller = Caller::from_headers(request.headers())?;
    debug!(
        "{} {} as {} {}",
        request.method(),
        request.uri().path(),
        caller.role,
        caller.user_id
    );
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(role: &str, user: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        map.insert(USER_HEADER, HeaderValue::from_str(user).unwrap());
        map
    }

    #[test]
    fn test_parse_caller() {
        let id = Uuid::new_v4();
        let caller = Caller::from_headers(&headers(" Collector ", &id.to_string())).unwrap();
        assert_eq!(caller.role, Role::Collector);
        assert_eq!(caller.user_id, id);
        assert!(caller.is_collector());
    }

    #[test]
    fn test_missing_or_bad_headers() {
        assert!(matches!(
            Caller::from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            Caller::from_headers(&headers("owner", &Uuid::new_v4().to_string())),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            Caller::from_headers(&headers("admin", "not-a-uuid")),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_require_role() {
        let caller = Caller {
            role: Role::Management,
            user_id: Uuid::new_v4(),
        };
        assert!(caller.require(&[Role::Admin, Role::Management]).is_ok());
        let err = caller.require(&[Role::Admin]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
