//! Authenticated caller context.
//!
//! Identity is established upstream; this service trusts the `X-User-ID` and
//! `X-User-Role` headers set after authentication. The extractor is also the
//! single authorization seam: every handler goes through `require_admin`,
//! `require_owner` or `require_owner_or_admin` rather than re-deriving
//! ownership checks inline.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Parent,
    Admin,
}

impl Role {
    pub fn from_header(s: &str) -> Option<Self> {
        match s {
            "parent" => Some(Role::Parent),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Authenticated caller, extracted from request headers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The caller must hold the admin role.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Administrative privilege required"
            )))
        }
    }

    /// The caller must hold the parent role.
    pub fn require_parent(&self) -> Result<(), AppError> {
        if self.role == Role::Parent {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Parent role required"
            )))
        }
    }

    /// The caller must be the owning parent of the resource.
    pub fn require_owner(&self, owner_id: Uuid) -> Result<(), AppError> {
        if self.role == Role::Parent && self.user_id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Not the owner of this resource"
            )))
        }
    }

    /// Read access: the owning parent, or any admin.
    pub fn require_owner_or_admin(&self, owner_id: Uuid) -> Result<(), AppError> {
        if self.is_admin() {
            return Ok(());
        }
        self.require_owner(owner_id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header")))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed X-User-ID header")))?;

        let role = parts
            .headers
            .get("X-User-Role")
            .and_then(|v| v.to_str().ok())
            .and_then(Role::from_header)
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or unknown X-User-Role header"))
            })?;

        let span = tracing::Span::current();
        span.record("user_id", user_id.to_string().as_str());

        Ok(AuthContext { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_passes_admin_check() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(ctx.require_admin().is_ok());
    }

    #[test]
    fn parent_fails_admin_check() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Parent,
        };
        assert!(ctx.require_admin().is_err());
    }

    #[test]
    fn owner_check_matches_only_the_owner() {
        let owner = Uuid::new_v4();
        let ctx = AuthContext {
            user_id: owner,
            role: Role::Parent,
        };
        assert!(ctx.require_owner(owner).is_ok());
        assert!(ctx.require_owner(Uuid::new_v4()).is_err());
    }

    #[test]
    fn admin_may_read_but_not_own() {
        let owner = Uuid::new_v4();
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(ctx.require_owner_or_admin(owner).is_ok());
        assert!(ctx.require_owner(owner).is_err());
    }
}
