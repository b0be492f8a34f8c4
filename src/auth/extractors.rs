use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::middleware::{AuthContext, NO_TOKEN};
use crate::error::AppError;

/// The caller's user id, as attached by the auth gate.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl AuthUser {
    /// Ownership check: only the owner may mutate the resource.
    pub fn ensure_owns(&self, owner: Uuid) -> Result<(), AppError> {
        if self.0 == owner {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only reachable without a context if a private route was mounted
        // outside the gate.
        parts
            .extensions
            .get::<AuthContext>()
            .map(|ctx| AuthUser(ctx.user_id))
            .ok_or_else(|| AppError::Unauthorized(NO_TOKEN.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_passes_and_stranger_is_forbidden() {
        let owner = Uuid::new_v4();
        assert!(AuthUser(owner).ensure_owns(owner).is_ok());
        assert!(matches!(
            AuthUser(Uuid::new_v4()).ensure_owns(owner),
            Err(AppError::Forbidden)
        ));
    }
}
