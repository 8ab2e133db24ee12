//! Token to principal resolution.
//!
//! Flow: verify the access token, read the subject, load the user graph in one
//! store call, reject inactive users, then precompute the effective permission
//! set for downstream authorization checks.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::error::{ErrorCode, RbacError, RbacResult};
use super::models::User;
use super::resolver;
use super::token::TokenService;
use crate::store::UserStore;

/// Authenticated user context handed to handlers.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    #[must_use]
    pub fn new(user: User) -> Self {
        let permissions = resolver::effective_permissions(&user);
        Self { user, permissions }
    }

    #[must_use]
    pub fn can(&self, resource_type: &str, action: &str) -> bool {
        resolver::has_permission(&self.user, resource_type, action)
    }

    #[must_use]
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    /// # Errors
    /// Returns `PERMISSION_REQUIRED` when the principal lacks `name`.
    pub fn require(&self, name: &str) -> RbacResult<()> {
        if self.has_permission(name) {
            Ok(())
        } else {
            debug!(user_id = %self.user.id, permission = name, "permission denied");
            Err(RbacError::permission_required(name))
        }
    }
}

#[derive(Clone)]
pub struct IdentityResolver {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(tokens: Arc<TokenService>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Resolve an optional raw access token into a principal.
    ///
    /// # Errors
    /// `NO_TOKEN`, `INVALID_TOKEN`, `INVALID_TOKEN_PAYLOAD` and `USER_NOT_FOUND` are
    /// authentication failures; `USER_INACTIVE` is an authorization failure.
    pub async fn resolve(&self, token: Option<&str>) -> RbacResult<Principal> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Err(RbacError::unauthenticated(
                ErrorCode::NoToken,
                "Authorization credentials required",
            ));
        };

        let Some(claims) = self.tokens.verify_access(token) else {
            return Err(RbacError::unauthenticated(
                ErrorCode::InvalidToken,
                "Invalid or expired token",
            ));
        };

        if claims.sub.trim().is_empty() {
            return Err(RbacError::unauthenticated(
                ErrorCode::InvalidTokenPayload,
                "Invalid token payload",
            ));
        }

        let Some(user) = self.users.find_graph_by_email(&claims.sub).await? else {
            return Err(RbacError::unauthenticated(
                ErrorCode::UserNotFound,
                "User not found",
            ));
        };

        if !user.is_active {
            return Err(RbacError::forbidden(
                ErrorCode::UserInactive,
                "User account is inactive",
            ));
        }

        Ok(Principal::new(user))
    }

    /// [`Self::resolve`] followed by a permission check.
    ///
    /// # Errors
    /// Any resolution error, or `PERMISSION_REQUIRED` on denial.
    pub async fn require_permission(
        &self,
        token: Option<&str>,
        permission: &str,
    ) -> RbacResult<Principal> {
        let principal = self.resolve(token).await?;
        principal.require(permission)?;
        Ok(principal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rbac::models::NewUser;
    use crate::rbac::token::{TokenConfig, TokenSubject};
    use crate::store::{seed, Stores};
    use secrecy::SecretString;

    async fn setup() -> (IdentityResolver, Arc<TokenService>, Stores, User) {
        let stores = Stores::memory();
        seed::bootstrap(&stores, None).await.unwrap();
        let tokens = Arc::new(
            TokenService::new(&TokenConfig::new(
                SecretString::from("access-secret-0123456789"),
                SecretString::from("refresh-secret-0123456789"),
            ))
            .unwrap(),
        );
        let role = stores.roles.find_by_name("user").await.unwrap().unwrap();
        let user = stores
            .users
            .create_with_roles(
                NewUser {
                    email: "a@x.com".to_string(),
                    password_hash: "hash".to_string(),
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    middle_name: None,
                },
                &[role.id],
            )
            .await
            .unwrap();
        let resolver = IdentityResolver::new(tokens.clone(), stores.users.clone());
        (resolver, tokens, stores, user)
    }

    fn subject(user: &User) -> TokenSubject {
        TokenSubject {
            email: user.email.clone(),
            user_id: user.id,
        }
    }

    fn code(result: RbacResult<Principal>) -> Option<ErrorCode> {
        result.err().map(|e| e.code())
    }

    #[tokio::test]
    async fn resolves_active_user() {
        let (resolver, tokens, _, user) = setup().await;
        let token = tokens.issue_access(&subject(&user)).unwrap();
        let principal = resolver.resolve(Some(&token)).await.unwrap();
        assert_eq!(principal.user.id, user.id);
        assert!(principal.has_permission("reports_read"));
        assert!(!principal.has_permission("documents_read"));
    }

    #[tokio::test]
    async fn failure_codes() {
        let (resolver, tokens, _, user) = setup().await;
        assert_eq!(code(resolver.resolve(None).await), Some(ErrorCode::NoToken));
        assert_eq!(
            code(resolver.resolve(Some("garbage")).await),
            Some(ErrorCode::InvalidToken)
        );

        let refresh = tokens.issue_refresh(&subject(&user)).unwrap();
        assert_eq!(
            code(resolver.resolve(Some(&refresh)).await),
            Some(ErrorCode::InvalidToken)
        );

        let blank = tokens
            .issue_access(&TokenSubject {
                email: " ".to_string(),
                user_id: user.id,
            })
            .unwrap();
        assert_eq!(
            code(resolver.resolve(Some(&blank)).await),
            Some(ErrorCode::InvalidTokenPayload)
        );

        let ghost = tokens
            .issue_access(&TokenSubject {
                email: "ghost@x.com".to_string(),
                user_id: user.id,
            })
            .unwrap();
        assert_eq!(
            code(resolver.resolve(Some(&ghost)).await),
            Some(ErrorCode::UserNotFound)
        );
    }

    #[tokio::test]
    async fn deactivated_user_is_forbidden_with_valid_token() {
        let (resolver, tokens, stores, user) = setup().await;
        let token = tokens.issue_access(&subject(&user)).unwrap();
        stores.users.set_active(user.id, false).await.unwrap();

        let err = resolver.resolve(Some(&token)).await.err().unwrap();
        assert!(matches!(err, RbacError::Authorization { .. }));
        assert_eq!(err.code(), ErrorCode::UserInactive);
    }

    #[tokio::test]
    async fn can_decides_resource_action_pairs() {
        let (resolver, tokens, _, user) = setup().await;
        let token = tokens.issue_access(&subject(&user)).unwrap();
        let principal = resolver.resolve(Some(&token)).await.unwrap();
        assert!(principal.can("reports", "read"));
        assert!(principal.can("user_profiles", "edit"));
        assert!(!principal.can("documents", "read"));
        assert!(!principal.can("reports", "delete"));
    }

    #[tokio::test]
    async fn require_permission_denies_missing_grant() {
        let (resolver, tokens, _, user) = setup().await;
        let token = tokens.issue_access(&subject(&user)).unwrap();
        let denied = resolver.require_permission(Some(&token), "documents_read").await;
        assert_eq!(code(denied), Some(ErrorCode::PermissionRequired));
        assert!(resolver
            .require_permission(Some(&token), "reports_read")
            .await
            .is_ok());
    }
}
