//! Self-service account flows: registration, login, token refresh and profile
//! management.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{ErrorCode, RbacError, RbacResult};
use super::models::{NewUser, ProfileUpdate, User};
use super::password;
use super::token::{TokenService, TokenSubject};
use super::validators::{self, Registration};
use crate::store::{seed::DEFAULT_ROLE, StoreError, Stores};

/// Freshly issued access/refresh pair.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

#[derive(Clone)]
pub struct AccountService {
    stores: Stores,
    tokens: Arc<TokenService>,
}

fn invalid_credentials() -> RbacError {
    RbacError::unauthenticated(ErrorCode::InvalidCredentials, "Invalid email or password")
}

impl AccountService {
    #[must_use]
    pub fn new(stores: Stores, tokens: Arc<TokenService>) -> Self {
        Self { stores, tokens }
    }

    /// Create a user holding the default role.
    ///
    /// # Errors
    /// Validation errors for bad input, `EMAIL_ALREADY_EXISTS` for a taken email and
    /// `DEFAULT_ROLE_MISSING` if the default role was never seeded.
    pub async fn register(&self, input: Registration) -> RbacResult<User> {
        let input = validators::validate_registration(input)?;

        if self
            .stores
            .users
            .find_graph_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(email_taken());
        }

        let Some(default_role) = self.stores.roles.find_by_name(DEFAULT_ROLE).await? else {
            return Err(RbacError::Internal {
                code: ErrorCode::DefaultRoleMissing,
                source: anyhow::anyhow!("default role '{DEFAULT_ROLE}' is not seeded"),
            });
        };

        let password_hash = password::hash_password_blocking(input.password).await?;
        let new_user = NewUser {
            email: input.email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            middle_name: input.middle_name,
        };

        let user = match self
            .stores
            .users
            .create_with_roles(new_user, &[default_role.id])
            .await
        {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => return Err(email_taken()),
            Err(err) => return Err(err.into()),
        };

        info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// Check credentials. Unknown email, wrong password and inactive user all
    /// fail with the same `INVALID_CREDENTIALS`.
    ///
    /// # Errors
    /// `INVALID_CREDENTIALS`, or an internal error from the store.
    pub async fn authenticate(&self, email: &str, password: &str) -> RbacResult<User> {
        let email = validators::normalize_email(email);
        let Some(user) = self.stores.users.find_graph_by_email(&email).await? else {
            return Err(invalid_credentials());
        };

        let matches =
            password::verify_password_blocking(password.to_string(), user.password_hash.clone())
                .await;
        if !matches {
            return Err(invalid_credentials());
        }
        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt for inactive user");
            return Err(invalid_credentials());
        }
        Ok(user)
    }

    /// # Errors
    /// Same as [`Self::authenticate`], plus internal signing failures.
    pub async fn login(&self, email: &str, password: &str) -> RbacResult<(User, TokenPair)> {
        let user = self.authenticate(email, password).await?;
        let pair = self.issue_pair(&user)?;
        info!(user_id = %user.id, "User logged in");
        Ok((user, pair))
    }

    /// Trade a refresh token for a new pair. The user must still exist and be active.
    ///
    /// # Errors
    /// `NO_TOKEN`, `INVALID_TOKEN_PAYLOAD` or `USER_NOT_FOUND`; `INVALID_TOKEN` for a
    /// bad token or an inactive user. All are 401.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> RbacResult<(User, TokenPair)> {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Err(RbacError::unauthenticated(
                ErrorCode::NoToken,
                "Refresh token required",
            ));
        };
        let Some(claims) = self.tokens.verify_refresh(token) else {
            return Err(RbacError::unauthenticated(
                ErrorCode::InvalidToken,
                "Invalid or expired refresh token",
            ));
        };
        if claims.sub.trim().is_empty() {
            return Err(RbacError::unauthenticated(
                ErrorCode::InvalidTokenPayload,
                "Invalid refresh token payload",
            ));
        }
        let Some(user) = self.stores.users.find_graph_by_email(&claims.sub).await? else {
            return Err(RbacError::unauthenticated(
                ErrorCode::UserNotFound,
                "User not found",
            ));
        };
        // Reported as a token failure so the status stays 401.
        if !user.is_active {
            warn!(user_id = %user.id, "Refresh attempt for inactive user");
            return Err(RbacError::unauthenticated(
                ErrorCode::InvalidToken,
                "Refresh token is no longer valid",
            ));
        }
        let pair = self.issue_pair(&user)?;
        Ok((user, pair))
    }

    /// # Errors
    /// Internal error if signing fails.
    pub fn issue_pair(&self, user: &User) -> RbacResult<TokenPair> {
        let subject = TokenSubject {
            email: user.email.clone(),
            user_id: user.id,
        };
        Ok(TokenPair {
            access_token: self.tokens.issue_access(&subject)?,
            refresh_token: self.tokens.issue_refresh(&subject)?,
            expires_in: self.tokens.access_ttl_seconds(),
            refresh_expires_in: self.tokens.refresh_ttl_seconds(),
        })
    }

    /// Update name fields; each provided value is trimmed and length-checked.
    ///
    /// # Errors
    /// `VALIDATION_ERROR` for an empty update or a too-short name.
    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> RbacResult<User> {
        if update.is_empty() {
            return Err(RbacError::validation(
                ErrorCode::ValidationError,
                "No fields to update",
            ));
        }
        let update = ProfileUpdate {
            first_name: update
                .first_name
                .map(|v| validators::validate_person_name("first_name", &v))
                .transpose()?,
            last_name: update
                .last_name
                .map(|v| validators::validate_person_name("last_name", &v))
                .transpose()?,
            middle_name: update
                .middle_name
                .map(|v| validators::validate_person_name("middle_name", &v))
                .transpose()?,
        };

        match self.stores.users.update_profile(user_id, &update).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => Err(user_not_found()),
            Err(err) => Err(err.into()),
        }
    }

    /// Soft-delete the caller's own account.
    ///
    /// # Errors
    /// `USER_NOT_FOUND` if the account vanished, or an internal store error.
    pub async fn deactivate(&self, user_id: Uuid) -> RbacResult<User> {
        match self.stores.users.set_active(user_id, false).await {
            Ok(user) => {
                info!(user_id = %user.id, "User deactivated own account");
                Ok(user)
            }
            Err(StoreError::NotFound(_)) => Err(user_not_found()),
            Err(err) => Err(err.into()),
        }
    }
}

fn email_taken() -> RbacError {
    RbacError::conflict(
        ErrorCode::EmailAlreadyExists,
        "A user with this email already exists",
    )
}

pub(crate) fn user_not_found() -> RbacError {
    RbacError::not_found(ErrorCode::UserNotFound, "User not found")
}
