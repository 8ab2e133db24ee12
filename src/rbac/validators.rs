//! Input and policy validation. Each check fails with a typed [`RbacError`]
//! carrying the code of the violated rule.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::error::{ErrorCode, RbacError, RbacResult};
use super::password::{validate_password_strength, MIN_PASSWORD_LENGTH};

pub const MAX_ROLES_PER_USER: usize = 10;
pub const MAX_PERMISSIONS_PER_ROLE: usize = 50;
pub const ROLE_NAME_MIN_LENGTH: usize = 2;
pub const ROLE_NAME_MAX_LENGTH: usize = 50;
pub const PERSON_NAME_MIN_LENGTH: usize = 2;

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
static ROLE_NAME_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    EMAIL_RE
        .as_ref()
        .is_some_and(|regex| regex.is_match(email_normalized))
}

/// Normalize and check an email address.
///
/// # Errors
/// Returns a validation error if the address is malformed.
pub fn validate_email(email: &str) -> RbacResult<String> {
    let normalized = normalize_email(email);
    if valid_email(&normalized) {
        Ok(normalized)
    } else {
        Err(RbacError::validation(
            ErrorCode::ValidationError,
            "Invalid email address",
        ))
    }
}

/// # Errors
/// Returns `WEAK_PASSWORD` if the password fails the strength policy.
pub fn validate_password(password: &str) -> RbacResult<()> {
    if validate_password_strength(password) {
        Ok(())
    } else {
        Err(RbacError::validation(
            ErrorCode::WeakPassword,
            format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters and contain letters and digits"
            ),
        ))
    }
}

/// Trim a first/last/middle name and require a minimum length.
///
/// # Errors
/// Returns a validation error naming `field` if the trimmed value is too short.
pub fn validate_person_name(field: &str, value: &str) -> RbacResult<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() < PERSON_NAME_MIN_LENGTH {
        return Err(RbacError::validation(
            ErrorCode::ValidationError,
            format!("{field} must be at least {PERSON_NAME_MIN_LENGTH} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Optional middle name: blank input means "no middle name".
///
/// # Errors
/// Returns a validation error if a non-blank value is too short.
pub fn validate_middle_name(value: Option<&str>) -> RbacResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => validate_person_name("middle_name", name).map(Some),
    }
}

/// Role names are 2 to 50 characters of `[A-Za-z0-9_-]`, compared after trimming.
///
/// # Errors
/// Returns `INVALID_ROLE_NAME` on any violation.
pub fn validate_role_name(name: &str) -> RbacResult<String> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if !(ROLE_NAME_MIN_LENGTH..=ROLE_NAME_MAX_LENGTH).contains(&length) {
        return Err(RbacError::validation(
            ErrorCode::InvalidRoleName,
            format!(
                "Role name must be between {ROLE_NAME_MIN_LENGTH} and {ROLE_NAME_MAX_LENGTH} characters"
            ),
        ));
    }
    if !ROLE_NAME_RE
        .as_ref()
        .is_some_and(|regex| regex.is_match(trimmed))
    {
        return Err(RbacError::validation(
            ErrorCode::InvalidRoleName,
            "Role name may only contain letters, digits, underscores and hyphens",
        ));
    }
    Ok(trimmed.to_string())
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .iter()
        .find(|name| !seen.insert(name.as_str()))
        .map(String::as_str)
}

/// A user's replacement role set: non-empty, unique, at most [`MAX_ROLES_PER_USER`].
///
/// # Errors
/// Returns `INVALID_ROLE_ASSIGNMENT` on any violation.
pub fn validate_role_assignment(role_names: &[String]) -> RbacResult<()> {
    if role_names.is_empty() {
        return Err(RbacError::validation(
            ErrorCode::InvalidRoleAssignment,
            "Role list must not be empty",
        ));
    }
    if let Some(duplicate) = first_duplicate(role_names) {
        return Err(RbacError::validation(
            ErrorCode::InvalidRoleAssignment,
            format!("Duplicate role '{duplicate}' in assignment"),
        ));
    }
    if role_names.len() > MAX_ROLES_PER_USER {
        return Err(RbacError::validation(
            ErrorCode::InvalidRoleAssignment,
            format!("A user cannot hold more than {MAX_ROLES_PER_USER} roles"),
        ));
    }
    Ok(())
}

/// A role's permission list: unique, at most [`MAX_PERMISSIONS_PER_ROLE`]. Empty is allowed.
///
/// # Errors
/// Returns `INVALID_PERMISSION_ASSIGNMENT` on any violation.
pub fn validate_permission_assignment(permission_names: &[String]) -> RbacResult<()> {
    if let Some(duplicate) = first_duplicate(permission_names) {
        return Err(RbacError::validation(
            ErrorCode::InvalidPermissionAssignment,
            format!("Duplicate permission '{duplicate}' in assignment"),
        ));
    }
    if permission_names.len() > MAX_PERMISSIONS_PER_ROLE {
        return Err(too_many_permissions());
    }
    Ok(())
}

pub(crate) fn too_many_permissions() -> RbacError {
    RbacError::validation(
        ErrorCode::InvalidPermissionAssignment,
        format!("A role cannot hold more than {MAX_PERMISSIONS_PER_ROLE} permissions"),
    )
}

/// Raw registration input.
#[derive(Clone, Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
}

/// Registration input after normalization; the password is still plain text.
#[derive(Clone, Debug)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
}

/// # Errors
/// Returns the first violated rule of the registration contract.
pub fn validate_registration(input: Registration) -> RbacResult<ValidRegistration> {
    let email = validate_email(&input.email)?;
    validate_password(&input.password)?;
    if input.password != input.password_confirm {
        return Err(RbacError::validation(
            ErrorCode::PasswordMismatch,
            "Passwords do not match",
        ));
    }
    let first_name = validate_person_name("first_name", &input.first_name)?;
    let last_name = validate_person_name("last_name", &input.last_name)?;
    let middle_name = validate_middle_name(input.middle_name.as_deref())?;

    Ok(ValidRegistration {
        email,
        password: input.password,
        first_name,
        last_name,
        middle_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn registration() -> Registration {
        Registration {
            email: "  A@X.com ".to_string(),
            password: "Passw0rd!".to_string(),
            password_confirm: "Passw0rd!".to_string(),
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            middle_name: Some("   ".to_string()),
        }
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  A@X.COM "), "a@x.com");
        assert!(valid_email("a@x.com"));
        assert!(!valid_email("a@x"));
        assert!(!valid_email("a x@y.com"));
        assert!(validate_email("nope").is_err());
    }

    #[test]
    fn role_name_rules() {
        assert_eq!(validate_role_name(" editor ").ok(), Some("editor".to_string()));
        assert!(validate_role_name("content-editor_2").is_ok());
        let long = "x".repeat(51);
        for bad in ["a", "has space", "emoji🙂", "dot.name", long.as_str()] {
            let err = validate_role_name(bad).err().map(|e| e.code());
            assert_eq!(err, Some(ErrorCode::InvalidRoleName), "{bad}");
        }
        assert!(validate_role_name(&"x".repeat(50)).is_ok());
    }

    #[test]
    fn role_assignment_limits() {
        let eleven: Vec<String> = (0..11).map(|i| format!("role{i}")).collect();
        let err = validate_role_assignment(&eleven).err().map(|e| e.code());
        assert_eq!(err, Some(ErrorCode::InvalidRoleAssignment));

        let ten: Vec<String> = (0..10).map(|i| format!("role{i}")).collect();
        assert!(validate_role_assignment(&ten).is_ok());

        let dup = validate_role_assignment(&names(&["user", "user"]));
        assert_eq!(dup.err().map(|e| e.code()), Some(ErrorCode::InvalidRoleAssignment));

        let empty = validate_role_assignment(&[]);
        assert_eq!(empty.err().map(|e| e.code()), Some(ErrorCode::InvalidRoleAssignment));
    }

    #[test]
    fn permission_assignment_limits() {
        assert!(validate_permission_assignment(&[]).is_ok());
        let dup = validate_permission_assignment(&names(&["documents_read", "documents_read"]));
        assert_eq!(
            dup.err().map(|e| e.code()),
            Some(ErrorCode::InvalidPermissionAssignment)
        );
        let many: Vec<String> = (0..51).map(|i| format!("perm_{i}")).collect();
        assert!(validate_permission_assignment(&many).is_err());
        assert!(validate_permission_assignment(&many[..50]).is_ok());
    }

    #[test]
    fn registration_is_normalized() {
        let valid = validate_registration(registration()).ok();
        let valid = valid.as_ref();
        assert_eq!(valid.map(|v| v.email.as_str()), Some("a@x.com"));
        assert_eq!(valid.map(|v| v.first_name.as_str()), Some("Ada"));
        assert_eq!(valid.and_then(|v| v.middle_name.clone()), None);
    }

    #[test]
    fn registration_failures() {
        let mut weak = registration();
        weak.password = "abcdefgh".to_string();
        weak.password_confirm = "abcdefgh".to_string();
        assert_eq!(
            validate_registration(weak).err().map(|e| e.code()),
            Some(ErrorCode::WeakPassword)
        );

        let mut mismatch = registration();
        mismatch.password_confirm = "Passw0rd?".to_string();
        assert_eq!(
            validate_registration(mismatch).err().map(|e| e.code()),
            Some(ErrorCode::PasswordMismatch)
        );

        let mut short_name = registration();
        short_name.last_name = " L ".to_string();
        assert_eq!(
            validate_registration(short_name).err().map(|e| e.code()),
            Some(ErrorCode::ValidationError)
        );

        let mut short_middle = registration();
        short_middle.middle_name = Some("K".to_string());
        assert!(validate_registration(short_middle).is_err());
    }
}
