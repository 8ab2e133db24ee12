//! Reference data bootstrapping: resources, permissions, the built-in roles and
//! an optional administrator account. Safe to run on every start.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::{StoreError, Stores};
use crate::rbac::models::{NewRole, NewUser, Permission, Resource};
use crate::rbac::{password, validators};

pub const DEFAULT_ROLE: &str = "user";
pub const ADMIN_ROLE: &str = "admin";
pub const MODERATOR_ROLE: &str = "moderator";

/// `(name, resource_type, action, description)`
const PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    ("documents_read", "documents", "read", "Read documents"),
    ("documents_write", "documents", "write", "Create and edit documents"),
    ("documents_delete", "documents", "delete", "Delete documents"),
    ("reports_read", "reports", "read", "View reports"),
    ("reports_create", "reports", "create", "Create reports"),
    ("reports_export", "reports", "export", "Export reports"),
    ("user_profiles_read", "user_profiles", "read", "View user profiles"),
    ("user_profiles_edit", "user_profiles", "edit", "Edit user profiles"),
    ("admin_users_manage", "admin_panel", "users_manage", "Manage users"),
    ("admin_roles_manage", "admin_panel", "roles_manage", "Manage roles"),
    ("admin_system_config", "admin_panel", "system_config", "Configure the system"),
];

/// `(name, resource_type, description)`
const RESOURCES: &[(&str, &str, &str)] = &[
    ("documents", "documents", "Document management"),
    ("reports", "reports", "Reporting"),
    ("user_profiles", "user_profiles", "User profile management"),
    ("admin_panel", "admin_panel", "System administration"),
];

const MODERATOR_PERMISSIONS: &[&str] = &[
    "documents_read",
    "documents_write",
    "documents_delete",
    "reports_read",
    "reports_create",
    "reports_export",
    "user_profiles_read",
];

const USER_PERMISSIONS: &[&str] = &["reports_read", "user_profiles_read", "user_profiles_edit"];

/// Credentials for an administrator account created at bootstrap.
#[derive(Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: SecretString,
}

/// Insert whatever reference data is missing.
///
/// # Errors
/// Returns an error if the store fails or the bootstrap admin credentials are invalid.
pub async fn bootstrap(stores: &Stores, admin: Option<&BootstrapAdmin>) -> Result<()> {
    seed_resources(stores).await?;
    seed_permissions(stores).await?;

    let all: Vec<String> = PERMISSIONS.iter().map(|(name, ..)| (*name).to_string()).collect();
    seed_role(stores, ADMIN_ROLE, "Full administrative access", &all).await?;
    seed_role(
        stores,
        MODERATOR_ROLE,
        "Manages documents and reports",
        &to_strings(MODERATOR_PERMISSIONS),
    )
    .await?;
    seed_role(
        stores,
        DEFAULT_ROLE,
        "Default role for registered users",
        &to_strings(USER_PERMISSIONS),
    )
    .await?;

    if let Some(admin) = admin {
        seed_admin(stores, admin).await?;
    }

    info!(backend = stores.backend(), "Reference data is in place");
    Ok(())
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

async fn seed_resources(stores: &Stores) -> Result<()> {
    for (name, resource_type, description) in RESOURCES {
        if stores.resources.find_by_name(name).await?.is_some() {
            continue;
        }
        match stores
            .resources
            .insert(Resource::new(name, resource_type, Some(*description)))
            .await
        {
            Ok(_) | Err(StoreError::Conflict(_)) => debug!("seeded resource {name}"),
            Err(err) => return Err(err).context("failed to seed resources"),
        }
    }
    Ok(())
}

async fn seed_permissions(stores: &Stores) -> Result<()> {
    for (name, resource_type, action, description) in PERMISSIONS {
        if stores.permissions.find_by_name(name).await?.is_some() {
            continue;
        }
        let permission = Permission::named(name, resource_type, action, Some(*description));
        match stores.permissions.insert(permission).await {
            Ok(_) | Err(StoreError::Conflict(_)) => debug!("seeded permission {name}"),
            Err(err) => return Err(err).context("failed to seed permissions"),
        }
    }
    Ok(())
}

async fn seed_role(
    stores: &Stores,
    name: &str,
    description: &str,
    permission_names: &[String],
) -> Result<()> {
    if stores.roles.find_by_name(name).await?.is_some() {
        return Ok(());
    }
    let permission_ids: Vec<_> = stores
        .permissions
        .find_by_names(permission_names)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    let role = NewRole {
        name: name.to_string(),
        description: Some(description.to_string()),
    };
    match stores.roles.create_with_permissions(role, &permission_ids).await {
        Ok(_) | Err(StoreError::Conflict(_)) => {
            debug!("seeded role {name}");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to seed role {name}")),
    }
}

async fn seed_admin(stores: &Stores, admin: &BootstrapAdmin) -> Result<()> {
    let email = validators::validate_email(&admin.email)?;
    if stores.users.find_graph_by_email(&email).await?.is_some() {
        debug!("bootstrap admin already exists");
        return Ok(());
    }
    validators::validate_password(admin.password.expose_secret())?;

    let role = stores
        .roles
        .find_by_name(ADMIN_ROLE)
        .await?
        .context("admin role is missing")?;
    let password_hash =
        password::hash_password_blocking(admin.password.expose_secret().to_string()).await?;

    let user = NewUser {
        email,
        password_hash,
        first_name: "System".to_string(),
        last_name: "Administrator".to_string(),
        middle_name: None,
    };
    match stores.users.create_with_roles(user, &[role.id]).await {
        Ok(user) => {
            info!(user_id = %user.id, "Created bootstrap admin account");
            Ok(())
        }
        Err(StoreError::Conflict(_)) => Ok(()),
        Err(err) => Err(err).context("failed to create bootstrap admin"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rbac::resolver;

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let stores = Stores::memory();
        bootstrap(&stores, None).await.unwrap();
        bootstrap(&stores, None).await.unwrap();

        assert_eq!(stores.permissions.stats().await.unwrap().total, 11);
        assert_eq!(stores.roles.counts().await.unwrap().total, 3);
        assert_eq!(stores.resources.counts().await.unwrap().total, 4);
    }

    #[tokio::test]
    async fn builtin_roles_have_expected_grants() {
        let stores = Stores::memory();
        bootstrap(&stores, None).await.unwrap();

        let admin = stores.roles.find_by_name(ADMIN_ROLE).await.unwrap().unwrap();
        assert_eq!(admin.permissions.len(), PERMISSIONS.len());

        let user = stores.roles.find_by_name(DEFAULT_ROLE).await.unwrap().unwrap();
        let names = user.permission_names();
        assert!(!names.contains(&"documents_read".to_string()));
        assert!(names.contains(&"reports_read".to_string()));

        let moderator = stores.roles.find_by_name(MODERATOR_ROLE).await.unwrap().unwrap();
        assert!(moderator
            .permission_names()
            .contains(&"documents_read".to_string()));
    }

    #[tokio::test]
    async fn bootstrap_admin_holds_admin_permissions() {
        let stores = Stores::memory();
        let admin = BootstrapAdmin {
            email: "Admin@Example.com".to_string(),
            password: SecretString::from("admin1234"),
        };
        bootstrap(&stores, Some(&admin)).await.unwrap();
        bootstrap(&stores, Some(&admin)).await.unwrap();

        let user = stores
            .users
            .find_graph_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(resolver::has_permission_name(&user, "admin_system_config"));
        assert!(resolver::has_permission(&user, "admin_panel", "users_manage"));
        assert!(password::verify_password("admin1234", &user.password_hash));
    }
}
