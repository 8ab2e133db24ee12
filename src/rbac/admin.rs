//! Administrative operations over users, roles and the permission catalog.
//!
//! Every write validates its whole input against the current store contents
//! first and then issues exactly one store call, which the store applies
//! atomically. Rules that depend on concurrently mutable state (active flags,
//! the per-role permission limit) are enforced by the store inside that call.

use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use super::accounts::user_not_found;
use super::error::{ErrorCode, RbacError, RbacResult};
use super::models::{EntityCounts, NewRole, Permission, PermissionStats, Resource, Role, User};
use super::validators::{self, MAX_PERMISSIONS_PER_ROLE};
use crate::store::{StoreError, Stores};

/// Aggregates served by the statistics endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemStats {
    pub users: EntityCounts,
    pub roles: EntityCounts,
    pub permissions: PermissionStats,
    pub resources: EntityCounts,
}

#[derive(Clone, Debug)]
pub struct AdminService {
    stores: Stores,
}

fn role_not_found(role: &str) -> RbacError {
    RbacError::not_found(ErrorCode::RoleNotFound, format!("Role '{role}' not found"))
}

fn missing_names<'a>(requested: &'a [String], found: &BTreeSet<&str>) -> Vec<&'a str> {
    requested
        .iter()
        .map(String::as_str)
        .filter(|name| !found.contains(name))
        .collect()
}

impl AdminService {
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// # Errors
    /// Internal error if the store fails.
    pub async fn list_users(&self) -> RbacResult<Vec<User>> {
        Ok(self.stores.users.list_with_roles().await?)
    }

    /// # Errors
    /// `USER_NOT_FOUND` (404) for an unknown id.
    pub async fn get_user(&self, id: Uuid) -> RbacResult<User> {
        self.stores
            .users
            .find_graph_by_id(id)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Overwrite a user's role set by role name.
    ///
    /// The active flags of the user and of every role are checked by the store
    /// inside the write, so a concurrent deactivation cannot slip in between.
    ///
    /// # Errors
    /// `INVALID_ROLE_ASSIGNMENT` for an empty, duplicated or oversized list, an
    /// inactive user or an inactive role; `USER_NOT_FOUND` or `ROLE_NOT_FOUND` for
    /// unknown references.
    pub async fn assign_user_roles(&self, user_id: Uuid, role_names: &[String]) -> RbacResult<User> {
        let role_names: Vec<String> = role_names.iter().map(|n| n.trim().to_string()).collect();
        validators::validate_role_assignment(&role_names)?;

        let roles = self.stores.roles.find_by_names(&role_names).await?;
        let found: BTreeSet<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        let missing = missing_names(&role_names, &found);
        if !missing.is_empty() {
            return Err(RbacError::not_found(
                ErrorCode::RoleNotFound,
                format!("Roles not found: {}", missing.join(", ")),
            ));
        }

        let role_ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        let user = match self.stores.users.replace_roles(user_id, &role_ids).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(user_not_found()),
            Err(StoreError::Rejected(reason)) => {
                return Err(RbacError::validation(ErrorCode::InvalidRoleAssignment, reason))
            }
            Err(err) => return Err(err.into()),
        };
        info!(user_id = %user.id, roles = ?user.role_names(), "Replaced user roles");
        Ok(user)
    }

    /// # Errors
    /// `USER_NOT_FOUND` (404) for an unknown id.
    pub async fn set_user_active(&self, user_id: Uuid, active: bool) -> RbacResult<User> {
        match self.stores.users.set_active(user_id, active).await {
            Ok(user) => {
                info!(user_id = %user.id, active, "Changed user active flag");
                Ok(user)
            }
            Err(StoreError::NotFound(_)) => Err(user_not_found()),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    /// Internal error if the store fails.
    pub async fn list_roles(&self) -> RbacResult<Vec<Role>> {
        Ok(self.stores.roles.list_with_permissions().await?)
    }

    /// Look a role up by UUID, falling back to its name.
    ///
    /// # Errors
    /// `ROLE_NOT_FOUND` (404).
    pub async fn get_role(&self, id_or_name: &str) -> RbacResult<Role> {
        let role = match Uuid::parse_str(id_or_name) {
            Ok(id) => self.stores.roles.find_by_id(id).await?,
            Err(_) => self.stores.roles.find_by_name(id_or_name.trim()).await?,
        };
        role.ok_or_else(|| role_not_found(id_or_name))
    }

    async fn role_by_id(&self, id: Uuid) -> RbacResult<Role> {
        self.stores
            .roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| role_not_found(&id.to_string()))
    }

    /// Resolve permission names to ids; every name must exist.
    async fn resolve_permissions(&self, names: &[String]) -> RbacResult<Vec<Uuid>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let permissions = self.stores.permissions.find_by_names(names).await?;
        let found: BTreeSet<&str> = permissions.iter().map(|p| p.name.as_str()).collect();
        let missing = missing_names(names, &found);
        if !missing.is_empty() {
            return Err(RbacError::not_found(
                ErrorCode::PermissionNotFound,
                format!("Permissions not found: {}", missing.join(", ")),
            ));
        }
        Ok(permissions.iter().map(|p| p.id).collect())
    }

    fn map_role_write(err: StoreError, id: Uuid) -> RbacError {
        match err {
            StoreError::NotFound(_) => role_not_found(&id.to_string()),
            StoreError::Rejected(reason) => {
                RbacError::validation(ErrorCode::InvalidPermissionAssignment, reason)
            }
            other => other.into(),
        }
    }

    /// # Errors
    /// `INVALID_ROLE_NAME`, `INVALID_PERMISSION_ASSIGNMENT`, `PERMISSION_NOT_FOUND`
    /// or `ROLE_ALREADY_EXISTS` (409).
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<String>,
        permission_names: &[String],
    ) -> RbacResult<Role> {
        let name = validators::validate_role_name(name)?;
        validators::validate_permission_assignment(permission_names)?;

        if self.stores.roles.find_by_name(&name).await?.is_some() {
            return Err(role_exists(&name));
        }
        let permission_ids = self.resolve_permissions(permission_names).await?;

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let role = match self
            .stores
            .roles
            .create_with_permissions(NewRole { name: name.clone(), description }, &permission_ids)
            .await
        {
            Ok(role) => role,
            Err(StoreError::Conflict(_)) => return Err(role_exists(&name)),
            Err(err) => return Err(err.into()),
        };
        info!(role_id = %role.id, role = %role.name, "Created role");
        Ok(role)
    }

    /// Overwrite a role's permission set.
    ///
    /// # Errors
    /// `ROLE_NOT_FOUND`, `PERMISSION_NOT_FOUND` or `INVALID_PERMISSION_ASSIGNMENT`.
    pub async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        permission_names: &[String],
    ) -> RbacResult<Role> {
        validators::validate_permission_assignment(permission_names)?;
        self.role_by_id(role_id).await?;
        let permission_ids = self.resolve_permissions(permission_names).await?;

        let role = self
            .stores
            .roles
            .replace_permissions(role_id, &permission_ids)
            .await
            .map_err(|err| Self::map_role_write(err, role_id))?;
        info!(role_id = %role.id, count = role.permissions.len(), "Replaced role permissions");
        Ok(role)
    }

    /// Add permissions to a role; already-held permissions are ignored.
    ///
    /// # Errors
    /// As [`Self::replace_role_permissions`]; also rejects an empty list and a
    /// resulting set larger than the per-role limit, counted by the store under
    /// the same lock that applies the addition.
    pub async fn add_role_permissions(
        &self,
        role_id: Uuid,
        permission_names: &[String],
    ) -> RbacResult<Role> {
        require_non_empty(permission_names)?;
        validators::validate_permission_assignment(permission_names)?;
        self.role_by_id(role_id).await?;
        let permission_ids = self.resolve_permissions(permission_names).await?;

        let role = self
            .stores
            .roles
            .add_permissions(role_id, &permission_ids, MAX_PERMISSIONS_PER_ROLE)
            .await
            .map_err(|err| Self::map_role_write(err, role_id))?;
        info!(role_id = %role.id, added = permission_ids.len(), "Added role permissions");
        Ok(role)
    }

    /// Remove permissions from a role; permissions it does not hold are ignored.
    ///
    /// # Errors
    /// As [`Self::replace_role_permissions`]; also rejects an empty list.
    pub async fn remove_role_permissions(
        &self,
        role_id: Uuid,
        permission_names: &[String],
    ) -> RbacResult<Role> {
        require_non_empty(permission_names)?;
        validators::validate_permission_assignment(permission_names)?;
        self.role_by_id(role_id).await?;
        let permission_ids = self.resolve_permissions(permission_names).await?;

        let role = self
            .stores
            .roles
            .remove_permissions(role_id, &permission_ids)
            .await
            .map_err(|err| Self::map_role_write(err, role_id))?;
        info!(role_id = %role.id, removed = permission_ids.len(), "Removed role permissions");
        Ok(role)
    }

    /// # Errors
    /// `ROLE_NOT_FOUND` (404).
    pub async fn set_role_active(&self, role_id: Uuid, active: bool) -> RbacResult<Role> {
        let role = self
            .stores
            .roles
            .set_active(role_id, active)
            .await
            .map_err(|err| Self::map_role_write(err, role_id))?;
        info!(role_id = %role.id, active, "Changed role active flag");
        Ok(role)
    }

    /// # Errors
    /// Internal error if the store fails.
    pub async fn list_permissions(&self, resource_type: Option<&str>) -> RbacResult<Vec<Permission>> {
        let filter = resource_type.map(str::trim).filter(|t| !t.is_empty());
        Ok(self.stores.permissions.list(filter).await?)
    }

    /// # Errors
    /// Internal error if the store fails.
    pub async fn list_resources(&self) -> RbacResult<Vec<Resource>> {
        Ok(self.stores.resources.list().await?)
    }

    /// Independent aggregates fetched concurrently; counts may be from slightly
    /// different instants.
    ///
    /// # Errors
    /// Internal error if any aggregate fails.
    pub async fn stats(&self) -> RbacResult<SystemStats> {
        let (users, roles, permissions, resources) = tokio::try_join!(
            self.stores.users.counts(),
            self.stores.roles.counts(),
            self.stores.permissions.stats(),
            self.stores.resources.counts(),
        )?;
        Ok(SystemStats {
            users,
            roles,
            permissions,
            resources,
        })
    }
}

fn role_exists(name: &str) -> RbacError {
    RbacError::conflict(
        ErrorCode::RoleAlreadyExists,
        format!("Role '{name}' already exists"),
    )
}

fn require_non_empty(permission_names: &[String]) -> RbacResult<()> {
    if permission_names.is_empty() {
        return Err(RbacError::validation(
            ErrorCode::InvalidPermissionAssignment,
            "Permission list must not be empty",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rbac::models::NewUser;
    use crate::rbac::resolver;
    use crate::store::seed;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    async fn setup() -> (AdminService, Stores, User) {
        let stores = Stores::memory();
        seed::bootstrap(&stores, None).await.unwrap();
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
        (AdminService::new(stores.clone()), stores, user)
    }

    fn code<T>(result: RbacResult<T>) -> Option<ErrorCode> {
        result.err().map(|e| e.code())
    }

    #[tokio::test]
    async fn assign_roles_replaces_the_set() {
        let (admin, _, user) = setup().await;
        let updated = admin
            .assign_user_roles(user.id, &names(&["moderator"]))
            .await
            .unwrap();
        assert_eq!(updated.role_names(), vec!["moderator"]);
        assert!(resolver::has_permission(&updated, "documents", "read"));
    }

    #[tokio::test]
    async fn assign_roles_enforces_cardinality() {
        let (admin, _, user) = setup().await;
        let eleven: Vec<String> = (0..11).map(|i| format!("role_{i}")).collect();
        assert_eq!(
            code(admin.assign_user_roles(user.id, &eleven).await),
            Some(ErrorCode::InvalidRoleAssignment)
        );
        assert_eq!(
            code(admin.assign_user_roles(user.id, &names(&["user", "user"])).await),
            Some(ErrorCode::InvalidRoleAssignment)
        );
        assert_eq!(
            code(admin.assign_user_roles(user.id, &[]).await),
            Some(ErrorCode::InvalidRoleAssignment)
        );
    }

    #[tokio::test]
    async fn assign_roles_rejects_unknown_or_inactive() {
        let (admin, stores, user) = setup().await;
        assert_eq!(
            code(admin.assign_user_roles(user.id, &names(&["ghost"])).await),
            Some(ErrorCode::RoleNotFound)
        );
        assert_eq!(
            code(admin.assign_user_roles(Uuid::new_v4(), &names(&["user"])).await),
            Some(ErrorCode::UserNotFound)
        );

        let moderator = stores.roles.find_by_name("moderator").await.unwrap().unwrap();
        admin.set_role_active(moderator.id, false).await.unwrap();
        assert_eq!(
            code(admin.assign_user_roles(user.id, &names(&["moderator"])).await),
            Some(ErrorCode::InvalidRoleAssignment)
        );

        admin.set_user_active(user.id, false).await.unwrap();
        assert_eq!(
            code(admin.assign_user_roles(user.id, &names(&["user"])).await),
            Some(ErrorCode::InvalidRoleAssignment)
        );
        let unchanged = admin.get_user(user.id).await.unwrap();
        assert_eq!(unchanged.role_names(), vec!["user"]);
    }

    #[tokio::test]
    async fn create_role_validates_and_detects_conflicts() {
        let (admin, _, _) = setup().await;
        let role = admin
            .create_role(" editor ", Some("Edits".to_string()), &names(&["documents_write"]))
            .await
            .unwrap();
        assert_eq!(role.name, "editor");
        assert_eq!(role.permission_names(), vec!["documents_write"]);

        assert_eq!(
            code(admin.create_role("editor", None, &[]).await),
            Some(ErrorCode::RoleAlreadyExists)
        );
        assert_eq!(
            code(admin.create_role("bad name!", None, &[]).await),
            Some(ErrorCode::InvalidRoleName)
        );
        assert_eq!(
            code(admin.create_role("auditor", None, &names(&["nope_read"])).await),
            Some(ErrorCode::PermissionNotFound)
        );
        assert!(admin.get_role("auditor").await.is_err());
    }

    #[tokio::test]
    async fn add_then_remove_permission_revokes_it() {
        let (admin, stores, user) = setup().await;
        let role = admin.get_role("user").await.unwrap();

        admin
            .add_role_permissions(role.id, &names(&["documents_read"]))
            .await
            .unwrap();
        let holder = stores.users.find_graph_by_id(user.id).await.unwrap().unwrap();
        assert!(resolver::has_permission_name(&holder, "documents_read"));

        admin
            .remove_role_permissions(role.id, &names(&["documents_read"]))
            .await
            .unwrap();
        let holder = stores.users.find_graph_by_id(user.id).await.unwrap().unwrap();
        assert!(!resolver::has_permission_name(&holder, "documents_read"));
        assert!(!resolver::has_permission_name(&holder, "documents_delete"));
    }

    #[tokio::test]
    async fn replace_permissions_overwrites() {
        let (admin, _, _) = setup().await;
        let role = admin.get_role("moderator").await.unwrap();
        let replaced = admin
            .replace_role_permissions(role.id, &names(&["reports_read"]))
            .await
            .unwrap();
        assert_eq!(replaced.permission_names(), vec!["reports_read"]);

        let cleared = admin.replace_role_permissions(role.id, &[]).await.unwrap();
        assert!(cleared.permissions.is_empty());

        assert_eq!(
            code(admin.add_role_permissions(role.id, &[]).await),
            Some(ErrorCode::InvalidPermissionAssignment)
        );
        assert_eq!(
            code(admin.replace_role_permissions(Uuid::new_v4(), &[]).await),
            Some(ErrorCode::RoleNotFound)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_additions_never_exceed_the_role_limit() {
        let (admin, stores, _) = setup().await;
        let mut catalog = Vec::new();
        for i in 0..55 {
            let permission = stores
                .permissions
                .insert(Permission::new(&format!("widget{i}"), "read", None))
                .await
                .unwrap();
            catalog.push(permission.name);
        }
        let role_id = admin
            .create_role("crowded", None, &catalog[..45])
            .await
            .unwrap()
            .id;

        let first = {
            let admin = admin.clone();
            let names = catalog[45..50].to_vec();
            tokio::spawn(async move { admin.add_role_permissions(role_id, &names).await })
        };
        let second = {
            let admin = admin.clone();
            let names = catalog[50..55].to_vec();
            tokio::spawn(async move { admin.add_role_permissions(role_id, &names).await })
        };
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        let role = admin.get_role("crowded").await.unwrap();
        assert!(role.permissions.len() <= MAX_PERMISSIONS_PER_ROLE);
        assert_eq!(role.permissions.len(), 50);
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.into_iter().any(|r| {
            r.err().map(|e| e.code()) == Some(ErrorCode::InvalidPermissionAssignment)
        }));
    }

    #[tokio::test]
    async fn inactive_role_grants_nothing() {
        let (admin, stores, user) = setup().await;
        let role = admin.get_role("user").await.unwrap();
        admin.set_role_active(role.id, false).await.unwrap();

        let holder = stores.users.find_graph_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(holder.role_names(), vec!["user"]);
        assert!(resolver::effective_permissions(&holder).is_empty());
    }

    #[tokio::test]
    async fn stats_and_catalog() {
        let (admin, _, user) = setup().await;
        admin.set_user_active(user.id, false).await.unwrap();

        let stats = admin.stats().await.unwrap();
        assert_eq!(stats.users, EntityCounts::new(1, 0));
        assert_eq!(stats.roles.total, 3);
        assert_eq!(stats.permissions.total, 11);
        assert_eq!(stats.resources.active, 4);

        let documents = admin.list_permissions(Some("documents")).await.unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(admin.list_permissions(Some(" ")).await.unwrap().len(), 11);
        assert_eq!(admin.list_resources().await.unwrap().len(), 4);
    }
}
