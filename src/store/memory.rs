//! In-memory store for tests and local development.
//!
//! All state sits behind one `RwLock`, so each write holds a single lock for its
//! whole duration and readers never see a half-applied assignment.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    inactive_role_rejected, inactive_user_rejected, permission_limit_rejected, PermissionStore,
    ResourceStore, RoleStore, StoreError, StoreResult, UserStore,
};
use crate::rbac::models::{
    EntityCounts, NewRole, NewUser, Permission, PermissionStats, ProfileUpdate, Resource, Role,
    User,
};

#[derive(Clone, Debug)]
struct UserRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role_ids: Vec<Uuid>,
}

#[derive(Clone, Debug)]
struct RoleRecord {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    permission_ids: BTreeSet<Uuid>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, UserRecord>,
    roles: HashMap<Uuid, RoleRecord>,
    permissions: HashMap<Uuid, Permission>,
    resources: HashMap<Uuid, Resource>,
}

impl State {
    fn role(&self, record: &RoleRecord) -> Role {
        let mut permissions: Vec<Permission> = record
            .permission_ids
            .iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Role {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            is_active: record.is_active,
            created_at: record.created_at,
            permissions,
        }
    }

    fn user(&self, record: &UserRecord) -> User {
        let mut roles: Vec<Role> = record
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).map(|role| self.role(role)))
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        User {
            id: record.id,
            email: record.email.clone(),
            password_hash: record.password_hash.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            middle_name: record.middle_name.clone(),
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
            roles,
        }
    }

    fn user_mut(&mut self, id: Uuid) -> StoreResult<&mut UserRecord> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    fn role_mut(&mut self, id: Uuid) -> StoreResult<&mut RoleRecord> {
        self.roles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    fn user_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.users
            .get(&id)
            .map(|record| self.user(record))
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    fn role_by_id(&self, id: Uuid) -> StoreResult<Role> {
        self.roles
            .get(&id)
            .map(|record| self.role(record))
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    fn ensure_roles_exist(&self, role_ids: &[Uuid]) -> StoreResult<()> {
        match role_ids.iter().find(|id| !self.roles.contains_key(id)) {
            Some(missing) => Err(StoreError::Unexpected(anyhow!(
                "role {missing} does not exist"
            ))),
            None => Ok(()),
        }
    }

    fn ensure_permissions_exist(&self, permission_ids: &[Uuid]) -> StoreResult<()> {
        match permission_ids
            .iter()
            .find(|id| !self.permissions.contains_key(id))
        {
            Some(missing) => Err(StoreError::Unexpected(anyhow!(
                "permission {missing} does not exist"
            ))),
            None => Ok(()),
        }
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_graph_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email)
            .map(|record| state.user(record)))
    }

    async fn find_graph_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|record| state.user(record)))
    }

    async fn list_with_roles(&self) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().map(|r| state.user(r)).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
        Ok(users)
    }

    async fn create_with_roles(&self, user: NewUser, role_ids: &[Uuid]) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {}", user.email)));
        }
        state.ensure_roles_exist(role_ids)?;

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            is_active: true,
            created_at: now,
            updated_at: now,
            role_ids: dedup(role_ids),
        };
        let id = record.id;
        state.users.insert(id, record);
        state.user_by_id(id)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let record = state.user_mut(id)?;
        if let Some(first_name) = &update.first_name {
            record.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &update.last_name {
            record.last_name.clone_from(last_name);
        }
        if let Some(middle_name) = &update.middle_name {
            record.middle_name = Some(middle_name.clone());
        }
        record.updated_at = Utc::now();
        state.user_by_id(id)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let record = state.user_mut(id)?;
        record.is_active = active;
        record.updated_at = Utc::now();
        state.user_by_id(id)
    }

    async fn replace_roles(&self, id: Uuid, role_ids: &[Uuid]) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if !state.user_mut(id)?.is_active {
            return Err(inactive_user_rejected());
        }
        state.ensure_roles_exist(role_ids)?;
        if let Some(inactive) = role_ids
            .iter()
            .filter_map(|role_id| state.roles.get(role_id))
            .find(|role| !role.is_active)
        {
            return Err(inactive_role_rejected(&inactive.name));
        }
        let record = state.user_mut(id)?;
        record.role_ids = dedup(role_ids);
        record.updated_at = Utc::now();
        state.user_by_id(id)
    }

    async fn counts(&self) -> StoreResult<EntityCounts> {
        let state = self.state.read().await;
        let active = state.users.values().filter(|u| u.is_active).count();
        Ok(EntityCounts::new(
            count(state.users.len()),
            count(active),
        ))
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.get(&id).map(|record| state.role(record)))
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .values()
            .find(|r| r.name == name)
            .map(|record| state.role(record)))
    }

    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .roles
            .values()
            .filter(|r| names.contains(&r.name))
            .map(|record| state.role(record))
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn list_with_permissions(&self) -> StoreResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state.roles.values().map(|r| state.role(r)).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_with_permissions(
        &self,
        role: NewRole,
        permission_ids: &[Uuid],
    ) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        if state.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::Conflict(format!("role {}", role.name)));
        }
        state.ensure_permissions_exist(permission_ids)?;

        let record = RoleRecord {
            id: Uuid::new_v4(),
            name: role.name,
            description: role.description,
            is_active: true,
            created_at: Utc::now(),
            permission_ids: permission_ids.iter().copied().collect(),
        };
        let id = record.id;
        state.roles.insert(id, record);
        state.role_by_id(id)
    }

    async fn replace_permissions(&self, id: Uuid, permission_ids: &[Uuid]) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        state.ensure_permissions_exist(permission_ids)?;
        state.role_mut(id)?.permission_ids = permission_ids.iter().copied().collect();
        state.role_by_id(id)
    }

    async fn add_permissions(
        &self,
        id: Uuid,
        permission_ids: &[Uuid],
        limit: usize,
    ) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        state.ensure_permissions_exist(permission_ids)?;
        let record = state.role_mut(id)?;
        let mut combined = record.permission_ids.clone();
        combined.extend(permission_ids.iter().copied());
        if combined.len() > limit {
            return Err(permission_limit_rejected(limit));
        }
        record.permission_ids = combined;
        state.role_by_id(id)
    }

    async fn remove_permissions(&self, id: Uuid, permission_ids: &[Uuid]) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        let record = state.role_mut(id)?;
        for permission_id in permission_ids {
            record.permission_ids.remove(permission_id);
        }
        state.role_by_id(id)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Role> {
        let mut state = self.state.write().await;
        state.role_mut(id)?.is_active = active;
        state.role_by_id(id)
    }

    async fn counts(&self) -> StoreResult<EntityCounts> {
        let state = self.state.read().await;
        let active = state.roles.values().filter(|r| r.is_active).count();
        Ok(EntityCounts::new(count(state.roles.len()), count(active)))
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| names.contains(&p.name))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn find_by_pair(
        &self,
        resource_type: &str,
        action: &str,
    ) -> StoreResult<Option<Permission>> {
        let state = self.state.read().await;
        Ok(state
            .permissions
            .values()
            .find(|p| p.matches(resource_type, action))
            .cloned())
    }

    async fn list(&self, resource_type: Option<&str>) -> StoreResult<Vec<Permission>> {
        let state = self.state.read().await;
        let mut permissions: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| resource_type.map_or(true, |rt| p.resource_type == rt))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| {
            a.resource_type
                .cmp(&b.resource_type)
                .then(a.action.cmp(&b.action))
        });
        Ok(permissions)
    }

    async fn insert(&self, permission: Permission) -> StoreResult<Permission> {
        let mut state = self.state.write().await;
        if state.permissions.values().any(|p| {
            p.name == permission.name || p.matches(&permission.resource_type, &permission.action)
        }) {
            return Err(StoreError::Conflict(format!("permission {}", permission.name)));
        }
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn stats(&self) -> StoreResult<PermissionStats> {
        let state = self.state.read().await;
        let resource_types: BTreeSet<&str> = state
            .permissions
            .values()
            .map(|p| p.resource_type.as_str())
            .collect();
        let actions: BTreeSet<&str> = state
            .permissions
            .values()
            .map(|p| p.action.as_str())
            .collect();
        Ok(PermissionStats {
            total: count(state.permissions.len()),
            resource_types: count(resource_types.len()),
            actions: count(actions.len()),
        })
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Resource>> {
        let state = self.state.read().await;
        let mut resources: Vec<Resource> = state.resources.values().cloned().collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resources)
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Resource>> {
        let state = self.state.read().await;
        Ok(state.resources.values().find(|r| r.name == name).cloned())
    }

    async fn insert(&self, resource: Resource) -> StoreResult<Resource> {
        let mut state = self.state.write().await;
        if state.resources.values().any(|r| r.name == resource.name) {
            return Err(StoreError::Conflict(format!("resource {}", resource.name)));
        }
        state.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn counts(&self) -> StoreResult<EntityCounts> {
        let state = self.state.read().await;
        let active = state.resources.values().filter(|r| r.is_active).count();
        Ok(EntityCounts::new(
            count(state.resources.len()),
            count(active),
        ))
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
