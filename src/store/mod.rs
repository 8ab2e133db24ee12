//! Persistence seams. The core depends on these traits only; [`Stores`] bundles
//! one implementation of each behind `Arc<dyn ...>`.
//!
//! Every write method is one atomic operation: Postgres runs it inside a single
//! transaction and the memory store under a single write lock.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::rbac::models::{
    EntityCounts, NewRole, NewUser, Permission, PermissionStats, ProfileUpdate, Resource, Role,
    User,
};

pub mod memory;
pub mod postgres;
pub mod seed;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// A guard evaluated inside the write refused it; the message is client-safe.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn inactive_user_rejected() -> StoreError {
    StoreError::Rejected("Cannot assign roles to an inactive user".to_string())
}

pub(crate) fn inactive_role_rejected(name: &str) -> StoreError {
    StoreError::Rejected(format!("Role '{name}' is inactive"))
}

pub(crate) fn permission_limit_rejected(limit: usize) -> StoreError {
    StoreError::Rejected(format!("A role cannot hold more than {limit} permissions"))
}

/// Users are always returned with roles and role permissions populated.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_graph_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_graph_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn list_with_roles(&self) -> StoreResult<Vec<User>>;
    /// Insert the user and its role rows together. Duplicate emails are `Conflict`.
    async fn create_with_roles(&self, user: NewUser, role_ids: &[Uuid]) -> StoreResult<User>;
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<User>;
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<User>;
    /// Overwrite the user's role set. `Rejected` if the user or any of the
    /// roles is inactive when the write is applied.
    async fn replace_roles(&self, id: Uuid, role_ids: &[Uuid]) -> StoreResult<User>;
    async fn counts(&self) -> StoreResult<EntityCounts>;
}

/// Roles are always returned with their permissions populated.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Role>>;
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Role>>;
    async fn list_with_permissions(&self) -> StoreResult<Vec<Role>>;
    /// Insert the role and its permission rows together. Duplicate names are `Conflict`.
    async fn create_with_permissions(
        &self,
        role: NewRole,
        permission_ids: &[Uuid],
    ) -> StoreResult<Role>;
    async fn replace_permissions(&self, id: Uuid, permission_ids: &[Uuid]) -> StoreResult<Role>;
    /// Set union with the existing permissions. `Rejected` if the union would
    /// hold more than `limit` permissions.
    async fn add_permissions(
        &self,
        id: Uuid,
        permission_ids: &[Uuid],
        limit: usize,
    ) -> StoreResult<Role>;
    /// Set difference with the existing permissions.
    async fn remove_permissions(&self, id: Uuid, permission_ids: &[Uuid]) -> StoreResult<Role>;
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Role>;
    async fn counts(&self) -> StoreResult<EntityCounts>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>>;
    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Permission>>;
    /// The permission registered for a `(resource_type, action)` pair, whatever its name.
    async fn find_by_pair(&self, resource_type: &str, action: &str)
        -> StoreResult<Option<Permission>>;
    async fn list(&self, resource_type: Option<&str>) -> StoreResult<Vec<Permission>>;
    async fn insert(&self, permission: Permission) -> StoreResult<Permission>;
    async fn stats(&self) -> StoreResult<PermissionStats>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Resource>>;
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Resource>>;
    async fn insert(&self, resource: Resource) -> StoreResult<Resource>;
    async fn counts(&self) -> StoreResult<EntityCounts>;
}

#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub resources: Arc<dyn ResourceStore>,
    backend: &'static str,
}

impl Stores {
    /// Process-local store; contents are lost on exit.
    #[must_use]
    pub fn memory() -> Self {
        Self::from_backend(Arc::new(memory::MemoryStore::new()), "memory")
    }

    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_backend(Arc::new(postgres::PgStore::new(pool)), "postgres")
    }

    fn from_backend<S>(store: Arc<S>, backend: &'static str) -> Self
    where
        S: UserStore + RoleStore + PermissionStore + ResourceStore + 'static,
    {
        Self {
            users: store.clone(),
            roles: store.clone(),
            permissions: store.clone(),
            resources: store,
            backend,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
