//! `PostgreSQL` store built on `sqlx`.
//!
//! Reads load the authorization graph in one joined query. Each write runs in a
//! single transaction that is committed only after every statement succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::{
    inactive_role_rejected, inactive_user_rejected, permission_limit_rejected, PermissionStore,
    ResourceStore, RoleStore, StoreError, StoreResult, UserStore,
};
use crate::rbac::models::{
    EntityCounts, NewRole, NewUser, Permission, PermissionStats, ProfileUpdate, Resource, Role,
    User,
};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const USER_GRAPH_SELECT: &str = r"
SELECT u.id, u.email, u.password_hash, u.first_name, u.last_name, u.middle_name,
       u.is_active, u.created_at, u.updated_at,
       r.id AS role_id, r.name AS role_name, r.description AS role_description,
       r.is_active AS role_is_active, r.created_at AS role_created_at,
       p.id AS permission_id, p.name AS permission_name,
       p.resource_type AS permission_resource_type, p.action AS permission_action,
       p.description AS permission_description, p.created_at AS permission_created_at
FROM users u
LEFT JOIN user_roles ur ON ur.user_id = u.id
LEFT JOIN roles r ON r.id = ur.role_id
LEFT JOIN role_permissions rp ON rp.role_id = r.id
LEFT JOIN permissions p ON p.id = rp.permission_id
";

const USER_GRAPH_ORDER: &str = "ORDER BY u.created_at, u.email, r.name, p.name";

const ROLE_GRAPH_SELECT: &str = r"
SELECT r.id, r.name, r.description, r.is_active, r.created_at,
       p.id AS permission_id, p.name AS permission_name,
       p.resource_type AS permission_resource_type, p.action AS permission_action,
       p.description AS permission_description, p.created_at AS permission_created_at
FROM roles r
LEFT JOIN role_permissions rp ON rp.role_id = r.id
LEFT JOIN permissions p ON p.id = rp.permission_id
";

const ROLE_GRAPH_ORDER: &str = "ORDER BY r.name, p.name";

const PERMISSION_SELECT: &str =
    "SELECT id, name, resource_type, action, description, created_at FROM permissions";

const RESOURCE_SELECT: &str =
    "SELECT id, name, resource_type, description, is_active, created_at FROM resources";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Unexpected(anyhow::Error::new(err))
}

fn insert_err(what: String) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        if is_unique_violation(&err) {
            StoreError::Conflict(what)
        } else {
            db_err(err)
        }
    }
}

#[derive(sqlx::FromRow)]
struct PermissionColumns {
    permission_id: Option<Uuid>,
    permission_name: Option<String>,
    permission_resource_type: Option<String>,
    permission_action: Option<String>,
    permission_description: Option<String>,
    permission_created_at: Option<DateTime<Utc>>,
}

impl PermissionColumns {
    fn into_permission(self) -> Option<Permission> {
        Some(Permission {
            id: self.permission_id?,
            name: self.permission_name?,
            resource_type: self.permission_resource_type?,
            action: self.permission_action?,
            description: self.permission_description,
            created_at: self.permission_created_at?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserGraphRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role_id: Option<Uuid>,
    role_name: Option<String>,
    role_description: Option<String>,
    role_is_active: Option<bool>,
    role_created_at: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    permission: PermissionColumns,
}

#[derive(sqlx::FromRow)]
struct RoleGraphRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    permission: PermissionColumns,
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    id: Uuid,
    name: String,
    resource_type: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            resource_type: row.resource_type,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: Uuid,
    name: String,
    resource_type: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            resource_type: row.resource_type,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Fold joined rows (ordered by user, then role) into user graphs.
fn fold_users(rows: Vec<UserGraphRow>) -> Vec<User> {
    let mut users: Vec<User> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for row in rows {
        let position = *index.entry(row.id).or_insert_with(|| {
            users.push(User {
                id: row.id,
                email: row.email.clone(),
                password_hash: row.password_hash.clone(),
                first_name: row.first_name.clone(),
                last_name: row.last_name.clone(),
                middle_name: row.middle_name.clone(),
                is_active: row.is_active,
                created_at: row.created_at,
                updated_at: row.updated_at,
                roles: Vec::new(),
            });
            users.len() - 1
        });

        let (Some(role_id), Some(role_name), Some(role_is_active), Some(role_created_at)) = (
            row.role_id,
            row.role_name,
            row.role_is_active,
            row.role_created_at,
        ) else {
            continue;
        };

        let roles = &mut users[position].roles;
        if roles.last().map(|r| r.id) != Some(role_id) {
            roles.push(Role {
                id: role_id,
                name: role_name,
                description: row.role_description,
                is_active: role_is_active,
                created_at: role_created_at,
                permissions: Vec::new(),
            });
        }
        if let (Some(role), Some(permission)) = (roles.last_mut(), row.permission.into_permission())
        {
            role.permissions.push(permission);
        }
    }

    users
}

fn fold_roles(rows: Vec<RoleGraphRow>) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::new();
    for row in rows {
        if roles.last().map(|r| r.id) != Some(row.id) {
            roles.push(Role {
                id: row.id,
                name: row.name,
                description: row.description,
                is_active: row.is_active,
                created_at: row.created_at,
                permissions: Vec::new(),
            });
        }
        if let (Some(role), Some(permission)) = (roles.last_mut(), row.permission.into_permission())
        {
            role.permissions.push(permission);
        }
    }
    roles
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the idempotent schema.
    ///
    /// # Errors
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    async fn users_where(&self, clause: &str, bind: UserKey<'_>) -> StoreResult<Vec<User>> {
        let sql = format!("{USER_GRAPH_SELECT} {clause} {USER_GRAPH_ORDER}");
        let query = sqlx::query_as::<_, UserGraphRow>(&sql);
        let query = match bind {
            UserKey::Id(id) => query.bind(id),
            UserKey::Email(email) => query.bind(email),
            UserKey::All => query,
        };
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(fold_users(rows))
    }

    async fn roles_where(&self, clause: &str, bind: RoleKey<'_>) -> StoreResult<Vec<Role>> {
        let sql = format!("{ROLE_GRAPH_SELECT} {clause} {ROLE_GRAPH_ORDER}");
        let query = sqlx::query_as::<_, RoleGraphRow>(&sql);
        let query = match bind {
            RoleKey::Id(id) => query.bind(id),
            RoleKey::Name(name) => query.bind(name),
            RoleKey::Names(names) => query.bind(names),
            RoleKey::All => query,
        };
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(fold_roles(rows))
    }

    async fn user_graph(&self, id: Uuid) -> StoreResult<User> {
        self.find_graph_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn role_graph(&self, id: Uuid) -> StoreResult<Role> {
        RoleStore::find_by_id(self, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn counts_of(&self, table: &str) -> StoreResult<EntityCounts> {
        let sql = format!(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE is_active) AS active FROM {table}"
        );
        let (total, active): (i64, i64) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(EntityCounts::new(total, active))
    }
}

enum UserKey<'a> {
    Id(Uuid),
    Email(&'a str),
    All,
}

enum RoleKey<'a> {
    Id(Uuid),
    Name(&'a str),
    Names(&'a [String]),
    All,
}

/// Lock a role row for the rest of the transaction, failing if it is absent.
async fn lock_role(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> StoreResult<()> {
    sqlx::query("SELECT 1 FROM roles WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?
        .map(|_| ())
        .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
}

async fn insert_role_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role_id: Uuid,
    permission_ids: &[Uuid],
) -> StoreResult<()> {
    if permission_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id)
         SELECT $1, UNNEST($2::uuid[])
         ON CONFLICT DO NOTHING",
    )
    .bind(role_id)
    .bind(permission_ids)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn insert_user_roles(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    role_ids: &[Uuid],
) -> StoreResult<()> {
    if role_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id)
         SELECT $1, UNNEST($2::uuid[])
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_ids)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_graph_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self
            .users_where("WHERE u.email = $1", UserKey::Email(email))
            .await?;
        Ok(users.into_iter().next())
    }

    async fn find_graph_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users_where("WHERE u.id = $1", UserKey::Id(id)).await?;
        Ok(users.into_iter().next())
    }

    async fn list_with_roles(&self) -> StoreResult<Vec<User>> {
        self.users_where("", UserKey::All).await
    }

    async fn create_with_roles(&self, user: NewUser, role_ids: &[Uuid]) -> StoreResult<User> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, middle_name)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.middle_name)
        .execute(&mut *tx)
        .await
        .map_err(insert_err(format!("email {}", user.email)))?;

        insert_user_roles(&mut tx, id, role_ids).await?;
        tx.commit().await.map_err(db_err)?;

        self.user_graph(id).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<User> {
        let result = sqlx::query(
            "UPDATE users
             SET first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name),
                 middle_name = COALESCE($4, middle_name),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.middle_name)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        self.user_graph(id).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<User> {
        let result =
            sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        self.user_graph(id).await
    }

    async fn replace_roles(&self, id: Uuid, role_ids: &[Uuid]) -> StoreResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        match active {
            None => return Err(StoreError::NotFound(format!("user {id}"))),
            Some(false) => return Err(inactive_user_rejected()),
            Some(true) => {}
        }

        // FOR SHARE holds off a concurrent role deactivation until commit.
        let roles: Vec<(String, bool)> = sqlx::query_as(
            "SELECT name, is_active FROM roles WHERE id = ANY($1) ORDER BY name FOR SHARE",
        )
        .bind(role_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        if let Some((name, _)) = roles.iter().find(|(_, is_active)| !is_active) {
            return Err(inactive_role_rejected(name));
        }

        sqlx::query("UPDATE users SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        insert_user_roles(&mut tx, id, role_ids).await?;
        tx.commit().await.map_err(db_err)?;

        self.user_graph(id).await
    }

    async fn counts(&self) -> StoreResult<EntityCounts> {
        self.counts_of("users").await
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Role>> {
        let roles = self.roles_where("WHERE r.id = $1", RoleKey::Id(id)).await?;
        Ok(roles.into_iter().next())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let roles = self
            .roles_where("WHERE r.name = $1", RoleKey::Name(name))
            .await?;
        Ok(roles.into_iter().next())
    }

    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Role>> {
        self.roles_where("WHERE r.name = ANY($1)", RoleKey::Names(names))
            .await
    }

    async fn list_with_permissions(&self) -> StoreResult<Vec<Role>> {
        self.roles_where("", RoleKey::All).await
    }

    async fn create_with_permissions(
        &self,
        role: NewRole,
        permission_ids: &[Uuid],
    ) -> StoreResult<Role> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("INSERT INTO roles (id, name, description) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&role.name)
            .bind(&role.description)
            .execute(&mut *tx)
            .await
            .map_err(insert_err(format!("role {}", role.name)))?;

        insert_role_permissions(&mut tx, id, permission_ids).await?;
        tx.commit().await.map_err(db_err)?;

        self.role_graph(id).await
    }

    async fn replace_permissions(&self, id: Uuid, permission_ids: &[Uuid]) -> StoreResult<Role> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        lock_role(&mut tx, id).await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        insert_role_permissions(&mut tx, id, permission_ids).await?;
        tx.commit().await.map_err(db_err)?;
        self.role_graph(id).await
    }

    async fn add_permissions(
        &self,
        id: Uuid,
        permission_ids: &[Uuid],
        limit: usize,
    ) -> StoreResult<Role> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        lock_role(&mut tx, id).await?;
        let combined: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                 SELECT permission_id FROM role_permissions WHERE role_id = $1
                 UNION
                 SELECT UNNEST($2::uuid[])
             ) AS combined",
        )
        .bind(id)
        .bind(permission_ids)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if usize::try_from(combined).unwrap_or(usize::MAX) > limit {
            return Err(permission_limit_rejected(limit));
        }
        insert_role_permissions(&mut tx, id, permission_ids).await?;
        tx.commit().await.map_err(db_err)?;
        self.role_graph(id).await
    }

    async fn remove_permissions(&self, id: Uuid, permission_ids: &[Uuid]) -> StoreResult<Role> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        lock_role(&mut tx, id).await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = ANY($2)")
            .bind(id)
            .bind(permission_ids)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        self.role_graph(id).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Role> {
        let result = sqlx::query("UPDATE roles SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("role {id}")));
        }
        self.role_graph(id).await
    }

    async fn counts(&self) -> StoreResult<EntityCounts> {
        self.counts_of("roles").await
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let sql = format!("{PERMISSION_SELECT} WHERE name = $1");
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Permission::from))
    }

    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Permission>> {
        let sql = format!("{PERMISSION_SELECT} WHERE name = ANY($1) ORDER BY name");
        let rows = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn find_by_pair(
        &self,
        resource_type: &str,
        action: &str,
    ) -> StoreResult<Option<Permission>> {
        let sql = format!("{PERMISSION_SELECT} WHERE resource_type = $1 AND action = $2");
        let row = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(resource_type)
            .bind(action)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Permission::from))
    }

    async fn list(&self, resource_type: Option<&str>) -> StoreResult<Vec<Permission>> {
        let sql = format!(
            "{PERMISSION_SELECT} WHERE ($1::text IS NULL OR resource_type = $1) ORDER BY resource_type, action"
        );
        let rows = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(resource_type)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn insert(&self, permission: Permission) -> StoreResult<Permission> {
        sqlx::query(
            "INSERT INTO permissions (id, name, resource_type, action, description, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(permission.id)
        .bind(&permission.name)
        .bind(&permission.resource_type)
        .bind(&permission.action)
        .bind(&permission.description)
        .bind(permission.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err(format!("permission {}", permission.name)))?;
        Ok(permission)
    }

    async fn stats(&self) -> StoreResult<PermissionStats> {
        let (total, resource_types, actions): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT resource_type), COUNT(DISTINCT action) FROM permissions",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(PermissionStats {
            total,
            resource_types,
            actions,
        })
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn list(&self) -> StoreResult<Vec<Resource>> {
        let sql = format!("{RESOURCE_SELECT} ORDER BY name");
        let rows = sqlx::query_as::<_, ResourceRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Resource::from).collect())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Resource>> {
        let sql = format!("{RESOURCE_SELECT} WHERE name = $1");
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Resource::from))
    }

    async fn insert(&self, resource: Resource) -> StoreResult<Resource> {
        sqlx::query(
            "INSERT INTO resources (id, name, resource_type, description, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(resource.id)
        .bind(&resource.name)
        .bind(&resource.resource_type)
        .bind(&resource.description)
        .bind(resource.is_active)
        .bind(resource.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err(format!("resource {}", resource.name)))?;
        Ok(resource)
    }

    async fn counts(&self) -> StoreResult<EntityCounts> {
        self.counts_of("resources").await
    }
}

/// Runs against a real database only when `ROLEGATE_TEST_DSN` is set.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{seed, Stores};

    async fn test_pool() -> Option<PgPool> {
        let dsn = std::env::var("ROLEGATE_TEST_DSN").ok()?;
        let pool = PgPool::connect(&dsn).await.ok()?;
        PgStore::migrate(&pool).await.ok()?;
        Some(pool)
    }

    #[tokio::test]
    async fn graph_round_trip_against_postgres() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let stores = Stores::postgres(pool);
        seed::bootstrap(&stores, None).await.unwrap();

        let moderator = stores.roles.find_by_name("moderator").await.unwrap().unwrap();
        let email = format!("pg-{}@x.com", Uuid::new_v4());
        let user = stores
            .users
            .create_with_roles(
                NewUser {
                    email: email.clone(),
                    password_hash: "hash".to_string(),
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    middle_name: None,
                },
                &[moderator.id],
            )
            .await
            .unwrap();

        let loaded = stores.users.find_graph_by_email(&email).await.unwrap().unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.role_names(), vec!["moderator"]);
        assert!(loaded.roles[0]
            .permission_names()
            .contains(&"documents_read".to_string()));

        let duplicate = stores
            .users
            .create_with_roles(
                NewUser {
                    email,
                    password_hash: "hash".to_string(),
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    middle_name: None,
                },
                &[],
            )
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn guarded_writes_against_postgres() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let stores = Stores::postgres(pool);
        seed::bootstrap(&stores, None).await.unwrap();

        let read = stores.permissions.find_by_name("documents_read").await.unwrap().unwrap();
        let write = stores.permissions.find_by_name("documents_write").await.unwrap().unwrap();
        let role = stores
            .roles
            .create_with_permissions(
                NewRole {
                    name: format!("pg-{}", Uuid::new_v4().simple()),
                    description: None,
                },
                &[read.id],
            )
            .await
            .unwrap();
        let err = stores.roles.add_permissions(role.id, &[write.id], 1).await;
        assert!(matches!(err, Err(StoreError::Rejected(_))));
        assert!(stores.roles.add_permissions(role.id, &[read.id], 1).await.is_ok());

        let user = stores
            .users
            .create_with_roles(
                NewUser {
                    email: format!("pg-{}@x.com", Uuid::new_v4()),
                    password_hash: "hash".to_string(),
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    middle_name: None,
                },
                &[],
            )
            .await
            .unwrap();
        stores.roles.set_active(role.id, false).await.unwrap();
        let err = stores.users.replace_roles(user.id, &[role.id]).await;
        assert!(matches!(err, Err(StoreError::Rejected(_))));
    }

    #[test]
    fn fold_users_groups_roles_and_permissions() {
        let user_id = Uuid::new_v4();
        let role_id = Uuid::new_v4();
        let now = Utc::now();
        let row = |permission: Option<(&str, &str)>| UserGraphRow {
            id: user_id,
            email: "a@x.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            middle_name: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            role_id: Some(role_id),
            role_name: Some("editor".to_string()),
            role_description: None,
            role_is_active: Some(true),
            role_created_at: Some(now),
            permission: PermissionColumns {
                permission_id: permission.map(|_| Uuid::new_v4()),
                permission_name: permission.map(|(rt, a)| format!("{rt}_{a}")),
                permission_resource_type: permission.map(|(rt, _)| rt.to_string()),
                permission_action: permission.map(|(_, a)| a.to_string()),
                permission_description: None,
                permission_created_at: permission.map(|_| now),
            },
        };

        let users = fold_users(vec![
            row(Some(("documents", "read"))),
            row(Some(("documents", "write"))),
        ]);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].roles.len(), 1);
        assert_eq!(
            users[0].roles[0].permission_names(),
            vec!["documents_read", "documents_write"]
        );

        let empty_role = fold_users(vec![row(None)]);
        assert!(empty_role[0].roles[0].permissions.is_empty());
    }

    #[test]
    fn unique_violation_is_not_triggered_by_other_errors() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(matches!(
            insert_err("x".to_string())(sqlx::Error::RowNotFound),
            StoreError::Unexpected(_)
        ));
    }
}
