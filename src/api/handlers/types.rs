//! Response views shared by the user, resource and admin endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rbac::{
    Permission, Principal, Resource, Role, User,
    admin::SystemStats,
    models::{EntityCounts, PermissionStats},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub full_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
            full_name: user.full_name(),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles: user.role_names(),
        }
    }
}

/// The caller's own profile with effective permissions.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    pub permissions: Vec<String>,
}

impl From<&Principal> for ProfileView {
    fn from(principal: &Principal) -> Self {
        Self {
            user: UserView::from(&principal.user),
            permissions: principal.permissions.iter().cloned().collect(),
        }
    }
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self::from(&Principal::new(user.clone()))
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RoleView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<String>,
}

impl From<&Role> for RoleView {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            description: role.description.clone(),
            is_active: role.is_active,
            created_at: role.created_at,
            permissions: role.permission_names(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PermissionView {
    pub id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Permission> for PermissionView {
    fn from(permission: &Permission) -> Self {
        Self {
            id: permission.id,
            name: permission.name.clone(),
            resource_type: permission.resource_type.clone(),
            action: permission.action.clone(),
            description: permission.description.clone(),
            created_at: permission.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResourceView {
    pub id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Resource> for ResourceView {
    fn from(resource: &Resource) -> Self {
        Self {
            id: resource.id,
            name: resource.name.clone(),
            resource_type: resource.resource_type.clone(),
            description: resource.description.clone(),
            is_active: resource.is_active,
            created_at: resource.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CountsView {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

impl From<EntityCounts> for CountsView {
    fn from(counts: EntityCounts) -> Self {
        Self {
            total: counts.total,
            active: counts.active,
            inactive: counts.inactive,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PermissionStatsView {
    pub total: i64,
    pub resource_types: i64,
    pub actions: i64,
}

impl From<PermissionStats> for PermissionStatsView {
    fn from(stats: PermissionStats) -> Self {
        Self {
            total: stats.total,
            resource_types: stats.resource_types,
            actions: stats.actions,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StatsView {
    pub users: CountsView,
    pub roles: CountsView,
    pub permissions: PermissionStatsView,
    pub resources: CountsView,
}

impl From<SystemStats> for StatsView {
    fn from(stats: SystemStats) -> Self {
        Self {
            users: stats.users.into(),
            roles: stats.roles.into(),
            permissions: stats.permissions.into(),
            resources: stats.resources.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn profile_flattens_user_fields() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "secret-hash".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            middle_name: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            roles: Vec::new(),
        };
        let principal = Principal {
            user,
            permissions: BTreeSet::from(["reports_read".to_string()]),
        };
        let json = serde_json::to_value(ProfileView::from(&principal)).unwrap_or_default();
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["full_name"], "Ada Lovelace");
        assert_eq!(json["permissions"][0], "reports_read");
        assert!(json.get("password_hash").is_none());
    }
}
