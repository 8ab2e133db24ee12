use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Build the canonical `resource_type_action` permission name.
#[must_use]
pub fn canonical_permission_name(resource_type: &str, action: &str) -> String {
    format!("{resource_type}_{action}")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    #[must_use]
    pub fn new(resource_type: &str, action: &str, description: Option<&str>) -> Self {
        Self::named(
            &canonical_permission_name(resource_type, action),
            resource_type,
            action,
            description,
        )
    }

    /// Permission whose stored name does not follow `resource_type_action`.
    #[must_use]
    pub fn named(name: &str, resource_type: &str, action: &str, description: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            action: action.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn matches(&self, resource_type: &str, action: &str) -> bool {
        self.resource_type == resource_type && self.action == action
    }
}

/// A role together with the permissions attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<Permission>,
}

impl Role {
    #[must_use]
    pub fn permission_names(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.name.clone()).collect()
    }
}

/// A user with the full authorization graph (roles and their permissions) loaded.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<Role>,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }

    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    #[must_use]
    pub fn new(name: &str, resource_type: &str, description: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            description: description.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Insert payload for a user; the password is already hashed.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

/// Partial profile update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.middle_name.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

impl EntityCounts {
    #[must_use]
    pub fn new(total: i64, active: i64) -> Self {
        Self {
            total,
            active,
            inactive: total - active,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionStats {
    pub total: i64,
    pub resource_types: i64,
    pub actions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_joins_with_underscore() {
        assert_eq!(canonical_permission_name("documents", "read"), "documents_read");
        assert_eq!(
            canonical_permission_name("admin", "system_config"),
            "admin_system_config"
        );
    }

    #[test]
    fn full_name_includes_middle_name_when_present() {
        let now = Utc::now();
        let mut user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            middle_name: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            roles: Vec::new(),
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
        user.middle_name = Some("King".to_string());
        assert_eq!(user.full_name(), "Ada King Lovelace");
    }

    #[test]
    fn entity_counts_derive_inactive() {
        let counts = EntityCounts::new(10, 7);
        assert_eq!(counts.inactive, 3);
    }
}
