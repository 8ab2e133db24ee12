//! Permission resolution over an already-loaded user graph. No I/O happens here.

use std::collections::BTreeSet;

use super::models::{canonical_permission_name, Permission, User};

fn active_grants(user: &User) -> impl Iterator<Item = &Permission> {
    user.roles
        .iter()
        .filter(|role| role.is_active)
        .flat_map(|role| role.permissions.iter())
}

/// Union of permission names over the user's active roles.
#[must_use]
pub fn effective_permissions(user: &User) -> BTreeSet<String> {
    active_grants(user).map(|p| p.name.clone()).collect()
}

/// Canonical-name membership, falling back to a `(resource_type, action)` match for
/// stored permissions whose name does not follow `resource_type_action`.
#[must_use]
pub fn has_permission(user: &User, resource_type: &str, action: &str) -> bool {
    let name = canonical_permission_name(resource_type, action);
    active_grants(user).any(|p| p.name == name || p.matches(resource_type, action))
}

#[must_use]
pub fn has_permission_name(user: &User, name: &str) -> bool {
    active_grants(user).any(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::models::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn role(name: &str, active: bool, permissions: Vec<Permission>) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            is_active: active,
            created_at: Utc::now(),
            permissions,
        }
    }

    fn user(roles: Vec<Role>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            middle_name: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            roles,
        }
    }

    fn perm(resource_type: &str, action: &str) -> Permission {
        Permission::new(resource_type, action, None)
    }

    #[test]
    fn union_over_active_roles() {
        let u = user(vec![
            role("reader", true, vec![perm("documents", "read"), perm("reports", "read")]),
            role("writer", true, vec![perm("documents", "read"), perm("documents", "write")]),
        ]);
        let effective = effective_permissions(&u);
        let expected: BTreeSet<String> = ["documents_read", "documents_write", "reports_read"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(effective, expected);
    }

    #[test]
    fn inactive_roles_contribute_nothing() {
        let u = user(vec![
            role("reader", false, vec![perm("documents", "read")]),
            role("writer", false, vec![perm("documents", "write")]),
        ]);
        assert!(effective_permissions(&u).is_empty());
        assert!(!has_permission(&u, "documents", "read"));
        assert!(!has_permission_name(&u, "documents_write"));
        // The assignment itself is untouched.
        assert_eq!(u.role_names(), vec!["reader", "writer"]);
    }

    #[test]
    fn inactive_role_does_not_mask_an_active_one() {
        let u = user(vec![
            role("old", false, vec![perm("documents", "read")]),
            role("new", true, vec![perm("documents", "read")]),
        ]);
        assert!(has_permission(&u, "documents", "read"));
    }

    #[test]
    fn pair_fallback_matches_non_canonical_names() {
        let u = user(vec![role(
            "admin",
            true,
            vec![Permission::named(
                "admin_system_config",
                "admin_panel",
                "system_config",
                None,
            )],
        )]);
        assert!(has_permission(&u, "admin_panel", "system_config"));
        assert!(has_permission_name(&u, "admin_system_config"));
        assert!(!has_permission_name(&u, "admin_panel_system_config"));
    }

    #[test]
    fn missing_permission_is_denied() {
        let u = user(vec![role("user", true, vec![perm("reports", "read")])]);
        assert!(!has_permission(&u, "documents", "read"));
        assert!(!has_permission_name(&u, "documents_read"));
        assert!(effective_permissions(&u).contains("reports_read"));
    }

    #[test]
    fn no_roles_means_no_permissions() {
        let u = user(Vec::new());
        assert!(effective_permissions(&u).is_empty());
        assert!(!has_permission(&u, "documents", "read"));
    }
}
