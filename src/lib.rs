//! # Rolegate (RBAC service)
//!
//! `rolegate` authenticates users with signed bearer tokens and authorizes every
//! protected operation against the permissions granted by their roles.
//!
//! ## Authorization model
//!
//! - **Users** hold a set of **roles**; roles hold a set of **permissions**.
//! - A permission is a `(resource_type, action)` pair with the canonical name
//!   `resource_type_action`, e.g. `documents_read`.
//! - A user's effective permissions are the union over their *active* roles only.
//!   Deactivating a role keeps the assignment but drops its grants immediately.
//! - Nothing is hard-deleted. Users and roles are deactivated instead.
//!
//! ## Tokens
//!
//! Access and refresh tokens are HS256 JWTs signed with two distinct secrets and
//! carrying a `type` claim, so one class can never stand in for the other. They
//! travel as `HttpOnly` cookies and/or an `Authorization: Bearer` header. There is
//! no server-side revocation; every request re-loads the user, so deactivation
//! takes effect on the next request.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod rbac;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
