//! Core authorization domain: credentials, tokens, permission resolution,
//! identity resolution and the account/administration services built on them.

pub mod accounts;
pub mod admin;
pub mod error;
pub mod identity;
pub mod models;
pub mod password;
pub mod resolver;
pub mod token;
pub mod validators;

pub use error::{ErrorCode, RbacError, RbacResult};
pub use identity::{IdentityResolver, Principal};
pub use models::{Permission, Resource, Role, User};
