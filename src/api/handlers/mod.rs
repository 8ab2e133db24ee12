pub mod admin;
pub mod auth;
pub mod health;
pub mod resources;
pub(crate) mod types;
pub mod users;
