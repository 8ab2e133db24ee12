//! Auth handlers and supporting modules.
//!
//! Tokens travel either as `Authorization: Bearer` headers or as the
//! `access_token`/`refresh_token` cookies. Login and refresh set both cookies,
//! logout clears them.

pub(crate) mod cookies;
pub mod login;
pub mod logout;
pub(crate) mod principal;
pub mod refresh;
pub mod register;
mod state;
pub(crate) mod types;

pub use cookies::{CookieOptions, SameSite};
pub use state::AuthConfig;
