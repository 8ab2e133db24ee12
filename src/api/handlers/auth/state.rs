//! Cookie transport configuration for the auth endpoints.

use super::cookies::{CookieOptions, SameSite};
use crate::rbac::token::{DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    cookie_secure: bool,
    same_site: SameSite,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            cookie_secure: false,
            same_site: SameSite::Lax,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub fn access_cookie(&self) -> CookieOptions {
        self.cookie_options(self.access_ttl_seconds)
    }

    #[must_use]
    pub fn refresh_cookie(&self) -> CookieOptions {
        self.cookie_options(self.refresh_ttl_seconds)
    }

    fn cookie_options(&self, max_age_seconds: i64) -> CookieOptions {
        CookieOptions {
            http_only: true,
            secure: self.cookie_secure,
            same_site: self.same_site,
            max_age_seconds,
        }
    }
}
