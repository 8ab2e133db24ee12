//! Token cookies and request credential extraction.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use std::{fmt, str::FromStr};
use tracing::error;

use super::state::AuthConfig;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!(
                "invalid SameSite value '{other}', expected lax, strict or none"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_seconds: i64,
}

impl CookieOptions {
    /// Render a `Set-Cookie` value.
    #[must_use]
    pub fn render(&self, name: &str, value: &str) -> String {
        let mut cookie = format!(
            "{name}={value}; Path=/; SameSite={}; Max-Age={}",
            self.same_site,
            self.max_age_seconds.max(0)
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Same attributes with `Max-Age=0`.
    #[must_use]
    pub fn expired(self) -> Self {
        Self {
            max_age_seconds: 0,
            ..self
        }
    }
}

pub(crate) fn set_cookie(
    name: &str,
    value: &str,
    options: CookieOptions,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&options.render(name, value))
}

pub(crate) fn clear_cookie(
    name: &str,
    options: CookieOptions,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&options.expired().render(name, ""))
}

/// `Set-Cookie` headers carrying a fresh token pair.
pub(crate) fn token_cookie_headers(
    config: &AuthConfig,
    access_token: &str,
    refresh_token: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cookies = [
        set_cookie(ACCESS_COOKIE_NAME, access_token, config.access_cookie()),
        set_cookie(REFRESH_COOKIE_NAME, refresh_token, config.refresh_cookie()),
    ];
    for cookie in cookies {
        match cookie {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => error!("Failed to build token cookie: {err}"),
        }
    }
    headers
}

/// `Set-Cookie` headers expiring both token cookies.
pub(crate) fn cleared_cookie_headers(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cookies = [
        clear_cookie(ACCESS_COOKIE_NAME, config.access_cookie()),
        clear_cookie(REFRESH_COOKIE_NAME, config.refresh_cookie()),
    ];
    for value in cookies.into_iter().flatten() {
        headers.append(SET_COOKIE, value);
    }
    headers
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

/// Bearer header first, then the access cookie.
pub(crate) fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, ACCESS_COOKIE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(secure: bool) -> CookieOptions {
        CookieOptions {
            http_only: true,
            secure,
            same_site: SameSite::Strict,
            max_age_seconds: 1800,
        }
    }

    #[test]
    fn renders_attributes() {
        let cookie = options(true).render(ACCESS_COOKIE_NAME, "abc");
        assert_eq!(
            cookie,
            "access_token=abc; Path=/; SameSite=Strict; Max-Age=1800; HttpOnly; Secure"
        );
        let insecure = options(false).render(ACCESS_COOKIE_NAME, "abc");
        assert!(!insecure.contains("Secure"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let value = clear_cookie(REFRESH_COOKIE_NAME, options(false));
        assert_eq!(
            value.ok().and_then(|v| v.to_str().ok().map(str::to_string)),
            Some("refresh_token=; Path=/; SameSite=Strict; Max-Age=0; HttpOnly".to_string())
        );
    }

    #[test]
    fn pair_headers_set_both_cookies() {
        let config = AuthConfig::new().with_access_ttl_seconds(60);
        let headers = token_cookie_headers(&config, "a", "r");
        let values: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(values.len(), 2);
        assert!(values[0].starts_with("access_token=a;"));
        assert!(values[0].contains("Max-Age=60"));
        assert!(values[1].starts_with("refresh_token=r;"));

        let cleared = cleared_cookie_headers(&config);
        assert!(cleared
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .all(|v| v.contains("Max-Age=0")));
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        assert_eq!("LAX".parse::<SameSite>(), Ok(SameSite::Lax));
        assert_eq!(" none ".parse::<SameSite>(), Ok(SameSite::None));
        assert!("sometimes".parse::<SameSite>().is_err());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; access_token=from-cookie"));
        assert_eq!(
            extract_access_token(&headers),
            Some("from-cookie".to_string())
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            extract_access_token(&headers),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn empty_credentials_are_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        headers.insert(COOKIE, HeaderValue::from_static("access_token="));
        assert_eq!(extract_access_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
