//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action, building the token configuration
//! and cookie policy the server runs with.

use crate::api::SameSite;
use crate::cli::actions::{
    Action,
    server::{Args, Environment},
};
use crate::cli::commands::{ARG_DSN, ARG_ENVIRONMENT, ARG_PORT, auth};
use crate::rbac::token::TokenConfig;
use crate::store::seed::BootstrapAdmin;
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the resulting
/// configuration is rejected by [`Args::validate`].
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .map(|dsn| dsn.trim().to_string())
        .filter(|dsn| !dsn.is_empty());

    let environment = matches
        .get_one::<String>(ARG_ENVIRONMENT)
        .map(|value| value.parse::<Environment>())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or_default();

    let tokens = token_config(matches)?;

    let cookie_secure = matches
        .get_one::<bool>(auth::ARG_COOKIE_SECURE)
        .copied()
        .unwrap_or_else(|| environment.is_production());

    let same_site = matches
        .get_one::<String>(auth::ARG_COOKIE_SAMESITE)
        .map(|value| value.parse::<SameSite>())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or_default();

    let cors_origins: Vec<String> = matches
        .get_many::<String>(auth::ARG_CORS_ORIGINS)
        .map(|values| {
            values
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let bootstrap_admin = match (
        matches.get_one::<String>(auth::ARG_BOOTSTRAP_ADMIN_EMAIL),
        matches.get_one::<String>(auth::ARG_BOOTSTRAP_ADMIN_PASSWORD),
    ) {
        (Some(email), Some(password)) => Some(BootstrapAdmin {
            email: email.trim().to_string(),
            password: SecretString::from(password.clone()),
        }),
        _ => None,
    };

    let args = Args {
        port,
        dsn,
        environment,
        tokens,
        cookie_secure,
        same_site,
        cors_origins,
        bootstrap_admin,
    };
    args.validate()?;

    Ok(Action::Server(args))
}

fn token_config(matches: &clap::ArgMatches) -> Result<TokenConfig> {
    let access_secret = matches
        .get_one::<String>(auth::ARG_ACCESS_TOKEN_SECRET)
        .cloned()
        .context("missing required argument: --access-token-secret")?;
    let refresh_secret = matches
        .get_one::<String>(auth::ARG_REFRESH_TOKEN_SECRET)
        .cloned()
        .context("missing required argument: --refresh-token-secret")?;

    let access_minutes = matches
        .get_one::<i64>(auth::ARG_ACCESS_TOKEN_TTL_MINUTES)
        .copied()
        .unwrap_or(30);
    let refresh_days = matches
        .get_one::<i64>(auth::ARG_REFRESH_TOKEN_TTL_DAYS)
        .copied()
        .unwrap_or(7);

    Ok(TokenConfig::new(
        SecretString::from(access_secret),
        SecretString::from(refresh_secret),
    )
    .with_access_ttl_seconds(access_minutes.saturating_mul(60))
    .with_refresh_ttl_seconds(refresh_days.saturating_mul(24 * 60 * 60)))
}
