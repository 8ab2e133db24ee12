use crate::{
    api::{self, AppState, AuthConfig, SameSite},
    cli::telemetry,
    rbac::token::{TokenConfig, TokenService},
    store::{
        Stores,
        postgres::PgStore,
        seed::{self, BootstrapAdmin},
    },
};
use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub environment: Environment,
    pub tokens: TokenConfig,
    pub cookie_secure: bool,
    pub same_site: SameSite,
    pub cors_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Args {
    /// Reject configurations that are unsafe to serve.
    ///
    /// # Errors
    /// Returns an error naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        self.tokens
            .validate()
            .context("invalid token configuration")?;

        if self.same_site == SameSite::None && !self.cookie_secure {
            bail!("SameSite=None cookies must also be Secure (set --cookie-secure true)");
        }

        if self.cors_origins.iter().any(|origin| origin.trim() == "*") {
            bail!("wildcard CORS origin is not allowed with credentialed requests");
        }

        if self.environment.is_production() {
            if self.dsn.is_none() {
                bail!("a database DSN is required in production");
            }
            if !self.cookie_secure {
                bail!("token cookies must be Secure in production");
            }
        }

        Ok(())
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable,
/// seeding fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let tokens = Arc::new(TokenService::new(&args.tokens).context("invalid token configuration")?);

    let stores = match &args.dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(10)
                .max_lifetime(Duration::from_secs(60 * 30))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;
            PgStore::migrate(&pool)
                .await
                .context("Failed to apply database schema")?;
            Stores::postgres(pool)
        }
        None => {
            warn!("No DSN configured, using the in-memory store; data is lost on exit");
            Stores::memory()
        }
    };

    seed::bootstrap(&stores, args.bootstrap_admin.as_ref())
        .await
        .context("Failed to seed reference data")?;

    let auth = AuthConfig::new()
        .with_cookie_secure(args.cookie_secure)
        .with_same_site(args.same_site);

    let state = Arc::new(AppState::new(stores, tokens, auth));

    let result = api::new(args.port, state, &args.cors_origins).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("environment", args.environment.to_string()),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "none (in-memory)".to_string(), redact_dsn),
        ),
        ("cookie_secure", args.cookie_secure.to_string()),
        ("cookie_samesite", args.same_site.to_string()),
        ("cors_origins", args.cors_origins.join(", ")),
        (
            "bootstrap_admin",
            args.bootstrap_admin
                .as_ref()
                .map_or_else(|| "none".to_string(), |admin| admin.email.clone()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", rolegate_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn rolegate_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    ROLEGATE_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}

const ROLEGATE_BANNER: &str = r"
  +---------+
  |  o   o  |
  |    |    |   R O L E G A T E {VERSION}
  |  \___/  |
  +----+----+";

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: None,
            environment: Environment::Development,
            tokens: TokenConfig::new(
                SecretString::from("access-secret-0123456789"),
                SecretString::from("refresh-secret-0123456789"),
            ),
            cookie_secure: false,
            same_site: SameSite::Lax,
            cors_origins: vec!["http://localhost:3000".to_string()],
            bootstrap_admin: None,
        }
    }

    #[test]
    fn development_defaults_are_valid() {
        assert!(args().validate().is_ok());
    }

    #[test]
    fn shared_secrets_are_rejected() {
        let mut args = args();
        args.tokens = TokenConfig::new(
            SecretString::from("same-secret-0123456789"),
            SecretString::from("same-secret-0123456789"),
        );
        assert!(args.validate().is_err());
    }

    #[test]
    fn same_site_none_requires_secure() {
        let mut args = args();
        args.same_site = SameSite::None;
        assert!(args.validate().is_err());
        args.cookie_secure = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn production_requires_dsn_and_secure_cookies() {
        let mut args = args();
        args.environment = Environment::Production;
        args.cookie_secure = true;
        assert!(args.validate().is_err());

        args.dsn = Some("postgres://rolegate@localhost:5432/rolegate".to_string());
        assert!(args.validate().is_ok());

        args.cookie_secure = false;
        assert!(args.validate().is_err());
    }

    #[test]
    fn wildcard_cors_is_rejected() {
        let mut args = args();
        args.cors_origins = vec!["*".to_string()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("Production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("development".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn redact_dsn_hides_password() {
        assert_eq!(
            redact_dsn("postgres://user:hunter2@db:5432/rolegate"),
            "postgres://user:REDACTED@db:5432/rolegate"
        );
        assert_eq!(
            redact_dsn("postgres://user@db/rolegate"),
            "postgres://user@db/rolegate"
        );
        assert_eq!(redact_dsn("not a url"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
        assert!(rolegate_banner().contains(env!("CARGO_PKG_VERSION")));
    }
}
