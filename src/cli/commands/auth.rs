use clap::{Arg, ArgAction, Command};

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_REFRESH_TOKEN_SECRET: &str = "refresh-token-secret";
pub const ARG_ACCESS_TOKEN_TTL_MINUTES: &str = "access-token-ttl-minutes";
pub const ARG_REFRESH_TOKEN_TTL_DAYS: &str = "refresh-token-ttl-days";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_COOKIE_SAMESITE: &str = "cookie-samesite";
pub const ARG_CORS_ORIGINS: &str = "cors-origins";
pub const ARG_BOOTSTRAP_ADMIN_EMAIL: &str = "bootstrap-admin-email";
pub const ARG_BOOTSTRAP_ADMIN_PASSWORD: &str = "bootstrap-admin-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_cookie_args(command);
    with_bootstrap_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HMAC secret for access tokens")
                .env("ROLEGATE_ACCESS_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_SECRET)
                .long(ARG_REFRESH_TOKEN_SECRET)
                .help("HMAC secret for refresh tokens, must differ from the access secret")
                .env("ROLEGATE_REFRESH_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .long(ARG_ACCESS_TOKEN_TTL_MINUTES)
                .help("Access token lifetime in minutes")
                .env("ROLEGATE_ACCESS_TOKEN_TTL_MINUTES")
                .default_value("30")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_DAYS)
                .long(ARG_REFRESH_TOKEN_TTL_DAYS)
                .help("Refresh token lifetime in days")
                .env("ROLEGATE_REFRESH_TOKEN_TTL_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark token cookies Secure (default: true in production)")
                .env("ROLEGATE_COOKIE_SECURE")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SAMESITE)
                .long(ARG_COOKIE_SAMESITE)
                .help("SameSite attribute for token cookies")
                .env("ROLEGATE_COOKIE_SAMESITE")
                .default_value("lax")
                .ignore_case(true)
                .value_parser(["lax", "strict", "none"]),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGINS)
                .long(ARG_CORS_ORIGINS)
                .help("Comma separated list of allowed CORS origins")
                .env("ROLEGATE_CORS_ORIGINS")
                .default_value("http://localhost:3000")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}

fn with_bootstrap_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .long(ARG_BOOTSTRAP_ADMIN_EMAIL)
                .help("Email of an administrator account created at startup if missing")
                .env("ROLEGATE_BOOTSTRAP_ADMIN_EMAIL")
                .requires(ARG_BOOTSTRAP_ADMIN_PASSWORD),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                .long(ARG_BOOTSTRAP_ADMIN_PASSWORD)
                .help("Password of the bootstrap administrator")
                .env("ROLEGATE_BOOTSTRAP_ADMIN_PASSWORD")
                .hide_env_values(true)
                .requires(ARG_BOOTSTRAP_ADMIN_EMAIL),
        )
}
