use crate::cli::{
    actions::{Action, server::Args},
    commands::auth::{
        ARG_BASE_URL, ARG_CHALLENGE_THRESHOLD, ARG_RESET_TOKEN_TTL_SECONDS,
        ARG_SESSION_SWEEP_SECONDS, ARG_SESSION_TTL_SECONDS, ARG_SITE_TITLE,
    },
};
use anyhow::{Context, Result};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or the base URL is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let base_url = matches
        .get_one::<String>(ARG_BASE_URL)
        .cloned()
        .context("missing required argument: --base-url")?;
    Url::parse(&base_url).context("invalid DOCGEN_BASE_URL")?;

    let site_title = matches
        .get_one::<String>(ARG_SITE_TITLE)
        .cloned()
        .unwrap_or_else(|| "Documentation".to_string());

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url,
        site_title,
        session_ttl_seconds: matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(86_400),
        reset_token_ttl_seconds: matches
            .get_one::<i64>(ARG_RESET_TOKEN_TTL_SECONDS)
            .copied()
            .unwrap_or(172_800),
        session_sweep_seconds: matches
            .get_one::<u64>(ARG_SESSION_SWEEP_SECONDS)
            .copied()
            .unwrap_or(3_600),
        challenge_threshold: matches
            .get_one::<u32>(ARG_CHALLENGE_THRESHOLD)
            .copied()
            .unwrap_or(3),
    }))
}
