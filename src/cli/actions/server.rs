use crate::api::{self, handlers::auth::AuthConfig};
use anyhow::Result;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub site_title: String,
    pub session_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub session_sweep_seconds: u64,
    pub challenge_threshold: u32,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.base_url.clone())
            .with_site_title(self.site_title.clone())
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_reset_token_ttl_seconds(self.reset_token_ttl_seconds)
            .with_session_sweep_seconds(self.session_sweep_seconds)
            .with_challenge_threshold(self.challenge_threshold)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = args.auth_config();

    api::new(args.port, args.dsn, auth_config).await
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        dsn = %redact_dsn(&args.dsn),
        base_url = %args.base_url,
        session_ttl_seconds = args.session_ttl_seconds,
        reset_token_ttl_seconds = args.reset_token_ttl_seconds,
        challenge_threshold = args.challenge_threshold,
        "starting server"
    );
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<invalid dsn>".to_string(),
    }
}
