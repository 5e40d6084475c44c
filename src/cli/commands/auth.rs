use clap::{Arg, Command};

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SITE_TITLE: &str = "site-title";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_RESET_TOKEN_TTL_SECONDS: &str = "reset-token-ttl-seconds";
pub const ARG_SESSION_SWEEP_SECONDS: &str = "session-sweep-seconds";
pub const ARG_CHALLENGE_THRESHOLD: &str = "challenge-threshold";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL, used for reset links and the cookie Secure flag")
                .default_value("http://localhost:8080")
                .env("DOCGEN_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_SITE_TITLE)
                .long(ARG_SITE_TITLE)
                .help("Site title shown in pages and email subjects")
                .default_value("Documentation")
                .env("DOCGEN_SITE_TITLE"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .default_value("86400")
                .env("DOCGEN_SESSION_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_RESET_TOKEN_TTL_SECONDS)
                .help("Password reset link lifetime in seconds")
                .default_value("172800")
                .env("DOCGEN_RESET_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_SECONDS)
                .long(ARG_SESSION_SWEEP_SECONDS)
                .help("Interval between expired session sweeps in seconds")
                .default_value("3600")
                .env("DOCGEN_SESSION_SWEEP_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_THRESHOLD)
                .long(ARG_CHALLENGE_THRESHOLD)
                .help("Failed logins per client before a challenge is required")
                .default_value("3")
                .env("DOCGEN_CHALLENGE_THRESHOLD")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}
