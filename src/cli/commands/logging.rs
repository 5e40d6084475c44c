use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names accepted by `DOCGEN_LOG_LEVEL`, indexed by verbosity count.
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept either a level name or its verbosity count.
fn parse_log_level(level: &str) -> Result<u8, String> {
    let level = level.trim().to_lowercase();
    let count = match level.parse::<usize>() {
        Ok(count) => Some(count),
        Err(_) => LOG_LEVELS.iter().position(|name| *name == level),
    };
    count
        .filter(|count| *count < LOG_LEVELS.len())
        .and_then(|count| u8::try_from(count).ok())
        .ok_or_else(|| format!("invalid log level '{level}', expected one of {LOG_LEVELS:?}"))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_log_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Repeat to raise log output, or set DOCGEN_LOG_LEVEL to a level name")
            .env("DOCGEN_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
