use tracing::Level;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const FUNCTION_NAME_VAR: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Maps a `LOG_LEVEL` value to a level; unknown or missing values mean info.
pub fn parse_level(raw: Option<&str>) -> Level {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("trace") => Level::TRACE,
        Some("debug") => Level::DEBUG,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs the global subscriber: JSON lines inside Lambda, human-readable
/// output elsewhere. Safe to call more than once.
pub fn init() {
    let level = parse_level(std::env::var(LOG_LEVEL_VAR).ok().as_deref());
    let filter = EnvFilter::new(level.as_str().to_ascii_lowercase());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if std::env::var_os(FUNCTION_NAME_VAR).is_some() {
        builder
            .json()
            .with_current_span(true)
            .try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
