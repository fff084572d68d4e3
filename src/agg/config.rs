use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    Invalid { name: &'static str, input: String, source: humantime::DurationError },
    NotPositive { name: &'static str, input: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { name, input, source } => write!(f, "invalid {name} {input:?}: {source}"),
            ConfigError::NotPositive { name, input } => write!(f, "{name} must be greater than zero, got {input:?}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Invalid { source, .. } => Some(source),
            ConfigError::NotPositive { .. } => None,
        }
    }
}

/// Parses a human duration such as `30s`, `1m` or `1h30m`; zero is rejected.
pub fn parse_positive_duration(name: &'static str, input: &str) -> Result<Duration, ConfigError> {
    let d = humantime::parse_duration(input.trim()).map_err(|source| ConfigError::Invalid {
        name,
        input: input.to_string(),
        source,
    })?;
    if d.is_zero() {
        return Err(ConfigError::NotPositive { name, input: input.to_string() });
    }
    Ok(d)
}
