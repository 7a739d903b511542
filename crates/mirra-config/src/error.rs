use miette::Diagnostic;
use mirra_utils::error::PathError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(mirra_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(mirra_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(mirra_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Invalid upstream registry URL '{url}': {reason}")]
    #[diagnostic(
        code(mirra_config::invalid_upstream),
        help("Use an absolute http(s) URL such as https://registry.npmjs.org")
    )]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("Invalid private scope '{0}'")]
    #[diagnostic(
        code(mirra_config::invalid_scope),
        help("Scopes start with '@' and contain no '/', e.g. \"@company\"")
    )]
    InvalidScope(String),

    #[error("Sync concurrency must be at least 1")]
    #[diagnostic(code(mirra_config::invalid_concurrency))]
    InvalidConcurrency,

    #[error("Invalid duration '{0}'")]
    #[diagnostic(
        code(mirra_config::invalid_duration),
        help("Durations look like \"30s\", \"5m\" or \"1h30m\"")
    )]
    InvalidDuration(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(mirra_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(mirra_config::path))]
    Path(#[from] PathError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(mirra_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(mirra_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
