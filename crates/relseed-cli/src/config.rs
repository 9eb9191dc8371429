use std::path::Path;

use thiserror::Error;

use relseed_generate::SeedOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
}

/// Read seeding options from a TOML file; missing keys keep their defaults.
pub fn load_options(path: Option<&Path>) -> Result<SeedOptions, ConfigError> {
    let Some(path) = path else {
        return Ok(SeedOptions::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_options(&content)
}

pub fn parse_options(content: &str) -> Result<SeedOptions, ConfigError> {
    Ok(toml::from_str(content)?)
}
