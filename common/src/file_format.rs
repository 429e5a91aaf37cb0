use std::path::Path;

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("Failed to get file extension for {0}")]
    MissingFileExtension(String),
    #[error("Unsupported config file extension for file: {0}")]
    UnsupportedFileExtension(String),
    #[error("Failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML config parsing failed")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON config parsing failed")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let ext = path
            .extension()
            .and_then(|os_str| os_str.to_str())
            .ok_or_else(|| ConfigFileError::MissingFileExtension(path.display().to_string()))?;

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(ConfigFileError::UnsupportedFileExtension(
                path.display().to_string(),
            ))
        }
    }
}

pub fn parse_config<T: DeserializeOwned>(
    text: &str,
    format: ConfigFormat,
) -> Result<T, ConfigFileError> {
    match format {
        ConfigFormat::Yaml => Ok(serde_yml::from_str(text)?),
        ConfigFormat::Json => Ok(serde_json::from_str(text)?),
    }
}

/// Reads and deserializes a config file, picking the format from its extension.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigFileError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&text, format)
}
