use std::path::{Path, PathBuf};
use std::str::FromStr;

use shared::ModelMetadata;
use strum::{Display, EnumString};

const DEFAULT_MODEL_PATH: &str = "models/my_model.onnx";
const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: &str = "8081";

/// What happens to an upload once its prediction has been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RetentionPolicy {
    Keep,
    Delete,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Failed to read model metadata {}: {source}", .path.display())]
    MetadataIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse model metadata {}: {source}", .path.display())]
    MetadataParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub metadata_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
    pub retention: RetentionPolicy,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path =
            PathBuf::from(lookup("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()));
        let metadata_path = lookup("MODEL_METADATA_PATH").map(PathBuf::from);
        let upload_dir =
            PathBuf::from(lookup("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()));

        let retention = match lookup("UPLOAD_RETENTION") {
            Some(value) => RetentionPolicy::from_str(value.trim()).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "UPLOAD_RETENTION",
                    value,
                }
            })?,
            None => RetentionPolicy::Keep,
        };

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port_str = lookup("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let port = port_str
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port_str.clone(),
            })?;

        Ok(Self {
            model_path,
            metadata_path,
            upload_dir,
            retention,
            host,
            port,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Explicit path wins; otherwise a `.yaml` next to the artifact is used when present.
    pub fn resolved_metadata_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.metadata_path {
            return Some(path.clone());
        }
        let sidecar = self.model_path.with_extension("yaml");
        sidecar.is_file().then_some(sidecar)
    }

    pub fn load_metadata(&self) -> Result<ModelMetadata, ConfigError> {
        match self.resolved_metadata_path() {
            Some(path) => load_metadata_file(&path),
            None => Ok(ModelMetadata::default()),
        }
    }
}

pub fn load_metadata_file(path: &Path) -> Result<ModelMetadata, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::MetadataIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::MetadataParse {
        path: path.to_path_buf(),
        source,
    })
}
