//! Configuración inmutable del extractor, fijada al iniciar el trabajo de ingesta.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::parsers::Limits;

const DEFAULT_MAX_PICTURE_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB
const DEFAULT_MAX_STREAM_BYTES: u64 = 1024 * 1024 * 1024; // 1 GiB
const DEFAULT_TOOL_NAME: &str = "Embedded File Extractor";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Directorio raíz del módulo en disco.
    pub module_dir_absolute: PathBuf,
    /// Directorio del módulo relativo al caso, con barras `/`.
    pub module_dir_relative: String,
    #[serde(default = "default_max_picture_bytes")]
    pub max_picture_bytes: u64,
    /// Tope de un flujo de un archivo compuesto leído completo en memoria.
    #[serde(default = "default_max_stream_bytes")]
    pub max_stream_bytes: u64,
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
}

fn default_max_picture_bytes() -> u64 {
    DEFAULT_MAX_PICTURE_BYTES
}

fn default_max_stream_bytes() -> u64 {
    DEFAULT_MAX_STREAM_BYTES
}

fn default_tool_name() -> String {
    DEFAULT_TOOL_NAME.to_string()
}

impl ExtractorConfig {
    pub fn new(module_dir_absolute: impl Into<PathBuf>, module_dir_relative: &str) -> Self {
        Self {
            module_dir_absolute: module_dir_absolute.into(),
            module_dir_relative: normalize_relative_dir(module_dir_relative),
            max_picture_bytes: DEFAULT_MAX_PICTURE_BYTES,
            max_stream_bytes: DEFAULT_MAX_STREAM_BYTES,
            tool_name: DEFAULT_TOOL_NAME.to_string(),
        }
    }

    pub fn with_max_picture_bytes(mut self, limit: u64) -> Self {
        self.max_picture_bytes = limit;
        self
    }

    pub fn with_max_stream_bytes(mut self, limit: u64) -> Self {
        self.max_stream_bytes = limit;
        self
    }

    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// Interpreta la configuración desde JSON y la valida.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(contents)?;
        config.module_dir_relative = normalize_relative_dir(&config.module_dir_relative);
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_dir_absolute.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "module_dir_absolute no puede estar vacío".to_string(),
            ));
        }
        if self.module_dir_relative.is_empty() {
            return Err(ConfigError::Invalid(
                "module_dir_relative no puede estar vacío".to_string(),
            ));
        }
        if self
            .module_dir_relative
            .split('/')
            .any(|segment| segment == "..")
        {
            return Err(ConfigError::Invalid(format!(
                "module_dir_relative no puede salir del caso: {}",
                self.module_dir_relative
            )));
        }
        if self.max_picture_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_picture_bytes debe ser mayor que cero".to_string(),
            ));
        }
        if self.max_stream_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_stream_bytes debe ser mayor que cero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_picture_bytes: self.max_picture_bytes,
            max_stream_bytes: self.max_stream_bytes,
        }
    }
}

/// Convierte separadores a `/` y elimina las barras de los extremos.
fn normalize_relative_dir(value: &str) -> String {
    value
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
