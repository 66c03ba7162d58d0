//! Descriptores de las imágenes extraídas, listos para el gestor de archivos derivados.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::collaborators::InputDocument;
use crate::hashing::{HashSummary, content_hashes};
use crate::sink::EncodingType;

/// Ruta relativa al caso: `/<módulo>/<nombre único del padre>/<archivo>`.
///
/// Siempre usa `/`, independientemente del sistema anfitrión.
pub fn relative_path(
    module_dir_relative: &str,
    parent_unique_name: &str,
    file_name: &str,
) -> String {
    let module = module_dir_relative.replace('\\', "/");
    let module = module.trim_matches('/');
    if module.is_empty() {
        format!("/{parent_unique_name}/{file_name}")
    } else {
        format!("/{module}/{parent_unique_name}/{file_name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImageDescriptor {
    /// Nombre final, único dentro del directorio del padre.
    pub file_name: String,
    pub relative_path: String,
    /// Ubicación del archivo codificado en disco.
    pub local_path: PathBuf,
    /// Tamaño de la imagen decodificada, sin la cabecera de codificación.
    pub size: u64,
    pub ctime: i64,
    pub crtime: i64,
    pub atime: i64,
    pub mtime: i64,
    pub parent_id: u64,
    pub parent_name: String,
    pub is_file: bool,
    pub tool_name: String,
    pub encoding: EncodingType,
    pub hashes: HashSummary,
}

impl ExtractedImageDescriptor {
    pub(crate) fn new(
        parent: &dyn InputDocument,
        file_name: String,
        relative_path: String,
        local_path: PathBuf,
        data: &[u8],
        tool_name: &str,
    ) -> Self {
        Self {
            file_name,
            relative_path,
            local_path,
            size: data.len() as u64,
            ctime: 0,
            crtime: 0,
            atime: 0,
            mtime: 0,
            parent_id: parent.id(),
            parent_name: parent.name().to_string(),
            is_file: true,
            tool_name: tool_name.to_string(),
            encoding: EncodingType::Xor1,
            hashes: content_hashes(data),
        }
    }

    pub(crate) fn with_mtime(mut self, mtime: Option<i64>) -> Self {
        self.mtime = mtime.unwrap_or(0);
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
