//! Detección de tipos MIME mediante inferencia heurística.

use infer::Infer;
use std::io::Read;

use crate::collaborators::{FileTypeDetector, InputDocument};
use crate::error::ClassificationError;

const OCTET_STREAM: &str = "application/octet-stream";
const DEFAULT_SNIFF_LIMIT: u64 = 32 * 1024 * 1024; // 32 MiB

/// Detector por defecto basado en las firmas de `infer`.
///
/// Los contenedores OLE y ZIP necesitan inspeccionar sus directorios internos,
/// por eso se lee hasta `sniff_limit` bytes y no solo la cabecera.
pub struct InferFileTypeDetector {
    infer: Infer,
    sniff_limit: u64,
}

impl InferFileTypeDetector {
    pub fn new() -> Self {
        Self {
            infer: Infer::new(),
            sniff_limit: DEFAULT_SNIFF_LIMIT,
        }
    }

    pub fn with_sniff_limit(mut self, limit: u64) -> Self {
        self.sniff_limit = limit;
        self
    }

    pub fn detect_bytes(&self, data: &[u8]) -> String {
        self.infer
            .get(data)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string())
    }
}

impl Default for InferFileTypeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTypeDetector for InferFileTypeDetector {
    fn file_type(&self, document: &dyn InputDocument) -> Result<String, ClassificationError> {
        let reader = document
            .open()
            .map_err(|e| ClassificationError(format!("{}: {}", document.name(), e)))?;

        let mut contents = Vec::new();
        reader
            .take(self.sniff_limit)
            .read_to_end(&mut contents)
            .map_err(|e| ClassificationError(format!("{}: {}", document.name(), e)))?;

        Ok(self.detect_bytes(&contents))
    }
}
