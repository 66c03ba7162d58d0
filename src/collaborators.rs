//! Interfaces de los sistemas externos: el caso forense, el detector de tipos,
//! el gestor de archivos derivados y el trabajo de ingesta.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::PathBuf;

use crate::descriptor::ExtractedImageDescriptor;
use crate::error::{ClassificationError, LookupError, RegistrationError};
use crate::naming::sanitize_file_name;

/// Flujo de bytes con acceso secuencial y aleatorio.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Documento de entrada prestado por el caso; no se modifica durante la extracción.
pub trait InputDocument {
    fn id(&self) -> u64;

    fn name(&self) -> &str;

    /// Abre un lector nuevo sobre el contenido completo del documento.
    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>>;

    /// Nombre único del documento dentro del caso: `<id>_<nombre>`.
    fn unique_name(&self) -> String {
        sanitize_file_name(&format!("{}_{}", self.id(), self.name()))
    }
}

/// Detector externo que asigna un tipo MIME a cada documento.
pub trait FileTypeDetector: Send + Sync {
    fn file_type(&self, document: &dyn InputDocument) -> Result<String, ClassificationError>;
}

/// Consultas sobre la jerarquía de archivos del caso.
pub trait CaseFileSystem: Send + Sync {
    fn has_derived_children(&self, document: &dyn InputDocument) -> Result<bool, LookupError>;
}

/// Persiste cada imagen extraída como archivo derivado del documento padre.
pub trait DerivedFileRegistrar: Send + Sync {
    fn register_derived_file(
        &self,
        descriptor: &ExtractedImageDescriptor,
    ) -> Result<DerivedFile, RegistrationError>;
}

/// Eventos y seguimiento del trabajo de ingesta en curso.
pub trait IngestJob: Send + Sync {
    fn notify_new_content(&self, document: &dyn InputDocument);

    fn add_to_job(&self, files: Vec<DerivedFile>);
}

/// Archivo derivado ya persistido por el gestor de archivos.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DerivedFile {
    pub id: u64,
    pub name: String,
    pub relative_path: String,
    pub parent_id: u64,
}

/// Documento en memoria, útil para anfitriones que ya cargaron el contenido.
#[derive(Clone, Debug)]
pub struct MemoryDocument {
    id: u64,
    name: String,
    bytes: Vec<u8>,
}

impl MemoryDocument {
    pub fn new(id: u64, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id,
            name: name.into(),
            bytes,
        }
    }
}

impl InputDocument for MemoryDocument {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }
}

/// Documento respaldado por un archivo local.
#[derive(Clone, Debug)]
pub struct FileDocument {
    id: u64,
    name: String,
    path: PathBuf,
}

impl FileDocument {
    pub fn new(id: u64, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { id, name, path }
    }
}

impl InputDocument for FileDocument {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}
