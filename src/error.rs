//! Tipos de error del extractor y de sus colaboradores externos.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fallos al abrir o recorrer un contenedor. Nunca salen del límite del analizador:
/// se convierten en [`crate::ParseOutcome::Failed`].
#[derive(Error, Debug)]
pub enum ContainerError {
    /// La estructura del contenedor no corresponde al formato esperado.
    #[error("No se pudo abrir el contenedor: {0}")]
    Open(String),

    /// Los bytes de un registro de imagen no se pudieron leer.
    #[error("Registro ilegible en el desplazamiento {offset}: {reason}")]
    RecordRead { offset: u64, reason: String },

    /// Una imagen supera el tamaño máximo configurado.
    #[error("La imagen supera el límite de {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("El documento está cifrado")]
    Encrypted,

    /// Versiones anteriores a Office 97.
    #[error("Formato de documento antiguo no soportado: {0}")]
    OldFormat(String),

    #[error("Error de E/S: {0}")]
    Io(#[from] io::Error),

    #[error("Error leyendo el paquete ZIP: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Error leyendo XML del paquete: {0}")]
    Xml(#[from] xmltree::ParseError),

    /// El analizador entró en pánico; el mensaje se conserva para diagnóstico.
    #[error("Fallo interno del analizador: {0}")]
    Panicked(String),
}

impl ContainerError {
    pub(crate) fn open(reason: impl Into<String>) -> Self {
        Self::Open(reason.into())
    }

    pub(crate) fn record(offset: u64, reason: impl Into<String>) -> Self {
        Self::RecordRead {
            offset,
            reason: reason.into(),
        }
    }

    /// Indica si el fallo ocurrió al leer una imagen ya enumerada.
    pub fn is_record_read(&self) -> bool {
        matches!(self, Self::RecordRead { .. } | Self::TooLarge { .. })
    }
}

/// Fallos de escritura en el directorio de salida del módulo.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("No se pudo crear el directorio {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No se pudo escribir {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("El contenido no tiene la cabecera de codificación esperada")]
    InvalidEncoding,
}

/// El detector de tipos de archivo no pudo clasificar el documento.
#[derive(Error, Debug)]
#[error("No se pudo determinar el tipo de archivo: {0}")]
pub struct ClassificationError(pub String);

/// El sistema de archivos del caso no pudo responder una consulta.
#[derive(Error, Debug)]
#[error("Error consultando el caso: {0}")]
pub struct LookupError(pub String);

/// El gestor de archivos rechazó un archivo derivado.
#[derive(Error, Debug)]
#[error("No se pudo registrar el archivo derivado: {0}")]
pub struct RegistrationError(pub String);

/// Configuración inválida o ilegible.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No se pudo leer la configuración: {0}")]
    Io(#[from] io::Error),

    #[error("Configuración JSON inválida: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuración inválida: {0}")]
    Invalid(String),
}
