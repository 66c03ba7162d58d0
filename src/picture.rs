//! Registros de imagen producidos por los analizadores de contenedores.

use serde::{Deserialize, Serialize};

const FALLBACK_EXTENSION: &str = "bin";

/// Tipo de imagen declarado por el contenedor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PictureType {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
    Tiff,
    Unknown,
}

impl PictureType {
    /// Tipo a partir del `recType` de un registro BLIP de OfficeArt.
    pub fn from_blip_type(rec_type: u16) -> Self {
        match rec_type {
            0xF01A => PictureType::Emf,
            0xF01B => PictureType::Wmf,
            0xF01C => PictureType::Pict,
            0xF01D | 0xF02A => PictureType::Jpeg,
            0xF01E => PictureType::Png,
            0xF01F => PictureType::Dib,
            0xF029 => PictureType::Tiff,
            _ => PictureType::Unknown,
        }
    }

    /// Tipo a partir de la extensión de una parte de un paquete OOXML.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "emf" => PictureType::Emf,
            "wmf" => PictureType::Wmf,
            "pict" | "pct" => PictureType::Pict,
            "jpg" | "jpeg" | "jpe" => PictureType::Jpeg,
            "png" => PictureType::Png,
            "bmp" | "dib" => PictureType::Dib,
            "tif" | "tiff" => PictureType::Tiff,
            _ => PictureType::Unknown,
        }
    }

    pub fn is_metafile(self) -> bool {
        matches!(self, PictureType::Emf | PictureType::Wmf | PictureType::Pict)
    }

    /// Extensión asociada al tipo, sin punto.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            PictureType::Emf => Some("emf"),
            PictureType::Wmf => Some("wmf"),
            PictureType::Pict => Some("pict"),
            PictureType::Jpeg => Some("jpg"),
            PictureType::Png => Some("png"),
            PictureType::Dib => Some("dib"),
            PictureType::Tiff => Some("tiff"),
            PictureType::Unknown => None,
        }
    }

    /// Extensión del tipo o, si es desconocido, la que sugiere el contenido.
    pub fn suggest_extension(self, data: &[u8]) -> &'static str {
        self.extension()
            .or_else(|| sniff_extension(data))
            .unwrap_or(FALLBACK_EXTENSION)
    }
}

/// Detecta la extensión a partir de la firma de los bytes.
pub fn sniff_extension(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.extension())
}

/// Imagen enumerada dentro de un contenedor. Solo vive durante una extracción.
#[derive(Clone, Debug)]
pub struct PictureRecord {
    pub data: Vec<u8>,
    /// Nombre de archivo propuesto por el contenedor o sintetizado por el analizador.
    pub name_hint: Option<String>,
    pub suggested_extension: Option<String>,
    pub kind: PictureType,
    /// Fecha de modificación en segundos Unix, cuando el contenedor la conserva.
    pub modified: Option<i64>,
}

impl PictureRecord {
    pub fn new(data: Vec<u8>, kind: PictureType) -> Self {
        Self {
            data,
            name_hint: None,
            suggested_extension: None,
            kind,
            modified: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name_hint = Some(name.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.suggested_extension = Some(extension.into());
        self
    }

    pub fn with_modified(mut self, modified: Option<i64>) -> Self {
        self.modified = modified;
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
