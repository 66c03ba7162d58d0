//! Formatos de contenedor con extracción de imágenes soportada.

use serde::{Deserialize, Serialize};

pub const DOC_MIME: &str = "application/msword";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPT_MIME: &str = "application/vnd.ms-powerpoint";
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ContainerFormat {
    Doc,
    Docx,
    Ppt,
    Pptx,
    Xls,
    Xlsx,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 6] = [
        ContainerFormat::Doc,
        ContainerFormat::Docx,
        ContainerFormat::Ppt,
        ContainerFormat::Pptx,
        ContainerFormat::Xls,
        ContainerFormat::Xlsx,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::Doc => DOC_MIME,
            ContainerFormat::Docx => DOCX_MIME,
            ContainerFormat::Ppt => PPT_MIME,
            ContainerFormat::Pptx => PPTX_MIME,
            ContainerFormat::Xls => XLS_MIME,
            ContainerFormat::Xlsx => XLSX_MIME,
        }
    }

    /// Busca el formato cuyo tipo MIME coincide exactamente con `content_type`.
    pub fn classify(content_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.mime_type() == content_type)
    }
}
