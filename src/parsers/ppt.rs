//! Presentaciones PowerPoint 97-2003: las imágenes viven en el flujo `Pictures`.

use tracing::debug;

use super::compound::CompoundDocument;
use super::officeart::{Records, decode_blip};
use super::{ContainerParser, Limits, le_u32};
use crate::collaborators::ReadSeek;
use crate::error::ContainerError;
use crate::naming::sequential_name;
use crate::picture::{PictureRecord, PictureType};

const DOCUMENT_STREAM: &str = "PowerPoint Document";
const CURRENT_USER_STREAM: &str = "Current User";
const PICTURES_STREAM: &str = "Pictures";
/// Flujo de PowerPoint 95 y anteriores.
const LEGACY_HEADER_STREAM: &str = "Header";

const CURRENT_USER_TOKEN_OFFSET: usize = 12;
const ENCRYPTED_HEADER_TOKEN: u32 = 0xF3D1_C4DF;

pub struct PptParser;

impl ContainerParser for PptParser {
    fn parse(
        &self,
        reader: &mut dyn ReadSeek,
        limits: &Limits,
    ) -> Result<Vec<PictureRecord>, ContainerError> {
        let mut document = CompoundDocument::open(reader, limits.max_stream_bytes)?;

        if !document.has_stream(DOCUMENT_STREAM) {
            if document.has_stream(LEGACY_HEADER_STREAM) {
                return Err(ContainerError::OldFormat("PowerPoint 95".to_string()));
            }
            return Err(ContainerError::open(format!("falta el flujo {DOCUMENT_STREAM}")));
        }

        if let Some(current_user) = document.read_optional_stream(CURRENT_USER_STREAM)?
            && le_u32(&current_user, CURRENT_USER_TOKEN_OFFSET) == Some(ENCRYPTED_HEADER_TOKEN)
        {
            return Err(ContainerError::Encrypted);
        }

        let Some(pictures) = document.read_optional_stream(PICTURES_STREAM)? else {
            debug!("presentación sin flujo {PICTURES_STREAM}");
            return Ok(Vec::new());
        };

        pictures_stream_records(&pictures, limits)
    }
}

/// Recorre los BLIPs del flujo `Pictures` en orden.
///
/// Solo se emiten JPEG, PNG, WMF, EMF y PICT; el índice del nombre avanza
/// únicamente con las imágenes emitidas.
fn pictures_stream_records(
    pictures: &[u8],
    limits: &Limits,
) -> Result<Vec<PictureRecord>, ContainerError> {
    let mut records = Vec::new();

    for record in Records::new(pictures, 0) {
        let record = record?;
        if !record.header.is_blip() {
            continue;
        }

        let kind = PictureType::from_blip_type(record.header.rec_type);
        let Some(extension) = emitted_extension(kind) else {
            debug!(
                offset = record.offset,
                rec_type = record.header.rec_type,
                "tipo de imagen omitido"
            );
            continue;
        };

        let blip = decode_blip(&record, limits)?;
        records.push(
            PictureRecord::new(blip.data, kind)
                .with_name(sequential_name(records.len(), extension))
                .with_extension(extension),
        );
    }

    Ok(records)
}

fn emitted_extension(kind: PictureType) -> Option<&'static str> {
    match kind {
        PictureType::Jpeg
        | PictureType::Png
        | PictureType::Wmf
        | PictureType::Emf
        | PictureType::Pict => kind.extension(),
        PictureType::Dib | PictureType::Tiff | PictureType::Unknown => None,
    }
}
