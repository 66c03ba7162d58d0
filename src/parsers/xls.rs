//! Libros de Excel 97-2003 (BIFF8).
//!
//! El grupo de dibujos del libro se guarda en registros `MSODRAWINGGROUP`,
//! partidos en registros `CONTINUE` cuando superan el tamaño máximo de BIFF.

use tracing::debug;

use super::compound::CompoundDocument;
use super::officeart::blip_store_pictures;
use super::{ContainerParser, Limits, le_u16};
use crate::collaborators::ReadSeek;
use crate::error::ContainerError;
use crate::naming::sequential_name;
use crate::picture::PictureRecord;

const WORKBOOK_STREAM: &str = "Workbook";
/// Flujo de Excel 5/95 y anteriores.
const LEGACY_BOOK_STREAM: &str = "Book";

const RT_BOF: u16 = 0x0809;
const RT_EOF: u16 = 0x000A;
const RT_FILEPASS: u16 = 0x002F;
const RT_CONTINUE: u16 = 0x003C;
const RT_MSODRAWINGGROUP: u16 = 0x00EB;
const BIFF8_VERSION: u16 = 0x0600;

const BIFF_HEADER_LEN: usize = 4;

#[derive(Clone, Copy)]
struct BiffRecord<'a> {
    kind: u16,
    offset: usize,
    body: &'a [u8],
}

fn biff_records(stream: &[u8]) -> impl Iterator<Item = Result<BiffRecord<'_>, ContainerError>> {
    let mut position = 0usize;
    std::iter::from_fn(move || {
        if stream.len().saturating_sub(position) < BIFF_HEADER_LEN {
            return None;
        }
        let offset = position;
        let kind = le_u16(stream, offset)?;
        let length = le_u16(stream, offset + 2)? as usize;
        let start = offset + BIFF_HEADER_LEN;
        let Some(body) = stream.get(start..start + length) else {
            position = stream.len();
            return Some(Err(ContainerError::record(
                offset as u64,
                format!("el registro BIFF 0x{kind:04X} está truncado"),
            )));
        };
        position = start + length;
        Some(Ok(BiffRecord { kind, offset, body }))
    })
}

pub struct XlsParser;

impl ContainerParser for XlsParser {
    fn parse(
        &self,
        reader: &mut dyn ReadSeek,
        limits: &Limits,
    ) -> Result<Vec<PictureRecord>, ContainerError> {
        let mut document = CompoundDocument::open(reader, limits.max_stream_bytes)?;

        if !document.has_stream(WORKBOOK_STREAM) && document.has_stream(LEGACY_BOOK_STREAM) {
            return Err(ContainerError::OldFormat("Excel 5/95".to_string()));
        }
        let workbook = document.read_stream(WORKBOOK_STREAM)?;

        let drawing_group = drawing_group(&workbook)?;
        if drawing_group.is_empty() {
            debug!("libro sin grupo de dibujos");
            return Ok(Vec::new());
        }

        let blips = blip_store_pictures(&drawing_group, 0, None, limits)?;
        Ok(blips
            .into_iter()
            .enumerate()
            .map(|(index, blip)| {
                let extension = blip.kind.suggest_extension(&blip.data);
                PictureRecord::new(blip.data, blip.kind)
                    .with_name(sequential_name(index, extension))
                    .with_extension(extension)
            })
            .collect())
    }
}

/// Concatena el contenido de los `MSODRAWINGGROUP` del libro y de sus `CONTINUE`.
fn drawing_group(workbook: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let mut records = biff_records(workbook);

    let bof = records
        .next()
        .transpose()?
        .filter(|record| record.kind == RT_BOF)
        .ok_or_else(|| ContainerError::open("el flujo Workbook no empieza con BOF"))?;
    let version = le_u16(bof.body, 0).unwrap_or(0);
    if version != BIFF8_VERSION {
        return Err(ContainerError::OldFormat(format!(
            "BIFF versión 0x{version:04X}"
        )));
    }

    let mut group = Vec::new();
    let mut in_group = false;
    for record in records {
        let record = record?;
        match record.kind {
            RT_FILEPASS => {
                debug!(offset = record.offset, "registro FILEPASS en el libro");
                return Err(ContainerError::Encrypted);
            }
            RT_EOF => break,
            RT_MSODRAWINGGROUP => {
                group.extend_from_slice(record.body);
                in_group = true;
            }
            RT_CONTINUE if in_group => group.extend_from_slice(record.body),
            _ => in_group = false,
        }
    }

    debug!(bytes = group.len(), "grupo de dibujos del libro");
    Ok(group)
}
