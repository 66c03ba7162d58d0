//! Analizadores de contenedores: uno por formato soportado.
//!
//! Ningún fallo atraviesa [`parse_container`]: los errores y los pánicos de los
//! analizadores se convierten en [`ParseOutcome::Failed`].

mod compound;
mod doc;
mod officeart;
mod ooxml;
mod ppt;
mod xls;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::collaborators::ReadSeek;
use crate::error::ContainerError;
use crate::format::ContainerFormat;
use crate::picture::PictureRecord;

/// Resultado cerrado del análisis de un contenedor.
#[derive(Debug)]
pub enum ParseOutcome {
    Records(Vec<PictureRecord>),
    Empty,
    Failed(ContainerError),
}

/// Límites de recursos aplicados durante el análisis.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub max_picture_bytes: u64,
    /// Tope de un flujo OLE2 completo leído en memoria.
    pub max_stream_bytes: u64,
}

impl Limits {
    pub(crate) fn check(&self, len: u64) -> Result<(), ContainerError> {
        if len > self.max_picture_bytes {
            return Err(ContainerError::TooLarge {
                limit: self.max_picture_bytes,
            });
        }
        Ok(())
    }
}

/// Un analizador abre el contenedor y enumera todas sus imágenes.
pub(crate) trait ContainerParser: Sync {
    fn parse(
        &self,
        reader: &mut dyn ReadSeek,
        limits: &Limits,
    ) -> Result<Vec<PictureRecord>, ContainerError>;
}

fn parser_for(format: ContainerFormat) -> &'static dyn ContainerParser {
    match format {
        ContainerFormat::Doc => &doc::DocParser,
        ContainerFormat::Ppt => &ppt::PptParser,
        ContainerFormat::Xls => &xls::XlsParser,
        ContainerFormat::Docx => &ooxml::OoxmlParser::WORD,
        ContainerFormat::Pptx => &ooxml::OoxmlParser::PRESENTATION,
        ContainerFormat::Xlsx => &ooxml::OoxmlParser::WORKBOOK,
    }
}

/// Analiza `reader` como un contenedor `format` y contiene cualquier fallo.
pub fn parse_container(
    format: ContainerFormat,
    reader: &mut dyn ReadSeek,
    limits: &Limits,
) -> ParseOutcome {
    run_contained(parser_for(format), reader, limits)
}

fn run_contained(
    parser: &dyn ContainerParser,
    reader: &mut dyn ReadSeek,
    limits: &Limits,
) -> ParseOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| parser.parse(reader, limits))) {
        Ok(Ok(records)) if records.is_empty() => ParseOutcome::Empty,
        Ok(Ok(records)) => ParseOutcome::Records(records),
        Ok(Err(error)) => ParseOutcome::Failed(error),
        Err(payload) => ParseOutcome::Failed(ContainerError::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pánico sin mensaje".to_string()
    }
}

pub(crate) fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn le_i32(data: &[u8], offset: usize) -> Option<i32> {
    le_u32(data, offset).map(|value| value as i32)
}
