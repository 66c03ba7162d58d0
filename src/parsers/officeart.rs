//! Registros OfficeArt (Escher) compartidos por Word, PowerPoint y Excel binarios.
//!
//! Solo se interpreta lo necesario para localizar BLIPs: cabeceras de
//! registro, el almacén de BLIPs (`OfficeArtBStoreContainer`) y sus entradas
//! `OfficeArtFBSE`, y el cuerpo de cada BLIP.

use flate2::read::ZlibDecoder;
use std::io::Read;

use super::{Limits, le_i32, le_u16, le_u32};
use crate::error::ContainerError;
use crate::picture::PictureType;

pub const RT_DGG_CONTAINER: u16 = 0xF000;
pub const RT_BSTORE_CONTAINER: u16 = 0xF001;
pub const RT_SP_CONTAINER: u16 = 0xF004;
pub const RT_FBSE: u16 = 0xF007;
const RT_BLIP_FIRST: u16 = 0xF018;
const RT_BLIP_LAST: u16 = 0xF117;

const RECORD_HEADER_LEN: usize = 8;
const FBSE_FIXED_LEN: usize = 36;
const UID_LEN: usize = 16;
const METAFILE_HEADER_LEN: usize = 34;
const METAFILE_DEFLATE: u8 = 0x00;
const NO_DELAY_OFFSET: u32 = u32::MAX;

const WMF_PLACEABLE_KEY: u32 = 0x9AC6_CDD7;
const WMF_PLACEABLE_INCH: u16 = 72;
const PICT_PREAMBLE_LEN: usize = 512;

#[derive(Clone, Copy, Debug)]
pub struct RecordHeader {
    pub version: u8,
    pub instance: u16,
    pub rec_type: u16,
    pub length: u32,
}

impl RecordHeader {
    fn parse(data: &[u8], position: usize) -> Option<Self> {
        let ver_instance = le_u16(data, position)?;
        Some(Self {
            version: (ver_instance & 0x000F) as u8,
            instance: ver_instance >> 4,
            rec_type: le_u16(data, position + 2)?,
            length: le_u32(data, position + 4)?,
        })
    }

    pub fn is_blip(&self) -> bool {
        (RT_BLIP_FIRST..=RT_BLIP_LAST).contains(&self.rec_type)
    }
}

/// Registro localizado dentro de un flujo. `offset` es absoluto en el flujo.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    pub header: RecordHeader,
    pub offset: u64,
    pub body: &'a [u8],
}

impl<'a> Record<'a> {
    /// Lee el registro que empieza en `position`; `base` es el desplazamiento
    /// absoluto de `data` dentro de su flujo.
    pub fn parse_at(data: &'a [u8], position: usize, base: u64) -> Result<Self, ContainerError> {
        let absolute = base + position as u64;
        let header = RecordHeader::parse(data, position)
            .ok_or_else(|| ContainerError::record(absolute, "cabecera OfficeArt truncada"))?;

        let start = position + RECORD_HEADER_LEN;
        let end = start
            .checked_add(header.length as usize)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                ContainerError::record(
                    absolute,
                    format!(
                        "el registro 0x{:04X} declara {} bytes y solo quedan {}",
                        header.rec_type,
                        header.length,
                        data.len().saturating_sub(start)
                    ),
                )
            })?;

        Ok(Self {
            header,
            offset: absolute,
            body: &data[start..end],
        })
    }

    pub fn body_offset(&self) -> u64 {
        self.offset + RECORD_HEADER_LEN as u64
    }

    pub fn children(&self) -> Records<'a> {
        Records::new(self.body, self.body_offset())
    }

    pub fn total_len(&self) -> usize {
        RECORD_HEADER_LEN + self.body.len()
    }
}

/// Iterador sobre registros hermanos consecutivos.
///
/// Menos de ocho bytes finales se consideran relleno; un registro que declara
/// más bytes de los disponibles detiene la iteración con error.
pub struct Records<'a> {
    data: &'a [u8],
    position: usize,
    base: u64,
}

impl<'a> Records<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Self {
        Self {
            data,
            position: 0,
            base,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len().saturating_sub(self.position) < RECORD_HEADER_LEN {
            return None;
        }

        match Record::parse_at(self.data, self.position, self.base) {
            Ok(record) => {
                self.position += record.total_len();
                Some(Ok(record))
            }
            Err(error) => {
                self.position = self.data.len();
                Some(Err(error))
            }
        }
    }
}

/// Imagen decodificada a partir de un registro BLIP.
#[derive(Clone, Debug)]
pub struct Blip {
    pub kind: PictureType,
    pub data: Vec<u8>,
    /// Desplazamiento absoluto de los datos de imagen dentro de su flujo.
    pub data_offset: u64,
}

/// Número de UIDs de 16 bytes que preceden a los datos según la instancia.
fn uid_count(header: &RecordHeader) -> usize {
    let single_uid_instance = match header.rec_type {
        0xF01A => 0x3D4,
        0xF01B => 0x216,
        0xF01C => 0x542,
        0xF01D => 0x46A,
        0xF02A => 0x6E2,
        0xF01E => 0x6E0,
        0xF01F => 0x7A8,
        0xF029 => 0x6E4,
        _ => return 1 + (header.instance & 1) as usize,
    };
    if header.instance == single_uid_instance + 1 {
        2
    } else {
        1
    }
}

/// Extrae los bytes de imagen de un registro BLIP.
pub fn decode_blip(record: &Record<'_>, limits: &Limits) -> Result<Blip, ContainerError> {
    let kind = PictureType::from_blip_type(record.header.rec_type);
    let uids_len = UID_LEN * uid_count(&record.header);

    if kind.is_metafile() {
        decode_metafile(record, kind, uids_len, limits)
    } else {
        // Mapas de bits y tipos desconocidos: UIDs + un byte de etiqueta.
        let header_len = uids_len + 1;
        let data = record.body.get(header_len..).ok_or_else(|| {
            ContainerError::record(record.offset, "BLIP de mapa de bits sin datos")
        })?;
        limits.check(data.len() as u64)?;
        Ok(Blip {
            kind,
            data: data.to_vec(),
            data_offset: record.body_offset() + header_len as u64,
        })
    }
}

fn decode_metafile(
    record: &Record<'_>,
    kind: PictureType,
    uids_len: usize,
    limits: &Limits,
) -> Result<Blip, ContainerError> {
    let header_start = uids_len;
    let data_start = header_start + METAFILE_HEADER_LEN;
    let (Some(header), Some(payload)) = (
        record.body.get(header_start..data_start),
        record.body.get(data_start..),
    ) else {
        return Err(ContainerError::record(
            record.offset,
            "BLIP de metarchivo con cabecera truncada",
        ));
    };

    let compression = header[32];
    let mut data = if compression == METAFILE_DEFLATE {
        inflate(payload, limits).map_err(|error| match error {
            ContainerError::TooLarge { .. } => error,
            other => ContainerError::record(record.offset, other.to_string()),
        })?
    } else {
        limits.check(payload.len() as u64)?;
        payload.to_vec()
    };

    match kind {
        PictureType::Wmf if le_u32(&data, 0) != Some(WMF_PLACEABLE_KEY) => {
            let mut placed = wmf_placeable_header(header).to_vec();
            placed.append(&mut data);
            data = placed;
        }
        PictureType::Pict => {
            let mut placed = vec![0u8; PICT_PREAMBLE_LEN];
            placed.append(&mut data);
            data = placed;
        }
        _ => {}
    }

    Ok(Blip {
        kind,
        data,
        data_offset: record.body_offset() + data_start as u64,
    })
}

fn inflate(payload: &[u8], limits: &Limits) -> Result<Vec<u8>, ContainerError> {
    let mut data = Vec::new();
    ZlibDecoder::new(payload)
        .take(limits.max_picture_bytes.saturating_add(1))
        .read_to_end(&mut data)?;
    limits.check(data.len() as u64)?;
    Ok(data)
}

/// Cabecera "placeable" de Aldus construida con los límites del metarchivo.
fn wmf_placeable_header(metafile_header: &[u8]) -> [u8; 22] {
    let bound = |offset: usize| le_i32(metafile_header, offset).unwrap_or(0) as i16;
    let words: [u16; 10] = {
        let key = WMF_PLACEABLE_KEY.to_le_bytes();
        [
            u16::from_le_bytes([key[0], key[1]]),
            u16::from_le_bytes([key[2], key[3]]),
            0,
            bound(4) as u16,
            bound(8) as u16,
            bound(12) as u16,
            bound(16) as u16,
            WMF_PLACEABLE_INCH,
            0,
            0,
        ]
    };
    let checksum = words.iter().fold(0u16, |acc, word| acc ^ word);

    let mut header = [0u8; 22];
    for (index, word) in words.iter().enumerate() {
        header[index * 2..index * 2 + 2].copy_from_slice(&word.to_le_bytes());
    }
    header[20..22].copy_from_slice(&checksum.to_le_bytes());
    header
}

/// Entrada del almacén de BLIPs.
#[derive(Clone, Copy, Debug)]
pub struct BlipStoreEntry<'a> {
    pub size: u32,
    pub references: u32,
    pub delay_offset: u32,
    pub embedded: Option<Record<'a>>,
}

pub fn parse_fbse<'a>(record: &Record<'a>) -> Result<BlipStoreEntry<'a>, ContainerError> {
    let body = record.body;
    if body.len() < FBSE_FIXED_LEN {
        return Err(ContainerError::record(record.offset, "entrada FBSE truncada"));
    }

    let name_len = body[33] as usize;
    let blip_start = FBSE_FIXED_LEN + name_len;
    let embedded = if body.len() >= blip_start + RECORD_HEADER_LEN {
        let blip = Record::parse_at(body, blip_start, record.body_offset())?;
        blip.header.is_blip().then_some(blip)
    } else {
        None
    };

    Ok(BlipStoreEntry {
        size: le_u32(body, 20).unwrap_or(0),
        references: le_u32(body, 24).unwrap_or(0),
        delay_offset: le_u32(body, 28).unwrap_or(NO_DELAY_OFFSET),
        embedded,
    })
}

/// Flujo donde se guardan los BLIPs diferidos de un documento.
#[derive(Clone, Copy)]
pub struct DelayStream<'a> {
    pub data: &'a [u8],
    pub base: u64,
}

/// Resuelve el BLIP de una entrada FBSE, embebido o en el flujo diferido.
pub fn resolve_fbse<'a>(
    entry: &BlipStoreEntry<'a>,
    delay: Option<DelayStream<'a>>,
) -> Result<Option<Record<'a>>, ContainerError> {
    if let Some(blip) = entry.embedded {
        return Ok(Some(blip));
    }

    let Some(delay) = delay else {
        return Ok(None);
    };
    if entry.size == 0 || entry.references == 0 || entry.delay_offset == NO_DELAY_OFFSET {
        return Ok(None);
    }

    let position = entry.delay_offset as usize;
    if position >= delay.data.len() {
        return Err(ContainerError::record(
            delay.base + position as u64,
            "BLIP diferido fuera del flujo",
        ));
    }
    let blip = Record::parse_at(delay.data, position, delay.base)?;
    Ok(blip.header.is_blip().then_some(blip))
}

/// Enumera las imágenes del almacén de BLIPs de un `OfficeArtDggContainer`.
pub fn blip_store_pictures(
    data: &[u8],
    base: u64,
    delay: Option<DelayStream<'_>>,
    limits: &Limits,
) -> Result<Vec<Blip>, ContainerError> {
    let mut blips = Vec::new();

    for record in Records::new(data, base) {
        let dgg = record?;
        if dgg.header.rec_type != RT_DGG_CONTAINER {
            continue;
        }
        for child in dgg.children() {
            let store = child?;
            if store.header.rec_type != RT_BSTORE_CONTAINER {
                continue;
            }
            for entry in store.children() {
                let entry = entry?;
                if entry.header.rec_type != RT_FBSE {
                    continue;
                }
                let fbse = parse_fbse(&entry)?;
                if let Some(blip) = resolve_fbse(&fbse, delay)? {
                    blips.push(decode_blip(&blip, limits)?);
                }
            }
        }
    }

    Ok(blips)
}
