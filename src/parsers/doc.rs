//! Documentos de Word 97-2003.
//!
//! Las imágenes se buscan en dos sitios: el almacén de BLIPs del grupo de
//! dibujos (flujo de tabla, con BLIPs diferidos en `WordDocument`) y las
//! estructuras `PICF` del flujo `Data` a las que apuntan los tramos de
//! caracteres de las imágenes en línea.

use tracing::debug;

use super::compound::CompoundDocument;
use super::officeart::{
    Blip, DelayStream, RT_FBSE, Records, blip_store_pictures, decode_blip, parse_fbse,
    resolve_fbse,
};
use super::{ContainerParser, Limits, le_u16, le_u32};
use crate::collaborators::ReadSeek;
use crate::error::ContainerError;
use crate::picture::{PictureRecord, PictureType};

const WORD_DOCUMENT_STREAM: &str = "WordDocument";
const DATA_STREAM: &str = "Data";

const WORD_IDENT: u16 = 0xA5EC;
/// Las versiones con `nFib` menor son de Word 95 o anteriores.
const MIN_WORD97_NFIB: u16 = 106;
const FIB_FLAGS_OFFSET: usize = 0x0A;
const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_TABLE_ONE: u16 = 0x0200;
const FIB_CSW_OFFSET: usize = 32;
/// Posición del par `fcPlcfBteChpx`/`lcbPlcfBteChpx` dentro de `FibRgFcLcb97`.
const CHPX_BINS_PAIR: usize = 12;
/// Posición del par `fcDggInfo`/`lcbDggInfo` dentro de `FibRgFcLcb97`.
const DGG_INFO_PAIR: usize = 50;

const FKP_PAGE_LEN: usize = 512;
const PN_MASK: u32 = 0x003F_FFFF;

const SPRM_C_F_DATA: u16 = 0x0806;
const SPRM_C_F_OLE2: u16 = 0x080A;
const SPRM_C_F_SPEC: u16 = 0x0855;
const SPRM_C_F_OBJ: u16 = 0x0856;
const SPRM_C_PIC_LOCATION: u16 = 0x6A03;

const PICF_HEADER_LEN: usize = 0x44;
const MM_SHAPE: u16 = 0x64;
const MM_SHAPEFILE: u16 = 0x66;

/// Fragmento del flujo de tabla declarado por un par `fc`/`lcb` del FIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableRange {
    offset: u32,
    length: u32,
}

impl TableRange {
    fn slice<'t>(&self, table: &'t [u8]) -> Option<&'t [u8]> {
        let start = self.offset as usize;
        table.get(start..start.checked_add(self.length as usize)?)
    }
}

#[derive(Debug)]
struct Fib {
    table_stream: &'static str,
    chpx_bins: Option<TableRange>,
    drawing_group: Option<TableRange>,
}

impl Fib {
    fn parse(word_document: &[u8]) -> Result<Self, ContainerError> {
        let truncated = || ContainerError::open("FIB truncado");

        if le_u16(word_document, 0) != Some(WORD_IDENT) {
            return Err(ContainerError::open("el flujo WordDocument no tiene la firma de Word"));
        }
        let n_fib = le_u16(word_document, 2).ok_or_else(truncated)?;
        if n_fib < MIN_WORD97_NFIB {
            return Err(ContainerError::OldFormat(format!("Word nFib {n_fib}")));
        }

        let flags = le_u16(word_document, FIB_FLAGS_OFFSET).ok_or_else(truncated)?;
        if flags & FLAG_ENCRYPTED != 0 {
            return Err(ContainerError::Encrypted);
        }
        let table_stream = if flags & FLAG_TABLE_ONE != 0 {
            "1Table"
        } else {
            "0Table"
        };

        // csw, fibRgW, cslw, fibRgLw, cbRgFcLcb y fibRgFcLcb van seguidos.
        let csw = le_u16(word_document, FIB_CSW_OFFSET).ok_or_else(truncated)? as usize;
        let cslw_offset = FIB_CSW_OFFSET + 2 + csw * 2;
        let cslw = le_u16(word_document, cslw_offset).ok_or_else(truncated)? as usize;
        let fc_lcb_count_offset = cslw_offset + 2 + cslw * 4;
        let fc_lcb_count = le_u16(word_document, fc_lcb_count_offset).ok_or_else(truncated)?;
        let fc_lcb_offset = fc_lcb_count_offset + 2;

        let table_range = |index: usize| -> Result<Option<TableRange>, ContainerError> {
            if index >= fc_lcb_count as usize {
                return Ok(None);
            }
            let pair = fc_lcb_offset + index * 8;
            let offset = le_u32(word_document, pair).ok_or_else(truncated)?;
            let length = le_u32(word_document, pair + 4).ok_or_else(truncated)?;
            Ok((length > 0).then_some(TableRange { offset, length }))
        };

        Ok(Self {
            table_stream,
            chpx_bins: table_range(CHPX_BINS_PAIR)?,
            drawing_group: table_range(DGG_INFO_PAIR)?,
        })
    }
}

pub struct DocParser;

impl ContainerParser for DocParser {
    fn parse(
        &self,
        reader: &mut dyn ReadSeek,
        limits: &Limits,
    ) -> Result<Vec<PictureRecord>, ContainerError> {
        let mut document = CompoundDocument::open(reader, limits.max_stream_bytes)?;
        let word_document = document.read_stream(WORD_DOCUMENT_STREAM)?;
        let fib = Fib::parse(&word_document)?;
        let table = document.read_stream(fib.table_stream)?;
        let outside_table = |what: &str| {
            ContainerError::open(format!("{what} excede el flujo {}", fib.table_stream))
        };

        let mut blips = Vec::new();

        if let Some(group) = fib.drawing_group {
            let data = group
                .slice(&table)
                .ok_or_else(|| outside_table("el grupo de dibujos"))?;
            let delay = DelayStream {
                data: &word_document,
                base: 0,
            };
            blips.extend(blip_store_pictures(
                data,
                group.offset as u64,
                Some(delay),
                limits,
            )?);
        }

        let locations = match fib.chpx_bins {
            Some(bins) => {
                let plc = bins
                    .slice(&table)
                    .ok_or_else(|| outside_table("la tabla PlcBteChpx"))?;
                picture_locations(&word_document, plc)
            }
            None => Vec::new(),
        };
        if !locations.is_empty() {
            match document.read_optional_stream(DATA_STREAM)? {
                Some(data) => blips.extend(inline_pictures(&data, &locations, limits)?),
                None => debug!(count = locations.len(), "imágenes en línea sin flujo Data"),
            }
        }

        debug!(count = blips.len(), "imágenes del documento Word");
        Ok(blips.into_iter().map(into_record).collect())
    }
}

/// Los nombres se derivan del desplazamiento de los datos en su flujo.
fn into_record(blip: Blip) -> PictureRecord {
    let extension = blip.kind.suggest_extension(&blip.data);
    let name = format!("{:x}.{}", blip.data_offset, extension);
    PictureRecord::new(blip.data, blip.kind)
        .with_name(name)
        .with_extension(extension)
}

/// Desplazamientos en `Data` de las imágenes en línea, sin repetir y en orden
/// de aparición.
///
/// `PlcBteChpx` guarda `n + 1` posiciones de texto seguidas de `n` números de
/// página; cada página es un FKP de 512 bytes dentro de `WordDocument`.
fn picture_locations(word_document: &[u8], plc: &[u8]) -> Vec<u32> {
    let pages = plc.len().saturating_sub(4) / 8;
    let mut locations = Vec::new();

    for index in 0..pages {
        let Some(pn) = le_u32(plc, (pages + 1 + index) * 4) else {
            break;
        };
        let start = (pn & PN_MASK) as usize * FKP_PAGE_LEN;
        let Some(page) = start
            .checked_add(FKP_PAGE_LEN)
            .and_then(|end| word_document.get(start..end))
        else {
            debug!(pn, "página FKP fuera del flujo WordDocument");
            continue;
        };

        for grpprl in chpx_grpprls(page) {
            if let Some(location) = run_picture_location(grpprl)
                && !locations.contains(&location)
            {
                locations.push(location);
            }
        }
    }

    locations
}

/// Propiedades de cada tramo de una página `ChpxFkp`.
///
/// El último byte es `crun`; tras las `crun + 1` posiciones de texto viene un
/// byte por tramo con la posición de su `Chpx` dividida entre dos.
fn chpx_grpprls(page: &[u8]) -> impl Iterator<Item = &[u8]> {
    let crun = page.last().copied().unwrap_or(0) as usize;
    let offsets = 4 * (crun + 1);

    (0..crun).filter_map(move |run| {
        let chpx = *page.get(offsets + run)? as usize * 2;
        if chpx == 0 {
            return None;
        }
        let cb = *page.get(chpx)? as usize;
        page.get(chpx + 1..chpx + 1 + cb)
    })
}

/// `sprmCPicLocation` de un tramo especial que no sea un objeto incrustado ni
/// un campo de formulario.
fn run_picture_location(grpprl: &[u8]) -> Option<u32> {
    let mut location = None;
    let mut special = false;
    let mut position = 0usize;

    while let Some(sprm) = le_u16(grpprl, position) {
        let operand = position + 2;
        let Some(len) = operand_len(sprm, grpprl.get(operand).copied()) else {
            break;
        };
        let flag = grpprl.get(operand) == Some(&1);
        match sprm {
            SPRM_C_PIC_LOCATION => location = le_u32(grpprl, operand),
            SPRM_C_F_SPEC => special = flag,
            SPRM_C_F_DATA | SPRM_C_F_OLE2 | SPRM_C_F_OBJ if flag => return None,
            _ => {}
        }
        position = operand + len;
    }

    location.filter(|_| special)
}

/// Tamaño del operando según el campo `spra` del sprm.
fn operand_len(sprm: u16, first: Option<u8>) -> Option<usize> {
    match sprm >> 13 {
        0 | 1 => Some(1),
        2 | 4 | 5 => Some(2),
        3 => Some(4),
        7 => Some(3),
        _ => first.map(|size| size as usize + 1),
    }
}

/// Lee las estructuras `PICF` de `data` en cada desplazamiento de `locations`.
///
/// Un desplazamiento sin una cabecera `PICF` válida se omite.
fn inline_pictures(
    data: &[u8],
    locations: &[u32],
    limits: &Limits,
) -> Result<Vec<Blip>, ContainerError> {
    let mut blips = Vec::new();

    for &location in locations {
        let position = location as usize;
        let Some(end) = picf_end(data, position) else {
            debug!(offset = location, "tramo de imagen sin cabecera PICF válida");
            continue;
        };
        blips.extend(picf_pictures(data, position, end, limits)?);
    }

    Ok(blips)
}

/// Fin del bloque `PICF` que empieza en `position`, si su cabecera es válida.
fn picf_end(data: &[u8], position: usize) -> Option<usize> {
    let lcb = le_u32(data, position)? as usize;
    let cb_header = le_u16(data, position.checked_add(4)?)?;
    if cb_header as usize != PICF_HEADER_LEN || lcb < PICF_HEADER_LEN {
        return None;
    }
    position.checked_add(lcb).filter(|end| *end <= data.len())
}

fn picf_pictures(
    data: &[u8],
    position: usize,
    end: usize,
    limits: &Limits,
) -> Result<Vec<Blip>, ContainerError> {
    let mm = le_u16(data, position + 6).unwrap_or(0);
    let content = position + PICF_HEADER_LEN;

    match mm {
        MM_SHAPEFILE => {
            let name_len = data.get(content).copied().unwrap_or(0) as usize;
            let content = (content + 1 + name_len).min(end);
            inline_shape_pictures(data, content, end, limits)
        }
        MM_SHAPE => inline_shape_pictures(data, content, end, limits),
        _ if content < end => {
            // Formato previo a OfficeArt: metarchivo sin más envoltorio.
            let payload = &data[content..end];
            limits.check(payload.len() as u64)?;
            Ok(vec![Blip {
                kind: PictureType::Wmf,
                data: payload.to_vec(),
                data_offset: content as u64,
            }])
        }
        _ => Ok(Vec::new()),
    }
}

/// Lee el `OfficeArtInlineSpContainer` que sigue a una cabecera `PICF`.
fn inline_shape_pictures(
    data: &[u8],
    start: usize,
    end: usize,
    limits: &Limits,
) -> Result<Vec<Blip>, ContainerError> {
    let mut blips = Vec::new();

    for record in Records::new(&data[start..end], start as u64) {
        let record = record?;
        if record.header.rec_type == RT_FBSE {
            let entry = parse_fbse(&record)?;
            match resolve_fbse(&entry, None)? {
                Some(blip) => blips.push(decode_blip(&blip, limits)?),
                None => debug!(offset = record.offset, "FBSE en línea sin BLIP embebido"),
            }
        } else if record.header.is_blip() {
            blips.push(decode_blip(&record, limits)?);
        }
    }

    Ok(blips)
}
