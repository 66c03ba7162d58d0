//! Lectura de paquetes OPC: tipos de contenido, relaciones y partes.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

use super::xml::{
    DEFAULT_SPEC, OVERRIDE_SPEC, RELATIONSHIP_SPEC, attribute, matching_children, parse_element,
};
use crate::error::ContainerError;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const PACKAGE_RELATIONSHIPS_PART: &str = "_rels/.rels";
const RELATIONSHIPS_DIR: &str = "_rels/";
const RELATIONSHIPS_EXTENSION: &str = ".rels";
const OFFICE_DOCUMENT_REL_SUFFIX: &str = "/officeDocument";
const EXTERNAL_TARGET_MODE: &str = "External";
/// Las partes XML del paquete son pequeñas; este tope evita descomprimir bombas.
const MAX_XML_PART_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// Contenido de una parte junto con su fecha de modificación en el ZIP.
pub struct PartData {
    pub bytes: Vec<u8>,
    pub modified: Option<i64>,
}

#[derive(Default)]
struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(bytes: &[u8]) -> Result<Self, ContainerError> {
        let root = parse_element(bytes)?;
        let mut types = Self::default();

        for element in matching_children(&root, DEFAULT_SPEC) {
            if let (Some(extension), Some(content_type)) = (
                attribute(element, "Extension"),
                attribute(element, "ContentType"),
            ) {
                types
                    .defaults
                    .insert(extension.to_ascii_lowercase(), content_type.to_string());
            }
        }
        for element in matching_children(&root, OVERRIDE_SPEC) {
            if let (Some(part), Some(content_type)) = (
                attribute(element, "PartName"),
                attribute(element, "ContentType"),
            ) {
                types
                    .overrides
                    .insert(part_key(part), content_type.to_string());
            }
        }

        Ok(types)
    }

    fn get(&self, part: &str) -> Option<&str> {
        if let Some(content_type) = self.overrides.get(&part_key(part)) {
            return Some(content_type);
        }
        let (_, extension) = part.rsplit_once('.')?;
        self.defaults
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Clave de comparación de nombres de parte: sin barra inicial y sin mayúsculas.
fn part_key(name: &str) -> String {
    name.trim_start_matches('/').to_lowercase()
}

pub struct Package<R: Read + Seek> {
    archive: ZipArchive<R>,
    /// Nombres de las entradas en el orden del directorio central.
    names: Vec<String>,
    index: HashMap<String, usize>,
    content_types: ContentTypes,
}

impl<R: Read + Seek> Package<R> {
    pub fn open(reader: R) -> Result<Self, ContainerError> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| ContainerError::open(format!("no es un paquete ZIP válido: {e}")))?;

        let mut names = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());
        for position in 0..archive.len() {
            let entry = archive.by_index_raw(position)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            index.entry(part_key(&name)).or_insert(position);
            names.push(name);
        }

        let mut package = Self {
            archive,
            names,
            index,
            content_types: ContentTypes::default(),
        };

        let content_types = package
            .read_xml_part(CONTENT_TYPES_PART)?
            .ok_or_else(|| ContainerError::open(format!("falta {CONTENT_TYPES_PART}")))?;
        package.content_types = ContentTypes::parse(&content_types)?;
        Ok(package)
    }

    pub fn part_names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, part: &str) -> bool {
        self.index.contains_key(&part_key(part))
    }

    pub fn content_type(&self, part: &str) -> Option<&str> {
        self.content_types.get(part)
    }

    /// Parte destino de la relación `officeDocument` del paquete.
    pub fn main_part(&mut self) -> Result<String, ContainerError> {
        let relationships = self
            .read_relationships(PACKAGE_RELATIONSHIPS_PART)?
            .ok_or_else(|| ContainerError::open(format!("falta {PACKAGE_RELATIONSHIPS_PART}")))?;

        relationships
            .iter()
            .find(|rel| !rel.external && rel.rel_type.ends_with(OFFICE_DOCUMENT_REL_SUFFIX))
            .and_then(|rel| resolve_target("", &rel.target))
            .filter(|part| self.contains(part))
            .ok_or_else(|| ContainerError::open("el paquete no declara un documento principal"))
    }

    /// Relaciones de un archivo `.rels`, o `None` si el archivo no existe.
    pub fn read_relationships(
        &mut self,
        rels_part: &str,
    ) -> Result<Option<Vec<Relationship>>, ContainerError> {
        let Some(bytes) = self.read_xml_part(rels_part)? else {
            return Ok(None);
        };
        let root = parse_element(&bytes)?;

        let relationships = matching_children(&root, RELATIONSHIP_SPEC)
            .filter_map(|element| {
                Some(Relationship {
                    rel_type: attribute(element, "Type")?.to_string(),
                    target: attribute(element, "Target")?.to_string(),
                    external: attribute(element, "TargetMode") == Some(EXTERNAL_TARGET_MODE),
                })
            })
            .collect();
        Ok(Some(relationships))
    }

    fn read_xml_part(&mut self, part: &str) -> Result<Option<Vec<u8>>, ContainerError> {
        let Some(&position) = self.index.get(&part_key(part)) else {
            return Ok(None);
        };
        let data = self
            .read_entry(position, MAX_XML_PART_BYTES)
            .map_err(|e| ContainerError::open(format!("no se pudo leer {part}: {e}")))?;
        Ok(Some(data.bytes))
    }

    /// Lee una parte con un tope de bytes descomprimidos.
    pub fn read_part(&mut self, part: &str, limit: u64) -> Result<Option<PartData>, ContainerError> {
        match self.index.get(&part_key(part)) {
            Some(&position) => self.read_entry(position, limit).map(Some),
            None => Ok(None),
        }
    }

    fn read_entry(&mut self, position: usize, limit: u64) -> Result<PartData, ContainerError> {
        let mut file = self.archive.by_index(position)?;
        if file.size() > limit {
            return Err(ContainerError::TooLarge { limit });
        }

        let modified = file.last_modified().and_then(zip_time_to_unix);
        let offset = file.header_start();
        let mut bytes = Vec::with_capacity(file.size() as usize);
        (&mut file)
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| ContainerError::record(offset, e.to_string()))?;
        if bytes.len() as u64 > limit {
            return Err(ContainerError::TooLarge { limit });
        }

        Ok(PartData { bytes, modified })
    }
}

/// Archivos de relaciones cuya parte origen está bajo `root`, con la carpeta
/// de esa parte para resolver destinos relativos.
pub fn relationship_parts_under(names: &[String], root: &str) -> Vec<(String, String)> {
    let root = part_key(root);
    names
        .iter()
        .filter_map(|name| {
            let without_extension = name.strip_suffix(RELATIONSHIPS_EXTENSION)?;
            let at = without_extension.rfind(RELATIONSHIPS_DIR)?;
            let folder = &without_extension[..at];
            let source = &without_extension[at + RELATIONSHIPS_DIR.len()..];
            if source.contains('/') {
                return None;
            }
            part_key(&format!("{folder}{source}"))
                .starts_with(&root)
                .then(|| (name.clone(), folder.to_string()))
        })
        .collect()
}

/// Resuelve el destino de una relación respecto a la carpeta de su parte origen.
///
/// Devuelve `None` si el destino sale de la raíz del paquete o queda vacío.
pub fn resolve_target(base_folder: &str, target: &str) -> Option<String> {
    let target = percent_decode(target.split(['#', '?']).next().unwrap_or_default());

    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        base_folder.split('/').filter(|s| !s.is_empty()).collect()
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    (!segments.is_empty()).then(|| segments.join("/"))
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut position = 0;
    while position < bytes.len() {
        if bytes[position] == b'%'
            && let Some(hex) = value.get(position + 1..position + 3)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            decoded.push(byte);
            position += 3;
            continue;
        }
        decoded.push(bytes[position]);
        position += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Fecha DOS del ZIP a segundos Unix. Las fechas de 1980 o anteriores se
/// consideran ausentes: es el valor que escriben las herramientas sin reloj.
fn zip_time_to_unix(time: zip::DateTime) -> Option<i64> {
    if time.year() <= 1980 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?;
    let datetime = date.and_hms_opt(
        time.hour() as u32,
        time.minute() as u32,
        time.second() as u32,
    )?;
    Some(datetime.and_utc().timestamp())
}
