//! Constructores de contenedores sintéticos para las pruebas.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub type FixtureResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Fecha con la que se escriben las entradas de los paquetes de prueba.
pub const FIXTURE_MODIFIED_UNIX: i64 = 1_706_790_600;

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const OFFICE_DOCUMENT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

pub fn officeart_record(version: u8, instance: u16, rec_type: u16, body: &[u8]) -> Vec<u8> {
    let ver_instance = (instance << 4) | (version as u16 & 0x000F);
    let mut record = Vec::with_capacity(8 + body.len());
    record.extend_from_slice(&ver_instance.to_le_bytes());
    record.extend_from_slice(&rec_type.to_le_bytes());
    record.extend_from_slice(&(body.len() as u32).to_le_bytes());
    record.extend_from_slice(body);
    record
}

/// BLIP de mapa de bits con un UID y el byte de etiqueta.
pub fn blip_record(rec_type: u16, instance: u16, data: &[u8]) -> Vec<u8> {
    let mut body = vec![0x11; 16];
    body.push(0xFF);
    body.extend_from_slice(data);
    officeart_record(0, instance, rec_type, &body)
}

/// Entrada FBSE con el BLIP embebido o, si `blip` es `None`, diferida.
pub fn fbse_record(blip: Option<&[u8]>, size: u32, delay_offset: u32) -> Vec<u8> {
    let mut body = vec![0u8; 36];
    body[0] = 6;
    body[1] = 6;
    body[18..20].copy_from_slice(&0x00FFu16.to_le_bytes());
    let size = blip.map_or(size, |blip| blip.len() as u32);
    body[20..24].copy_from_slice(&size.to_le_bytes());
    body[24..28].copy_from_slice(&1u32.to_le_bytes());
    body[28..32].copy_from_slice(&delay_offset.to_le_bytes());
    if let Some(blip) = blip {
        body.extend_from_slice(blip);
    }
    officeart_record(2, 6, 0xF007, &body)
}

/// `OfficeArtDggContainer` con un FBSE embebido por cada BLIP.
pub fn drawing_group_bytes(blips: &[Vec<u8>]) -> Vec<u8> {
    let store_body: Vec<u8> = blips
        .iter()
        .flat_map(|blip| fbse_record(Some(blip.as_slice()), 0, 0))
        .collect();
    let mut dgg_body = officeart_record(0, 0, 0xF006, &[0u8; 16]);
    dgg_body.extend(officeart_record(0xF, blips.len() as u16, 0xF001, &store_body));
    officeart_record(0xF, 0, 0xF000, &dgg_body)
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("compresión en memoria");
    encoder.finish().expect("compresión en memoria")
}

pub fn compound_file(streams: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    write_compound(cfb::CompoundFile::create(Cursor::new(Vec::new()))?, streams)
}

/// Archivo compuesto de versión 4, cuyo directorio admite longitudes de 64 bits.
pub fn compound_file_v4(streams: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let file = cfb::CompoundFile::create_with_version(cfb::Version::V4, Cursor::new(Vec::new()))?;
    write_compound(file, streams)
}

/// Sobrescribe la longitud declarada de un flujo en su entrada de directorio.
pub fn forge_stream_len(bytes: &mut [u8], name: &str, len: u64) -> bool {
    let mut encoded: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
    encoded.extend_from_slice(&[0, 0]);
    let name_len = encoded.len() as u16;

    for entry in (0..bytes.len().saturating_sub(127)).step_by(128) {
        let name_matches = bytes[entry..].starts_with(&encoded)
            && bytes[entry + 64..entry + 66] == name_len.to_le_bytes()
            && bytes[entry + 66] == 2;
        if name_matches {
            bytes[entry + 120..entry + 128].copy_from_slice(&len.to_le_bytes());
            return true;
        }
    }
    false
}

fn write_compound(
    mut file: cfb::CompoundFile<Cursor<Vec<u8>>>,
    streams: &[(&str, &[u8])],
) -> io::Result<Vec<u8>> {
    for (name, data) in streams {
        let mut stream = file.create_stream(format!("/{name}"))?;
        stream.write_all(data)?;
        stream.flush()?;
    }
    file.flush()?;
    Ok(file.into_inner().into_inner())
}

pub fn current_user_stream(encrypted: bool) -> Vec<u8> {
    let token: u32 = if encrypted { 0xF3D1_C4DF } else { 0xE391_C05F };
    let mut body = vec![0u8; 20];
    body[0..4].copy_from_slice(&20u32.to_le_bytes());
    body[4..8].copy_from_slice(&token.to_le_bytes());
    officeart_record(0, 0, 0x0FF6, &body)
}

pub fn biff_record(kind: u16, body: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(4 + body.len());
    record.extend_from_slice(&kind.to_le_bytes());
    record.extend_from_slice(&(body.len() as u16).to_le_bytes());
    record.extend_from_slice(body);
    record
}

/// Flujo `Workbook` BIFF8 con el grupo de dibujos partido en bloques de `chunk` bytes.
pub fn xls_workbook_stream(drawing_group: &[u8], chunk: usize) -> Vec<u8> {
    let mut bof = vec![0u8; 16];
    bof[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    bof[2..4].copy_from_slice(&0x0005u16.to_le_bytes());

    let mut stream = biff_record(0x0809, &bof);
    stream.extend(biff_record(0x0042, &1200u16.to_le_bytes()));
    for (index, piece) in drawing_group.chunks(chunk).enumerate() {
        let kind = if index == 0 { 0x00EB } else { 0x003C };
        stream.extend(biff_record(kind, piece));
    }
    stream.extend(biff_record(0x000A, &[]));
    stream
}

const WORD_CSW: u16 = 14;
const WORD_CSLW: u16 = 22;
const WORD_CSW_AT: usize = 32;
const WORD_CSLW_AT: usize = WORD_CSW_AT + 2 + WORD_CSW as usize * 2;
const WORD_FC_LCB_COUNT_AT: usize = WORD_CSLW_AT + 2 + WORD_CSLW as usize * 4;

/// Flujo `WordDocument` con un FIB de Word 97 y, opcionalmente, `fcDggInfo`/`lcbDggInfo`.
pub fn word_document_stream(
    table_one: bool,
    encrypted: bool,
    drawing_group: Option<(u32, u32)>,
) -> Vec<u8> {
    const CB_RG_FC_LCB: u16 = 93;

    let mut fib = vec![0u8; 1024];
    fib[0..2].copy_from_slice(&0xA5ECu16.to_le_bytes());
    fib[2..4].copy_from_slice(&0x00C1u16.to_le_bytes());
    let mut flags = 0u16;
    if encrypted {
        flags |= 0x0100;
    }
    if table_one {
        flags |= 0x0200;
    }
    fib[0x0A..0x0C].copy_from_slice(&flags.to_le_bytes());

    fib[WORD_CSW_AT..WORD_CSW_AT + 2].copy_from_slice(&WORD_CSW.to_le_bytes());
    fib[WORD_CSLW_AT..WORD_CSLW_AT + 2].copy_from_slice(&WORD_CSLW.to_le_bytes());
    fib[WORD_FC_LCB_COUNT_AT..WORD_FC_LCB_COUNT_AT + 2]
        .copy_from_slice(&CB_RG_FC_LCB.to_le_bytes());

    if let Some((offset, length)) = drawing_group {
        set_fc_lcb(&mut fib, 50, offset, length);
    }
    fib
}

fn set_fc_lcb(fib: &mut [u8], index: usize, offset: u32, length: u32) {
    let pair = WORD_FC_LCB_COUNT_AT + 2 + index * 8;
    fib[pair..pair + 4].copy_from_slice(&offset.to_le_bytes());
    fib[pair + 4..pair + 8].copy_from_slice(&length.to_le_bytes());
}

/// Tramo de caracteres de una imagen en línea: su desplazamiento en `Data` y
/// si además lleva `fData`, como los campos de formulario.
#[derive(Debug, Clone, Copy)]
pub struct PictureRun {
    pub location: u32,
    pub form_field: bool,
}

impl PictureRun {
    pub fn at(location: u32) -> Self {
        Self {
            location,
            form_field: false,
        }
    }

    pub fn form_field(location: u32) -> Self {
        Self {
            location,
            form_field: true,
        }
    }

    fn grpprl(&self) -> Vec<u8> {
        let mut grpprl = Vec::new();
        grpprl.extend_from_slice(&0x0855u16.to_le_bytes());
        grpprl.push(1);
        if self.form_field {
            grpprl.extend_from_slice(&0x0806u16.to_le_bytes());
            grpprl.push(1);
        }
        grpprl.extend_from_slice(&0x6A03u16.to_le_bytes());
        grpprl.extend_from_slice(&self.location.to_le_bytes());
        grpprl
    }
}

/// Página `ChpxFkp` de 512 bytes con un tramo por elemento de `runs`.
pub fn chpx_page(runs: &[PictureRun]) -> Vec<u8> {
    let mut page = vec![0u8; 512];
    let crun = runs.len();
    for (index, fc) in (0..=crun).map(|run| 0x800 + run as u32).enumerate() {
        page[index * 4..index * 4 + 4].copy_from_slice(&fc.to_le_bytes());
    }

    let mut chpx_at = 256;
    for (run, picture) in runs.iter().enumerate() {
        let grpprl = picture.grpprl();
        page[4 * (crun + 1) + run] = (chpx_at / 2) as u8;
        page[chpx_at] = grpprl.len() as u8;
        page[chpx_at + 1..chpx_at + 1 + grpprl.len()].copy_from_slice(&grpprl);
        chpx_at += (1 + grpprl.len()).next_multiple_of(2);
    }
    page[511] = crun as u8;
    page
}

/// Flujos `WordDocument` y `0Table` cuyos tramos de caracteres apuntan a `runs`.
///
/// La única página FKP va tras el FIB, en la página 2 del flujo.
pub fn word_with_picture_runs(runs: &[PictureRun]) -> (Vec<u8>, Vec<u8>) {
    let mut table = Vec::new();
    table.extend_from_slice(&0x800u32.to_le_bytes());
    table.extend_from_slice(&(0x800 + runs.len() as u32).to_le_bytes());
    table.extend_from_slice(&2u32.to_le_bytes());

    let mut word = word_document_stream(false, false, None);
    set_fc_lcb(&mut word, 12, 0, table.len() as u32);
    word.extend(chpx_page(runs));
    (word, table)
}

/// Bloque `PICF` del flujo `Data` seguido de `content`.
pub fn picf_block(mm: u16, name: Option<&[u8]>, content: &[u8]) -> Vec<u8> {
    let name_len = name.map_or(0, |name| 1 + name.len());
    let lcb = 0x44 + name_len + content.len();

    let mut block = vec![0u8; 0x44];
    block[0..4].copy_from_slice(&(lcb as u32).to_le_bytes());
    block[4..6].copy_from_slice(&0x44u16.to_le_bytes());
    block[6..8].copy_from_slice(&mm.to_le_bytes());
    if let Some(name) = name {
        block.push(name.len() as u8);
        block.extend_from_slice(name);
    }
    block.extend_from_slice(content);
    block
}

fn sample_image(seed: u8) -> RgbImage {
    RgbImage::from_fn(8, 8, |x, y| Rgb([seed, (x * 30) as u8, (y * 30) as u8]))
}

pub fn png_bytes(seed: u8) -> FixtureResult<Vec<u8>> {
    let mut bytes = Vec::new();
    sample_image(seed).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn jpeg_bytes(seed: u8) -> FixtureResult<Vec<u8>> {
    let mut bytes = Vec::new();
    sample_image(seed).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
    Ok(bytes)
}

/// Paquete OOXML mínimo con imágenes relacionadas desde una parte del documento.
pub struct OoxmlFixture {
    root: &'static str,
    main_part: &'static str,
    main_content_type: &'static str,
    image_rels: &'static str,
    target_prefix: &'static str,
    images: Vec<(String, Vec<u8>)>,
    external_images: Vec<String>,
    extra_relationships: Vec<(String, String)>,
    content_types: bool,
}

impl OoxmlFixture {
    fn new(
        root: &'static str,
        main_part: &'static str,
        main_content_type: &'static str,
        image_rels: &'static str,
        target_prefix: &'static str,
    ) -> Self {
        Self {
            root,
            main_part,
            main_content_type,
            image_rels,
            target_prefix,
            images: Vec::new(),
            external_images: Vec::new(),
            extra_relationships: Vec::new(),
            content_types: true,
        }
    }

    pub fn word() -> Self {
        Self::new(
            "word",
            "document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
            "_rels/document.xml.rels",
            "",
        )
    }

    pub fn presentation() -> Self {
        Self::new(
            "ppt",
            "presentation.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
            "slides/_rels/slide1.xml.rels",
            "../",
        )
    }

    pub fn workbook() -> Self {
        Self::new(
            "xl",
            "workbook.xml",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
            "drawings/_rels/drawing1.xml.rels",
            "../",
        )
    }

    /// Añade una parte de imagen; `path` es relativo a la carpeta raíz del documento.
    pub fn image(mut self, path: &str, data: &[u8]) -> Self {
        self.images.push((path.to_string(), data.to_vec()));
        self
    }

    pub fn external_image(mut self, url: &str) -> Self {
        self.external_images.push(url.to_string());
        self
    }

    /// Relación de imagen adicional en `rels` (relativo a la raíz) hacia `target`.
    pub fn extra_relationship(mut self, rels: &str, target: &str) -> Self {
        self.extra_relationships
            .push((rels.to_string(), target.to_string()));
        self
    }

    pub fn without_content_types(mut self) -> Self {
        self.content_types = false;
        self
    }

    pub fn build(self) -> FixtureResult<Vec<u8>> {
        let mut relationships: BTreeMap<String, Vec<String>> = BTreeMap::new();
        relationships.entry(self.image_rels.to_string()).or_default();
        for (path, _) in &self.images {
            let target = format!("{}{}", self.target_prefix, path);
            push_relationship(&mut relationships, self.image_rels, &target, false);
        }
        for url in &self.external_images {
            push_relationship(&mut relationships, self.image_rels, url, true);
        }
        for (rels, target) in &self.extra_relationships {
            push_relationship(&mut relationships, rels, target, false);
        }

        let options = FileOptions::<'_, ()>::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::from_date_and_time(2024, 2, 1, 12, 30, 0)?);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        let main_path = format!("{}/{}", self.root, self.main_part);
        if self.content_types {
            writer.start_file("[Content_Types].xml", options)?;
            writer.write_all(
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Default Extension="png" ContentType="image/png"/>
    <Default Extension="jpeg" ContentType="image/jpeg"/>
    <Override PartName="/{main_path}" ContentType="{}"/>
</Types>
"#,
                    self.main_content_type
                )
                .as_bytes(),
            )?;
        }

        writer.start_file("_rels/.rels", options)?;
        writer.write_all(
            relationships_xml(&[relationship_xml(
                1,
                OFFICE_DOCUMENT_REL_TYPE,
                &main_path,
                false,
            )])
            .as_bytes(),
        )?;

        writer.start_file(main_path.as_str(), options)?;
        writer.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><root/>"#)?;

        for (rels, entries) in &relationships {
            writer.start_file(format!("{}/{}", self.root, rels), options)?;
            writer.write_all(relationships_xml(entries).as_bytes())?;
        }

        for (path, data) in &self.images {
            writer.start_file(format!("{}/{}", self.root, path), options)?;
            writer.write_all(data)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn push_relationship(
    relationships: &mut BTreeMap<String, Vec<String>>,
    rels: &str,
    target: &str,
    external: bool,
) {
    let entries = relationships.entry(rels.to_string()).or_default();
    let id = entries.len() + 1;
    entries.push(relationship_xml(id, IMAGE_REL_TYPE, target, external));
}

fn relationship_xml(id: usize, rel_type: &str, target: &str, external: bool) -> String {
    let mode = if external {
        r#" TargetMode="External""#
    } else {
        ""
    };
    format!(r#"<Relationship Id="rId{id}" Type="{rel_type}" Target="{target}"{mode}/>"#)
}

fn relationships_xml(entries: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
{}
</Relationships>
"#,
        entries.join("\n")
    )
}
