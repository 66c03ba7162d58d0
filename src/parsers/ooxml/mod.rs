//! Paquetes Office Open XML (docx, pptx, xlsx).
//!
//! Las imágenes son las partes destino de relaciones de tipo imagen declaradas
//! bajo la carpeta del documento principal (`word/`, `ppt/` o `xl/`).

mod package;
mod xml;

use std::collections::HashSet;
use std::io::{Seek, SeekFrom};
use tracing::{debug, warn};

use super::{ContainerParser, Limits};
use crate::collaborators::ReadSeek;
use crate::error::ContainerError;
use crate::picture::{PictureRecord, PictureType};
use package::{Package, relationship_parts_under, resolve_target};

const IMAGE_REL_SUFFIX: &str = "/image";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PackageKind {
    Word,
    Presentation,
    Workbook,
}

impl PackageKind {
    fn main_content_types(self) -> &'static [&'static str] {
        match self {
            PackageKind::Word => &[
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml",
                "application/vnd.ms-word.document.macroEnabled.main+xml",
                "application/vnd.ms-word.template.macroEnabledTemplate.main+xml",
            ],
            PackageKind::Presentation => &[
                "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
                "application/vnd.openxmlformats-officedocument.presentationml.slideshow.main+xml",
                "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml",
                "application/vnd.ms-powerpoint.presentation.macroEnabled.main+xml",
                "application/vnd.ms-powerpoint.slideshow.macroEnabled.main+xml",
                "application/vnd.ms-powerpoint.template.macroEnabled.main+xml",
            ],
            PackageKind::Workbook => &[
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
                "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
                "application/vnd.ms-excel.template.macroEnabled.main+xml",
            ],
        }
    }

    fn label(self) -> &'static str {
        match self {
            PackageKind::Word => "documento de Word",
            PackageKind::Presentation => "presentación de PowerPoint",
            PackageKind::Workbook => "libro de Excel",
        }
    }
}

pub struct OoxmlParser {
    kind: PackageKind,
}

impl OoxmlParser {
    pub const WORD: Self = Self {
        kind: PackageKind::Word,
    };
    pub const PRESENTATION: Self = Self {
        kind: PackageKind::Presentation,
    };
    pub const WORKBOOK: Self = Self {
        kind: PackageKind::Workbook,
    };
}

impl ContainerParser for OoxmlParser {
    fn parse(
        &self,
        reader: &mut dyn ReadSeek,
        limits: &Limits,
    ) -> Result<Vec<PictureRecord>, ContainerError> {
        reader.seek(SeekFrom::Start(0))?;
        let mut package = Package::open(reader)?;

        let main_part = package.main_part()?;
        let content_type = package.content_type(&main_part).unwrap_or_default();
        if !self.kind.main_content_types().contains(&content_type) {
            return Err(ContainerError::open(format!(
                "{main_part} ({content_type}) no es un {}",
                self.kind.label()
            )));
        }

        let root = match main_part.rfind('/') {
            Some(slash) => &main_part[..=slash],
            None => "",
        };
        let image_parts = image_parts(&mut package, root)?;
        debug!(root, count = image_parts.len(), "partes de imagen del paquete");

        let mut records = Vec::with_capacity(image_parts.len());
        for part in image_parts {
            let Some(data) = package.read_part(&part, limits.max_picture_bytes)? else {
                continue;
            };
            let file_name = part.rsplit('/').next().unwrap_or(&part).to_string();
            let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
            let kind = extension
                .as_deref()
                .map(PictureType::from_extension)
                .unwrap_or(PictureType::Unknown);

            let mut record = PictureRecord::new(data.bytes, kind)
                .with_name(file_name)
                .with_modified(data.modified);
            if let Some(extension) = extension {
                record = record.with_extension(extension);
            }
            records.push(record);
        }

        Ok(records)
    }
}

/// Partes destino de las relaciones de imagen bajo `root`, sin repetir y en
/// orden de aparición.
fn image_parts<R: std::io::Read + Seek>(
    package: &mut Package<R>,
    root: &str,
) -> Result<Vec<String>, ContainerError> {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();

    for (rels_part, source_folder) in relationship_parts_under(package.part_names(), root) {
        let Some(relationships) = package.read_relationships(&rels_part)? else {
            continue;
        };
        for relationship in relationships {
            if relationship.external || !relationship.rel_type.ends_with(IMAGE_REL_SUFFIX) {
                continue;
            }
            let Some(target) = resolve_target(&source_folder, &relationship.target) else {
                warn!(%rels_part, target = %relationship.target, "destino de imagen inválido");
                continue;
            };
            if !package.contains(&target) {
                warn!(%rels_part, %target, "la relación apunta a una parte inexistente");
                continue;
            }
            if seen.insert(target.to_lowercase()) {
                parts.push(target);
            }
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FIXTURE_MODIFIED_UNIX, OoxmlFixture, png_bytes};
    use std::io::Cursor;

    fn limits() -> Limits {
        Limits {
            max_picture_bytes: 1024 * 1024,
            max_stream_bytes: 16 * 1024 * 1024,
        }
    }

    fn parse(parser: &OoxmlParser, bytes: Vec<u8>) -> Result<Vec<PictureRecord>, ContainerError> {
        parser.parse(&mut Cursor::new(bytes), &limits())
    }

    #[test]
    fn docx_images_use_their_part_names() -> Result<(), Box<dyn std::error::Error>> {
        let png = png_bytes(3)?;
        let bytes = OoxmlFixture::word()
            .image("media/image1.png", &png)
            .image("media/image2.jpeg", b"jpeg")
            .build()?;

        let records = parse(&OoxmlParser::WORD, bytes)?;

        let names: Vec<_> = records.iter().filter_map(|r| r.name_hint.as_deref()).collect();
        assert_eq!(names, vec!["image1.png", "image2.jpeg"]);
        assert_eq!(records[0].data, png);
        assert_eq!(records[0].kind, PictureType::Png);
        assert_eq!(records[1].suggested_extension.as_deref(), Some("jpeg"));
        assert_eq!(records[0].modified, Some(FIXTURE_MODIFIED_UNIX));
        Ok(())
    }

    #[test]
    fn shared_targets_are_listed_once() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = OoxmlFixture::presentation()
            .image("media/image1.png", b"png")
            .extra_relationship("slides/_rels/slide1.xml.rels", "../media/image1.png")
            .extra_relationship("slides/_rels/slide2.xml.rels", "../media/image1.png")
            .build()?;

        assert_eq!(parse(&OoxmlParser::PRESENTATION, bytes)?.len(), 1);
        Ok(())
    }

    #[test]
    fn external_and_dangling_targets_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = OoxmlFixture::workbook()
            .image("media/image1.png", b"png")
            .external_image("https://example.com/remota.png")
            .extra_relationship("drawings/_rels/drawing1.xml.rels", "../media/falta.png")
            .build()?;

        let records = parse(&OoxmlParser::WORKBOOK, bytes)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name_hint.as_deref(), Some("image1.png"));
        Ok(())
    }

    #[test]
    fn package_without_images_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = OoxmlFixture::word().build()?;
        assert!(parse(&OoxmlParser::WORD, bytes)?.is_empty());
        Ok(())
    }

    #[test]
    fn mismatched_main_part_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = OoxmlFixture::word().image("media/image1.png", b"png").build()?;
        assert!(matches!(
            parse(&OoxmlParser::WORKBOOK, bytes),
            Err(ContainerError::Open(_))
        ));
        Ok(())
    }

    #[test]
    fn oversized_part_is_too_large() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = OoxmlFixture::word()
            .image("media/image1.png", &[7u8; 4096])
            .build()?;
        let tight = Limits {
            max_picture_bytes: 1024,
            max_stream_bytes: 16 * 1024 * 1024,
        };

        let result = OoxmlParser::WORD.parse(&mut Cursor::new(bytes), &tight);
        assert!(matches!(result, Err(ContainerError::TooLarge { limit: 1024 })));
        Ok(())
    }

    #[test]
    fn missing_content_types_is_an_open_error() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = OoxmlFixture::word().without_content_types().build()?;
        assert!(matches!(
            parse(&OoxmlParser::WORD, bytes),
            Err(ContainerError::Open(_))
        ));
        Ok(())
    }
}
