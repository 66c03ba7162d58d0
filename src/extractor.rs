//! Coordinador de la extracción de imágenes de un documento.
//!
//! Cada llamada a [`ImageExtractor::classify_and_extract`] recorre la máquina
//! de estados completa para un documento y termina en un
//! [`ExtractionOutcome`]. Ningún fallo se propaga al anfitrión: todo se
//! registra en el log y el trabajo de ingesta continúa con el siguiente
//! documento.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Span, debug, error, info, info_span, warn};

use crate::collaborators::{
    CaseFileSystem, DerivedFileRegistrar, FileTypeDetector, IngestJob, InputDocument,
};
use crate::config::ExtractorConfig;
use crate::descriptor::{ExtractedImageDescriptor, relative_path};
use crate::error::{ConfigError, ContainerError, LookupError, SinkError};
use crate::format::ContainerFormat;
use crate::naming::{UniqueNames, sanitize_file_name, sequential_name};
use crate::parsers::{ParseOutcome, parse_container};
use crate::picture::PictureRecord;
use crate::sink::OutputSink;

/// Estado terminal de la extracción de un documento.
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// El documento ya tiene derivados y su directorio de salida existe.
    AlreadyDone,
    Unsupported,
    NoImages,
    ParseFailed(ContainerError),
    /// No se pudo consultar si el documento ya fue procesado.
    LookupFailed(LookupError),
    /// El directorio de salida no se pudo crear; no se escribió nada.
    OutputFailed(SinkError),
    Extracted { written: usize, registered: usize },
}

pub struct ImageExtractor {
    config: ExtractorConfig,
    detector: Arc<dyn FileTypeDetector>,
    case: Arc<dyn CaseFileSystem>,
    registrar: Arc<dyn DerivedFileRegistrar>,
    job: Arc<dyn IngestJob>,
    span: Span,
}

impl ImageExtractor {
    pub fn new(
        config: ExtractorConfig,
        detector: Arc<dyn FileTypeDetector>,
        case: Arc<dyn CaseFileSystem>,
        registrar: Arc<dyn DerivedFileRegistrar>,
        job: Arc<dyn IngestJob>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let span = info_span!(
            "embedded_image_extractor",
            tool = %config.tool_name,
            module_dir = %config.module_dir_relative
        );
        Ok(Self {
            config,
            detector,
            case,
            registrar,
            job,
            span,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Formato del documento según el detector de tipos. Los errores del
    /// detector se registran y se tratan como formato no soportado.
    pub fn classify(&self, document: &dyn InputDocument) -> Option<ContainerFormat> {
        match self.detector.file_type(document) {
            Ok(mime_type) => ContainerFormat::classify(&mime_type),
            Err(err) => {
                error!(
                    document = document.name(),
                    id = document.id(),
                    error = %err,
                    "no se pudo clasificar el documento"
                );
                None
            }
        }
    }

    pub fn is_supported(&self, document: &dyn InputDocument) -> bool {
        self.classify(document).is_some()
    }

    /// Directorio de salida del documento: `<módulo>/<id>_<nombre>`.
    pub fn output_directory(&self, document: &dyn InputDocument) -> PathBuf {
        self.config.module_dir_absolute.join(document.unique_name())
    }

    pub fn classify_and_extract(&self, document: &dyn InputDocument) -> ExtractionOutcome {
        let _entered = self.span.enter();

        let Some(format) = self.classify(document) else {
            debug!(document = document.name(), "formato no soportado");
            return ExtractionOutcome::Unsupported;
        };

        let output_dir = self.output_directory(document);
        match self.case.has_derived_children(document) {
            Ok(true) if output_dir.exists() => {
                info!(document = document.name(), "el documento ya fue procesado");
                return ExtractionOutcome::AlreadyDone;
            }
            Ok(_) => {}
            Err(err) => {
                error!(
                    document = document.name(),
                    error = %err,
                    "no se pudo comprobar si el documento ya fue procesado"
                );
                return ExtractionOutcome::LookupFailed(err);
            }
        }

        let records = match self.parse(document, format) {
            ParseOutcome::Records(records) => records,
            ParseOutcome::Empty => {
                debug!(document = document.name(), ?format, "sin imágenes");
                return ExtractionOutcome::NoImages;
            }
            ParseOutcome::Failed(err) => {
                warn!(
                    document = document.name(),
                    ?format,
                    error = %err,
                    "no se pudo analizar el contenedor"
                );
                return ExtractionOutcome::ParseFailed(err);
            }
        };

        self.write_and_register(document, output_dir, records)
    }

    fn parse(&self, document: &dyn InputDocument, format: ContainerFormat) -> ParseOutcome {
        match document.open() {
            Ok(mut reader) => parse_container(format, &mut *reader, &self.config.limits()),
            Err(err) => ParseOutcome::Failed(ContainerError::Io(err)),
        }
    }

    fn write_and_register(
        &self,
        document: &dyn InputDocument,
        output_dir: PathBuf,
        records: Vec<PictureRecord>,
    ) -> ExtractionOutcome {
        let parent_unique_name = document.unique_name();
        let mut sink = OutputSink::new(output_dir);
        let mut names = UniqueNames::new();
        let mut handles = Vec::with_capacity(records.len());
        let mut written = 0;

        for (index, record) in records.into_iter().enumerate() {
            let file_name = names.claim(&sanitize_file_name(&proposed_name(index, &record)));

            let local_path = match sink.write(&file_name, &record.data) {
                Ok(path) => path,
                Err(err @ SinkError::DirectoryCreate { .. }) => {
                    warn!(
                        document = document.name(),
                        error = %err,
                        "no se pudo crear el directorio de salida"
                    );
                    return ExtractionOutcome::OutputFailed(err);
                }
                Err(err) => {
                    warn!(file = %file_name, error = %err, "no se pudo escribir la imagen");
                    continue;
                }
            };
            written += 1;

            let descriptor = ExtractedImageDescriptor::new(
                document,
                file_name.clone(),
                relative_path(&self.config.module_dir_relative, &parent_unique_name, &file_name),
                local_path,
                &record.data,
                &self.config.tool_name,
            )
            .with_mtime(record.modified);

            match self.registrar.register_derived_file(&descriptor) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    error!(file = %file_name, error = %err, "no se pudo registrar la imagen extraída");
                }
            }
        }

        let registered = handles.len();
        if registered > 0 {
            self.job.notify_new_content(document);
            self.job.add_to_job(handles);
        }

        info!(
            document = document.name(),
            written, registered, "extracción de imágenes terminada"
        );
        ExtractionOutcome::Extracted {
            written,
            registered,
        }
    }
}

/// Nombre propuesto por el contenedor o, si no lo hay, `image_<n>.<ext>`.
fn proposed_name(index: usize, record: &PictureRecord) -> String {
    match &record.name_hint {
        Some(name) => name.clone(),
        None => {
            let extension = record
                .suggested_extension
                .as_deref()
                .unwrap_or_else(|| record.kind.suggest_extension(&record.data));
            sequential_name(index, extension)
        }
    }
}
