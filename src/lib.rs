//! Extracción de imágenes incrustadas en documentos Office binarios y OOXML.
//!
//! El punto de entrada es [`ImageExtractor::classify_and_extract`]: clasifica el
//! documento por su tipo MIME, abre el contenedor correspondiente, escribe cada
//! imagen en el directorio del módulo y registra los archivos derivados.

mod collaborators;
mod config;
mod descriptor;
mod detector;
mod error;
mod extractor;
mod format;
mod hashing;
mod naming;
mod parsers;
mod picture;
mod sink;

pub use collaborators::{
    CaseFileSystem, DerivedFile, DerivedFileRegistrar, FileDocument, FileTypeDetector, IngestJob,
    InputDocument, MemoryDocument, ReadSeek,
};
pub use config::ExtractorConfig;
pub use descriptor::ExtractedImageDescriptor;
pub use detector::InferFileTypeDetector;
pub use error::{
    ClassificationError, ConfigError, ContainerError, LookupError, RegistrationError, SinkError,
};
pub use extractor::{ExtractionOutcome, ImageExtractor};
pub use format::ContainerFormat;
pub use hashing::HashSummary;
pub use parsers::{Limits, ParseOutcome, parse_container};
pub use picture::{PictureRecord, PictureType};
pub use sink::{EncodedReader, EncodedWriter, EncodingType, OutputSink, decode_encoded};

#[cfg(test)]
mod fixtures;
