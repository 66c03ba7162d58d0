//! Acceso a los flujos de un archivo compuesto OLE2 (Word, PowerPoint y Excel 97-2003).

use cfb::CompoundFile;
use std::io::{Read, Seek, SeekFrom};

use crate::collaborators::ReadSeek;
use crate::error::ContainerError;

pub struct CompoundDocument<'r> {
    file: CompoundFile<&'r mut dyn ReadSeek>,
    max_stream_bytes: u64,
}

impl<'r> CompoundDocument<'r> {
    pub fn open(reader: &'r mut dyn ReadSeek, max_stream_bytes: u64) -> Result<Self, ContainerError> {
        reader.seek(SeekFrom::Start(0))?;
        let file = CompoundFile::open(reader)
            .map_err(|e| ContainerError::open(format!("no es un archivo compuesto OLE2: {e}")))?;
        Ok(Self {
            file,
            max_stream_bytes,
        })
    }

    pub fn has_stream(&self, name: &str) -> bool {
        self.file.is_stream(stream_path(name))
    }

    /// Lee un flujo completo. Un flujo inexistente es un error de apertura.
    ///
    /// El tamaño declarado en el directorio no se usa para reservar memoria:
    /// puede no corresponder con los sectores reales del archivo.
    pub fn read_stream(&mut self, name: &str) -> Result<Vec<u8>, ContainerError> {
        let path = stream_path(name);
        if !self.file.is_stream(&path) {
            return Err(ContainerError::open(format!("falta el flujo {name}")));
        }

        let limit = self.max_stream_bytes;
        let stream = self
            .file
            .open_stream(&path)
            .map_err(|e| ContainerError::open(format!("flujo {name}: {e}")))?;
        if stream.len() > limit {
            return Err(ContainerError::TooLarge { limit });
        }

        let mut data = Vec::new();
        stream
            .take(limit.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| ContainerError::open(format!("flujo {name}: {e}")))?;
        if data.len() as u64 > limit {
            return Err(ContainerError::TooLarge { limit });
        }
        Ok(data)
    }

    /// Como [`Self::read_stream`], pero un flujo ausente devuelve `None`.
    pub fn read_optional_stream(&mut self, name: &str) -> Result<Option<Vec<u8>>, ContainerError> {
        if self.has_stream(name) {
            self.read_stream(name).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn stream_path(name: &str) -> String {
    format!("/{name}")
}
