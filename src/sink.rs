//! Escritura de las imágenes extraídas en el directorio del módulo.
//!
//! Cada archivo se guarda con una cabecera fija seguida del contenido
//! transformado con XOR de un solo byte, para que antivirus e indexadores del
//! sistema anfitrión no traten los artefactos extraídos como archivos vivos.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::SinkError;

const XOR1_HEADER_LEN: usize = 32;
const XOR1_HEADER: &[u8; XOR1_HEADER_LEN] = b"TSK_CONTAINER_XOR1_xxxxxxxxxxxxx";
const XOR1_KEY: u8 = 0xCA;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EncodingType {
    #[serde(rename = "XOR1")]
    Xor1,
}

fn xor_in_place(buffer: &mut [u8]) {
    for byte in buffer {
        *byte ^= XOR1_KEY;
    }
}

/// Envoltorio de escritura que antepone la cabecera y codifica cada byte.
pub struct EncodedWriter<W: Write> {
    inner: W,
    scratch: Vec<u8>,
}

impl<W: Write> EncodedWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(XOR1_HEADER)?;
        Ok(Self {
            inner,
            scratch: Vec::new(),
        })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EncodedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        xor_in_place(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Lector inverso de [`EncodedWriter`]: valida la cabecera y decodifica el resto.
pub struct EncodedReader<R: Read> {
    inner: R,
}

impl<R: Read> EncodedReader<R> {
    pub fn new(mut inner: R) -> Result<Self, SinkError> {
        let mut header = [0u8; XOR1_HEADER_LEN];
        inner
            .read_exact(&mut header)
            .map_err(|_| SinkError::InvalidEncoding)?;
        if &header != XOR1_HEADER {
            return Err(SinkError::InvalidEncoding);
        }
        Ok(Self { inner })
    }
}

impl<R: Read> Read for EncodedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        xor_in_place(&mut buf[..read]);
        Ok(read)
    }
}

/// Decodifica en memoria el contenido completo de un archivo codificado.
pub fn decode_encoded(encoded: &[u8]) -> Result<Vec<u8>, SinkError> {
    let mut reader = EncodedReader::new(encoded)?;
    let mut decoded = Vec::with_capacity(encoded.len().saturating_sub(XOR1_HEADER_LEN));
    reader
        .read_to_end(&mut decoded)
        .map_err(|_| SinkError::InvalidEncoding)?;
    Ok(decoded)
}

/// Destino de escritura para las imágenes de un único documento padre.
///
/// El directorio se crea de forma perezosa en la primera escritura.
pub struct OutputSink {
    directory: PathBuf,
    prepared: bool,
}

impl OutputSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prepared: false,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Crea el directorio y sus ancestros si todavía no existen.
    pub fn prepare(&mut self) -> Result<(), SinkError> {
        if self.prepared {
            return Ok(());
        }
        fs::create_dir_all(&self.directory).map_err(|source| SinkError::DirectoryCreate {
            path: self.directory.clone(),
            source,
        })?;
        self.prepared = true;
        Ok(())
    }

    /// Escribe `data` codificado en `<directorio>/<file_name>` y devuelve la ruta.
    pub fn write(&mut self, file_name: &str, data: &[u8]) -> Result<PathBuf, SinkError> {
        self.prepare()?;

        let path = self.directory.join(file_name);
        write_encoded(&path, data).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn write_encoded(path: &Path, data: &[u8]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = EncodedWriter::new(BufWriter::new(file))?;
    writer.write_all(data)?;
    writer.flush()?;
    writer
        .into_inner()
        .into_inner()
        .map_err(|e| e.into_error())?
        .sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_bytes_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut sink = OutputSink::new(dir.path().join("7_doc.doc"));
        let payload: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();

        let path = sink.write("image_0.png", &payload)?;

        let stored = fs::read(&path)?;
        assert_eq!(&stored[..XOR1_HEADER.len()], XOR1_HEADER);
        assert_ne!(&stored[XOR1_HEADER.len()..], payload.as_slice());
        assert_eq!(decode_encoded(&stored)?, payload);
        Ok(())
    }

    #[test]
    fn empty_payload_keeps_header() -> Result<(), Box<dyn std::error::Error>> {
        let mut encoded = Vec::new();
        EncodedWriter::new(&mut encoded)?.write_all(&[])?;

        assert_eq!(encoded.as_slice(), XOR1_HEADER);
        assert!(decode_encoded(&encoded)?.is_empty());
        Ok(())
    }

    #[test]
    fn decode_rejects_plain_content() {
        assert!(matches!(
            decode_encoded(b"\x89PNG plain"),
            Err(SinkError::InvalidEncoding)
        ));
    }

    #[test]
    fn directory_is_created_once_on_first_write() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("anidado").join("1_a.ppt");
        let mut sink = OutputSink::new(&target);
        assert!(!target.exists());

        sink.write("image_0.jpg", b"uno")?;
        sink.write("image_1.jpg", b"dos")?;

        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target)?.count(), 2);
        Ok(())
    }

    #[test]
    fn directory_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("ocupado");
        fs::write(&blocker, b"archivo, no directorio")?;

        let mut sink = OutputSink::new(blocker.join("1_a.xls"));
        let result = sink.write("image_0.png", b"datos");

        assert!(matches!(result, Err(SinkError::DirectoryCreate { .. })));
        Ok(())
    }
}
