//! Cálculo de hashes de las imágenes extraídas.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HashSummary {
    pub md5: String,
    pub sha256: String,
}

/// Devuelve los hashes MD5 y SHA-256 del contenido en hexadecimal.
pub fn content_hashes(data: &[u8]) -> HashSummary {
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    for chunk in data.chunks(8192) {
        md5.update(chunk);
        sha256.update(chunk);
    }

    HashSummary {
        md5: format!("{:x}", md5.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
    }
}
