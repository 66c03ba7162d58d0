//! Saneamiento y unicidad de los nombres de archivo extraídos.

use std::collections::HashSet;

const UNKNOWN_NAME_PREFIX: &str = "image_";

/// Nombre secuencial para formatos que no informan el nombre original.
pub fn sequential_name(index: usize, extension: &str) -> String {
    format!("{UNKNOWN_NAME_PREFIX}{index}.{extension}")
}

/// Sustituye separadores de ruta, caracteres de control y nombres reservados.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    trimmed.to_string()
}

/// Garantiza nombres únicos dentro del directorio de un documento padre.
#[derive(Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devuelve `name` o, si ya existe, `stem_N.ext` con el primer `N` libre.
    /// La comparación ignora mayúsculas para no colisionar en sistemas de
    /// archivos insensibles a ellas.
    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let (stem, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot + 1..])),
            _ => (name, None),
        };

        let mut counter = 1;
        loop {
            let candidate = match extension {
                Some(ext) => format!("{stem}_{counter}.{ext}"),
                None => format!("{stem}_{counter}"),
            };
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }
}
