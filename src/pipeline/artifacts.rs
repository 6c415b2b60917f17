use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{ModeloError, PeriodInfo};
use crate::forms::encode_latin1;

/// Which declaration an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Form349,
    Form349Csv,
    Form369,
}

impl FormKind {
    /// `modelo_349_2024_T1.txt`, `modelo_349_csv_2024_T1.txt`, `modelo_369_2024_T1.txt`.
    pub fn file_name(&self, period: &PeriodInfo) -> String {
        let stem = match self {
            Self::Form349 => "modelo_349",
            Self::Form349Csv => "modelo_349_csv",
            Self::Form369 => "modelo_369",
        };
        format!("{stem}_{}_{}.txt", period.year, period.compact_label())
    }
}

/// A generated declaration, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormArtifact {
    pub kind: FormKind,
    pub file_name: String,
    pub content: String,
}

impl FormArtifact {
    pub fn new(kind: FormKind, period: &PeriodInfo, content: String) -> Self {
        Self {
            kind,
            file_name: kind.file_name(period),
            content,
        }
    }

    /// Content as ISO-8859-1 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_latin1(&self.content)
    }
}

/// Write all artifacts into `dir`.
///
/// Each file is first written as `<name>.part`; only when every file has been
/// written are they renamed into place. On failure the partial files are
/// removed and nothing is left behind.
pub fn write_artifacts(artifacts: &[FormArtifact], dir: &Path) -> Result<Vec<PathBuf>, ModeloError> {
    fs::create_dir_all(dir)?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let target = dir.join(&artifact.file_name);
        let part = dir.join(format!("{}.part", artifact.file_name));
        if let Err(e) = fs::write(&part, artifact.to_bytes()) {
            discard(&staged);
            let _ = fs::remove_file(&part);
            return Err(e.into());
        }
        staged.push((part, target));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (part, target) in &staged {
        if let Err(e) = fs::rename(part, target) {
            discard(&staged);
            for done in &written {
                let _ = fs::remove_file(done);
            }
            return Err(e.into());
        }
        info!(path = %target.display(), "declaration written");
        written.push(target.clone());
    }
    Ok(written)
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (part, _) in staged {
        if part.exists() {
            if let Err(e) = fs::remove_file(part) {
                warn!(path = %part.display(), error = %e, "could not remove partial file");
            }
        }
    }
}
