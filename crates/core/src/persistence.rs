//! Annotation sidecars.
//!
//! A document's committed annotations are saved as a versioned JSON file
//! next to the PDF, so the source document itself is never modified.

use crate::error::PersistenceError;
use crate::store::AnnotationStore;
use doc_model::Annotation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SIDECAR_VERSION: u32 = 1;
const SIDECAR_SUFFIX: &str = ".pagemark.json";

/// Annotations per 1-based page, as stored on disk.
pub type PageAnnotations = BTreeMap<u32, Vec<Annotation>>;

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    version: u32,
    pages: PageAnnotations,
}

/// Sidecar location for a PDF.
///
/// # Example
/// ```
/// use std::path::Path;
/// use pagemark_core::persistence::sidecar_path;
///
/// let path = sidecar_path(Path::new("/docs/report.pdf"));
/// assert_eq!(path, Path::new("/docs/report.pdf.pagemark.json"));
/// ```
pub fn sidecar_path(pdf_path: &Path) -> PathBuf {
    let mut path = pdf_path.as_os_str().to_owned();
    path.push(SIDECAR_SUFFIX);
    PathBuf::from(path)
}

/// Writes every non-empty page of `store` next to `pdf_path`.
pub fn save_annotations(
    pdf_path: &Path,
    store: &AnnotationStore,
) -> Result<PathBuf, PersistenceError> {
    let path = sidecar_path(pdf_path);
    let sidecar = Sidecar {
        version: SIDECAR_VERSION,
        pages: store.pages().map(|(page, list)| (page, list.to_vec())).collect(),
    };
    let json = serde_json::to_string_pretty(&sidecar)?;

    // Write through a temporary file so a crash never leaves half a sidecar.
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, &path)?;

    log::info!("saved {} annotations to {}", store.len(), path.display());
    Ok(path)
}

/// Reads the sidecar for `pdf_path`, or `None` when there is none.
pub fn load_annotations(pdf_path: &Path) -> Result<Option<PageAnnotations>, PersistenceError> {
    let path = sidecar_path(pdf_path);
    if !path.exists() {
        return Ok(None);
    }
    read_sidecar(&path).map(Some)
}

/// Reads a sidecar file directly, wherever it lives.
pub fn read_sidecar(path: &Path) -> Result<PageAnnotations, PersistenceError> {
    let json = fs::read_to_string(path)?;
    let sidecar: Sidecar = serde_json::from_str(&json)?;
    if sidecar.version > SIDECAR_VERSION {
        return Err(PersistenceError::UnsupportedVersion(sidecar.version));
    }
    Ok(sidecar.pages)
}

pub fn delete_annotations(pdf_path: &Path) -> Result<(), PersistenceError> {
    let path = sidecar_path(pdf_path);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Color, Point, Shape, StrokeKind, ToolStyle};

    #[test]
    fn saves_and_loads_pages() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pdf = dir.path().join("notes.pdf");

        let mut store = AnnotationStore::new();
        let style = ToolStyle { color: Color::BLUE, ..ToolStyle::default() };
        let highlight =
            Shape::Freehand { kind: StrokeKind::Highlighter, points: vec![Point::new(1.0, 2.0)] };
        store.append(1, Annotation::new(highlight, &style));
        let arrow = Shape::Arrow { x1: 0.0, y1: 0.0, x2: 5.0, y2: 5.0 };
        store.append(3, Annotation::new(arrow, &style));

        let written = save_annotations(&pdf, &store).expect("save");
        assert_eq!(written, dir.path().join("notes.pdf.pagemark.json"));
        assert!(!dir.path().join("notes.pdf.pagemark.tmp").exists());

        let pages = load_annotations(&pdf).expect("load").expect("sidecar present");
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(pages[&1], store.get(1));
        assert_eq!(pages[&3], store.get(3));
    }

    #[test]
    fn missing_sidecar_is_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(load_annotations(&dir.path().join("absent.pdf")).expect("load").is_none());
        delete_annotations(&dir.path().join("absent.pdf")).expect("delete is idempotent");
    }

    #[test]
    fn newer_versions_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pdf = dir.path().join("doc.pdf");
        fs::write(sidecar_path(&pdf), r#"{"version":7,"pages":{}}"#).expect("write");

        assert!(matches!(load_annotations(&pdf), Err(PersistenceError::UnsupportedVersion(7))));
    }

    #[test]
    fn malformed_sidecar_is_a_serde_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pdf = dir.path().join("doc.pdf");
        fs::write(sidecar_path(&pdf), "{ not json").expect("write");

        assert!(matches!(load_annotations(&pdf), Err(PersistenceError::Serde(_))));
    }
}
