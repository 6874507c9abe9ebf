//! Font loading for text annotations.

use crate::SurfaceError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// A parsed-on-demand TrueType/OpenType face.
///
/// The bytes are validated once at load time and shared between clones.
/// `index` selects the face inside a font collection.
#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    index: u32,
    source: Option<PathBuf>,
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, SurfaceError> {
        Self::from_collection(data, 0)
    }

    fn from_collection(data: Vec<u8>, index: u32) -> Result<Self, SurfaceError> {
        ttf_parser::Face::parse(&data, index).map_err(|e| SurfaceError::Font(e.to_string()))?;
        Ok(Self { data: Arc::new(data), index, source: None })
    }

    pub fn load(path: &Path) -> Result<Self, SurfaceError> {
        let data = std::fs::read(path)?;
        let mut face = Self::from_bytes(data)?;
        face.source = Some(path.to_path_buf());
        Ok(face)
    }

    /// A sans-serif face from the installed system fonts, looked up once per
    /// process.
    pub fn system_default() -> Option<FontFace> {
        static SYSTEM_FONT: OnceLock<Option<FontFace>> = OnceLock::new();
        SYSTEM_FONT
            .get_or_init(|| {
                let mut db = fontdb::Database::new();
                db.load_system_fonts();
                let found = find_sans_serif(&db);
                match &found {
                    Some(face) => log::debug!("using system font {:?}", face.source),
                    None => log::warn!("no usable system font among {} faces", db.len()),
                }
                found
            })
            .clone()
    }

    /// Loads `configured` when given, falling back to the system default.
    pub fn resolve(configured: Option<&Path>) -> Option<FontFace> {
        if let Some(path) = configured {
            match FontFace::load(path) {
                Ok(face) => return Some(face),
                Err(error) => log::warn!("cannot use font {}: {error}", path.display()),
            }
        }
        FontFace::system_default()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn face(&self) -> Result<ttf_parser::Face<'_>, SurfaceError> {
        ttf_parser::Face::parse(&self.data, self.index)
            .map_err(|e| SurfaceError::Font(e.to_string()))
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("source", &self.source)
            .field("index", &self.index)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Generic sans-serif first, then common families whose generic mapping may
/// be missing, then any face the database holds.
fn find_sans_serif(db: &fontdb::Database) -> Option<FontFace> {
    let families = [
        fontdb::Family::SansSerif,
        fontdb::Family::Name("DejaVu Sans"),
        fontdb::Family::Name("Liberation Sans"),
        fontdb::Family::Name("Noto Sans"),
        fontdb::Family::Name("Helvetica"),
        fontdb::Family::Name("Segoe UI"),
    ];
    let query = fontdb::Query { families: &families, ..fontdb::Query::default() };

    db.query(&query)
        .into_iter()
        .chain(db.faces().map(|info| info.id))
        .find_map(|id| load_from_database(db, id))
}

fn load_from_database(db: &fontdb::Database, id: fontdb::ID) -> Option<FontFace> {
    let mut face = db
        .with_face_data(id, |data, index| FontFace::from_collection(data.to_vec(), index))?
        .ok()?;
    face.source = db.face(id).and_then(|info| match &info.source {
        fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => Some(path.clone()),
        fontdb::Source::Binary(_) => None,
    });
    Some(face)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bytes_that_are_not_a_font() {
        assert!(matches!(FontFace::from_bytes(b"not a font".to_vec()), Err(SurfaceError::Font(_))));
    }

    #[test]
    fn missing_font_file_is_an_io_error() {
        let err = FontFace::load(Path::new("/definitely/not/here.ttf")).expect_err("should fail");
        assert!(matches!(err, SurfaceError::Io(_)));
    }

    #[test]
    fn system_default_comes_from_the_font_database() {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let found = FontFace::system_default();
        assert_eq!(found.is_some(), find_sans_serif(&db).is_some());
        if let Some(face) = found {
            assert!(face.face().is_ok());
        }
    }

    #[test]
    fn faces_load_from_an_in_memory_database() {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let Some(path) = db.faces().find_map(|info| match &info.source {
            fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => Some(path.clone()),
            fontdb::Source::Binary(_) => None,
        }) else {
            return;
        };

        let mut memory = fontdb::Database::new();
        memory.load_font_data(std::fs::read(&path).expect("font file"));
        let face = find_sans_serif(&memory).expect("a face from the loaded file");
        assert!(face.source().is_none());
        assert!(face.face().is_ok());
    }

    #[test]
    fn unusable_configured_font_falls_back_to_system() {
        let resolved = FontFace::resolve(Some(Path::new("/definitely/not/here.ttf")));
        assert_eq!(resolved.is_some(), FontFace::system_default().is_some());
    }
}
