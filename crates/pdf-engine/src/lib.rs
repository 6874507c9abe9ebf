//! Document source adapter.
//!
//! Wraps a PDF decoding/rendering backend behind [`PdfEngine`]: open a
//! document from bytes or a path, query page geometry, and rasterize pages
//! at a scale. Page indices are 0-based here; the editor speaks 1-based
//! page numbers and converts at the boundary.

use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no readable MediaBox.
const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// Wraps a backend-assigned id. Only engines should mint handles.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Pixel dimensions of a page rendered at some scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width_px: u32,
    pub height_px: u32,
}

/// Pixel size of `size` at `scale`, rounded, never smaller than 1x1.
///
/// Deterministic for a given page and scale; non-positive or non-finite
/// scales fall back to 1.
pub fn page_viewport(size: PageSize, scale: f32) -> Viewport {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    Viewport {
        width_px: (size.width_pt * scale).round().max(1.0) as u32,
        height_px: (size.height_pt * scale).round().max(1.0) as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width_px: 256, height_px: 256 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine: Send {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    fn page_viewport(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        scale: f32,
    ) -> Result<Viewport, PdfEngineError> {
        Ok(page_viewport(self.page_size(handle, page_index)?, scale))
    }

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.render_page(handle, RenderRequest { page_index, scale: 0.25 })?;

        Ok(image::imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
    }
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

impl DocumentRecord {
    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        self.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_sizes.len() as u32,
        })
    }
}

/// Pure-Rust backend: parses structure and page geometry with `lopdf` and
/// renders each page as blank paper of the right size.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if is_encrypted(bytes) {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            sizes.push(media_box(&doc, object_id).unwrap_or(DEFAULT_PAGE_SIZE));
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = read_source(source)?;
        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("opened document {} with {} page(s)", handle.raw(), page_sizes.len());
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        self.record(handle)?.page_size(page_index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let Viewport { width_px: width, height_px: height } =
            page_viewport(page_size, request.scale);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

fn read_source(source: OpenSource) -> Result<Vec<u8>, PdfEngineError> {
    match source {
        OpenSource::Path(path) => Ok(fs::read(path)?),
        OpenSource::Bytes(bytes) => Ok(bytes),
    }
}

fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

/// Resolves a page's MediaBox, following `/Parent` for inherited boxes.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut node = page_id;

    for _ in 0..32 {
        let dict = doc.get_dictionary(node).ok()?;

        if let Ok(array) = dict.get(b"MediaBox").and_then(Object::as_array) {
            let [x0, y0, x1, y1] = array.as_slice() else {
                return None;
            };
            return Some(PageSize {
                width_pt: (number(x1)? - number(x0)?).abs(),
                height_pt: (number(y1)? - number(y0)?).abs(),
            });
        }

        node = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }

    None
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    //! Content-accurate rasterization through PDFium.

    use super::*;
    use pdfium_render::prelude::*;

    struct PdfiumRecord {
        bytes: Vec<u8>,
        page_sizes: Vec<PageSize>,
    }

    pub struct PdfiumEngine {
        pdfium: Pdfium,
        next_handle: u64,
        docs: HashMap<DocumentHandle, PdfiumRecord>,
    }

    impl PdfiumEngine {
        /// Binds PDFium from the working directory, then the system library path.
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|err| {
                        PdfEngineError::Backend(format!("failed to bind pdfium library: {err}"))
                    })?;

            Ok(Self { pdfium: Pdfium::new(bindings), next_handle: 0, docs: HashMap::new() })
        }

        fn record(&self, handle: DocumentHandle) -> Result<&PdfiumRecord, PdfEngineError> {
            self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
        }
    }

    fn backend(err: impl std::fmt::Display) -> PdfEngineError {
        PdfEngineError::Backend(err.to_string())
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            let bytes = read_source(source)?;

            let page_sizes: Vec<PageSize> = {
                let document =
                    self.pdfium.load_pdf_from_byte_slice(&bytes, None).map_err(backend)?;
                document
                    .pages()
                    .iter()
                    .map(|page| PageSize {
                        width_pt: page.width().value,
                        height_pt: page.height().value,
                    })
                    .collect()
            };

            if page_sizes.is_empty() {
                return Err(PdfEngineError::NoPages);
            }

            self.next_handle += 1;
            let handle = DocumentHandle(self.next_handle);
            self.docs.insert(handle, PdfiumRecord { bytes, page_sizes });
            Ok(handle)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            Ok(self.record(handle)?.page_sizes.len() as u32)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            let record = self.record(handle)?;
            record.page_sizes.get(page_index as usize).copied().ok_or(
                PdfEngineError::PageOutOfRange {
                    page: page_index,
                    page_count: record.page_sizes.len() as u32,
                },
            )
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let size = self.page_size(handle, request.page_index)?;
            let viewport = page_viewport(size, request.scale);
            let record = self.record(handle)?;

            let document =
                self.pdfium.load_pdf_from_byte_slice(&record.bytes, None).map_err(backend)?;
            let index = request.page_index.try_into().map_err(backend)?;
            let page = document.pages().get(index).map_err(backend)?;

            let config = PdfRenderConfig::new()
                .set_target_width(viewport.width_px as i32)
                .set_target_height(viewport.height_px as i32);
            let bitmap = page.render_with_config(&config).map_err(backend)?;

            RgbaImage::from_raw(
                viewport.width_px,
                viewport.height_px,
                bitmap.as_rgba_bytes().to_vec(),
            )
            .ok_or_else(|| PdfEngineError::Backend("pdfium returned a short bitmap".to_owned()))
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.docs
                .remove(&handle)
                .map(|_| ())
                .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
        }
    }
}

impl<E: PdfEngine + ?Sized> PdfEngine for Box<E> {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        (**self).open(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        (**self).page_count(handle)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        (**self).page_size(handle, page_index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        (**self).render_page(handle, request)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        (**self).close(handle)
    }
}

/// The best engine available in this build.
///
/// With the `pdfium` feature, PDFium is used when its library can be bound,
/// so page rasters carry the real page content. Otherwise, or when binding
/// fails, pages come from [`LopdfEngine`] as blank paper of the right size.
pub fn default_engine() -> Box<dyn PdfEngine> {
    #[cfg(feature = "pdfium")]
    match pdfium_backend::PdfiumEngine::from_system_library() {
        Ok(engine) => {
            log::info!("using pdfium backend");
            return Box::new(engine);
        }
        Err(error) => log::warn!("{error}; falling back to lopdf"),
    }

    Box::new(LopdfEngine::new())
}
