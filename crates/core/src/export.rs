//! Flattening the page raster and the annotation layer into one image.

use crate::error::{ExportError, RenderError};
use doc_model::Annotation;
use image::{ImageFormat, RgbaImage};
use pagemark_render::{paint_annotations, FontFace, PixmapSurface, Surface};
use pagemark_scheduler::CancellationToken;
use pdf_engine::{DocumentHandle, PdfEngine, RenderRequest};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// One flattened page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedPage {
    /// 1-based page number.
    pub page: u32,
    pub file_name: String,
    pub image: RgbaImage,
}

impl ExportedPage {
    pub fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = Cursor::new(Vec::new());
        self.image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }

    /// Writes the PNG into `dir` under [`ExportedPage::file_name`].
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, self.encode_png()?)?;
        Ok(path)
    }
}

/// Deterministic file name for `page` of the document named `stem`.
pub fn export_file_name(stem: &str, page: u32) -> String {
    format!("{stem}-page-{page}.png")
}

/// Paints `annotations` on their own transparent layer at `scale`. The
/// layer is what erasers act on, so they never reach the page raster.
pub fn annotation_layer(
    width: u32,
    height: u32,
    scale: f32,
    annotations: &[Annotation],
    font: Option<&FontFace>,
) -> Result<PixmapSurface, RenderError> {
    let mut layer = PixmapSurface::new(width, height, scale)?.with_font(font.cloned());
    paint_annotations(&mut layer, annotations);
    Ok(layer)
}

/// Renders page `page` (1-based) and composites its annotations on top.
pub fn compose_page(
    engine: &dyn PdfEngine,
    handle: DocumentHandle,
    page: u32,
    scale: f32,
    annotations: &[Annotation],
    font: Option<&FontFace>,
) -> Result<RgbaImage, RenderError> {
    let mut raster =
        engine.render_page(handle, RenderRequest { page_index: page.saturating_sub(1), scale })?;
    if annotations.is_empty() {
        return Ok(raster);
    }

    let (width, height) = raster.dimensions();
    let layer = annotation_layer(width, height, scale, annotations, font)?;
    layer.composite_onto(&mut raster)?;
    Ok(raster)
}

/// Everything needed to flatten a whole document.
pub struct DocumentExport<'a> {
    pub engine: &'a dyn PdfEngine,
    pub handle: DocumentHandle,
    pub page_count: u32,
    pub stem: &'a str,
    pub scale: f32,
    pub font: Option<&'a FontFace>,
}

impl DocumentExport<'_> {
    /// Flattens every page in order. Any page failure or cancellation
    /// aborts the whole export; no partial set is returned.
    pub fn run<'s, F>(
        &self,
        annotations_for: F,
        token: &CancellationToken,
    ) -> Result<Vec<ExportedPage>, ExportError>
    where
        F: Fn(u32) -> &'s [Annotation],
    {
        let mut pages = Vec::with_capacity(self.page_count as usize);
        for page in 1..=self.page_count {
            if token.is_cancelled() {
                log::info!("export of {} cancelled before page {page}", self.stem);
                return Err(ExportError::Cancelled);
            }

            let image = compose_page(
                self.engine,
                self.handle,
                page,
                self.scale,
                annotations_for(page),
                self.font,
            )
            .map_err(|source| ExportError::Page { page, source })?;

            log::debug!("exported page {page}/{}", self.page_count);
            pages.push(ExportedPage { page, file_name: export_file_name(self.stem, page), image });
        }

        if token.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(pages)
    }
}
