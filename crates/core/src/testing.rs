//! Scriptable engine for tests.

use image::{Rgba, RgbaImage};
use pdf_engine::{
    page_viewport, DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError, RenderRequest,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Opens anything as a document with fixed page sizes and renders white
/// pages. Individual pages can be made to fail or to render slowly.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pages: Vec<PageSize>,
    failing: HashSet<u32>,
    delays: HashMap<u32, Duration>,
    open: HashSet<u64>,
    next_handle: u64,
}

impl FakeEngine {
    pub fn with_pages(sizes: &[(f32, f32)]) -> Self {
        Self {
            pages: sizes
                .iter()
                .map(|&(width_pt, height_pt)| PageSize { width_pt, height_pt })
                .collect(),
            ..Self::default()
        }
    }

    /// Makes rendering of 1-based `page` fail.
    pub fn fail_page(&mut self, page: u32) {
        self.failing.insert(page - 1);
    }

    pub fn delay_page(&mut self, page: u32, delay: Duration) {
        self.delays.insert(page - 1, delay);
    }

    fn check(&self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        if self.open.contains(&handle.raw()) {
            Ok(())
        } else {
            Err(PdfEngineError::InvalidHandle(handle.raw()))
        }
    }
}

impl PdfEngine for FakeEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        if let OpenSource::Bytes(bytes) = &source {
            if bytes.starts_with(b"broken") {
                return Err(PdfEngineError::Backend("unreadable document".to_owned()));
            }
        }
        if self.pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }
        self.next_handle += 1;
        self.open.insert(self.next_handle);
        Ok(DocumentHandle::from_raw(self.next_handle))
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        self.check(handle)?;
        Ok(self.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        self.check(handle)?;
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let size = self.page_size(handle, request.page_index)?;
        if let Some(delay) = self.delays.get(&request.page_index) {
            std::thread::sleep(*delay);
        }
        if self.failing.contains(&request.page_index) {
            let page = request.page_index + 1;
            return Err(PdfEngineError::Backend(format!("page {page} is corrupt")));
        }
        let viewport = page_viewport(size, request.scale);
        Ok(RgbaImage::from_pixel(viewport.width_px, viewport.height_px, Rgba([255, 255, 255, 255])))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        if self.open.remove(&handle.raw()) {
            Ok(())
        } else {
            Err(PdfEngineError::InvalidHandle(handle.raw()))
        }
    }
}
