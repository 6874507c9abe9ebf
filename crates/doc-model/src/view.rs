use serde::{Deserialize, Serialize};

/// Current page and zoom of an open document.
///
/// `current_page` is 1-based and always within `[1, page_count]`. Setters
/// return `true` only when the value actually changed, which is the signal
/// to drop the cached raster and render again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    current_page: u32,
    zoom_scale: f32,
    page_count: u32,
}

impl ViewState {
    pub const MIN_ZOOM: f32 = 0.1;
    pub const MAX_ZOOM: f32 = 16.0;
    pub const ZOOM_STEP: f32 = 1.25;

    pub fn new(page_count: u32) -> Self {
        Self { current_page: 1, zoom_scale: 1.0, page_count: page_count.max(1) }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn zoom_scale(&self) -> f32 {
        self.zoom_scale
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn contains_page(&self, page: u32) -> bool {
        (1..=self.page_count).contains(&page)
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        let page = page.clamp(1, self.page_count);
        let changed = page != self.current_page;
        self.current_page = page;
        changed
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> bool {
        self.set_page(self.current_page.saturating_sub(1))
    }

    /// Sets the zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Non-finite or
    /// non-positive values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        if !zoom.is_finite() || zoom <= 0.0 {
            return false;
        }

        let zoom = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        let changed = (zoom - self.zoom_scale).abs() > f32::EPSILON;
        self.zoom_scale = zoom;
        changed
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom_scale * Self::ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom_scale / Self::ZOOM_STEP)
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Zoom that makes a page of `page_width` points fill `viewport_width` pixels.
pub fn fit_width_scale(viewport_width: f32, page_width: f32, dpr: f32) -> f32 {
    if viewport_width <= 0.0 || page_width <= 0.0 || dpr <= 0.0 {
        return 1.0;
    }

    (viewport_width / (page_width * dpr)).clamp(ViewState::MIN_ZOOM, ViewState::MAX_ZOOM)
}
