//! Pointer coordinates to document space.
//!
//! A surface may be displayed at a CSS size that differs from its backing
//! pixel buffer. Pointer samples arrive in client (CSS) coordinates, so they
//! are first scaled by `buffer / css` into buffer pixels and then divided by
//! the render scale (zoom x device pixel ratio) into document units.

use doc_model::Point;

/// Where a surface sits on screen and how big its pixel buffer is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub left: f32,
    pub top: f32,
    pub css_width: f32,
    pub css_height: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl SurfaceGeometry {
    /// A surface shown at exactly its buffer size at the origin.
    pub fn unscaled(pixel_width: u32, pixel_height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            css_width: pixel_width as f32,
            css_height: pixel_height as f32,
            pixel_width,
            pixel_height,
        }
    }

    /// Buffer pixels per CSS pixel on each axis. Degenerate CSS sizes map 1:1.
    pub fn buffer_ratio(&self) -> (f32, f32) {
        (ratio(self.pixel_width, self.css_width), ratio(self.pixel_height, self.css_height))
    }
}

fn ratio(pixels: u32, css: f32) -> f32 {
    if css.is_finite() && css > 0.0 {
        pixels as f32 / css
    } else {
        1.0
    }
}

/// Client coordinates to buffer pixel coordinates.
pub fn to_surface_pixels(client: Point, geometry: &SurfaceGeometry) -> Point {
    let (kx, ky) = geometry.buffer_ratio();
    Point::new((client.x - geometry.left) * kx, (client.y - geometry.top) * ky)
}

/// Client coordinates to document space at `render_scale`.
pub fn to_document_space(client: Point, geometry: &SurfaceGeometry, render_scale: f32) -> Point {
    let pixels = to_surface_pixels(client, geometry);
    let scale = if render_scale.is_finite() && render_scale > 0.0 { render_scale } else { 1.0 };
    Point::new(pixels.x / scale, pixels.y / scale)
}
