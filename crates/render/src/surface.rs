//! Drawing surfaces.
//!
//! Painters speak in document space. A surface owns the mapping from
//! document units to its own pixels, so the same annotation list paints
//! correctly at any zoom or device pixel ratio.

use crate::font::FontFace;
use crate::SurfaceError;
use doc_model::{Color, Point, Rect};
use image::{Rgba, RgbaImage};
use tiny_skia::{
    BlendMode, FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

/// How a draw call combines with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    #[default]
    Normal,
    /// Removes previously painted pixels instead of coloring them.
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ink {
    pub color: Color,
    pub opacity: f32,
    pub blend: Blend,
}

impl Ink {
    pub fn new(color: Color, opacity: f32) -> Self {
        Self { color, opacity, blend: Blend::Normal }
    }

    pub fn eraser() -> Self {
        Self { color: Color::BLACK, opacity: 1.0, blend: Blend::Erase }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    Close,
}

/// Resolution-independent path in document space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorPath {
    ops: Vec<PathOp>,
}

impl VectorPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, point: Point) {
        self.ops.push(PathOp::MoveTo(point));
    }

    pub fn line_to(&mut self, point: Point) {
        self.ops.push(PathOp::LineTo(point));
    }

    pub fn quad_to(&mut self, control: Point, end: Point) {
        self.ops.push(PathOp::QuadTo(control, end));
    }

    pub fn close(&mut self) {
        self.ops.push(PathOp::Close);
    }

    pub fn ops(&self) -> &[PathOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn to_skia(&self) -> Option<Path> {
        let mut builder = PathBuilder::new();
        for op in &self.ops {
            match *op {
                PathOp::MoveTo(p) => builder.move_to(p.x, p.y),
                PathOp::LineTo(p) => builder.line_to(p.x, p.y),
                PathOp::QuadTo(c, p) => builder.quad_to(c.x, c.y, p.x, p.y),
                PathOp::Close => builder.close(),
            }
        }
        builder.finish()
    }
}

/// Closed primitives a surface can fill or outline.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Must already be normalized (non-negative extent).
    Rect(Rect),
    Ellipse(Rect),
    Dot { center: Point, radius: f32 },
    Polygon(Vec<Point>),
}

impl Primitive {
    fn to_skia(&self) -> Option<Path> {
        match self {
            Primitive::Rect(rect) => {
                tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.w, rect.h)
                    .map(PathBuilder::from_rect)
            }
            Primitive::Ellipse(rect) => {
                tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.w, rect.h)
                    .and_then(PathBuilder::from_oval)
            }
            Primitive::Dot { center, radius } => {
                PathBuilder::from_circle(center.x, center.y, radius.max(f32::EPSILON))
            }
            Primitive::Polygon(points) => {
                let (first, rest) = points.split_first()?;
                let mut builder = PathBuilder::new();
                builder.move_to(first.x, first.y);
                for point in rest {
                    builder.line_to(point.x, point.y);
                }
                builder.close();
                builder.finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeStyle {
    Fill,
    Outline { width: f32 },
}

/// Minimal 2D drawing capability the annotation painter needs.
///
/// Geometry arguments are in document space; implementations scale them to
/// their own pixel grid.
pub trait Surface {
    /// Pixel dimensions of the backing buffer.
    fn size(&self) -> (u32, u32);

    /// Document units to pixels.
    fn scale(&self) -> f32;

    /// Resets every pixel to fully transparent.
    fn clear(&mut self);

    /// Strokes an open path with round caps and joins.
    fn draw_path(&mut self, path: &VectorPath, width: f32, ink: Ink);

    fn draw_shape(&mut self, shape: &Primitive, style: ShapeStyle, ink: Ink);

    /// Fills `text` with its top-left corner at `origin`. No wrapping and no
    /// background.
    fn draw_text(&mut self, text: &str, origin: Point, font_size: f32, ink: Ink);

    /// Source-over composites this surface onto `target`, which must have
    /// the same pixel size.
    fn composite_onto(&self, target: &mut RgbaImage) -> Result<(), SurfaceError>;
}

/// Raster surface backed by a `tiny_skia::Pixmap`.
pub struct PixmapSurface {
    pixmap: Pixmap,
    scale: f32,
    font: Option<FontFace>,
    warned_missing_font: bool,
}

impl PixmapSurface {
    /// Creates a transparent surface. `scale` maps document units to pixels.
    pub fn new(width: u32, height: u32, scale: f32) -> Result<Self, SurfaceError> {
        let pixmap = Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(Self { pixmap, scale: sanitize_scale(scale), font: None, warned_missing_font: false })
    }

    /// Wraps an existing straight-alpha image.
    pub fn from_image(image: &RgbaImage, scale: f32) -> Result<Self, SurfaceError> {
        Ok(Self {
            pixmap: pixmap_from_image(image)?,
            scale: sanitize_scale(scale),
            font: None,
            warned_missing_font: false,
        })
    }

    pub fn with_font(mut self, font: Option<FontFace>) -> Self {
        self.set_font(font);
        self
    }

    pub fn set_font(&mut self, font: Option<FontFace>) {
        self.font = font;
        self.warned_missing_font = false;
    }

    pub fn font(&self) -> Option<&FontFace> {
        self.font.as_ref()
    }

    /// Straight-alpha copy of the pixels.
    pub fn to_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (dst, src) in image.pixels_mut().zip(self.pixmap.pixels()) {
            let color = src.demultiply();
            *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
        }
        image
    }

    /// Straight-alpha RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    fn transform(&self) -> Transform {
        Transform::from_scale(self.scale, self.scale)
    }

    fn glyph_paths(&self, font: &FontFace, text: &str, origin: Point, font_size: f32) -> Vec<Path> {
        let Ok(face) = font.face() else {
            return Vec::new();
        };

        let units_per_em = f32::from(face.units_per_em().max(1));
        let scale = font_size / units_per_em;
        let baseline = origin.y + f32::from(face.ascender()) * scale;
        let mut pen_x = origin.x;
        let mut paths = Vec::new();

        for ch in text.chars() {
            let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
            let mut builder = GlyphPathBuilder::new(pen_x, baseline, scale);
            if face.outline_glyph(glyph, &mut builder).is_some() {
                if let Some(path) = builder.finish() {
                    paths.push(path);
                }
            }
            let advance = face.glyph_hor_advance(glyph).unwrap_or(0);
            pen_x += f32::from(advance) * scale;
        }

        paths
    }
}

impl Surface for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    fn draw_path(&mut self, path: &VectorPath, width: f32, ink: Ink) {
        let Some(path) = path.to_skia() else {
            return;
        };
        let stroke = Stroke {
            width: width.max(0.0),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let transform = self.transform();
        self.pixmap.stroke_path(&path, &paint_for(ink), &stroke, transform, None);
    }

    fn draw_shape(&mut self, shape: &Primitive, style: ShapeStyle, ink: Ink) {
        let Some(path) = shape.to_skia() else {
            return;
        };
        let paint = paint_for(ink);
        let transform = self.transform();
        match style {
            ShapeStyle::Fill => {
                self.pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
            }
            ShapeStyle::Outline { width } => {
                let stroke = Stroke {
                    width: width.max(0.0),
                    line_join: LineJoin::Miter,
                    ..Stroke::default()
                };
                self.pixmap.stroke_path(&path, &paint, &stroke, transform, None);
            }
        }
    }

    fn draw_text(&mut self, text: &str, origin: Point, font_size: f32, ink: Ink) {
        let Some(font) = self.font.clone() else {
            if !self.warned_missing_font {
                log::warn!("no font available; skipping text annotations");
                self.warned_missing_font = true;
            }
            return;
        };

        let paint = paint_for(ink);
        let transform = self.transform();
        for path in self.glyph_paths(&font, text, origin, font_size) {
            self.pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
    }

    fn composite_onto(&self, target: &mut RgbaImage) -> Result<(), SurfaceError> {
        let (width, height) = self.size();
        if target.dimensions() != (width, height) {
            return Err(SurfaceError::SizeMismatch {
                expected: (width, height),
                actual: target.dimensions(),
            });
        }

        let mut base = pixmap_from_image(target)?;
        base.draw_pixmap(
            0,
            0,
            self.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );

        for (dst, src) in target.pixels_mut().zip(base.pixels()) {
            let color = src.demultiply();
            *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
        }
        Ok(())
    }
}

impl std::fmt::Debug for PixmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixmapSurface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .field("scale", &self.scale)
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn paint_for(ink: Ink) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.anti_alias = true;
    match ink.blend {
        Blend::Normal => {
            paint.set_color(skia_color(ink.color, ink.opacity));
        }
        Blend::Erase => {
            paint.set_color(tiny_skia::Color::BLACK);
            paint.blend_mode = BlendMode::DestinationOut;
        }
    }
    paint
}

fn skia_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let alpha = f32::from(color.a) / 255.0 * opacity.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(
        f32::from(color.r) / 255.0,
        f32::from(color.g) / 255.0,
        f32::from(color.b) / 255.0,
        alpha,
    )
    .unwrap_or(tiny_skia::Color::BLACK)
}

fn pixmap_from_image(image: &RgbaImage) -> Result<Pixmap, SurfaceError> {
    let (width, height) = image.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
    for (src, dst) in image.as_raw().chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let alpha = src[3];
        dst[0] = premultiply(src[0], alpha);
        dst[1] = premultiply(src[1], alpha);
        dst[2] = premultiply(src[2], alpha);
        dst[3] = alpha;
    }
    Ok(pixmap)
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    let product = u16::from(channel) * u16::from(alpha) + 127;
    ((product + (product >> 8)) >> 8) as u8
}

/// Collects glyph outlines (font units, y up) into a document-space path
/// anchored at a baseline point (y down).
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, baseline: f32, scale: f32) -> Self {
        Self { builder: PathBuilder::new(), origin_x, baseline, scale }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, size: f32) -> Primitive {
        Primitive::Rect(Rect { x, y, w: size, h: size })
    }

    #[test]
    fn rejects_zero_sized_surfaces() {
        assert!(matches!(
            PixmapSurface::new(0, 10, 1.0),
            Err(SurfaceError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn geometry_is_scaled_to_pixels() {
        let mut surface = PixmapSurface::new(40, 40, 2.0).expect("surface");
        surface.draw_shape(&square(5.0, 5.0, 5.0), ShapeStyle::Fill, Ink::new(Color::BLUE, 1.0));

        assert_eq!(surface.pixel(15, 15).map(|p| p[3]), Some(255));
        assert_eq!(surface.pixel(8, 8).map(|p| p[3]), Some(0));
        assert_eq!(surface.pixel(21, 21).map(|p| p[3]), Some(0));
    }

    #[test]
    fn erase_removes_earlier_pixels() {
        let mut surface = PixmapSurface::new(20, 20, 1.0).expect("surface");
        surface.draw_shape(&square(0.0, 0.0, 20.0), ShapeStyle::Fill, Ink::new(Color::RED, 1.0));
        surface.draw_shape(&square(0.0, 0.0, 10.0), ShapeStyle::Fill, Ink::eraser());

        assert_eq!(surface.pixel(5, 5).map(|p| p[3]), Some(0));
        assert_eq!(surface.pixel(15, 15), Some([255, 0, 0, 255]));
    }

    #[test]
    fn clear_makes_surface_transparent() {
        let mut surface = PixmapSurface::new(10, 10, 1.0).expect("surface");
        surface.draw_shape(&square(0.0, 0.0, 10.0), ShapeStyle::Fill, Ink::new(Color::RED, 1.0));
        surface.clear();
        assert!(surface.to_image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn composite_keeps_base_where_layer_is_transparent() {
        let mut layer = PixmapSurface::new(10, 10, 1.0).expect("surface");
        layer.draw_shape(&square(0.0, 0.0, 5.0), ShapeStyle::Fill, Ink::new(Color::RED, 1.0));

        let mut page = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        layer.composite_onto(&mut page).expect("composite");

        assert_eq!(page.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(page.get_pixel(8, 8).0, [255, 255, 255, 255]);
    }

    #[test]
    fn composite_rejects_mismatched_sizes() {
        let layer = PixmapSurface::new(10, 10, 1.0).expect("surface");
        let mut page = RgbaImage::new(12, 10);
        assert!(matches!(
            layer.composite_onto(&mut page),
            Err(SurfaceError::SizeMismatch { expected: (10, 10), actual: (12, 10) })
        ));
    }

    #[test]
    fn image_round_trip_preserves_straight_alpha() {
        let image = RgbaImage::from_pixel(3, 3, Rgba([200, 100, 50, 255]));
        let surface = PixmapSurface::from_image(&image, 1.0).expect("surface");
        assert_eq!(surface.to_image(), image);
    }

    #[test]
    fn text_without_font_is_skipped() {
        let mut surface = PixmapSurface::new(50, 20, 1.0).expect("surface");
        surface.draw_text("hello", Point::new(2.0, 2.0), 12.0, Ink::new(Color::BLACK, 1.0));
        surface.draw_text("again", Point::new(2.0, 2.0), 12.0, Ink::new(Color::BLACK, 1.0));

        assert!(surface.warned_missing_font);
        assert!(surface.to_image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn text_with_a_font_fills_glyph_outlines() {
        let Some(font) = FontFace::system_default() else {
            eprintln!("skipping: no system font installed");
            return;
        };
        let mut surface = PixmapSurface::new(120, 40, 1.0).expect("surface").with_font(Some(font));
        surface.draw_text("HHHH", Point::new(4.0, 4.0), 24.0, Ink::new(Color::BLACK, 1.0));

        assert!(!surface.warned_missing_font);
        let inked = surface.to_image().pixels().filter(|p| p.0[3] > 0).count();
        assert!(inked > 50, "glyphs should be filled, got {inked} inked pixels");
    }
}
