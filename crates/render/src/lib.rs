//! Annotation rendering for pagemark.
//!
//! [`Surface`] is the drawing capability; [`PixmapSurface`] implements it on
//! a `tiny_skia` pixmap. The painter functions apply the per-annotation
//! rules on top of any surface.

mod font;
mod painter;
mod surface;

pub use font::FontFace;
pub use painter::{
    arrowhead, arrowhead_length, paint_annotation, paint_annotations, paint_page, smoothed_path,
    ARROWHEAD_SPREAD, ERASER_WIDTH_FACTOR, HIGHLIGHTER_OPACITY, HIGHLIGHTER_WIDTH_FACTOR,
    MIN_ARROWHEAD_LENGTH, SHAPE_FILL_OPACITY,
};
pub use surface::{Blend, Ink, PathOp, PixmapSurface, Primitive, ShapeStyle, Surface, VectorPath};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("surface is {expected:?} pixels but target is {actual:?}")]
    SizeMismatch { expected: (u32, u32), actual: (u32, u32) },
    #[error("unusable font: {0}")]
    Font(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
