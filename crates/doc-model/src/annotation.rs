//! Annotation records.
//!
//! An annotation is immutable once it reaches the store. Shapes are kept
//! exactly as drawn: rectangles and ellipses may carry negative width or
//! height (the drag went up or left) and are normalized only when painted.

use crate::{Color, Point, ToolStyle};
use serde::{Deserialize, Serialize};

/// Stable identifier of an annotation, generated once at creation.
pub type AnnotationId = uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeKind {
    Pen,
    Highlighter,
    Eraser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Freehand { kind: StrokeKind, points: Vec<Point> },
    Rectangle { x: f32, y: f32, w: f32, h: f32 },
    Ellipse { x: f32, y: f32, w: f32, h: f32 },
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    Arrow { x1: f32, y1: f32, x2: f32, y2: f32 },
    Text { x: f32, y: f32, text: String, font_size: f32 },
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Freehand { kind: StrokeKind::Pen, .. } => "pen",
            Shape::Freehand { kind: StrokeKind::Highlighter, .. } => "highlighter",
            Shape::Freehand { kind: StrokeKind::Eraser, .. } => "eraser",
            Shape::Rectangle { .. } => "rectangle",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Line { .. } => "line",
            Shape::Arrow { .. } => "arrow",
            Shape::Text { .. } => "text",
        }
    }
}

/// Axis-aligned rectangle with non-negative extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    /// Builds a rectangle from an origin and a possibly negative extent.
    pub fn normalized(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x: x.min(x + w), y: y.min(y + h), w: w.abs(), h: h.abs() }
    }
}

fn default_opacity() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub color: Color,
    /// Line width in document units; shapes and text reuse it as border width.
    pub stroke_width: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub shape: Shape,
}

impl Annotation {
    /// Creates an annotation with a fresh id, capturing the given style.
    pub fn new(shape: Shape, style: &ToolStyle) -> Self {
        Self::with_id(AnnotationId::new_v4(), shape, style)
    }

    pub fn with_id(id: AnnotationId, shape: Shape, style: &ToolStyle) -> Self {
        Self { id, color: style.color, stroke_width: style.stroke_width, opacity: 1.0, shape }
    }
}
