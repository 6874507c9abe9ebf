//! Annotation painting rules.
//!
//! Every annotation is painted with an explicit ink, so nothing one
//! annotation sets (highlighter opacity, eraser blending) can leak into the
//! next. Painting order is list order: an eraser only removes what was
//! painted before it.

use crate::surface::{Ink, Primitive, ShapeStyle, Surface, VectorPath};
use doc_model::{Annotation, Point, Rect, Shape, StrokeKind};
use std::f32::consts::PI;

pub const HIGHLIGHTER_OPACITY: f32 = 0.35;
pub const HIGHLIGHTER_WIDTH_FACTOR: f32 = 6.0;
pub const ERASER_WIDTH_FACTOR: f32 = 4.0;
pub const SHAPE_FILL_OPACITY: f32 = 0.12;
/// Angle between the shaft and each side of the arrowhead.
pub const ARROWHEAD_SPREAD: f32 = PI / 6.0;
pub const MIN_ARROWHEAD_LENGTH: f32 = 10.0;

pub fn arrowhead_length(stroke_width: f32) -> f32 {
    (stroke_width * 3.0).max(MIN_ARROWHEAD_LENGTH)
}

/// Clears the surface, paints the committed list in order, then the
/// in-progress annotation on top.
pub fn paint_page<S>(surface: &mut S, committed: &[Annotation], in_progress: Option<&Annotation>)
where
    S: Surface + ?Sized,
{
    surface.clear();
    paint_annotations(surface, committed);
    if let Some(annotation) = in_progress {
        paint_annotation(surface, annotation);
    }
}

pub fn paint_annotations<S>(surface: &mut S, annotations: &[Annotation])
where
    S: Surface + ?Sized,
{
    for annotation in annotations {
        paint_annotation(surface, annotation);
    }
}

pub fn paint_annotation<S>(surface: &mut S, annotation: &Annotation)
where
    S: Surface + ?Sized,
{
    let ink = Ink::new(annotation.color, annotation.opacity);
    let width = annotation.stroke_width;

    match &annotation.shape {
        Shape::Freehand { kind, points } => {
            let (ink, width) = match kind {
                StrokeKind::Pen => (ink, width),
                StrokeKind::Highlighter => (
                    Ink::new(annotation.color, annotation.opacity * HIGHLIGHTER_OPACITY),
                    width * HIGHLIGHTER_WIDTH_FACTOR,
                ),
                StrokeKind::Eraser => (Ink::eraser(), width * ERASER_WIDTH_FACTOR),
            };
            paint_freehand(surface, points, width, ink);
        }
        Shape::Rectangle { x, y, w, h } => {
            let rect = Rect::normalized(*x, *y, *w, *h);
            paint_box(surface, Primitive::Rect(rect), width, ink);
        }
        Shape::Ellipse { x, y, w, h } => {
            let rect = Rect::normalized(*x, *y, *w, *h);
            paint_box(surface, Primitive::Ellipse(rect), width, ink);
        }
        Shape::Line { x1, y1, x2, y2 } => {
            paint_segment(surface, Point::new(*x1, *y1), Point::new(*x2, *y2), width, ink);
        }
        Shape::Arrow { x1, y1, x2, y2 } => {
            let start = Point::new(*x1, *y1);
            let end = Point::new(*x2, *y2);
            paint_segment(surface, start, end, width, ink);
            if start != end {
                let head = arrowhead(start, end, width);
                surface.draw_shape(&Primitive::Polygon(head.to_vec()), ShapeStyle::Fill, ink);
            }
        }
        Shape::Text { x, y, text, font_size } => {
            if !text.trim().is_empty() {
                surface.draw_text(text, Point::new(*x, *y), *font_size, ink);
            }
        }
    }
}

/// Path through the samples, smoothed with quadratic curves whose control
/// points are the samples and whose end points are the midpoints between
/// consecutive samples.
pub fn smoothed_path(points: &[Point]) -> VectorPath {
    let mut path = VectorPath::new();
    let Some((first, rest)) = points.split_first() else {
        return path;
    };

    path.move_to(*first);
    if rest.len() == 1 {
        path.line_to(rest[0]);
        return path;
    }

    for pair in rest.windows(2) {
        path.quad_to(pair[0], pair[0].midpoint(pair[1]));
    }
    if let Some(last) = rest.last() {
        path.line_to(*last);
    }
    path
}

/// Apex and the two back vertices of an arrowhead ending at `end`.
pub fn arrowhead(start: Point, end: Point, stroke_width: f32) -> [Point; 3] {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let length = arrowhead_length(stroke_width);
    let back = |offset: f32| {
        Point::new(
            end.x - length * (angle - offset).cos(),
            end.y - length * (angle - offset).sin(),
        )
    };
    [end, back(ARROWHEAD_SPREAD), back(-ARROWHEAD_SPREAD)]
}

fn paint_freehand<S>(surface: &mut S, points: &[Point], width: f32, ink: Ink)
where
    S: Surface + ?Sized,
{
    match points {
        [] => {}
        [point] => dot(surface, *point, width, ink),
        _ => surface.draw_path(&smoothed_path(points), width, ink),
    }
}

fn paint_segment<S>(surface: &mut S, start: Point, end: Point, width: f32, ink: Ink)
where
    S: Surface + ?Sized,
{
    if start == end {
        dot(surface, start, width, ink);
        return;
    }
    let mut path = VectorPath::new();
    path.move_to(start);
    path.line_to(end);
    surface.draw_path(&path, width, ink);
}

fn paint_box<S>(surface: &mut S, primitive: Primitive, width: f32, ink: Ink)
where
    S: Surface + ?Sized,
{
    let fill = Ink::new(ink.color, ink.opacity * SHAPE_FILL_OPACITY);
    surface.draw_shape(&primitive, ShapeStyle::Fill, fill);
    surface.draw_shape(&primitive, ShapeStyle::Outline { width }, ink);
}

fn dot<S>(surface: &mut S, center: Point, width: f32, ink: Ink)
where
    S: Surface + ?Sized,
{
    surface.draw_shape(&Primitive::Dot { center, radius: width / 2.0 }, ShapeStyle::Fill, ink);
}
