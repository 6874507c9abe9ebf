//! Pointer and text input to annotations.
//!
//! ```text
//! Idle --down (drawing tool)--> Drawing --up / leave--> Idle (commit)
//! Idle --down (text tool)-----> PlacingText --confirm--> Idle (commit if not blank)
//!                                           --cancel---> Idle
//! ```
//!
//! Drawing snapshots the page into history at pointer-down, so the stroke
//! is undoable as one step. Text snapshots only when non-blank content is
//! confirmed.

use crate::history::History;
use crate::store::AnnotationStore;
use doc_model::{Annotation, Color, Point, Shape, StrokeKind, Tool, ToolStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum ToolState {
    Idle,
    Drawing { page: u32, draft: Annotation },
    PlacingText { page: u32, at: Point, buffer: String, style: ToolStyle },
}

/// What an input did, so the caller knows what to repaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolEvent {
    /// Nothing changed.
    Ignored,
    /// The in-progress annotation on `page` changed.
    Preview { page: u32 },
    /// An annotation was appended to `page`.
    Committed { page: u32 },
    TextStarted { page: u32 },
    TextChanged { page: u32 },
    /// Pending input was dropped without touching the store or history.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct ToolEngine {
    tool: Tool,
    style: ToolStyle,
    state: ToolState,
}

impl Default for ToolEngine {
    fn default() -> Self {
        Self::new(Tool::Pen, ToolStyle::default())
    }
}

impl ToolEngine {
    pub fn new(tool: Tool, style: ToolStyle) -> Self {
        Self { tool, style, state: ToolState::Idle }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn style(&self) -> ToolStyle {
        self.style
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ToolState::Idle)
    }

    pub fn is_placing_text(&self) -> bool {
        matches!(self.state, ToolState::PlacingText { .. })
    }

    /// The in-progress annotation and its page, while drawing.
    pub fn draft(&self) -> Option<(u32, &Annotation)> {
        match &self.state {
            ToolState::Drawing { page, draft } => Some((*page, draft)),
            _ => None,
        }
    }

    pub fn pending_text(&self) -> Option<(u32, Point, &str)> {
        match &self.state {
            ToolState::PlacingText { page, at, buffer, .. } => Some((*page, *at, buffer.as_str())),
            _ => None,
        }
    }

    /// Switches tools, finishing whatever was in progress first.
    pub fn set_tool(
        &mut self,
        tool: Tool,
        store: &mut AnnotationStore,
        history: &mut History,
    ) -> ToolEvent {
        let event = self.settle(store, history);
        self.tool = tool;
        event
    }

    /// Style changes apply to annotations started afterwards.
    pub fn set_color(&mut self, color: Color) {
        self.style.color = color;
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.style.stroke_width = width;
        }
    }

    pub fn set_font_size(&mut self, size: f32) {
        if size.is_finite() && size > 0.0 {
            self.style.font_size = size;
        }
    }

    pub fn pointer_down(
        &mut self,
        page: u32,
        at: Point,
        store: &mut AnnotationStore,
        history: &mut History,
    ) -> ToolEvent {
        // A press elsewhere takes focus away from a pending text input.
        self.settle(store, history);

        if self.tool == Tool::Text {
            self.state =
                ToolState::PlacingText { page, at, buffer: String::new(), style: self.style };
            return ToolEvent::TextStarted { page };
        }

        history.push_undo(page, store);
        let draft = Annotation::new(seed_shape(self.tool, at), &self.style);
        self.state = ToolState::Drawing { page, draft };
        ToolEvent::Preview { page }
    }

    pub fn pointer_move(&mut self, at: Point) -> ToolEvent {
        let ToolState::Drawing { page, draft } = &mut self.state else {
            return ToolEvent::Ignored;
        };
        extend_shape(&mut draft.shape, at);
        ToolEvent::Preview { page: *page }
    }

    pub fn pointer_up(&mut self, store: &mut AnnotationStore) -> ToolEvent {
        self.finish_drawing(store)
    }

    /// Leaving the surface mid-stroke commits what exists.
    pub fn pointer_leave(&mut self, store: &mut AnnotationStore) -> ToolEvent {
        self.finish_drawing(store)
    }

    pub fn text_input(&mut self, text: &str) -> ToolEvent {
        let ToolState::PlacingText { page, buffer, .. } = &mut self.state else {
            return ToolEvent::Ignored;
        };
        buffer.push_str(text);
        ToolEvent::TextChanged { page: *page }
    }

    pub fn backspace(&mut self) -> ToolEvent {
        let ToolState::PlacingText { page, buffer, .. } = &mut self.state else {
            return ToolEvent::Ignored;
        };
        buffer.pop();
        ToolEvent::TextChanged { page: *page }
    }

    /// Commits non-blank pending text; blank text is dropped silently.
    pub fn confirm_text(
        &mut self,
        store: &mut AnnotationStore,
        history: &mut History,
    ) -> ToolEvent {
        if !self.is_placing_text() {
            return ToolEvent::Ignored;
        }
        let ToolState::PlacingText { page, at, buffer, style } =
            std::mem::replace(&mut self.state, ToolState::Idle)
        else {
            return ToolEvent::Ignored;
        };

        if buffer.trim().is_empty() {
            return ToolEvent::Discarded;
        }

        history.push_undo(page, store);
        let shape = Shape::Text { x: at.x, y: at.y, text: buffer, font_size: style.font_size };
        store.append(page, Annotation::new(shape, &style));
        ToolEvent::Committed { page }
    }

    pub fn cancel_text(&mut self) -> ToolEvent {
        if !self.is_placing_text() {
            return ToolEvent::Ignored;
        }
        self.state = ToolState::Idle;
        ToolEvent::Discarded
    }

    /// Brings the engine back to idle: strokes are committed as on
    /// pointer-up and pending text is confirmed as on focus loss.
    pub fn settle(&mut self, store: &mut AnnotationStore, history: &mut History) -> ToolEvent {
        match self.state {
            ToolState::Idle => ToolEvent::Ignored,
            ToolState::Drawing { .. } => self.finish_drawing(store),
            ToolState::PlacingText { .. } => self.confirm_text(store, history),
        }
    }

    /// Drops any in-progress input without committing it.
    pub fn reset(&mut self) {
        self.state = ToolState::Idle;
    }

    fn finish_drawing(&mut self, store: &mut AnnotationStore) -> ToolEvent {
        if !matches!(self.state, ToolState::Drawing { .. }) {
            return ToolEvent::Ignored;
        }
        let ToolState::Drawing { page, draft } = std::mem::replace(&mut self.state, ToolState::Idle)
        else {
            return ToolEvent::Ignored;
        };

        log::debug!("commit {} on page {page}", draft.shape.name());
        store.append(page, draft);
        ToolEvent::Committed { page }
    }
}

fn seed_shape(tool: Tool, at: Point) -> Shape {
    match tool {
        Tool::Pen => Shape::Freehand { kind: StrokeKind::Pen, points: vec![at] },
        Tool::Highlighter => Shape::Freehand { kind: StrokeKind::Highlighter, points: vec![at] },
        Tool::Eraser => Shape::Freehand { kind: StrokeKind::Eraser, points: vec![at] },
        Tool::Rectangle => Shape::Rectangle { x: at.x, y: at.y, w: 0.0, h: 0.0 },
        Tool::Ellipse => Shape::Ellipse { x: at.x, y: at.y, w: 0.0, h: 0.0 },
        Tool::Line => Shape::Line { x1: at.x, y1: at.y, x2: at.x, y2: at.y },
        Tool::Arrow => Shape::Arrow { x1: at.x, y1: at.y, x2: at.x, y2: at.y },
        Tool::Text => Shape::Text { x: at.x, y: at.y, text: String::new(), font_size: 0.0 },
    }
}

fn extend_shape(shape: &mut Shape, at: Point) {
    match shape {
        Shape::Freehand { points, .. } => points.push(at),
        Shape::Rectangle { x, y, w, h } | Shape::Ellipse { x, y, w, h } => {
            // Kept signed: the preview follows the drag direction.
            *w = at.x - *x;
            *h = at.y - *y;
        }
        Shape::Line { x2, y2, .. } | Shape::Arrow { x2, y2, .. } => {
            *x2 = at.x;
            *y2 = at.y;
        }
        Shape::Text { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        engine: ToolEngine,
        store: AnnotationStore,
        history: History,
    }

    impl Harness {
        fn new(tool: Tool) -> Self {
            Self {
                engine: ToolEngine::new(tool, ToolStyle::default()),
                store: AnnotationStore::new(),
                history: History::new(),
            }
        }

        fn down(&mut self, x: f32, y: f32) -> ToolEvent {
            self.engine.pointer_down(1, Point::new(x, y), &mut self.store, &mut self.history)
        }

        fn drag(&mut self, points: &[(f32, f32)]) -> ToolEvent {
            let (first, rest) = points.split_first().expect("at least one point");
            self.down(first.0, first.1);
            for &(x, y) in rest {
                self.engine.pointer_move(Point::new(x, y));
            }
            self.engine.pointer_up(&mut self.store)
        }
    }

    #[test]
    fn pen_stroke_commits_every_sample() {
        let mut h = Harness::new(Tool::Pen);
        h.engine.set_color(Color::RED);
        h.engine.set_stroke_width(3.0);

        let event = h.drag(&[(10.0, 10.0), (20.0, 20.0), (30.0, 10.0)]);
        assert_eq!(event, ToolEvent::Committed { page: 1 });

        let page = h.store.get(1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].color, Color::RED);
        assert_eq!(page[0].stroke_width, 3.0);
        assert_eq!(
            page[0].shape,
            Shape::Freehand {
                kind: StrokeKind::Pen,
                points: vec![
                    Point::new(10.0, 10.0),
                    Point::new(20.0, 20.0),
                    Point::new(30.0, 10.0),
                ],
            }
        );
        assert_eq!(h.history.undo_len(), 1);
        assert!(h.engine.is_idle());
    }

    #[test]
    fn history_is_recorded_at_pointer_down() {
        let mut h = Harness::new(Tool::Rectangle);
        h.down(5.0, 5.0);
        assert_eq!(h.history.undo_len(), 1);
        assert!(h.store.get(1).is_empty(), "draft stays out of the store");
    }

    #[test]
    fn rectangle_keeps_signed_extent_while_dragging() {
        let mut h = Harness::new(Tool::Rectangle);
        h.drag(&[(100.0, 100.0), (70.0, 60.0), (40.0, 40.0)]);
        assert_eq!(
            h.store.get(1)[0].shape,
            Shape::Rectangle { x: 100.0, y: 100.0, w: -60.0, h: -60.0 }
        );
    }

    #[test]
    fn zero_length_lines_are_still_committed() {
        for tool in [Tool::Line, Tool::Arrow] {
            let mut h = Harness::new(tool);
            assert_eq!(h.drag(&[(5.0, 5.0)]), ToolEvent::Committed { page: 1 });
            assert_eq!(h.store.get(1).len(), 1);
        }
    }

    #[test]
    fn pointer_leave_commits_like_pointer_up() {
        let mut h = Harness::new(Tool::Highlighter);
        h.down(1.0, 1.0);
        h.engine.pointer_move(Point::new(2.0, 2.0));
        assert_eq!(h.engine.pointer_leave(&mut h.store), ToolEvent::Committed { page: 1 });
        assert_eq!(h.store.get(1).len(), 1);
    }

    #[test]
    fn moves_without_a_press_are_ignored() {
        let mut h = Harness::new(Tool::Pen);
        assert_eq!(h.engine.pointer_move(Point::new(1.0, 1.0)), ToolEvent::Ignored);
        assert_eq!(h.engine.pointer_up(&mut h.store), ToolEvent::Ignored);
        assert!(h.store.is_empty());
    }

    #[test]
    fn style_changes_do_not_affect_the_draft() {
        let mut h = Harness::new(Tool::Pen);
        h.engine.set_color(Color::BLUE);
        h.down(0.0, 0.0);
        h.engine.set_color(Color::YELLOW);
        h.engine.set_stroke_width(9.0);
        h.engine.pointer_up(&mut h.store);

        assert_eq!(h.store.get(1)[0].color, Color::BLUE);
        assert_eq!(h.store.get(1)[0].stroke_width, 3.0);
        assert_eq!(h.engine.style().color, Color::YELLOW);
    }

    #[test]
    fn text_cancel_leaves_no_trace() {
        let mut h = Harness::new(Tool::Text);
        assert_eq!(h.down(50.0, 50.0), ToolEvent::TextStarted { page: 1 });
        h.engine.text_input("hello");
        assert_eq!(h.engine.cancel_text(), ToolEvent::Discarded);

        assert!(h.store.is_empty());
        assert_eq!(h.history.undo_len(), 0);
    }

    #[test]
    fn blank_text_is_discarded_on_confirm() {
        let mut h = Harness::new(Tool::Text);
        h.down(50.0, 50.0);
        h.engine.text_input("   ");
        assert_eq!(h.engine.confirm_text(&mut h.store, &mut h.history), ToolEvent::Discarded);
        assert!(h.store.is_empty());
        assert_eq!(h.history.undo_len(), 0);
    }

    #[test]
    fn confirmed_text_uses_the_style_at_placement() {
        let mut h = Harness::new(Tool::Text);
        h.engine.set_font_size(20.0);
        h.down(50.0, 60.0);
        h.engine.set_font_size(40.0);
        h.engine.text_input("helo");
        h.engine.backspace();
        h.engine.text_input("lo");

        let event = h.engine.confirm_text(&mut h.store, &mut h.history);
        assert_eq!(event, ToolEvent::Committed { page: 1 });
        assert_eq!(
            h.store.get(1)[0].shape,
            Shape::Text { x: 50.0, y: 60.0, text: "hello".to_owned(), font_size: 20.0 }
        );
        assert_eq!(h.history.undo_len(), 1);
    }

    #[test]
    fn pressing_elsewhere_confirms_pending_text() {
        let mut h = Harness::new(Tool::Text);
        h.down(10.0, 10.0);
        h.engine.text_input("first");
        h.down(90.0, 90.0);

        assert_eq!(h.store.get(1).len(), 1);
        assert_eq!(h.engine.pending_text(), Some((1, Point::new(90.0, 90.0), "")));
    }

    #[test]
    fn switching_tools_mid_stroke_commits_it() {
        let mut h = Harness::new(Tool::Pen);
        h.down(1.0, 1.0);
        let event = h.engine.set_tool(Tool::Ellipse, &mut h.store, &mut h.history);

        assert_eq!(event, ToolEvent::Committed { page: 1 });
        assert_eq!(h.engine.tool(), Tool::Ellipse);
        assert!(h.engine.is_idle());
    }

    #[test]
    fn non_positive_widths_are_ignored() {
        let mut engine = ToolEngine::default();
        engine.set_stroke_width(0.0);
        engine.set_font_size(f32::NAN);
        assert_eq!(engine.style(), ToolStyle::default());
    }
}
