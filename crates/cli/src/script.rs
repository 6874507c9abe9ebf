//! Recorded editing sessions for `pagemark replay`.
//!
//! A script is a JSON array of events, each tagged by `"event"`:
//!
//! ```json
//! [
//!   { "event": "tool", "tool": "rectangle" },
//!   { "event": "color", "color": "#2196f3" },
//!   { "event": "down", "x": 40, "y": 40 },
//!   { "event": "move", "x": 160, "y": 90 },
//!   { "event": "up" },
//!   { "event": "key", "key": "z", "ctrl": true }
//! ]
//! ```
//!
//! Pointer positions are in document coordinates of the current page.

use anyhow::{bail, Context, Result};
use doc_model::{Color, Point, Tool};
use pagemark_core::{Editor, Key, KeyInput};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Tool { tool: Tool },
    Color { color: Color },
    StrokeWidth { width: f32 },
    FontSize { size: f32 },
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave,
    Text { text: String },
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
    },
    Page { page: u32 },
    Zoom { zoom: f32 },
    Undo,
    Redo,
    ClearPage,
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptEvent>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid script {}", path.display()))
}

/// Feeds `events` through `editor` in order.
pub fn replay(editor: &mut Editor, events: &[ScriptEvent]) -> Result<()> {
    for (index, event) in events.iter().enumerate() {
        apply(editor, event).with_context(|| format!("script event {index} ({event:?})"))?;
    }
    Ok(())
}

fn apply(editor: &mut Editor, event: &ScriptEvent) -> Result<()> {
    match event {
        ScriptEvent::Tool { tool } => {
            editor.set_tool(*tool);
        }
        ScriptEvent::Color { color } => editor.set_color(*color),
        ScriptEvent::StrokeWidth { width } => editor.set_stroke_width(*width),
        ScriptEvent::FontSize { size } => editor.set_font_size(*size),
        ScriptEvent::Down { x, y } => {
            editor.pointer_down_at(Point::new(*x, *y));
        }
        ScriptEvent::Move { x, y } => {
            editor.pointer_move_at(Point::new(*x, *y));
        }
        ScriptEvent::Up => {
            editor.pointer_up();
        }
        ScriptEvent::Leave => {
            editor.pointer_leave();
        }
        ScriptEvent::Text { text } => {
            editor.text_input(text);
        }
        ScriptEvent::Key { key, ctrl, shift } => {
            let input = KeyInput { key: parse_key(key)?, ctrl: *ctrl, shift: *shift };
            let action = editor.handle_key(input, false);
            log::debug!("key {key:?} -> {action:?}");
        }
        ScriptEvent::Page { page } => {
            editor.go_to_page(*page)?;
        }
        ScriptEvent::Zoom { zoom } => {
            editor.set_zoom(*zoom)?;
        }
        ScriptEvent::Undo => {
            editor.undo();
        }
        ScriptEvent::Redo => {
            editor.redo();
        }
        ScriptEvent::ClearPage => {
            editor.clear_page();
        }
    }
    Ok(())
}

fn parse_key(name: &str) -> Result<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "enter" => Key::Enter,
        "escape" | "esc" => Key::Escape,
        "backspace" => Key::Backspace,
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Char(c),
                _ => bail!("unknown key {name:?}"),
            }
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_events() {
        let events: Vec<ScriptEvent> = serde_json::from_str(
            r##"[
                {"event": "tool", "tool": "arrow"},
                {"event": "color", "color": "#00ff00"},
                {"event": "down", "x": 1, "y": 2.5},
                {"event": "up"},
                {"event": "key", "key": "Z", "ctrl": true, "shift": true}
            ]"##,
        )
        .expect("script");

        assert_eq!(events[0], ScriptEvent::Tool { tool: Tool::Arrow });
        assert_eq!(events[1], ScriptEvent::Color { color: Color::rgb(0, 255, 0) });
        assert_eq!(events[2], ScriptEvent::Down { x: 1.0, y: 2.5 });
        assert_eq!(events[3], ScriptEvent::Up);
        assert_eq!(
            events[4],
            ScriptEvent::Key { key: "Z".to_owned(), ctrl: true, shift: true }
        );
    }

    #[test]
    fn key_names() {
        assert_eq!(parse_key("Enter").expect("enter"), Key::Enter);
        assert_eq!(parse_key("esc").expect("escape"), Key::Escape);
        assert_eq!(parse_key("h").expect("char"), Key::Char('h'));
        assert!(parse_key("F12").is_err());
    }
}
