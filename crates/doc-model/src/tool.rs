use crate::{Color, ModelError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Pen,
    Highlighter,
    Eraser,
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Text,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::Pen,
        Tool::Highlighter,
        Tool::Eraser,
        Tool::Rectangle,
        Tool::Ellipse,
        Tool::Line,
        Tool::Arrow,
        Tool::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Pen => "pen",
            Tool::Highlighter => "highlighter",
            Tool::Eraser => "eraser",
            Tool::Rectangle => "rectangle",
            Tool::Ellipse => "ellipse",
            Tool::Line => "line",
            Tool::Arrow => "arrow",
            Tool::Text => "text",
        }
    }

    /// Single-letter keyboard shortcut.
    pub fn shortcut(self) -> char {
        match self {
            Tool::Pen => 'p',
            Tool::Highlighter => 'h',
            Tool::Eraser => 'e',
            Tool::Rectangle => 'r',
            Tool::Ellipse => 'o',
            Tool::Line => 'l',
            Tool::Arrow => 'a',
            Tool::Text => 't',
        }
    }

    pub fn from_shortcut(key: char) -> Option<Tool> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|tool| tool.shortcut() == key)
    }

    /// Tools that start a stroke on pointer-down (everything but text).
    pub fn is_drawing(self) -> bool {
        !matches!(self, Tool::Text)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == wanted)
            .ok_or_else(|| ModelError::UnknownTool(value.to_owned()))
    }
}

/// Style captured by an annotation when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolStyle {
    pub color: Color,
    pub stroke_width: f32,
    pub font_size: f32,
}

impl Default for ToolStyle {
    fn default() -> Self {
        Self { color: Color::RED, stroke_width: 3.0, font_size: 16.0 }
    }
}
