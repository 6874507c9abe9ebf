//! Keyboard shortcuts and the actions they map to.

use doc_model::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false, shift: false }
    }

    pub fn ctrl(key: Key) -> Self {
        Self { key, ctrl: true, shift: false }
    }

    pub fn ctrl_shift(key: Key) -> Self {
        Self { key, ctrl: true, shift: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    SelectTool(Tool),
    Undo,
    Redo,
    ConfirmText,
    CancelText,
    InsertChar(char),
    DeleteChar,
    None,
}

/// Maps a key press to an editor action.
///
/// While a text input has focus, shortcuts are left to the input: only
/// Enter and Escape (confirm and cancel) and plain typing are handled.
pub fn interpret(input: KeyInput, text_focus: bool) -> KeyAction {
    if text_focus {
        return match input.key {
            Key::Enter => KeyAction::ConfirmText,
            Key::Escape => KeyAction::CancelText,
            Key::Backspace => KeyAction::DeleteChar,
            Key::Char(c) if !input.ctrl => KeyAction::InsertChar(c),
            Key::Char(_) => KeyAction::None,
        };
    }

    match input.key {
        Key::Char(c) if input.ctrl => match c.to_ascii_lowercase() {
            'z' if input.shift => KeyAction::Redo,
            'z' => KeyAction::Undo,
            'y' => KeyAction::Redo,
            _ => KeyAction::None,
        },
        Key::Char(c) => Tool::from_shortcut(c).map_or(KeyAction::None, KeyAction::SelectTool),
        _ => KeyAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_and_redo_chords() {
        assert_eq!(interpret(KeyInput::ctrl(Key::Char('z')), false), KeyAction::Undo);
        assert_eq!(interpret(KeyInput::ctrl(Key::Char('y')), false), KeyAction::Redo);
        assert_eq!(interpret(KeyInput::ctrl_shift(Key::Char('Z')), false), KeyAction::Redo);
    }

    #[test]
    fn letters_select_tools() {
        assert_eq!(
            interpret(KeyInput::plain(Key::Char('h')), false),
            KeyAction::SelectTool(Tool::Highlighter)
        );
        assert_eq!(interpret(KeyInput::plain(Key::Char('q')), false), KeyAction::None);
    }

    #[test]
    fn text_focus_suppresses_shortcuts() {
        assert_eq!(interpret(KeyInput::plain(Key::Char('h')), true), KeyAction::InsertChar('h'));
        assert_eq!(interpret(KeyInput::ctrl(Key::Char('z')), true), KeyAction::None);
        assert_eq!(interpret(KeyInput::plain(Key::Enter), true), KeyAction::ConfirmText);
        assert_eq!(interpret(KeyInput::plain(Key::Escape), true), KeyAction::CancelText);
    }

    #[test]
    fn enter_and_escape_do_nothing_without_text_focus() {
        assert_eq!(interpret(KeyInput::plain(Key::Enter), false), KeyAction::None);
        assert_eq!(interpret(KeyInput::plain(Key::Escape), false), KeyAction::None);
    }
}
